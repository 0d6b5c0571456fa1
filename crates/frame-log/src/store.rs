use crate::entry::sidecar_path;
use crate::naming::parse_file_name;
use crate::{stem_for, FrameLogEntry, FrameLogError, FrameRecord, Result};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity FIFO of snapshots mirrored on disk.
pub struct FrameLog {
    dir: PathBuf,
    capacity: usize,
    extension: String,
    ring: VecDeque<FrameLogEntry>,
    next_sequence: u64,
}

#[derive(Default)]
struct StemFiles {
    image: Option<String>,
    sidecar: bool,
}

impl FrameLog {
    /// Open (or create) a log directory.
    ///
    /// Entries whose sidecar survived a previous run are reloaded in write order; anything
    /// beyond `capacity` and any half-written pair is deleted.
    pub fn open(dir: impl AsRef<Path>, capacity: usize, extension: &str) -> Result<Self> {
        if capacity == 0 {
            return Err(FrameLogError::Config("capacity must be at least 1"));
        }
        let extension = extension.trim_start_matches('.').to_string();
        if extension.is_empty() || extension.eq_ignore_ascii_case("json") {
            return Err(FrameLogError::Config("image extension must be set and not json"));
        }
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| FrameLogError::io(&dir, e))?;

        let mut log = Self {
            dir,
            capacity,
            extension,
            ring: VecDeque::with_capacity(capacity + 1),
            next_sequence: 0,
        };
        log.reload()?;
        Ok(log)
    }

    fn reload(&mut self) -> Result<()> {
        let mut stems: BTreeMap<String, StemFiles> = BTreeMap::new();
        let listing = fs::read_dir(&self.dir).map_err(|e| FrameLogError::io(&self.dir, e))?;
        for item in listing {
            let item = item.map_err(|e| FrameLogError::io(&self.dir, e))?;
            let name = item.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((stem, ext)) = parse_file_name(name) else {
                continue;
            };
            let files = stems.entry(stem.to_string()).or_default();
            if ext == "json" {
                files.sidecar = true;
            } else {
                files.image = Some(name.to_string());
            }
        }

        let mut orphans = 0usize;
        let mut restored = Vec::new();
        for (stem, files) in stems {
            match (files.image, files.sidecar) {
                (Some(image_file), true) => match self.load_sidecar(&stem) {
                    Ok(mut entry) => {
                        entry.image_file = image_file;
                        restored.push(entry);
                    }
                    Err(e) => {
                        warn!(stem = %stem, error = %e, "dropping unreadable frame log entry");
                        self.remove_files(&stem, Some(&image_file));
                        orphans += 1;
                    }
                },
                (image, _) => {
                    self.remove_files(&stem, image.as_deref());
                    orphans += 1;
                }
            }
        }

        // Sidecars from before sequences were written all carry 0 and fall back to capture time
        restored.sort_by(|a, b| {
            (a.sequence, a.captured_at, &a.stem).cmp(&(b.sequence, b.captured_at, &b.stem))
        });
        self.next_sequence = restored.last().map_or(0, |e| e.sequence + 1);
        self.ring.extend(restored);

        let mut pruned = 0usize;
        while self.ring.len() > self.capacity {
            self.evict_oldest();
            pruned += 1;
        }
        info!(
            dir = %self.dir.display(),
            restored = self.ring.len(),
            pruned,
            orphans,
            "frame log opened"
        );
        Ok(())
    }

    fn load_sidecar(&self, stem: &str) -> Result<FrameLogEntry> {
        let path = sidecar_path(&self.dir, stem);
        let raw = fs::read(&path).map_err(|e| FrameLogError::io(&path, e))?;
        let mut entry: FrameLogEntry = serde_json::from_slice(&raw)
            .map_err(|source| FrameLogError::Sidecar { path, source })?;
        entry.stem = stem.to_string();
        entry.dir = self.dir.clone();
        Ok(entry)
    }

    /// Append a snapshot, evicting the oldest one once the ring is over capacity.
    pub fn record(&mut self, record: FrameRecord) -> Result<&FrameLogEntry> {
        let stem = self.unique_stem(&record);
        let image_file = format!("{stem}.{}", self.extension);
        let image_path = self.dir.join(&image_file);
        fs::write(&image_path, &record.image).map_err(|e| FrameLogError::io(&image_path, e))?;

        let entry = FrameLogEntry {
            stem: stem.clone(),
            sequence: self.next_sequence,
            captured_at: record.captured_at,
            monotonic: Some(record.monotonic),
            image_file,
            detections: record.detections,
            dir: self.dir.clone(),
        };
        let sidecar = entry.sidecar_path();
        let written = serde_json::to_vec_pretty(&entry)
            .map_err(|source| FrameLogError::Sidecar {
                path: sidecar.clone(),
                source,
            })
            .and_then(|json| fs::write(&sidecar, json).map_err(|e| FrameLogError::io(&sidecar, e)));
        if let Err(e) = written {
            let _ = fs::remove_file(&image_path);
            return Err(e);
        }

        debug!(stem = %stem, detections = entry.detections.len(), "frame logged");
        self.next_sequence += 1;
        self.ring.push_back(entry);
        while self.ring.len() > self.capacity {
            self.evict_oldest();
        }
        // Just pushed, so the ring cannot be empty
        self.ring.back().ok_or(FrameLogError::Config("ring empty after push"))
    }

    fn unique_stem(&self, record: &FrameRecord) -> String {
        let mut seq = 0u32;
        loop {
            let stem = stem_for(record.captured_at, seq);
            let taken = self.ring.back().is_some_and(|e| e.stem == stem)
                || sidecar_path(&self.dir, &stem).exists()
                || self.dir.join(format!("{stem}.{}", self.extension)).exists();
            if !taken {
                return stem;
            }
            seq += 1;
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(old) = self.ring.pop_front() {
            debug!(stem = %old.stem, "evicting frame log entry");
            self.remove_files(&old.stem, Some(&old.image_file));
        }
    }

    fn remove_files(&self, stem: &str, image_file: Option<&str>) {
        let mut paths = vec![sidecar_path(&self.dir, stem)];
        if let Some(image) = image_file {
            paths.push(self.dir.join(image));
        }
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to delete frame log file"),
            }
        }
    }

    /// Retained entries, newest first. Call again to restart.
    pub fn entries(&self) -> impl Iterator<Item = &FrameLogEntry> + '_ {
        self.ring.iter().rev()
    }

    pub fn latest(&self) -> Option<&FrameLogEntry> {
        self.ring.back()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
