//! Hazard classification and coalescing of one detection batch into one utterance

use crate::{Mode, Priority};
use std::cmp::Ordering;
use std::collections::HashSet;
use vision_detect::Detection;

/// The configured hazard label set, matched case-insensitively.
#[derive(Clone, Debug)]
pub struct HazardClassifier {
    labels: HashSet<String>,
}

impl HazardClassifier {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|l| l.as_ref().trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    pub fn is_hazard_label(&self, label: &str) -> bool {
        self.labels.contains(&label.trim().to_lowercase())
    }

    /// Overwrite every `is_hazard` flag from the label set, whatever the model reported.
    pub fn normalize(&self, detections: &mut [Detection]) {
        for det in detections {
            det.is_hazard = self.is_hazard_label(&det.label);
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One batch reduced to the labels worth saying.
#[derive(Clone, Debug, PartialEq)]
pub struct Coalesced {
    /// Distinct labels, highest confidence first
    pub labels: Vec<String>,
    pub priority: Priority,
}

impl Coalesced {
    pub fn text(&self) -> String {
        let list = self.labels.join(", ");
        match self.priority {
            Priority::Hazard => format!("Caution: {list}"),
            Priority::Normal => format!("I see {list}"),
        }
    }
}

#[derive(Clone, Debug)]
struct Candidate<'a> {
    label: &'a str,
    confidence: f32,
    is_hazard: bool,
}

fn by_confidence_desc(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.confidence.total_cmp(&a.confidence)
}

/// Reduce a batch to a single announcement candidate.
///
/// Detections below `threshold` are ignored, and in [`Mode::Hazard`] so is anything not
/// flagged hazardous. Labels are deduplicated keeping their best confidence. When more than
/// `max_labels` remain, hazards take the slots first; the chosen labels are then ordered by
/// descending confidence. Returns `None` when nothing qualifies.
pub fn coalesce(
    detections: &[Detection],
    mode: Mode,
    threshold: f32,
    max_labels: usize,
) -> Option<Coalesced> {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    for det in detections {
        if det.confidence < threshold || (mode == Mode::Hazard && !det.is_hazard) {
            continue;
        }
        match candidates.iter_mut().find(|c| c.label == det.label) {
            Some(existing) => {
                if det.confidence > existing.confidence {
                    existing.confidence = det.confidence;
                }
                existing.is_hazard |= det.is_hazard;
            }
            None => candidates.push(Candidate {
                label: &det.label,
                confidence: det.confidence,
                is_hazard: det.is_hazard,
            }),
        }
    }
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(by_confidence_desc);
    let max_labels = max_labels.max(1);
    let (hazards, others): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| c.is_hazard);
    let mut chosen: Vec<Candidate<'_>> = hazards.into_iter().take(max_labels).collect();
    let room = max_labels - chosen.len();
    chosen.extend(others.into_iter().take(room));
    chosen.sort_by(by_confidence_desc);

    let priority = if chosen.iter().any(|c| c.is_hazard) {
        Priority::Hazard
    } else {
        Priority::Normal
    };
    Some(Coalesced {
        labels: chosen.into_iter().map(|c| c.label.to_string()).collect(),
        priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_detect::BoundingBox;

    fn det(label: &str, confidence: f32, is_hazard: bool) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .with_hazard(is_hazard)
    }

    #[test]
    fn test_three_way_batch_in_normal_mode() {
        let batch = vec![
            det("cup", 0.9, false),
            det("chair", 0.95, false),
            det("knife", 0.8, true),
        ];
        let c = coalesce(&batch, Mode::Normal, 0.5, 3).unwrap();
        assert_eq!(c.priority, Priority::Hazard);
        assert_eq!(c.labels, vec!["chair", "cup", "knife"]);
        assert_eq!(c.text(), "Caution: chair, cup, knife");
    }

    #[test]
    fn test_hazard_mode_keeps_only_hazards() {
        let batch = vec![
            det("cup", 0.99, false),
            det("person", 0.6, true),
            det("car", 0.7, true),
        ];
        let c = coalesce(&batch, Mode::Hazard, 0.5, 3).unwrap();
        assert_eq!(c.labels, vec!["car", "person"]);
        assert_eq!(c.priority, Priority::Hazard);
        assert!(coalesce(&[det("cup", 0.99, false)], Mode::Hazard, 0.5, 3).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let batch = vec![det("cup", 0.5, false), det("pen", 0.49, false)];
        let c = coalesce(&batch, Mode::Normal, 0.5, 3).unwrap();
        assert_eq!(c.labels, vec!["cup"]);
        assert_eq!(c.text(), "I see cup");
    }

    #[test]
    fn test_duplicates_keep_best_confidence() {
        let batch = vec![
            det("cup", 0.6, false),
            det("book", 0.7, false),
            det("cup", 0.9, false),
        ];
        let c = coalesce(&batch, Mode::Normal, 0.5, 3).unwrap();
        assert_eq!(c.labels, vec!["cup", "book"]);
    }

    #[test]
    fn test_cap_never_truncates_hazards() {
        let batch = vec![
            det("chair", 0.99, false),
            det("cup", 0.98, false),
            det("book", 0.97, false),
            det("stairs", 0.55, true),
        ];
        let c = coalesce(&batch, Mode::Normal, 0.5, 3).unwrap();
        assert_eq!(c.labels, vec!["chair", "cup", "stairs"]);
        assert_eq!(c.priority, Priority::Hazard);
    }

    #[test]
    fn test_classifier_overrides_model_flags() {
        let hazards = HazardClassifier::new(["Knife", " person "]);
        let mut batch = vec![det("knife", 0.9, false), det("cup", 0.9, true), det("PERSON", 0.9, false)];
        hazards.normalize(&mut batch);
        let flags: Vec<_> = batch.iter().map(|d| d.is_hazard).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(hazards.len(), 2);
    }

    #[test]
    fn test_hazard_mode_labels_always_from_hazard_set() {
        let hazards = HazardClassifier::new(["person", "car", "knife"]);
        let pool = ["person", "cup", "car", "dog", "knife", "book"];
        for seed in 0..64u32 {
            let mut batch: Vec<Detection> = (0..6)
                .map(|i| {
                    let pick = ((seed * 7 + i * 13) % pool.len() as u32) as usize;
                    let conf = ((seed + i * 17) % 100) as f32 / 100.0;
                    // Model flags deliberately random
                    det(pool[pick], conf, (seed + i) % 2 == 0)
                })
                .collect();
            hazards.normalize(&mut batch);
            if let Some(c) = coalesce(&batch, Mode::Hazard, 0.3, 3) {
                assert!(c.labels.iter().all(|l| hazards.is_hazard_label(l)), "{c:?}");
                assert_eq!(c.priority, Priority::Hazard);
            }
        }
    }
}
