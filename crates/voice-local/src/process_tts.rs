//! Offline text-to-speech through a child process
//!
//! `espeak` speaks directly to the sound card. `piper` writes raw PCM which is piped into
//! `aplay`. Both run detached from the caller so `speak` returns as soon as the process is
//! spawned; `is_idle` reaps it with `try_wait` and `stop` kills it.

use crate::{SpeechEngine, SpeechError, SpeechHandle};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

const PIPER_SAMPLE_RATE: u32 = 22050;

#[derive(Clone, Debug)]
pub enum SpeechCommand {
    Espeak { voice: String },
    Piper { model: PathBuf },
}

impl SpeechCommand {
    fn programs(&self) -> &'static [&'static str] {
        match self {
            SpeechCommand::Espeak { .. } => &["espeak"],
            SpeechCommand::Piper { .. } => &["piper", "aplay"],
        }
    }
}

struct Playback {
    handle: SpeechHandle,
    // The last process in the pipeline decides when audio is done
    children: Vec<Child>,
}

pub struct ProcessSpeech {
    command: SpeechCommand,
    current: Option<Playback>,
    next_id: u64,
}

impl ProcessSpeech {
    /// Build the engine after checking that the needed programs are installed.
    pub fn new(command: SpeechCommand) -> Result<Self, SpeechError> {
        for program in command.programs() {
            if let Err(e) = which::which(program) {
                return Err(SpeechError::Unavailable(format!("`{program}`: {e}")));
            }
        }
        if let SpeechCommand::Piper { model } = &command {
            if !model.exists() {
                return Err(SpeechError::Unavailable(format!(
                    "piper model missing: {}",
                    model.display()
                )));
            }
        }
        info!(command = ?command, "process speech ready");
        Ok(Self {
            command,
            current: None,
            next_id: 0,
        })
    }

    fn spawn(&self, text: &str) -> std::io::Result<Vec<Child>> {
        match &self.command {
            SpeechCommand::Espeak { voice } => {
                let child = Command::new("espeak")
                    .args(["-v", voice.as_str(), "--", text])
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()?;
                Ok(vec![child])
            }
            SpeechCommand::Piper { model } => {
                let mut piper = Command::new("piper")
                    .arg("--model")
                    .arg(model)
                    .arg("--output-raw")
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .spawn()?;
                let pcm = piper.stdout.take().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "piper stdout missing")
                })?;
                let player = Command::new("aplay")
                    .args(["-q", "-f", "S16_LE", "-c", "1", "-t", "raw", "-r"])
                    .arg(PIPER_SAMPLE_RATE.to_string())
                    .stdin(Stdio::from(pcm))
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn();
                let player = match player {
                    Ok(p) => p,
                    Err(e) => {
                        reap(std::slice::from_mut(&mut piper));
                        return Err(e);
                    }
                };
                let stdin = piper.stdin.take();
                let mut children = vec![piper, player];
                // Closing stdin tells piper the utterance is complete
                if let Some(stdin) = stdin {
                    feed_or_reap(stdin, text, &mut children)?;
                }
                Ok(children)
            }
        }
    }

    fn kill_current(&mut self) {
        if let Some(mut playback) = self.current.take() {
            reap(&mut playback.children);
            debug!(handle = playback.handle.0, "speech process stopped");
        }
    }
}

impl SpeechEngine for ProcessSpeech {
    fn speak(&mut self, text: &str) -> Result<SpeechHandle, SpeechError> {
        self.kill_current();
        let children = self
            .spawn(text)
            .map_err(|e| SpeechError::Dispatch(e.to_string()))?;
        self.next_id += 1;
        let handle = SpeechHandle(self.next_id);
        self.current = Some(Playback { handle, children });
        Ok(handle)
    }

    fn stop(&mut self, handle: SpeechHandle) {
        if self.current.as_ref().map(|p| p.handle) == Some(handle) {
            self.kill_current();
        }
    }

    fn is_idle(&mut self) -> bool {
        let Some(playback) = self.current.as_mut() else {
            return true;
        };
        let Some(last) = playback.children.last_mut() else {
            self.current = None;
            return true;
        };
        match last.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    warn!(status = %status, "speech process exited with failure");
                }
                // Reap anything left upstream of the player
                if let Some(mut done) = self.current.take() {
                    for child in &mut done.children {
                        let _ = child.wait();
                    }
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to poll speech process");
                self.kill_current();
                true
            }
        }
    }

    fn name(&self) -> &str {
        match self.command {
            SpeechCommand::Espeak { .. } => "espeak",
            SpeechCommand::Piper { .. } => "piper",
        }
    }
}

impl Drop for ProcessSpeech {
    fn drop(&mut self) {
        self.kill_current();
    }
}

fn reap(children: &mut [Child]) {
    for child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Write the utterance; on failure no process of the pipeline is left running.
fn feed_or_reap(mut stdin: impl Write, text: &str, children: &mut [Child]) -> std::io::Result<()> {
    let written = writeln!(stdin, "{text}");
    if written.is_err() {
        reap(children);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reader gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        assert!(which::which("definitely-not-a-real-tts-binary").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_reaps_pipeline() {
        let mut children = vec![
            Command::new("sleep").arg("30").spawn().unwrap(),
            Command::new("sleep").arg("30").spawn().unwrap(),
        ];
        assert!(feed_or_reap(BrokenPipe, "hello", &mut children).is_err());
        for child in &mut children {
            assert!(child.try_wait().unwrap().is_some());
        }
    }

    #[test]
    fn test_missing_piper_model_is_rejected() {
        let cmd = SpeechCommand::Piper {
            model: PathBuf::from("/nonexistent/voice.onnx"),
        };
        assert!(matches!(
            ProcessSpeech::new(cmd),
            Err(SpeechError::Unavailable(_))
        ));
    }
}
