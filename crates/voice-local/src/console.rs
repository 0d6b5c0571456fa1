use crate::{CommandClassifier, EngineError, WakeEvent, WakeWordEngine};
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Wake engine fed by typed lines, for bring-up on hosts without a microphone.
pub struct ConsoleWakeEngine {
    lines: Receiver<String>,
    classifier: CommandClassifier,
    pending: VecDeque<WakeEvent>,
}

impl ConsoleWakeEngine {
    pub fn from_lines(lines: Receiver<String>, classifier: CommandClassifier) -> Self {
        Self {
            lines,
            classifier,
            pending: VecDeque::new(),
        }
    }

    /// Read lines from standard input on a background thread.
    pub fn stdin(classifier: CommandClassifier) -> Result<Self, EngineError> {
        let (tx, rx) = mpsc::sync_channel::<String>(16);
        std::thread::Builder::new()
            .name("console-wake".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| EngineError::Device(e.to_string()))?;
        Ok(Self::from_lines(rx, classifier))
    }
}

impl WakeWordEngine for ConsoleWakeEngine {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<WakeEvent>, EngineError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        match self.lines.recv_timeout(timeout) {
            Ok(line) => {
                self.pending.extend(self.classifier.classify(&line));
                Ok(self.pending.pop_front())
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Disconnected),
        }
    }

    fn name(&self) -> &str {
        "console"
    }
}
