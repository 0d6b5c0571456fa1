//! Spoken command classifier
//!
//! Maps a free-form transcript onto [`WakeEvent`]s with a small ordered table of regexes.
//! A transcript such as "hey buddy, hazard mode" yields the wake phrase followed by the
//! command heard after it.

use crate::{WakeEvent, WakeEventKind};
use regex::Regex;
use tracing::trace;

pub const DEFAULT_WAKE_PHRASE: &str = "hey buddy";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CommandPattern {
    Shutdown,
    Stop,
    ModeSwitch,
    Scan,
}

pub struct CommandClassifier {
    wake: Regex,
    // Order matters: "system shut down" must win over the stop words
    patterns: Vec<(CommandPattern, Regex)>,
    hazard_target: Regex,
    normal_target: Regex,
}

impl CommandClassifier {
    pub fn new(wake_phrases: &[String]) -> Result<Self, regex::Error> {
        let phrases: Vec<String> = wake_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"[\s,]+")
            })
            .collect();
        let wake_alt = if phrases.is_empty() {
            regex::escape(DEFAULT_WAKE_PHRASE).replace(' ', r"[\s,]+")
        } else {
            phrases.join("|")
        };
        let wake = Regex::new(&format!(r"(?i)\b(?:{wake_alt})\b"))?;

        let patterns = vec![
            (
                CommandPattern::Shutdown,
                Regex::new(r"(?i)\b(shut\s*down|system\s+shut\s*down|power\s+off)\b")?,
            ),
            (
                CommandPattern::Stop,
                Regex::new(r"(?i)\b(stop|quiet|cancel|silence|shut\s+up)\b")?,
            ),
            (
                CommandPattern::ModeSwitch,
                Regex::new(r"(?i)\b((hazard|danger|normal)\s+mode|(switch|change|toggle)\s+(the\s+)?mode)\b")?,
            ),
            (
                CommandPattern::Scan,
                Regex::new(r"(?i)(what'?s\s+around|what\s+is\s+around|\bscan\b|look\s+around|\bdescribe\b)")?,
            ),
        ];

        Ok(Self {
            wake,
            patterns,
            hazard_target: Regex::new(r"(?i)\b(hazard|danger)\b")?,
            normal_target: Regex::new(r"(?i)\bnormal\b")?,
        })
    }

    /// Classify one transcript into zero or more events, in spoken order.
    pub fn classify(&self, text: &str) -> Vec<WakeEvent> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();
        let remainder = match self.wake.find(&text) {
            Some(m) => {
                events.push(WakeEvent::wake_phrase());
                text[m.end()..]
                    .trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
                    .to_string()
            }
            None => text.clone(),
        };

        if !remainder.is_empty() {
            events.push(self.classify_command(&remainder));
        }
        trace!(transcript = %text, events = events.len(), "transcript classified");
        events
    }

    fn classify_command(&self, text: &str) -> WakeEvent {
        for (pattern, regex) in &self.patterns {
            if !regex.is_match(text) {
                continue;
            }
            return match pattern {
                CommandPattern::Shutdown => WakeEvent::shutdown(),
                CommandPattern::Stop => WakeEvent::stop(),
                CommandPattern::ModeSwitch => WakeEvent::mode_switch(self.mode_target(text)),
                CommandPattern::Scan => WakeEvent::scan(),
            };
        }
        WakeEvent::new(WakeEventKind::Unknown, Some(text.to_string()))
    }

    fn mode_target(&self, text: &str) -> Option<&'static str> {
        if self.hazard_target.is_match(text) {
            Some("hazard")
        } else if self.normal_target.is_match(text) {
            Some("normal")
        } else {
            None
        }
    }
}
