use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating mode; exactly one is active at a time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Announce every confident detection
    #[default]
    Normal,
    /// Announce only hazards
    Hazard,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Normal => Mode::Hazard,
            Mode::Hazard => Mode::Normal,
        }
    }

    /// Spoken confirmation after switching into this mode.
    pub fn confirmation(self) -> &'static str {
        match self {
            Mode::Normal => "Normal mode on",
            Mode::Hazard => "Hazard mode on",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Hazard => write!(f, "hazard"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Mode::Normal),
            "hazard" | "danger" => Ok(Mode::Hazard),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}
