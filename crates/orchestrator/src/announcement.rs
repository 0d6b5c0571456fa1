use std::time::Instant;

/// Two priority classes; `Hazard` sorts above `Normal`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Priority {
    Normal,
    Hazard,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Announcement {
    pub text: String,
    pub priority: Priority,
    /// Detection labels named in `text`, in spoken order; empty for command responses.
    pub labels: Vec<String>,
    pub created_at: Instant,
}

impl Announcement {
    pub fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            text: text.into(),
            priority,
            labels: Vec::new(),
            created_at: Instant::now(),
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, Priority::Normal)
    }

    pub fn hazard(text: impl Into<String>) -> Self {
        Self::new(text, Priority::Hazard)
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn created_at(mut self, at: Instant) -> Self {
        self.created_at = at;
        self
    }
}
