use crate::{Announcement, Priority};
use std::collections::VecDeque;
use tracing::warn;

/// Two-class announcement queue: hazards first, FIFO within a class.
///
/// Only the Normal class is bounded. Pushing past its capacity evicts the oldest Normal
/// entry; hazards are never evicted.
#[derive(Debug)]
pub struct AnnouncementQueue {
    hazard: VecDeque<Announcement>,
    normal: VecDeque<Announcement>,
    normal_capacity: usize,
}

impl AnnouncementQueue {
    pub fn new(normal_capacity: usize) -> Self {
        let normal_capacity = normal_capacity.max(1);
        Self {
            hazard: VecDeque::new(),
            normal: VecDeque::with_capacity(normal_capacity),
            normal_capacity,
        }
    }

    /// Enqueue, returning the Normal announcement dropped to make room, if any.
    pub fn push(&mut self, announcement: Announcement) -> Option<Announcement> {
        match announcement.priority {
            Priority::Hazard => {
                self.hazard.push_back(announcement);
                None
            }
            Priority::Normal => {
                let evicted = if self.normal.len() >= self.normal_capacity {
                    self.normal.pop_front()
                } else {
                    None
                };
                if let Some(old) = &evicted {
                    warn!(
                        dropped = %old.text,
                        capacity = self.normal_capacity,
                        "normal announcement queue overflow"
                    );
                }
                self.normal.push_back(announcement);
                evicted
            }
        }
    }

    pub fn pop(&mut self) -> Option<Announcement> {
        self.hazard.pop_front().or_else(|| self.normal.pop_front())
    }

    pub fn peek_priority(&self) -> Option<Priority> {
        if !self.hazard.is_empty() {
            Some(Priority::Hazard)
        } else if !self.normal.is_empty() {
            Some(Priority::Normal)
        } else {
            None
        }
    }

    pub fn has_hazard(&self) -> bool {
        !self.hazard.is_empty()
    }

    /// Drop every queued Normal announcement and return how many were removed.
    pub fn clear_normal(&mut self) -> usize {
        let n = self.normal.len();
        self.normal.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.hazard.len() + self.normal.len()
    }

    pub fn normal_len(&self) -> usize {
        self.normal.len()
    }

    pub fn hazard_len(&self) -> usize {
        self.hazard.len()
    }

    pub fn normal_capacity(&self) -> usize {
        self.normal_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.hazard.is_empty() && self.normal.is_empty()
    }
}
