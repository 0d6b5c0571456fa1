//! Consecutive-failure watchdogs for the capture pipelines

use std::fmt;
use tracing::{info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Subsystem {
    Camera,
    Detector,
    WakeEngine,
}

impl Subsystem {
    /// What the device says when this subsystem has been failing for a while.
    pub fn fault_message(self) -> &'static str {
        match self {
            Subsystem::Camera => "Camera not responding",
            Subsystem::Detector => "Object detection not responding",
            Subsystem::WakeEngine => "Microphone not responding",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subsystem::Camera => "camera",
            Subsystem::Detector => "detector",
            Subsystem::WakeEngine => "wake_engine",
        };
        f.write_str(name)
    }
}

/// Raised once when a subsystem reaches its failure threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct SubsystemFault {
    pub subsystem: Subsystem,
    pub consecutive_failures: u32,
    pub last_error: String,
}

#[derive(Debug)]
pub struct SubsystemWatchdog {
    subsystem: Subsystem,
    threshold: u32,
    consecutive_failures: u32,
    total_failures: u64,
    faulted: bool,
}

impl SubsystemWatchdog {
    pub fn new(subsystem: Subsystem, threshold: u32) -> Self {
        Self {
            subsystem,
            threshold: threshold.max(1),
            consecutive_failures: 0,
            total_failures: 0,
            faulted: false,
        }
    }

    /// Returns true when this success ends a reported fault.
    pub fn record_success(&mut self) -> bool {
        let recovered = self.faulted;
        if recovered {
            info!(
                subsystem = %self.subsystem,
                failures = self.consecutive_failures,
                "subsystem recovered"
            );
        }
        self.consecutive_failures = 0;
        self.faulted = false;
        recovered
    }

    /// Count a failure or timeout. Yields a fault exactly once per failure streak.
    pub fn record_failure(&mut self, error: &dyn fmt::Display) -> Option<SubsystemFault> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures += 1;
        if self.consecutive_failures == 1 {
            warn!(subsystem = %self.subsystem, error = %error, "subsystem call failed");
        }
        if self.faulted || self.consecutive_failures < self.threshold {
            return None;
        }
        self.faulted = true;
        warn!(
            subsystem = %self.subsystem,
            failures = self.consecutive_failures,
            error = %error,
            "subsystem fault"
        );
        Some(SubsystemFault {
            subsystem: self.subsystem,
            consecutive_failures: self.consecutive_failures,
            last_error: error.to_string(),
        })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_fires_once_at_threshold() {
        let mut wd = SubsystemWatchdog::new(Subsystem::Camera, 3);
        assert!(wd.record_failure(&"timeout").is_none());
        assert!(wd.record_failure(&"timeout").is_none());
        let fault = wd.record_failure(&"timeout").unwrap();
        assert_eq!(fault.subsystem, Subsystem::Camera);
        assert_eq!(fault.consecutive_failures, 3);
        assert!(wd.record_failure(&"timeout").is_none());
        assert!(wd.is_faulted());
    }

    #[test]
    fn test_success_rearms() {
        let mut wd = SubsystemWatchdog::new(Subsystem::Detector, 2);
        wd.record_failure(&"x");
        assert!(!wd.record_success());
        wd.record_failure(&"x");
        assert!(wd.record_failure(&"x").is_some());
        assert!(wd.record_success());
        assert_eq!(wd.consecutive_failures(), 0);
        wd.record_failure(&"x");
        assert!(wd.record_failure(&"x").is_some());
        assert_eq!(wd.total_failures(), 5);
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(Subsystem::Camera.fault_message(), "Camera not responding");
        assert_eq!(Subsystem::WakeEngine.to_string(), "wake_engine");
    }
}
