//! Timing information for evaluations.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

/// Start and end timestamps of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// When the evaluation started.
    pub started_at: Timestamp,
    /// When the evaluation ended.
    pub ended_at: Timestamp,
}

impl Timing {
    /// Creates a timing from start and end timestamps.
    pub fn new(started_at: Timestamp, ended_at: Timestamp) -> Self {
        Self {
            started_at,
            ended_at,
        }
    }

    /// Creates a timing that starts at `started_at` and ends now.
    pub fn since(started_at: Timestamp) -> Self {
        Self::new(started_at, Timestamp::now())
    }

    /// Returns the elapsed time.
    pub fn duration(&self) -> SignedDuration {
        self.ended_at.duration_since(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_duration() {
        let start = Timestamp::now();
        let end = start + SignedDuration::from_millis(250);

        let timing = Timing::new(start, end);
        assert_eq!(timing.duration().as_millis(), 250);
    }

    #[test]
    fn test_timing_since_is_not_negative() {
        let timing = Timing::since(Timestamp::now());
        assert!(!timing.duration().is_negative());
    }
}
