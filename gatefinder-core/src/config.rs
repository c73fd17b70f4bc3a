use crate::store::DEFAULT_HOST_CAP;
use std::path::PathBuf;
use std::time::Duration;

/// Run parameters for detection and reporting.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Maximum URLs admitted per host.
    pub host_cap: usize,
    /// Hard deadline for a single detection task.
    pub task_timeout: Duration,
    /// Pause after the load event before probing the DOM.
    pub settle_delay: Duration,
    /// Detection tasks allowed to run at once, across all hosts.
    pub max_in_flight: usize,
    pub output_dir: PathBuf,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            host_cap: DEFAULT_HOST_CAP,
            task_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            max_in_flight: 32,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl DetectorConfig {
    pub fn with_host_cap(mut self, cap: usize) -> Self {
        self.host_cap = cap;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Zero is bumped to one; a pool with no slots would never finish.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.host_cap, 500);
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.output_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_max_in_flight_never_zero() {
        let config = DetectorConfig::default().with_max_in_flight(0);
        assert_eq!(config.max_in_flight, 1);
    }
}
