//! Configuration for the grant manager and its background tasks.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the grant manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Where the JSON state file lives.
    pub data_path: PathBuf,
    /// How often live grants are written to disk.
    pub persist_interval: Duration,
    /// How often terminal records are dropped from the index.
    pub sweep_interval: Duration,
    /// When a grant's subject cannot be resolved at revocation time, try
    /// again after this long. `None` leaves the grant until the next load.
    pub unresolved_retry: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/timed.json"),
            persist_interval: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            unresolved_retry: Some(Duration::from_secs(10 * 60)),
        }
    }
}

impl ManagerConfig {
    /// Set the state file location.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Set the persistence period.
    pub fn with_persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Set the sweep period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set or disable the unresolved-subject retry delay.
    pub fn with_unresolved_retry(mut self, retry: Option<Duration>) -> Self {
        self.unresolved_retry = retry;
        self
    }
}
