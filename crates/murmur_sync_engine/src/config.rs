//! Configuration for the sync engine.

use std::time::Duration;

/// Default interval between re-announcement rounds.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default age limit of posts re-announced by a resync round.
pub const DEFAULT_RESYNC_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Interval of the background resync round. `None` disables it;
    /// [`SyncEngine::resync`](crate::SyncEngine::resync) still works.
    pub resync_interval: Option<Duration>,
    /// Only own posts younger than this are re-announced.
    pub resync_window: Duration,
    /// Capacity of the inbound delivery channel.
    pub inbound_buffer: usize,
    /// Maximum number of ingestion tasks in flight at once.
    pub max_inbound_tasks: usize,
    /// Whether each resync round also sweeps expired notifications.
    pub sweep_on_resync: bool,
}

impl SyncConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resync_interval: Some(DEFAULT_RESYNC_INTERVAL),
            resync_window: DEFAULT_RESYNC_WINDOW,
            inbound_buffer: 256,
            max_inbound_tasks: 64,
            sweep_on_resync: true,
        }
    }

    /// Sets the background resync interval.
    #[must_use]
    pub const fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }

    /// Disables the background resync round.
    #[must_use]
    pub const fn without_background_resync(mut self) -> Self {
        self.resync_interval = None;
        self
    }

    /// Sets the resync window.
    #[must_use]
    pub const fn with_resync_window(mut self, window: Duration) -> Self {
        self.resync_window = window;
        self
    }

    /// Sets the inbound channel capacity.
    #[must_use]
    pub const fn with_inbound_buffer(mut self, capacity: usize) -> Self {
        self.inbound_buffer = capacity;
        self
    }

    /// Sets the ingestion concurrency limit.
    #[must_use]
    pub const fn with_max_inbound_tasks(mut self, limit: usize) -> Self {
        self.max_inbound_tasks = limit;
        self
    }

    /// Sets whether resync rounds sweep expired notifications.
    #[must_use]
    pub const fn with_sweep_on_resync(mut self, sweep: bool) -> Self {
        self.sweep_on_resync = sweep;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_resync_interval(Duration::from_secs(10))
            .with_resync_window(Duration::from_secs(3600))
            .with_inbound_buffer(8)
            .with_max_inbound_tasks(2)
            .with_sweep_on_resync(false);

        assert_eq!(config.resync_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.resync_window, Duration::from_secs(3600));
        assert_eq!(config.inbound_buffer, 8);
        assert_eq!(config.max_inbound_tasks, 2);
        assert!(!config.sweep_on_resync);
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.resync_interval, Some(DEFAULT_RESYNC_INTERVAL));
        assert_eq!(config.resync_window, DEFAULT_RESYNC_WINDOW);
        assert_eq!(config.inbound_buffer, 256);
        assert_eq!(config.max_inbound_tasks, 64);
        assert!(config.sweep_on_resync);

        let config = config.without_background_resync();
        assert_eq!(config.resync_interval, None);
    }
}
