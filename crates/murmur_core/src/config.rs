//! Store configuration.

use std::time::Duration;

/// Lifetime of a notification after creation.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for opening a replica store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the journal file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the journal after every committed write.
    pub sync_on_write: bool,

    /// How long notifications stay visible.
    pub notification_ttl: Duration,

    /// Whether to run the expiry sweep right after replay.
    pub sweep_on_open: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: false,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            sweep_on_open: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the journal if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the journal on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the notification lifetime.
    #[must_use]
    pub const fn notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    /// Sets whether to sweep expired notifications on open.
    #[must_use]
    pub const fn sweep_on_open(mut self, value: bool) -> Self {
        self.sweep_on_open = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(!config.sync_on_write);
        assert!(config.sweep_on_open);
        assert_eq!(config.notification_ttl, Duration::from_secs(604_800));
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .create_if_missing(false)
            .sync_on_write(true)
            .notification_ttl(Duration::from_secs(60))
            .sweep_on_open(false);

        assert!(!config.create_if_missing);
        assert!(config.sync_on_write);
        assert!(!config.sweep_on_open);
        assert_eq!(config.notification_ttl, Duration::from_secs(60));
    }
}
