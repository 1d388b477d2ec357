//! Synchronization settings loaded from environment variables.
//!
//! All settings have sensible defaults so the engine runs with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use chatsync_shared::constants::{
    COMMAND_BUFFER, EXCESSIVE_LOADING_SUPPRESSION_MS, HIGHLIGHT_DURATION_MS, LOAD_MORE_THRESHOLD,
    PAGE_SIZE, SCROLL_DEBOUNCE_MS,
};
use chatsync_shared::SyncError;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Messages per history page.
    /// Env: `CHATSYNC_PAGE_SIZE`
    /// Default: `25`
    pub page_size: usize,

    /// Distance in points from an edge at which load-more fires.
    /// Env: `CHATSYNC_LOAD_THRESHOLD`
    /// Default: `800.0`
    pub load_more_threshold: f64,

    /// Minimum gap between processed scroll-position events.
    /// Env: `CHATSYNC_SCROLL_DEBOUNCE_MS`
    /// Default: `500`
    pub scroll_debounce: Duration,

    /// Load-more suppression after a programmatic scroll.
    /// Env: `CHATSYNC_SUPPRESSION_MS`
    /// Default: `1000`
    pub excessive_loading_suppression: Duration,

    /// How long a jumped-to row stays highlighted.
    /// Env: `CHATSYNC_HIGHLIGHT_MS`
    /// Default: `2500`
    pub highlight_duration: Duration,

    /// Capacity of the engine command channel.
    /// Env: `CHATSYNC_COMMAND_BUFFER`
    /// Default: `256`
    pub command_buffer: usize,

    /// Location of the local history cache. `None` uses the platform cache
    /// directory.
    /// Env: `CHATSYNC_CACHE_PATH`
    pub cache_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            load_more_threshold: LOAD_MORE_THRESHOLD,
            scroll_debounce: Duration::from_millis(SCROLL_DEBOUNCE_MS),
            excessive_loading_suppression: Duration::from_millis(EXCESSIVE_LOADING_SUPPRESSION_MS),
            highlight_duration: Duration::from_millis(HIGHLIGHT_DURATION_MS),
            command_buffer: COMMAND_BUFFER,
            cache_path: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = parse_positive("CHATSYNC_PAGE_SIZE") {
            config.page_size = n;
        }
        if let Some(points) = parse_env::<f64>("CHATSYNC_LOAD_THRESHOLD") {
            config.load_more_threshold = points;
        }
        if let Some(ms) = parse_env::<u64>("CHATSYNC_SCROLL_DEBOUNCE_MS") {
            config.scroll_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env::<u64>("CHATSYNC_SUPPRESSION_MS") {
            config.excessive_loading_suppression = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env::<u64>("CHATSYNC_HIGHLIGHT_MS") {
            config.highlight_duration = Duration::from_millis(ms);
        }
        if let Some(n) = parse_positive("CHATSYNC_COMMAND_BUFFER") {
            config.command_buffer = n;
        }
        if let Ok(path) = std::env::var("CHATSYNC_CACHE_PATH") {
            if !path.is_empty() {
                config.cache_path = Some(PathBuf::from(path));
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.page_size == 0 {
            return Err(SyncError::InvalidConfig("page_size must be positive".into()));
        }
        if self.command_buffer == 0 {
            return Err(SyncError::InvalidConfig(
                "command_buffer must be positive".into(),
            ));
        }
        if !self.load_more_threshold.is_finite() || self.load_more_threshold < 0.0 {
            return Err(SyncError::InvalidConfig(format!(
                "load_more_threshold out of range: {}",
                self.load_more_threshold
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = name, value = %value, "Invalid value, using default");
            None
        }
    }
}

fn parse_positive(name: &str) -> Option<usize> {
    let n = parse_env::<usize>(name)?;
    if n == 0 {
        tracing::warn!(var = name, "Must be positive, using default");
        return None;
    }
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.scroll_debounce, Duration::from_millis(500));
        assert_eq!(config.highlight_duration, Duration::from_millis(2_500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = SyncConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_env_reads_overrides() {
        std::env::set_var("CHATSYNC_HIGHLIGHT_MS", "1000");
        std::env::set_var("CHATSYNC_COMMAND_BUFFER", "not-a-number");
        let config = SyncConfig::from_env();
        std::env::remove_var("CHATSYNC_HIGHLIGHT_MS");
        std::env::remove_var("CHATSYNC_COMMAND_BUFFER");

        assert_eq!(config.highlight_duration, Duration::from_millis(1_000));
        assert_eq!(config.command_buffer, 256);
    }

    #[test]
    fn test_from_env_keeps_default_for_zero_page_size() {
        std::env::set_var("CHATSYNC_PAGE_SIZE", "0");
        let config = SyncConfig::from_env();
        std::env::remove_var("CHATSYNC_PAGE_SIZE");

        assert_eq!(config.page_size, 25);
        assert!(config.validate().is_ok());
    }
}
