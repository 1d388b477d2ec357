//! Scroll destination decisions and load-more triggering.
//!
//! Programmatic scrolls produce scroll-position callbacks of their own; the
//! suppression window keeps those from re-triggering pagination. Position
//! callbacks are also debounced so a fast fling is evaluated only a few
//! times.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::SyncConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub offset_y: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f64 {
        self.content_height - (self.offset_y + self.viewport_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDirection {
    Top,
    Bottom,
}

#[derive(Debug)]
pub struct ScrollCoordinator {
    debounce: Duration,
    suppression: Duration,
    threshold: f64,
    last_processed: Option<Instant>,
    last_offset: Option<f64>,
    suppressed_until: Option<Instant>,
}

impl ScrollCoordinator {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            debounce: config.scroll_debounce,
            suppression: config.excessive_loading_suppression,
            threshold: config.load_more_threshold,
            last_processed: None,
            last_offset: None,
            suppressed_until: None,
        }
    }

    /// Suppress load-more for the suppression window starting at `now`.
    pub fn disable_excessive_loading(&mut self, now: Instant) {
        self.suppressed_until = Some(now + self.suppression);
    }

    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// Evaluate a scroll-position callback.
    ///
    /// The scroll direction decides which edge is checked: moving up checks
    /// the top, moving down the bottom.
    pub fn on_scroll(&mut self, now: Instant, metrics: ScrollMetrics) -> Option<LoadDirection> {
        let previous = self.last_offset.replace(metrics.offset_y);

        if self.is_suppressed(now) {
            trace!("scroll event suppressed after programmatic scroll");
            return None;
        }
        if let Some(last) = self.last_processed {
            if now.duration_since(last) < self.debounce {
                return None;
            }
        }
        self.last_processed = Some(now);

        let moving_up = previous.is_some_and(|prev| metrics.offset_y < prev);
        let moving_down = previous.is_some_and(|prev| metrics.offset_y > prev);

        if moving_up && metrics.offset_y < self.threshold {
            Some(LoadDirection::Top)
        } else if moving_down && metrics.distance_to_bottom() < self.threshold {
            Some(LoadDirection::Bottom)
        } else {
            None
        }
    }

    /// Auto-scroll on a new message only when the user already sits at the
    /// bottom or sent it.
    pub fn should_auto_scroll(&self, is_at_bottom: bool, is_me: bool) -> bool {
        is_at_bottom || is_me
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(offset_y: f64) -> ScrollMetrics {
        ScrollMetrics {
            offset_y,
            content_height: 10_000.0,
            viewport_height: 800.0,
        }
    }

    fn coordinator() -> ScrollCoordinator {
        ScrollCoordinator::new(&SyncConfig::default())
    }

    #[test]
    fn test_scrolling_up_near_top_loads_top() {
        let mut scroll = coordinator();
        let t0 = Instant::now();
        assert_eq!(scroll.on_scroll(t0, metrics(2_000.0)), None);
        let t1 = t0 + Duration::from_millis(600);
        assert_eq!(scroll.on_scroll(t1, metrics(500.0)), Some(LoadDirection::Top));
    }

    #[test]
    fn test_scrolling_down_near_bottom_loads_bottom() {
        let mut scroll = coordinator();
        let t0 = Instant::now();
        scroll.on_scroll(t0, metrics(8_000.0));
        let t1 = t0 + Duration::from_millis(600);
        assert_eq!(scroll.on_scroll(t1, metrics(8_700.0)), Some(LoadDirection::Bottom));
    }

    #[test]
    fn test_events_inside_debounce_window_are_dropped() {
        let mut scroll = coordinator();
        let t0 = Instant::now();
        scroll.on_scroll(t0, metrics(2_000.0));
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(scroll.on_scroll(t1, metrics(100.0)), None);
        let t2 = t0 + Duration::from_millis(500);
        assert_eq!(scroll.on_scroll(t2, metrics(50.0)), Some(LoadDirection::Top));
    }

    #[test]
    fn test_programmatic_scroll_suppresses_loading_for_a_second() {
        let mut scroll = coordinator();
        let t0 = Instant::now();
        scroll.on_scroll(t0, metrics(2_000.0));
        scroll.disable_excessive_loading(t0);

        let t1 = t0 + Duration::from_millis(900);
        assert_eq!(scroll.on_scroll(t1, metrics(100.0)), None);

        let t2 = t0 + Duration::from_millis(1_600);
        assert!(!scroll.is_suppressed(t2));
        assert_eq!(scroll.on_scroll(t2, metrics(50.0)), Some(LoadDirection::Top));
    }

    #[test]
    fn test_auto_scroll_rules() {
        let scroll = coordinator();
        assert!(scroll.should_auto_scroll(true, false));
        assert!(scroll.should_auto_scroll(false, true));
        assert!(!scroll.should_auto_scroll(false, false));
    }
}
