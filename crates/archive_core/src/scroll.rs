//! crates/archive_core/src/scroll.rs
//!
//! Infinite scroll. Scroll events only record the latest position and ask
//! for a frame; the threshold check runs once per frame, so a burst of
//! events costs one evaluation.

use std::time::Duration;

use tokio::time::Instant;

/// Distance from the bottom (px) under which the next page is requested.
pub const LOAD_THRESHOLD_PX: f64 = 1000.0;
/// Quiet period after a trigger during which scrolling is ignored.
pub const TRIGGER_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSettings {
    pub threshold_px: f64,
    pub cooldown: Duration,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            threshold_px: LOAD_THRESHOLD_PX,
            cooldown: TRIGGER_COOLDOWN,
        }
    }
}

/// A viewport snapshot, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f64 {
        (self.document_height - self.scroll_top - self.viewport_height).max(0.0)
    }
}

/// What the loader needs to know about the feed at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStatus {
    pub appending: bool,
    pub has_more: bool,
}

#[derive(Debug, Default)]
pub struct ScrollLoader {
    settings: ScrollSettings,
    latest: Option<ScrollMetrics>,
    frame_requested: bool,
    last_trigger: Option<Instant>,
}

impl ScrollLoader {
    pub fn new(settings: ScrollSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Records the position. Returns `true` when the caller should schedule
    /// a frame; further events before that frame return `false`.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        self.latest = Some(metrics);
        if self.frame_requested {
            return false;
        }
        self.frame_requested = true;
        true
    }

    /// Evaluates the most recent position. Returns `true` when the next page
    /// should be fetched now.
    pub fn on_frame(&mut self, now: Instant, status: FeedStatus) -> bool {
        self.frame_requested = false;
        let Some(metrics) = self.latest.take() else {
            return false;
        };
        if status.appending || !status.has_more {
            return false;
        }
        if metrics.distance_to_bottom() >= self.settings.threshold_px {
            return false;
        }
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) < self.settings.cooldown {
                return false;
            }
        }
        self.last_trigger = Some(now);
        true
    }
}
