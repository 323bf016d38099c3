use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default scroll percentage that must be exceeded before consent unlocks.
pub const DEFAULT_UNLOCK_THRESHOLD: f64 = 90.0;

/// Measurements reported by the terms viewport on mount and on every scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollGeometry {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollGeometry {
    /// True when the content fits inside the viewport without scrolling.
    pub fn fits_viewport(&self) -> bool {
        self.scroll_height <= self.client_height
    }

    /// Scroll progress in percent, clamped to `[0, 100]`.
    pub fn progress(&self) -> f64 {
        if self.fits_viewport() {
            return 100.0;
        }
        let scrollable = self.scroll_height - self.client_height;
        clamp_progress(self.scroll_top / scrollable * 100.0)
    }
}

fn clamp_progress(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Observable consent state for the terms gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsentState {
    pub scroll_progress: f64,
    pub unlocked: bool,
    pub accepted: bool,
}

/// Unlocks the consent control once the reader has scrolled (nearly) to the bottom of the terms.
///
/// Unlocking is one-way for the life of the gate: scrolling back up never re-locks it.
#[derive(Debug, Clone)]
pub struct ScrollGate {
    threshold: f64,
    progress: f64,
    unlocked: bool,
    accepted: bool,
}

impl Default for ScrollGate {
    fn default() -> Self {
        Self::new(DEFAULT_UNLOCK_THRESHOLD)
    }
}

impl ScrollGate {
    pub fn new(threshold: f64) -> Self {
        let threshold = if threshold.is_finite() && (0.0..100.0).contains(&threshold) {
            threshold
        } else {
            DEFAULT_UNLOCK_THRESHOLD
        };

        Self {
            threshold,
            progress: 0.0,
            unlocked: false,
            accepted: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed the viewport geometry. Content that fits without scrolling unlocks immediately.
    pub fn observe(&mut self, geometry: ScrollGeometry) -> ConsentState {
        if geometry.fits_viewport() && !self.unlocked {
            debug!("terms fit the viewport; consent unlocked without scrolling");
        }
        self.record_progress(geometry.progress())
    }

    /// Feed an already computed progress percentage.
    pub fn record_progress(&mut self, progress: f64) -> ConsentState {
        self.progress = clamp_progress(progress);
        if !self.unlocked && self.progress > self.threshold {
            self.unlocked = true;
            debug!(progress = self.progress, "terms scrolled through; consent unlocked");
        }
        self.state()
    }

    /// Toggle consent. Ignored while the gate is still locked.
    pub fn set_accepted(&mut self, accepted: bool) -> ConsentState {
        if self.unlocked {
            self.accepted = accepted;
        } else {
            debug!("consent toggle ignored while terms are locked");
        }
        self.state()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn state(&self) -> ConsentState {
        ConsentState {
            scroll_progress: self.progress,
            unlocked: self.unlocked,
            accepted: self.accepted,
        }
    }
}
