use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// Player lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing played since the last `apply`.
    #[default]
    Idle,
    Playing,
    Paused,
    /// Last record applied.
    Done,
}

/// Playback tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackOptions {
    /// Multiplier on recorded timing. 2.0 plays twice as fast.
    pub speed: f64,
    /// Records applied per scheduling tick before yielding to the host.
    pub batch_size: usize,
    /// Upper bound on the recorded gap between two records.
    pub max_frame_delay_ms: u64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            batch_size: 20,
            max_frame_delay_ms: 300,
        }
    }
}

impl PlaybackOptions {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_frame_delay(mut self, ms: u64) -> Self {
        self.max_frame_delay_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        validate_speed(self.speed)?;
        if self.batch_size == 0 {
            return Err(OptionsError::ZeroBatchSize);
        }
        Ok(())
    }

    /// Wall-clock delay for a recorded gap of `gap_ms`.
    pub fn scaled_delay(&self, gap_ms: i64) -> Duration {
        let capped = gap_ms.clamp(0, self.max_frame_delay_ms as i64);
        Duration::from_nanos((capped as f64 * 1_000_000.0 / self.speed).round() as u64)
    }
}

pub(crate) fn validate_speed(speed: f64) -> Result<(), OptionsError> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(OptionsError::InvalidSpeed(speed))
    }
}
