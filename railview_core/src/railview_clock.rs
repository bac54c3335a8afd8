//! The "CLOCK" Engine - Looping virtual time for scripted scenarios
//!
//! Virtual time advances by `delta_real * speed_factor` on every tick and
//! restarts from zero once it would pass the scenario horizon. There is no
//! paused state: a paused scenario is simply one whose driver stops calling
//! `advance`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised for invalid clock parameters. State is left unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClockError {
    #[error("Horizon must be finite and positive, got {0}")]
    InvalidHorizon(f64),

    #[error("Speed factor must be finite and positive, got {0}")]
    InvalidSpeedFactor(f64),

    #[error("Tick delta must be finite and non-negative, got {0}")]
    InvalidDelta(f64),

    #[error("Seek target {target} outside [0, {horizon}]")]
    SeekOutOfRange { target: f64, horizon: f64 },
}

/// Virtual scenario clock with a looping horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Current virtual time in seconds, always within `[0, horizon]`
    current: f64,

    /// Scenario length in virtual seconds
    horizon: f64,

    /// Virtual seconds per real second
    speed_factor: f64,

    /// Number of wraps back to zero since construction or reset
    loops: u64,
}

impl SimulationClock {
    /// Creates a clock at time zero.
    ///
    /// # Arguments
    /// * `horizon` - Scenario length in virtual seconds (must be > 0)
    /// * `speed_factor` - Virtual seconds per real second (must be > 0)
    pub fn new(horizon: f64, speed_factor: f64) -> Result<Self, ClockError> {
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(ClockError::InvalidHorizon(horizon));
        }
        validate_speed_factor(speed_factor)?;

        Ok(Self {
            current: 0.0,
            horizon,
            speed_factor,
            loops: 0,
        })
    }

    /// Advances virtual time by `delta_real_secs * speed_factor`.
    ///
    /// When the result would exceed the horizon the scenario restarts at 0.
    /// Landing exactly on the horizon is kept.
    pub fn advance(&mut self, delta_real_secs: f64) -> Result<f64, ClockError> {
        if !delta_real_secs.is_finite() || delta_real_secs < 0.0 {
            return Err(ClockError::InvalidDelta(delta_real_secs));
        }

        let next = self.current + delta_real_secs * self.speed_factor;
        if next > self.horizon || !next.is_finite() {
            self.current = 0.0;
            self.loops += 1;
        } else {
            self.current = next;
        }

        Ok(self.current)
    }

    /// Restarts the scenario.
    pub fn reset(&mut self) -> f64 {
        self.current = 0.0;
        self.loops = 0;
        self.current
    }

    /// Changes the playback speed. Non-positive values are rejected.
    pub fn set_speed_factor(&mut self, factor: f64) -> Result<(), ClockError> {
        validate_speed_factor(factor)?;
        self.speed_factor = factor;
        Ok(())
    }

    /// Jumps to an arbitrary point of the scenario (backward or forward).
    pub fn seek(&mut self, target: f64) -> Result<f64, ClockError> {
        if !target.is_finite() || target < 0.0 || target > self.horizon {
            return Err(ClockError::SeekOutOfRange {
                target,
                horizon: self.horizon,
            });
        }
        self.current = target;
        Ok(self.current)
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.current
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// Number of times the scenario looped back to zero.
    pub fn loops(&self) -> u64 {
        self.loops
    }
}

fn validate_speed_factor(factor: f64) -> Result<(), ClockError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ClockError::InvalidSpeedFactor(factor));
    }
    Ok(())
}
