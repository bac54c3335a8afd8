//! The "VIEW" Engine - Named camera contexts with redirectable transitions
//!
//! Three closed contexts (`wide`, `regional`, `detail`) map to fixed camera
//! targets loaded from configuration. Switching context starts an eased flight
//! from wherever the camera is right now, so a second request during a
//! flight redirects it instead of queueing behind it.

use nalgebra::Vector2;
use railview_env::CameraTarget;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewError {
    #[error("Unknown view context: {0}")]
    UnknownContext(String),

    #[error("Invalid camera for {context}: {reason}")]
    InvalidCamera { context: ViewContext, reason: String },
}

/// The closed set of named views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewContext {
    /// Whole corridor
    Wide,
    /// A section of it
    Regional,
    /// Close-up
    Detail,
}

impl ViewContext {
    pub fn name(&self) -> &'static str {
        match self {
            ViewContext::Wide => "wide",
            ViewContext::Regional => "regional",
            ViewContext::Detail => "detail",
        }
    }

    pub fn all() -> Vec<ViewContext> {
        vec![ViewContext::Wide, ViewContext::Regional, ViewContext::Detail]
    }
}

impl fmt::Display for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ViewContext {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wide" => Ok(ViewContext::Wide),
            "regional" => Ok(ViewContext::Regional),
            "detail" => Ok(ViewContext::Detail),
            _ => Err(ViewError::UnknownContext(s.to_string())),
        }
    }
}

/// Camera state: centre plus zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: Vector2<f64>,
    pub zoom: f64,
}

impl Camera {
    pub fn new(center: [f64; 2], zoom: f64) -> Self {
        Self {
            center: Vector2::new(center[0], center[1]),
            zoom,
        }
    }

    /// Linear blend; `s = 0` is `self`, `s = 1` is `other`.
    pub fn lerp(&self, other: &Camera, s: f64) -> Camera {
        Camera {
            center: self.center.lerp(&other.center, s),
            zoom: self.zoom + (other.zoom - self.zoom) * s,
        }
    }

    pub fn to_target(&self) -> CameraTarget {
        CameraTarget {
            center: [self.center.x, self.center.y],
            zoom: self.zoom,
        }
    }
}

impl From<CameraTarget> for Camera {
    fn from(target: CameraTarget) -> Self {
        Camera::new(target.center, target.zoom)
    }
}

/// Camera targets for every context, as written in the scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewCatalogConfig {
    pub wide: CameraTarget,
    pub regional: CameraTarget,
    pub detail: CameraTarget,
}

/// Validated camera targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCatalog {
    wide: Camera,
    regional: Camera,
    detail: Camera,
}

impl ViewCatalog {
    pub fn from_config(config: &ViewCatalogConfig) -> Result<Self, ViewError> {
        let check = |context: ViewContext, target: CameraTarget| -> Result<Camera, ViewError> {
            if !target.center.iter().all(|c| c.is_finite()) {
                return Err(ViewError::InvalidCamera {
                    context,
                    reason: "centre is not finite".to_string(),
                });
            }
            if !target.zoom.is_finite() || target.zoom < 0.0 {
                return Err(ViewError::InvalidCamera {
                    context,
                    reason: format!("zoom {} must be finite and >= 0", target.zoom),
                });
            }
            Ok(target.into())
        };

        Ok(Self {
            wide: check(ViewContext::Wide, config.wide)?,
            regional: check(ViewContext::Regional, config.regional)?,
            detail: check(ViewContext::Detail, config.detail)?,
        })
    }

    pub fn camera(&self, context: ViewContext) -> Camera {
        match context {
            ViewContext::Wide => self.wide,
            ViewContext::Regional => self.regional,
            ViewContext::Detail => self.detail,
        }
    }
}

/// What a `focus` request asks the camera surface to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Already there (or heading there)
    None,
    Fly {
        from: CameraTarget,
        to: CameraTarget,
        duration: Duration,
    },
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    from: Camera,
    to: Camera,
    started: Duration,
    duration: Duration,
}

impl Flight {
    fn progress(&self, now: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.started).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

fn smoothstep(s: f64) -> f64 {
    s * s * (3.0 - 2.0 * s)
}

/// Owns the active context and the camera flight towards it.
#[derive(Debug, Clone)]
pub struct ViewportController {
    catalog: ViewCatalog,
    active: ViewContext,
    flight: Option<Flight>,
    transition_duration: Duration,
}

impl ViewportController {
    /// Starts settled on `initial`.
    pub fn new(catalog: ViewCatalog, initial: ViewContext, transition_duration: Duration) -> Self {
        Self {
            catalog,
            active: initial,
            flight: None,
            transition_duration,
        }
    }

    /// Switches to the context called `name`.
    ///
    /// # Arguments
    /// * `name` - Context name; unknown names leave the state untouched
    /// * `now` - Current time on the caller's timeline
    pub fn focus(&mut self, name: &str, now: Duration) -> Result<Transition, ViewError> {
        let context = name.parse::<ViewContext>()?;
        Ok(self.focus_context(context, now))
    }

    pub fn focus_context(&mut self, context: ViewContext, now: Duration) -> Transition {
        if context == self.active {
            return Transition::None;
        }

        let from = self.camera_at(now);
        let to = self.catalog.camera(context);
        debug!(from = %self.active, to = %context, redirect = self.is_transitioning(now), "view transition");

        self.active = context;
        self.flight = Some(Flight {
            from,
            to,
            started: now,
            duration: self.transition_duration,
        });

        Transition::Fly {
            from: from.to_target(),
            to: to.to_target(),
            duration: self.transition_duration,
        }
    }

    /// Camera position at `now`, eased along the current flight.
    pub fn camera_at(&self, now: Duration) -> Camera {
        match &self.flight {
            Some(flight) => flight.from.lerp(&flight.to, smoothstep(flight.progress(now))),
            None => self.catalog.camera(self.active),
        }
    }

    pub fn is_transitioning(&self, now: Duration) -> bool {
        self.flight.map(|f| f.progress(now) < 1.0).unwrap_or(false)
    }

    pub fn active(&self) -> ViewContext {
        self.active
    }

    pub fn catalog(&self) -> &ViewCatalog {
        &self.catalog
    }
}
