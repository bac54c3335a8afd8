//! RailView Core - Scripted and live rail corridor overlays
//!
//! This library drives a set of rail vehicles along a shared multi-track
//! corridor and keeps a rendering surface in sync with them:
//! 1. **Clock**: looping virtual time scaled by a speed factor
//! 2. **Model**: piecewise time → progress schedules (held / linear segments)
//! 3. **Overlay**: diff-based reconciliation of entity snapshots with the
//!    surface's feature store, plus the held-entity blink
//! 4. **View**: named camera contexts with redirectable flights

pub mod railview_clock;
pub mod railview_model;
pub mod railview_overlay;
pub mod railview_view;

pub mod config;
pub mod live;
pub mod metrics;
pub mod periodic;
pub mod route;
pub mod sim_runtime;
pub mod tracks;

// Re-export key types for convenience
pub use config::{ConfigError, EntityConfig, RuntimeConfig, RuntimeMode, ScenarioConfig};
pub use live::{LiveBatch, LiveReport};
pub use metrics::{OverlayMetrics, ReconcileStats};
pub use railview_clock::{ClockError, SimulationClock};
pub use railview_model::{EntityId, ModelError, Phase, PositionModel, Segment, SegmentRule};
pub use railview_overlay::{
    BlinkPhase, Category, EntityPosition, EntitySnapshot, OverlayError, OverlaySynchronizer, ReconcileOutcome,
    Snapshot,
};
pub use railview_view::{Camera, Transition, ViewContext, ViewError, ViewportController};
pub use route::{RouteError, RouteGeometry};
pub use sim_runtime::{RuntimeError, SimulationRuntime, StepReport};
pub use tracks::{TrackAssignment, TrackError};
