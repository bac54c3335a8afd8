//! RailView Environment Abstraction Layer
//!
//! This crate separates the RailView engines from the "outside world":
//! - Time (`now()`, `sleep()`) and task spawning
//! - The rendering surface that owns the persisted feature store
//! - The camera of that surface
//!
//! Engines only ever talk to these traits, so the same code drives a real
//! map widget in production and an in-memory surface under a virtual clock
//! in the simulation harness.
//!
//! # Example
//!
//! ```ignore
//! use railview_env::{RailViewContext, RenderSurface};
//!
//! async fn blink_loop<Ctx: RailViewContext, S: RenderSurface>(ctx: &Ctx, surface: &S) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(500)).await;
//!         let _ = surface.set_style_property("trains", "held-opacity", PropertyValue::Number(0.25));
//!     }
//! }
//! ```

mod context;
mod surface;
mod types;
mod error;
mod tokio_impl;

pub use context::RailViewContext;
pub use surface::{CameraSurface, RenderSurface, SurfaceController};
pub use types::{CameraTarget, Feature, FeatureCollection, Geometry, PropertyValue};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
