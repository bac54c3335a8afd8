//! Rendering surface abstraction for RailView overlays.

use crate::error::EnvError;
use crate::types::{CameraTarget, FeatureCollection, PropertyValue};
use std::time::Duration;

/// The persistent feature store of a map or schematic widget.
///
/// # Implementations
///
/// - **Production**: an adapter around the host map widget's source/layer API
/// - **Simulation**: `MemorySurface` (in `railview_sim`) with fault injection
///
/// # Ownership
///
/// The surface holds the only persisted copy of the rendered features.
/// Exactly one writer (the overlay synchronizer) calls the mutating methods.
///
/// ```text
/// Synchronizer                 Surface
///   |-- get_collection("trains") -->|
///   |<------------ previous --------|
///   |-- set_collection("trains") -->|  (full replacement)
///   |-- set_style_property -------->|  (blink phase)
/// ```
pub trait RenderSurface: Send + Sync + 'static {
    /// Replaces the named collection with `collection`.
    ///
    /// # Returns
    /// * `Ok(())` - The collection is now what the surface renders
    /// * `Err(EnvError::SurfaceUnavailable)` - Nothing was written
    fn set_collection(&self, name: &str, collection: FeatureCollection) -> Result<(), EnvError>;

    /// Returns the named collection, or `None` if it was never set.
    fn get_collection(&self, name: &str) -> Result<Option<FeatureCollection>, EnvError>;

    /// Sets a paint/style property on a layer by key.
    fn set_style_property(&self, layer: &str, key: &str, value: PropertyValue) -> Result<(), EnvError>;
}

/// Camera control of the surface.
pub trait CameraSurface: Send + Sync + 'static {
    /// Starts a smooth flight to `target` over `duration`.
    ///
    /// Fire and forget: a later call replaces any flight still in progress.
    fn fly_to(&self, target: CameraTarget, duration: Duration) -> Result<(), EnvError>;
}

/// Fault injection for surfaces used in simulation.
pub trait SurfaceController: Send + Sync {
    /// Makes every subsequent surface call fail (or succeed again).
    fn set_available(&self, available: bool);

    /// Returns whether the surface currently accepts calls.
    fn is_available(&self) -> bool;
}
