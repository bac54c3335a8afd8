//! In-memory rendering surface with fault injection.

use railview_core::railview_overlay::{TRACKS_COLLECTION, TRAINS_COLLECTION};
use railview_env::{
    CameraSurface, CameraTarget, EnvError, FeatureCollection, PropertyValue, RenderSurface, SurfaceController,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A recorded `set_style_property` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleChange {
    pub layer: String,
    pub key: String,
    pub value: PropertyValue,
}

/// A recorded `fly_to` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flight {
    pub target: CameraTarget,
    pub duration: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stand-in for a map widget: keeps collections, styles and camera calls.
///
/// While unavailable every call fails with `EnvError::SurfaceUnavailable`
/// and nothing is stored.
pub struct MemorySurface {
    collections: Mutex<HashMap<String, FeatureCollection>>,
    styles: Mutex<HashMap<(String, String), PropertyValue>>,
    style_history: Mutex<Vec<StyleChange>>,
    flights: Mutex<Vec<Flight>>,
    available: AtomicBool,
    writes: AtomicU64,
    failures: AtomicU64,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            styles: Mutex::new(HashMap::new()),
            style_history: Mutex::new(Vec::new()),
            flights: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn check_available(&self) -> Result<(), EnvError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
            Err(EnvError::unavailable("surface disabled by fault injection"))
        }
    }

    /// Current content of a collection (empty if never set).
    pub fn collection(&self, name: &str) -> FeatureCollection {
        lock(&self.collections).get(name).cloned().unwrap_or_default()
    }

    pub fn style(&self, layer: &str, key: &str) -> Option<PropertyValue> {
        lock(&self.styles).get(&(layer.to_string(), key.to_string())).cloned()
    }

    pub fn style_history(&self) -> Vec<StyleChange> {
        lock(&self.style_history).clone()
    }

    pub fn flights(&self) -> Vec<Flight> {
        lock(&self.flights).clone()
    }

    /// Successful mutating calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Calls refused while unavailable.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for MemorySurface {
    fn set_collection(&self, name: &str, collection: FeatureCollection) -> Result<(), EnvError> {
        self.check_available()?;
        lock(&self.collections).insert(name.to_string(), collection);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get_collection(&self, name: &str) -> Result<Option<FeatureCollection>, EnvError> {
        self.check_available()?;
        Ok(lock(&self.collections).get(name).cloned())
    }

    fn set_style_property(&self, layer: &str, key: &str, value: PropertyValue) -> Result<(), EnvError> {
        self.check_available()?;
        if layer != TRAINS_COLLECTION && layer != TRACKS_COLLECTION {
            return Err(EnvError::unknown_layer(layer));
        }

        lock(&self.styles).insert((layer.to_string(), key.to_string()), value.clone());
        lock(&self.style_history).push(StyleChange {
            layer: layer.to_string(),
            key: key.to_string(),
            value,
        });
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl CameraSurface for MemorySurface {
    fn fly_to(&self, target: CameraTarget, duration: Duration) -> Result<(), EnvError> {
        self.check_available()?;
        lock(&self.flights).push(Flight { target, duration });
        Ok(())
    }
}

impl SurfaceController for MemorySurface {
    fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::info!(available, "surface availability changed");
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
