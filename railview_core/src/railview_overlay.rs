//! The "OVERLAY" Engine - Diff-based reconciliation with a rendering surface
//!
//! Each pass turns an entity snapshot (simulated or live) into a fresh
//! feature collection and replaces the surface's copy with it. The surface
//! holds the only persisted state; the synchronizer only remembers which
//! snapshot it applied last, so that a late batch can never overwrite a
//! fresher one.
//!
//! The held blink is orthogonal to data: its phase lives here, advances on
//! its own cadence, and is written as a style property rather than baked
//! into features.

use crate::metrics::{OverlayMetrics, ReconcileStats};
use crate::railview_model::EntityId;
use crate::route::RouteGeometry;
use crate::tracks::TrackAssignment;

use railview_env::{EnvError, Feature, FeatureCollection, Geometry, PropertyValue, RenderSurface};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Collection holding one marker per entity.
pub const TRAINS_COLLECTION: &str = "trains";

/// Collection holding one line per track.
pub const TRACKS_COLLECTION: &str = "tracks";

/// Style key toggled by the blink on the trains layer.
pub const HELD_OPACITY_KEY: &str = "held-opacity";

const HELD_OPACITY_ON: f64 = 1.0;
const HELD_OPACITY_OFF: f64 = 0.25;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OverlayError {
    /// The surface was torn down; the synchronizer has nothing to write to
    #[error("Rendering surface is gone")]
    SurfaceGone,

    /// The surface refused a call; retry on the next pass
    #[error("Surface error: {0}")]
    Surface(#[from] EnvError),
}

// =============================================================================
// SNAPSHOT INPUT
// =============================================================================

/// Service category, drives marker colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HighSpeed,
    Intercity,
    Regional,
    Freight,
    #[default]
    Other,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::HighSpeed => "high_speed",
            Category::Intercity => "intercity",
            Category::Regional => "regional",
            Category::Freight => "freight",
            Category::Other => "other",
        }
    }

    /// Marker colour (hex).
    pub fn color(&self) -> &'static str {
        match self {
            Category::HighSpeed => "#e4002b",
            Category::Intercity => "#f39200",
            Category::Regional => "#0066b3",
            Category::Freight => "#5f6b73",
            Category::Other => "#9b9b9b",
        }
    }

    /// Lenient parse for live data: anything unrecognised is `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high_speed" | "highspeed" | "ice" | "tgv" => Ok(Category::HighSpeed),
            "intercity" | "ic" | "ec" => Ok(Category::Intercity),
            "regional" | "re" | "rb" | "s" => Ok(Category::Regional),
            "freight" | "cargo" => Ok(Category::Freight),
            "other" => Ok(Category::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Where an entity is, in whichever form its source provides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityPosition {
    /// Distance along the route plus lane (simulation)
    Progress { progress: f64, track: u8 },
    /// Direct surface coordinates (live reports)
    Coordinates { lon: f64, lat: f64 },
}

/// One entity as seen by a single reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub label: String,
    pub category: Category,
    pub held: bool,
    /// `None` excludes the entity from this pass
    pub position: Option<EntityPosition>,
}

/// A complete entity set, ordered by `sequence`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sequence: u64,
    pub entities: Vec<EntitySnapshot>,
}

/// Result of one `reconcile` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(ReconcileStats),
    /// Dropped: `sequence` is not newer than `last_applied`
    Stale { sequence: u64, last_applied: u64 },
}

// =============================================================================
// PROJECTION
// =============================================================================

/// Maps progress-based positions onto the route polyline.
#[derive(Debug, Clone)]
pub struct RouteProjection {
    route: Arc<RouteGeometry>,
    tracks: Arc<TrackAssignment>,
    route_length: f64,
    lane_spacing: f64,
}

impl RouteProjection {
    pub fn new(
        route: Arc<RouteGeometry>,
        tracks: Arc<TrackAssignment>,
        route_length: f64,
        lane_spacing: f64,
    ) -> Self {
        Self {
            route,
            tracks,
            route_length,
            lane_spacing,
        }
    }

    /// Surface coordinates of `position`, or `None` if it is unusable.
    pub fn project(&self, position: &EntityPosition) -> Option<[f64; 2]> {
        match *position {
            EntityPosition::Progress { progress, track } => {
                if !progress.is_finite() || progress < 0.0 || progress > self.route_length {
                    return None;
                }
                let offset = self.tracks.lane_offset(track, self.lane_spacing);
                Some(self.route.point_at(progress / self.route_length, offset))
            }
            EntityPosition::Coordinates { lon, lat } => {
                let valid = lon.is_finite()
                    && lat.is_finite()
                    && (-180.0..=180.0).contains(&lon)
                    && (-90.0..=90.0).contains(&lat);
                valid.then_some([lon, lat])
            }
        }
    }

    /// One line per track, offset from the route centre line.
    pub fn track_features(&self) -> Vec<Feature> {
        (0..self.tracks.track_count())
            .map(|track| {
                let offset = self.tracks.lane_offset(track, self.lane_spacing);
                Feature::new(format!("track-{}", track), Geometry::LineString(self.route.track_line(offset)))
                    .with_property("track", track as f64)
            })
            .collect()
    }
}

// =============================================================================
// BLINK PHASE
// =============================================================================

/// On/off phase of the held-entity pulse.
#[derive(Debug, Clone)]
pub struct BlinkPhase {
    cadence: Duration,
    visible: bool,
    toggles: u64,
    /// Time accumulated towards the next toggle
    carry: Duration,
}

impl BlinkPhase {
    /// Starts visible ("on").
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            visible: true,
            toggles: 0,
            carry: Duration::ZERO,
        }
    }

    /// Flips the phase and returns the new visibility.
    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.toggles += 1;
        self.visible
    }

    /// Accounts `elapsed` time and performs every toggle that became due.
    ///
    /// Returns how many toggles happened.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        if self.cadence.is_zero() {
            return 0;
        }
        self.carry += elapsed;
        let mut flips = 0;
        while self.carry >= self.cadence {
            self.carry -= self.cadence;
            self.toggle();
            flips += 1;
        }
        flips
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    /// Opacity held entities should be drawn with right now.
    pub fn opacity(&self) -> f64 {
        if self.visible {
            HELD_OPACITY_ON
        } else {
            HELD_OPACITY_OFF
        }
    }
}

// =============================================================================
// SYNCHRONIZER
// =============================================================================

/// The single writer of the rendering surface's entity and track layers.
pub struct OverlaySynchronizer<S: RenderSurface> {
    /// Weak so that a torn-down surface is detected instead of kept alive
    surface: Weak<S>,
    projection: RouteProjection,
    blink: BlinkPhase,
    last_applied: Option<u64>,
    metrics: OverlayMetrics,
}

impl<S: RenderSurface> OverlaySynchronizer<S> {
    pub fn new(surface: &Arc<S>, projection: RouteProjection, blink_cadence: Duration) -> Self {
        Self {
            surface: Arc::downgrade(surface),
            projection,
            blink: BlinkPhase::new(blink_cadence),
            last_applied: None,
            metrics: OverlayMetrics::default(),
        }
    }

    fn surface(&self) -> Result<Arc<S>, OverlayError> {
        self.surface.upgrade().ok_or(OverlayError::SurfaceGone)
    }

    /// True while the surface still exists.
    pub fn is_attached(&self) -> bool {
        self.surface.strong_count() > 0
    }

    /// Applies `snapshot` to the surface unless a fresher one was applied.
    ///
    /// On a surface failure nothing is marked as applied, so the next pass
    /// (with the same or a newer snapshot) retries.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> Result<ReconcileOutcome, OverlayError> {
        if let Some(last_applied) = self.last_applied {
            if snapshot.sequence <= last_applied {
                self.metrics.stale_dropped += 1;
                debug!(sequence = snapshot.sequence, last_applied, "dropping stale snapshot");
                return Ok(ReconcileOutcome::Stale {
                    sequence: snapshot.sequence,
                    last_applied,
                });
            }
        }

        let surface = self.surface()?;
        let (features, excluded) = self.build_features(snapshot);

        let result = surface
            .get_collection(TRAINS_COLLECTION)
            .map(Option::unwrap_or_default)
            .and_then(|previous| {
                let stats = diff(&previous, &features, excluded);
                surface
                    .set_collection(TRAINS_COLLECTION, FeatureCollection::from_features(features))
                    .map(|_| stats)
            });

        match result {
            Ok(stats) => {
                self.last_applied = Some(snapshot.sequence);
                self.metrics.record(&stats);
                debug!(
                    sequence = snapshot.sequence,
                    added = stats.added,
                    updated = stats.updated,
                    removed = stats.removed,
                    excluded = stats.excluded,
                    "reconciled"
                );
                Ok(ReconcileOutcome::Applied(stats))
            }
            Err(error) => {
                self.metrics.surface_failures += 1;
                warn!(sequence = snapshot.sequence, %error, "surface rejected reconciliation");
                Err(error.into())
            }
        }
    }

    /// Rebuilds every feature from scratch. Duplicate ids collapse to the
    /// last occurrence; entities without usable coordinates are skipped.
    fn build_features(&self, snapshot: &Snapshot) -> (Vec<Feature>, usize) {
        let mut by_id: BTreeMap<&str, Feature> = BTreeMap::new();
        let mut excluded = 0;

        for entity in &snapshot.entities {
            let Some(point) = entity.position.as_ref().and_then(|p| self.projection.project(p)) else {
                excluded += 1;
                continue;
            };

            let mut feature = Feature::new(entity.id.as_str(), Geometry::Point(point))
                .with_property("label", entity.label.as_str())
                .with_property("category", entity.category.name())
                .with_property("color", entity.category.color())
                .with_property("blink", entity.held);
            if let Some(EntityPosition::Progress { progress, track }) = entity.position {
                feature = feature
                    .with_property("progress", progress)
                    .with_property("track", track as f64);
            }

            by_id.insert(entity.id.as_str(), feature);
        }

        (by_id.into_values().collect(), excluded)
    }

    /// Publishes the per-track lines.
    pub fn render_tracks(&mut self) -> Result<usize, OverlayError> {
        let surface = self.surface()?;
        let features = self.projection.track_features();
        let count = features.len();
        surface
            .set_collection(TRACKS_COLLECTION, FeatureCollection::from_features(features))
            .map_err(|error| {
                self.metrics.surface_failures += 1;
                OverlayError::from(error)
            })?;
        Ok(count)
    }

    /// Flips the blink phase once and writes the resulting opacity.
    ///
    /// The phase advances even if the write fails; the next successful
    /// write carries the absolute value, so the surface re-syncs.
    pub fn tick_blink(&mut self) -> Result<bool, OverlayError> {
        let surface = self.surface()?;
        let visible = self.blink.toggle();
        self.metrics.blink_toggles += 1;
        self.write_opacity(&surface)?;
        Ok(visible)
    }

    /// Advances the blink by `elapsed`, writing only if the phase changed.
    pub fn advance_blink(&mut self, elapsed: Duration) -> Result<u32, OverlayError> {
        let surface = self.surface()?;
        let flips = self.blink.advance(elapsed);
        if flips > 0 {
            self.metrics.blink_toggles += flips as u64;
            self.write_opacity(&surface)?;
        }
        Ok(flips)
    }

    fn write_opacity(&mut self, surface: &S) -> Result<(), OverlayError> {
        surface
            .set_style_property(TRAINS_COLLECTION, HELD_OPACITY_KEY, PropertyValue::Number(self.blink.opacity()))
            .map_err(|error| {
                self.metrics.surface_failures += 1;
                OverlayError::from(error)
            })
    }

    pub fn blink(&self) -> &BlinkPhase {
        &self.blink
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    pub fn metrics(&self) -> &OverlayMetrics {
        &self.metrics
    }

    pub fn projection(&self) -> &RouteProjection {
        &self.projection
    }
}

fn diff(previous: &FeatureCollection, next: &[Feature], excluded: usize) -> ReconcileStats {
    let mut stats = ReconcileStats {
        excluded,
        ..Default::default()
    };

    for feature in next {
        match previous.get(&feature.id) {
            None => stats.added += 1,
            Some(old) if old == feature => stats.unchanged += 1,
            Some(_) => stats.updated += 1,
        }
    }

    let next_ids: std::collections::BTreeSet<&str> = next.iter().map(|f| f.id.as_str()).collect();
    stats.removed = previous.ids().difference(&next_ids).count();

    stats
}
