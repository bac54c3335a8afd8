//! Simulation Runtime - Orchestrates the RailView engines with an environment context.
//!
//! This module is the integration layer between the pure engines (clock,
//! position model, overlay, viewport) and the environment abstraction
//! (`RailViewContext` for time and tasks, `RenderSurface`/`CameraSurface`
//! for output).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SimulationRuntime                       │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │               Context: RailViewContext                 │  │
//! │  │  • now()   → camera flight timing                      │  │
//! │  │  • sleep() → clock tick / blink cadence                │  │
//! │  │  • spawn() → periodic tasks owned by the runtime       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                               │                              │
//! │  ┌─────────┐ ┌──────────┐ ┌──────────────┐ ┌─────────────┐   │
//! │  │  CLOCK  │→│  MODEL   │→│   OVERLAY    │ │    VIEW     │   │
//! │  │ Engine  │ │ Engine   │ │ Synchronizer │ │ Controller  │   │
//! │  └─────────┘ └──────────┘ └──────────────┘ └─────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use railview_core::sim_runtime::SimulationRuntime;
//! use railview_core::config::RuntimeConfig;
//! use railview_env::TokioContext;
//!
//! let ctx = TokioContext::shared();
//! let mut runtime = SimulationRuntime::new(ctx, &surface, &scenario, RuntimeConfig::default())?;
//!
//! runtime.start()?;
//! runtime.focus("detail")?;
//! // ...
//! runtime.shutdown().await;
//! ```

use crate::config::{ConfigError, RuntimeConfig, RuntimeMode, ScenarioConfig};
use crate::live::LiveBatch;
use crate::metrics::OverlayMetrics;
use crate::periodic::PeriodicTask;
use crate::railview_clock::{ClockError, SimulationClock};
use crate::railview_model::{EntityId, ModelError, Phase, PositionModel, RejectedEntity};
use crate::railview_overlay::{
    Category, EntityPosition, EntitySnapshot, OverlayError, OverlaySynchronizer, ReconcileOutcome, RouteProjection,
    Snapshot,
};
use crate::railview_view::{Camera, Transition, ViewCatalog, ViewContext, ViewError, ViewportController};
use crate::route::{RouteError, RouteGeometry};
use crate::tracks::{TrackAssignment, TrackError};

use railview_env::{CameraSurface, RailViewContext, RenderSurface};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("Runtime is in {actual:?} mode, operation needs {expected:?}")]
    ModeMismatch { expected: RuntimeMode, actual: RuntimeMode },

    #[error("Runtime tasks are already running")]
    AlreadyStarted,
}

/// Outcome of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Virtual time after the tick
    pub time: f64,
    pub loops: u64,
    /// The tick wrapped the clock back to zero
    pub wrapped: bool,
    /// `None` when ticks are ignored (live mode)
    pub outcome: Option<ReconcileOutcome>,
}

#[derive(Debug, Clone)]
struct EntityProfile {
    label: String,
    category: Category,
}

/// Lock that keeps working after a panicking holder.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the runtime handle and its periodic tasks.
struct RuntimeShared<S: RenderSurface + CameraSurface> {
    name: String,
    mode: RuntimeMode,
    clock: Mutex<SimulationClock>,
    model: PositionModel,
    profiles: BTreeMap<EntityId, EntityProfile>,
    tracks: Arc<TrackAssignment>,
    overlay: Mutex<OverlaySynchronizer<S>>,
    viewport: Mutex<ViewportController>,
    camera: Weak<S>,
    sequence: AtomicU64,
}

impl<S: RenderSurface + CameraSurface> RuntimeShared<S> {
    fn entities_at(&self, t: f64) -> Vec<EntitySnapshot> {
        self.model
            .evaluate_all(t)
            .into_iter()
            .map(|(id, result)| {
                let (label, category) = self
                    .profiles
                    .get(id)
                    .map_or_else(|| (id.to_string(), Category::Other), |p| (p.label.clone(), p.category));

                let (position, held) = match result {
                    Ok(progress) => {
                        let track = self.tracks.track_of(id.as_str());
                        let held = matches!(
                            self.model.phase(id.as_str(), t),
                            Ok(Phase::Held { awaiting_overtake: true })
                        );
                        (Some(EntityPosition::Progress { progress, track }), held)
                    }
                    Err(error) => {
                        debug!(entity = %id, %error, "entity not evaluated");
                        (None, false)
                    }
                };

                EntitySnapshot {
                    id: id.clone(),
                    label,
                    category,
                    held,
                    position,
                }
            })
            .collect()
    }

    fn step(&self, delta_real_secs: f64) -> Result<StepReport, RuntimeError> {
        if self.mode == RuntimeMode::Live {
            let clock = lock(&self.clock);
            return Ok(StepReport {
                time: clock.now(),
                loops: clock.loops(),
                wrapped: false,
                outcome: None,
            });
        }

        // Sequence is drawn with the clock held so a later time always gets a later sequence
        let (time, loops, wrapped, sequence) = {
            let mut clock = lock(&self.clock);
            let before = clock.loops();
            let time = clock.advance(delta_real_secs)?;
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            (time, clock.loops(), clock.loops() != before, sequence)
        };
        if wrapped {
            info!(scenario = %self.name, loops, "scenario looped");
        }

        let snapshot = Snapshot {
            sequence,
            entities: self.entities_at(time),
        };
        let outcome = lock(&self.overlay).reconcile(&snapshot)?;

        Ok(StepReport {
            time,
            loops,
            wrapped,
            outcome: Some(outcome),
        })
    }

    fn tick_blink(&self) -> Result<bool, RuntimeError> {
        Ok(lock(&self.overlay).tick_blink()?)
    }
}

/// A scenario wired to a context and a surface.
///
/// Generic over the context so the same runtime runs under tokio in
/// production and under a virtual clock in the simulation harness.
pub struct SimulationRuntime<Ctx, S>
where
    Ctx: RailViewContext,
    S: RenderSurface + CameraSurface,
{
    context: Arc<Ctx>,
    config: RuntimeConfig,
    shared: Arc<RuntimeShared<S>>,
    rejected: Vec<RejectedEntity>,
    tasks: Vec<PeriodicTask>,
}

impl<Ctx, S> SimulationRuntime<Ctx, S>
where
    Ctx: RailViewContext,
    S: RenderSurface + CameraSurface,
{
    /// Validates `scenario` and builds every engine.
    ///
    /// Fails on problems that make the whole scenario unusable (horizon,
    /// route, view catalog). Invalid entity schedules are only refused
    /// individually; see [`rejected`](Self::rejected).
    pub fn new(
        context: Arc<Ctx>,
        surface: &Arc<S>,
        scenario: &ScenarioConfig,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        scenario.check()?;
        config.check()?;

        let clock = SimulationClock::new(scenario.horizon, config.speed_factor)?;
        let route = RouteGeometry::new(&scenario.route)?;
        let catalog = ViewCatalog::from_config(&scenario.views)?;

        let mut tracks = TrackAssignment::new(scenario.track_count)?;
        let mut profiles = BTreeMap::new();
        for entity in &scenario.entities {
            if let Err(error) = tracks.assign(entity.id.clone(), entity.track) {
                warn!(entity = %entity.id, %error, "falling back to track 0");
            }
            profiles.entry(entity.id.clone()).or_insert_with(|| EntityProfile {
                label: entity.label().to_string(),
                category: entity.category,
            });
        }
        let tracks = Arc::new(tracks);

        let (model, rejected) = PositionModel::from_schedules(
            scenario.route_length,
            scenario.entities.iter().map(|e| (e.id.clone(), e.segments.clone())),
        )?;
        if model.is_empty() {
            warn!(scenario = %scenario.name, "no valid entity schedules");
        }

        let projection = RouteProjection::new(
            Arc::new(route),
            tracks.clone(),
            scenario.route_length,
            config.lane_spacing,
        );
        let overlay = OverlaySynchronizer::new(surface, projection, config.blink_cadence);
        let viewport = ViewportController::new(catalog, config.initial_view, config.transition_duration);

        info!(
            scenario = %scenario.name,
            entities = model.len(),
            rejected = rejected.len(),
            mode = ?config.mode,
            "runtime ready"
        );

        let shared = Arc::new(RuntimeShared {
            name: scenario.name.clone(),
            mode: config.mode,
            clock: Mutex::new(clock),
            model,
            profiles,
            tracks,
            overlay: Mutex::new(overlay),
            viewport: Mutex::new(viewport),
            camera: Arc::downgrade(surface),
            sequence: AtomicU64::new(0),
        });

        Ok(Self {
            context,
            config,
            shared,
            rejected,
            tasks: Vec::new(),
        })
    }

    /// Advances the clock by `delta_real_secs` and reconciles the surface.
    ///
    /// In live mode the tick is ignored. A surface failure is returned and
    /// the next tick retries.
    pub fn step(&self, delta_real_secs: f64) -> Result<StepReport, RuntimeError> {
        self.shared.step(delta_real_secs)
    }

    /// Entity snapshot entries at virtual time `t`, without rendering them.
    pub fn entities_at(&self, t: f64) -> Vec<EntitySnapshot> {
        self.shared.entities_at(t)
    }

    /// Reconciles the surface with an externally supplied batch.
    pub fn ingest_live(&self, batch: &LiveBatch) -> Result<ReconcileOutcome, RuntimeError> {
        if self.shared.mode != RuntimeMode::Live {
            return Err(RuntimeError::ModeMismatch {
                expected: RuntimeMode::Live,
                actual: self.shared.mode,
            });
        }
        let snapshot = batch.to_snapshot();
        Ok(lock(&self.shared.overlay).reconcile(&snapshot)?)
    }

    /// Switches the view context and forwards the flight to the camera.
    pub fn focus(&self, name: &str) -> Result<Transition, RuntimeError> {
        let now = self.context.now();
        let transition = lock(&self.shared.viewport).focus(name, now)?;

        if let Transition::Fly { to, duration, .. } = transition {
            match self.shared.camera.upgrade() {
                Some(camera) => {
                    if let Err(error) = camera.fly_to(to, duration) {
                        warn!(%error, "camera rejected flight");
                    }
                }
                None => warn!("camera surface is gone"),
            }
        }
        Ok(transition)
    }

    /// Current (possibly mid-flight) camera.
    pub fn camera(&self) -> Camera {
        lock(&self.shared.viewport).camera_at(self.context.now())
    }

    pub fn active_view(&self) -> ViewContext {
        lock(&self.shared.viewport).active()
    }

    /// Flips the held blink once.
    pub fn tick_blink(&self) -> Result<bool, RuntimeError> {
        self.shared.tick_blink()
    }

    /// Advances the held blink by `elapsed`.
    pub fn advance_blink(&self, elapsed: Duration) -> Result<u32, RuntimeError> {
        Ok(lock(&self.shared.overlay).advance_blink(elapsed)?)
    }

    /// Publishes the per-track lines.
    pub fn publish_tracks(&self) -> Result<usize, RuntimeError> {
        Ok(lock(&self.shared.overlay).render_tracks()?)
    }

    pub fn set_speed_factor(&self, factor: f64) -> Result<(), RuntimeError> {
        Ok(lock(&self.shared.clock).set_speed_factor(factor)?)
    }

    /// Restarts the scenario from time zero.
    pub fn reset(&self) -> f64 {
        lock(&self.shared.clock).reset()
    }

    pub fn seek(&self, t: f64) -> Result<f64, RuntimeError> {
        Ok(lock(&self.shared.clock).seek(t)?)
    }

    /// Current virtual time.
    pub fn now(&self) -> f64 {
        lock(&self.shared.clock).now()
    }

    pub fn loops(&self) -> u64 {
        lock(&self.shared.clock).loops()
    }

    pub fn horizon(&self) -> f64 {
        lock(&self.shared.clock).horizon()
    }

    pub fn metrics(&self) -> OverlayMetrics {
        lock(&self.shared.overlay).metrics().clone()
    }

    pub fn blink_toggles(&self) -> u64 {
        lock(&self.shared.overlay).blink().toggles()
    }

    pub fn model(&self) -> &PositionModel {
        &self.shared.model
    }

    pub fn tracks(&self) -> &TrackAssignment {
        &self.shared.tracks
    }

    /// Entities refused at load time.
    pub fn rejected(&self) -> &[RejectedEntity] {
        &self.rejected
    }

    pub fn mode(&self) -> RuntimeMode {
        self.shared.mode
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Spawns the clock task (simulated mode only) and the blink task.
    ///
    /// Both end on their own once the surface is gone.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        if self.is_running() {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.tasks.clear();

        if let Err(error) = self.publish_tracks() {
            warn!(%error, "could not publish tracks");
        }

        if self.shared.mode == RuntimeMode::Simulated {
            let shared = self.shared.clone();
            let dt = self.config.tick_interval.as_secs_f64();
            self.tasks.push(PeriodicTask::spawn(
                self.context.clone(),
                "railview-clock",
                self.config.tick_interval,
                move || continue_unless_gone(shared.step(dt)),
            ));
        }

        let shared = self.shared.clone();
        self.tasks.push(PeriodicTask::spawn(
            self.context.clone(),
            "railview-blink",
            self.config.blink_cadence,
            move || continue_unless_gone(shared.tick_blink()),
        ));

        info!(scenario = %self.shared.name, tasks = self.tasks.len(), "runtime started");
        Ok(())
    }

    /// True while at least one periodic task is alive.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Stops every periodic task; no callback fires afterwards.
    pub fn stop(&mut self) {
        for mut task in self.tasks.drain(..) {
            task.stop();
        }
    }

    /// Stops every periodic task and waits for them to exit.
    pub async fn shutdown(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            task.shutdown().await;
        }
        info!(scenario = %self.shared.name, "runtime shut down");
    }
}

impl<Ctx, S> Drop for SimulationRuntime<Ctx, S>
where
    Ctx: RailViewContext,
    S: RenderSurface + CameraSurface,
{
    fn drop(&mut self) {
        self.stop();
    }
}

fn continue_unless_gone<T>(result: Result<T, RuntimeError>) -> ControlFlow<()> {
    match result {
        Err(RuntimeError::Overlay(OverlayError::SurfaceGone)) => {
            info!("surface gone, ending task");
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityConfig;
    use crate::metrics::ReconcileStats;
    use crate::railview_model::Segment;
    use crate::railview_overlay::TRAINS_COLLECTION;
    use crate::railview_view::ViewCatalogConfig;
    use crate::live::LiveReport;
    use approx::assert_relative_eq;
    use railview_env::{CameraTarget, EnvError, FeatureCollection, Geometry, PropertyValue, TokioContext};
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingSurface {
        collections: Mutex<HashMap<String, FeatureCollection>>,
        flights: Mutex<Vec<CameraTarget>>,
        writes: AtomicU64,
    }

    impl RenderSurface for RecordingSurface {
        fn set_collection(&self, name: &str, collection: FeatureCollection) -> Result<(), EnvError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.collections.lock().unwrap().insert(name.to_string(), collection);
            Ok(())
        }

        fn get_collection(&self, name: &str) -> Result<Option<FeatureCollection>, EnvError> {
            Ok(self.collections.lock().unwrap().get(name).cloned())
        }

        fn set_style_property(&self, _layer: &str, _key: &str, _value: PropertyValue) -> Result<(), EnvError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl CameraSurface for RecordingSurface {
        fn fly_to(&self, target: CameraTarget, _duration: Duration) -> Result<(), EnvError> {
            self.flights.lock().unwrap().push(target);
            Ok(())
        }
    }

    impl RecordingSurface {
        fn position_of(&self, id: &str) -> Option<[f64; 2]> {
            let collections = self.collections.lock().unwrap();
            match &collections.get(TRAINS_COLLECTION)?.get(id)?.geometry {
                Geometry::Point(p) => Some(*p),
                _ => None,
            }
        }
    }

    fn scenario() -> ScenarioConfig {
        ScenarioConfig {
            name: "overtake".to_string(),
            route_length: 40.0,
            horizon: 60.0,
            track_count: 1,
            route: vec![[0.0, 0.0], [40.0, 0.0]],
            entities: vec![
                EntityConfig {
                    id: "A".into(),
                    label: None,
                    category: Category::Regional,
                    track: 0,
                    segments: vec![
                        Segment::awaiting(0.0, 10.0, 0.0),
                        Segment::linear(10.0, 50.0, 0.0, 40.0),
                        Segment::held(50.0, 60.0, 40.0),
                    ],
                },
                EntityConfig {
                    id: "B".into(),
                    label: Some("Express".to_string()),
                    category: Category::HighSpeed,
                    track: 0,
                    segments: vec![Segment::linear(30.0, 50.0, 0.0, 40.0)],
                },
            ],
            views: ViewCatalogConfig {
                wide: CameraTarget { center: [20.0, 0.0], zoom: 5.0 },
                regional: CameraTarget { center: [10.0, 0.0], zoom: 8.0 },
                detail: CameraTarget { center: [5.0, 0.0], zoom: 12.0 },
            },
        }
    }

    fn runtime(
        surface: &Arc<RecordingSurface>,
        config: RuntimeConfig,
    ) -> SimulationRuntime<TokioContext, RecordingSurface> {
        let config = RuntimeConfig { lane_spacing: 1.0, ..config };
        SimulationRuntime::new(TokioContext::shared(), surface, &scenario(), config).unwrap()
    }

    #[tokio::test]
    async fn test_step_renders_model_positions() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(&surface, RuntimeConfig::default());

        let report = runtime.step(30.0).unwrap();
        assert_relative_eq!(report.time, 30.0);
        assert_eq!(
            report.outcome,
            Some(ReconcileOutcome::Applied(ReconcileStats { added: 2, ..Default::default() }))
        );

        let a = surface.position_of("A").unwrap();
        let b = surface.position_of("B").unwrap();
        assert_relative_eq!(a[0], 20.0);
        assert_relative_eq!(b[0], 0.0);

        // Same lane, B catches A exactly at t=50
        runtime.step(20.0).unwrap();
        assert_relative_eq!(surface.position_of("A").unwrap()[0], 40.0);
        assert_relative_eq!(surface.position_of("B").unwrap()[0], 40.0);
    }

    #[test]
    fn test_concurrent_steps_keep_freshest_time() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(&surface, RuntimeConfig::default());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        runtime.step(0.1).unwrap();
                    }
                });
            }
        });

        let now = runtime.now();
        assert_relative_eq!(now, 40.0, epsilon = 1e-6);
        let metrics = runtime.metrics();
        assert_eq!(metrics.passes_applied + metrics.stale_dropped, 400);

        // Whatever interleaving happened, the surface shows the latest clock time
        for id in ["A", "B"] {
            let expected = runtime.model().evaluate(id, now).unwrap();
            assert_relative_eq!(surface.position_of(id).unwrap()[0], expected, epsilon = 1e-9);
        }
    }

    #[tokio::test]
    async fn test_zero_cadence_is_rejected() {
        let surface = Arc::new(RecordingSurface::default());
        for config in [
            RuntimeConfig {
                tick_interval: Duration::ZERO,
                ..RuntimeConfig::default()
            },
            RuntimeConfig {
                blink_cadence: Duration::ZERO,
                ..RuntimeConfig::default()
            },
            RuntimeConfig {
                lane_spacing: -1.0,
                ..RuntimeConfig::default()
            },
        ] {
            let result = SimulationRuntime::new(TokioContext::shared(), &surface, &scenario(), config);
            assert!(matches!(result, Err(RuntimeError::Config(ConfigError::Invalid(_)))));
        }
    }

    #[tokio::test]
    async fn test_awaiting_hold_sets_blink_flag() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(&surface, RuntimeConfig::default());

        let entities = runtime.entities_at(5.0);
        let a = entities.iter().find(|e| e.id.as_str() == "A").unwrap();
        let b = entities.iter().find(|e| e.id.as_str() == "B").unwrap();
        assert!(a.held);
        assert!(!b.held);
        assert_eq!(b.label, "Express");

        // Terminal station stop is not an overtake hold
        let late = runtime.entities_at(55.0);
        assert!(late.iter().all(|e| !e.held));
    }

    #[tokio::test]
    async fn test_horizon_wrap_is_reported() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(&surface, RuntimeConfig::default());

        runtime.step(59.0).unwrap();
        let report = runtime.step(2.0).unwrap();
        assert!(report.wrapped);
        assert_eq!(report.loops, 1);
        assert_relative_eq!(report.time, 0.0);
        assert_relative_eq!(surface.position_of("A").unwrap()[0], 0.0);
    }

    #[tokio::test]
    async fn test_live_mode_ignores_ticks() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(
            &surface,
            RuntimeConfig {
                mode: RuntimeMode::Live,
                ..Default::default()
            },
        );

        let report = runtime.step(10.0).unwrap();
        assert_eq!(report.outcome, None);
        assert_relative_eq!(runtime.now(), 0.0);

        let batch = |sequence, lon| LiveBatch {
            sequence,
            reports: vec![LiveReport {
                id: Some("IC 1".to_string()),
                lon: Some(lon),
                lat: Some(0.0),
                ..Default::default()
            }],
        };

        runtime.ingest_live(&batch(2, 12.0)).unwrap();
        let stale = runtime.ingest_live(&batch(1, 3.0)).unwrap();
        assert!(matches!(stale, ReconcileOutcome::Stale { sequence: 1, last_applied: 2 }));
        assert_eq!(surface.position_of("IC 1"), Some([12.0, 0.0]));
    }

    #[tokio::test]
    async fn test_ingest_live_rejected_in_simulated_mode() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(&surface, RuntimeConfig::default());

        let result = runtime.ingest_live(&LiveBatch { sequence: 1, reports: vec![] });
        assert!(matches!(result, Err(RuntimeError::ModeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_focus_forwards_flight() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(&surface, RuntimeConfig::default());

        assert_eq!(runtime.focus("wide").unwrap(), Transition::None);
        assert!(matches!(runtime.focus("detail").unwrap(), Transition::Fly { .. }));
        assert!(matches!(runtime.focus("orbit"), Err(RuntimeError::View(_))));

        let flights = surface.flights.lock().unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].center, [5.0, 0.0]);
        assert_eq!(runtime.active_view(), ViewContext::Detail);
    }

    #[tokio::test]
    async fn test_invalid_entity_does_not_block_others() {
        let surface = Arc::new(RecordingSurface::default());
        let mut config = scenario();
        config.entities.push(EntityConfig {
            id: "broken".into(),
            label: None,
            category: Category::Freight,
            track: 0,
            segments: vec![Segment::linear(0.0, 10.0, 0.0, 99.0)],
        });

        let runtime = SimulationRuntime::new(TokioContext::shared(), &surface, &config, RuntimeConfig::default()).unwrap();
        assert_eq!(runtime.rejected().len(), 1);
        assert_eq!(runtime.model().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_route_fails_fast() {
        let surface = Arc::new(RecordingSurface::default());
        let mut config = scenario();
        config.route = vec![[0.0, 0.0]];

        let result = SimulationRuntime::new(TokioContext::shared(), &surface, &config, RuntimeConfig::default());
        assert!(matches!(result, Err(RuntimeError::Route(RouteError::TooFewPoints(1)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_tasks_tick_until_stopped() {
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = runtime(&surface, RuntimeConfig::default());

        runtime.start().unwrap();
        assert!(matches!(runtime.start(), Err(RuntimeError::AlreadyStarted)));

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(runtime.metrics().passes_applied, 10);
        assert_eq!(runtime.blink_toggles(), 2);
        assert_relative_eq!(runtime.now(), 1.0, epsilon = 1e-9);

        runtime.stop();
        assert!(!runtime.is_running());
        let writes = surface.writes.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(surface.writes.load(Ordering::SeqCst), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_end_when_surface_is_gone() {
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = runtime(&surface, RuntimeConfig::default());

        runtime.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(runtime.is_running());

        drop(surface);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!runtime.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_tasks() {
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = runtime(&surface, RuntimeConfig::default());

        runtime.start().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        runtime.shutdown().await;

        let writes = surface.writes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(surface.writes.load(Ordering::SeqCst), writes);
    }
}
