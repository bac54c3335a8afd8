//! Scenario runner - steps corridor scenarios headlessly and checks invariants.

use crate::context::SimContext;
use crate::exporter::{SimEvent, SimExport, SimFrame};
use crate::live_feed::{LiveFeed, LiveFeedConfig};
use crate::scenarios::ScenarioId;
use crate::surface::MemorySurface;

use railview_core::config::{RuntimeConfig, RuntimeMode, ScenarioConfig};
use railview_core::railview_model::{EntityId, ModelError, PositionModel, CONTINUITY_EPSILON};
use railview_core::railview_overlay::{ReconcileOutcome, HELD_OPACITY_KEY, TRAINS_COLLECTION};
use railview_core::sim_runtime::SimulationRuntime;
use railview_core::tracks::TrackAssignment;
use railview_env::{RailViewContext, SurfaceController};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// RNG stream used by the synthetic live feed.
const FEED_STREAM: u64 = 0x4c49_5645;

/// Sampling step (virtual seconds) when scanning for overtakes.
const CONTACT_RESOLUTION: f64 = 0.5;

/// How two same-track entities came together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// The progress gap changed sign: one overtook the other
    Pass,
    /// The gap closed to zero without changing sign
    Meet,
}

/// A located contact between two entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactEvent {
    pub a: EntityId,
    pub b: EntityId,
    pub time: f64,
    pub kind: ContactKind,
}

/// Scans every same-track pair over `[0, horizon]` for passes and meets.
///
/// A zero gap before either entity has separated from the other (both still
/// at the origin) is not a contact.
pub fn detect_contacts(
    model: &PositionModel,
    tracks: &TrackAssignment,
    horizon: f64,
    resolution: f64,
) -> Result<Vec<ContactEvent>, ModelError> {
    let ids: Vec<&EntityId> = model.ids().collect();
    let steps = (horizon / resolution).ceil() as usize;
    let mut events = Vec::new();

    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            if tracks.track_of(a.as_str()) != tracks.track_of(b.as_str()) {
                continue;
            }

            // (time, sign) of the last sample with a non-zero gap
            let mut last: Option<(f64, f64)> = None;
            let mut touch: Option<f64> = None;

            for step in 0..=steps {
                let t = (step as f64 * resolution).min(horizon);
                let gap = model.evaluate(a.as_str(), t)? - model.evaluate(b.as_str(), t)?;

                if gap.abs() <= CONTINUITY_EPSILON {
                    if last.is_some() && touch.is_none() {
                        touch = Some(t);
                    }
                    continue;
                }

                let sign = gap.signum();
                if let Some((last_t, last_sign)) = last {
                    if sign != last_sign {
                        let time = model
                            .first_contact(a.as_str(), b.as_str(), last_t, t, resolution / 4.0)?
                            .unwrap_or(t);
                        events.push(ContactEvent {
                            a: (*a).clone(),
                            b: (*b).clone(),
                            time,
                            kind: ContactKind::Pass,
                        });
                    } else if let Some(time) = touch {
                        events.push(ContactEvent {
                            a: (*a).clone(),
                            b: (*b).clone(),
                            time,
                            kind: ContactKind::Meet,
                        });
                    }
                }
                touch = None;
                last = Some((t, sign));
            }

            if let Some(time) = touch {
                events.push(ContactEvent {
                    a: (*a).clone(),
                    b: (*b).clone(),
                    time,
                    kind: ContactKind::Meet,
                });
            }
        }
    }

    events.sort_by(|x, y| x.time.total_cmp(&y.time));
    Ok(events)
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final virtual scenario time in seconds
    pub final_time_secs: f64,

    /// Train markers on the surface at the end
    pub final_entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Passes and meets found in the schedules
    pub contacts: Vec<ContactEvent>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    #[serde(skip)]
    pub export: Option<SimExport>,
}

impl ScenarioResult {
    fn failed(scenario: &str, seed: u64, reason: String) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            final_entity_count: 0,
            failure_reason: Some(reason),
            contacts: Vec::new(),
            metrics: ScenarioMetrics::default(),
            export: None,
        }
    }

    pub fn passes(&self) -> usize {
        self.contacts.iter().filter(|c| c.kind == ContactKind::Pass).count()
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Reconciliation passes that reached the surface
    pub passes_applied: u64,

    /// Snapshots dropped as stale
    pub stale_dropped: u64,

    /// Surface calls that failed
    pub surface_failures: u64,

    /// Successful reconciliations right after an outage
    pub recoveries: u64,

    /// Held blink phase flips
    pub blink_toggles: u64,

    /// Clock wraps
    pub loops: u64,

    /// Tick-to-tick jumps larger than the schedule allows
    pub continuity_violations: u64,

    /// Largest tick-to-tick progress change observed
    pub max_step_jump: f64,

    /// Entities excluded for missing coordinates
    pub entities_excluded: u64,

    /// Live batches delivered out of order
    pub batches_reordered: u64,
}

/// Runs corridor scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Real time per tick
    tick_interval: Duration,

    /// Virtual seconds per real second
    speed_factor: f64,

    /// Real seconds to run
    max_duration_secs: f64,

    mode: RuntimeMode,

    /// Real-time window `[start, end)` during which the surface is down
    outage: Option<(f64, f64)>,

    /// Export a frame every N ticks
    export_interval: Option<u64>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_interval: Duration::from_millis(100),
            speed_factor: 1.0,
            max_duration_secs: 60.0,
            mode: RuntimeMode::Simulated,
            outage: None,
            export_interval: None,
        }
    }

    /// Sets the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the speed factor.
    pub fn with_speed(mut self, factor: f64) -> Self {
        self.speed_factor = factor;
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Feeds the overlay from the synthetic live source instead of the clock.
    pub fn live(mut self, live: bool) -> Self {
        self.mode = if live { RuntimeMode::Live } else { RuntimeMode::Simulated };
        self
    }

    /// Takes the surface down between `start` and `end` real seconds.
    pub fn with_outage(mut self, start: f64, end: f64) -> Self {
        self.outage = Some((start, end));
        self
    }

    /// Records a frame every `every_ticks` ticks.
    pub fn with_export(mut self, every_ticks: u64) -> Self {
        self.export_interval = Some(every_ticks.max(1));
        self
    }

    /// Runs a built-in scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        self.run_config(scenario.name(), &scenario.config(), Some(scenario.expected_passes()))
    }

    /// Runs any scenario configuration.
    ///
    /// # Arguments
    /// * `name` - Name used in the result
    /// * `config` - Scenario to run
    /// * `expected_passes` - If set, the schedules must contain exactly this many passes
    pub fn run_config(&self, name: &str, config: &ScenarioConfig, expected_passes: Option<usize>) -> ScenarioResult {
        if self.tick_interval.is_zero() {
            return ScenarioResult::failed(name, self.seed, "tick interval must be > 0".to_string());
        }
        if !self.max_duration_secs.is_finite() || self.max_duration_secs < 0.0 {
            return ScenarioResult::failed(
                name,
                self.seed,
                format!("duration {} must be finite and >= 0", self.max_duration_secs),
            );
        }

        let context = SimContext::shared(self.seed);
        let surface = MemorySurface::shared();

        let runtime_config = RuntimeConfig {
            tick_interval: self.tick_interval,
            speed_factor: self.speed_factor,
            mode: self.mode,
            ..RuntimeConfig::default()
        };
        let blink_cadence = runtime_config.blink_cadence;

        let runtime = match SimulationRuntime::new(context.clone(), &surface, config, runtime_config) {
            Ok(runtime) => runtime,
            Err(error) => return ScenarioResult::failed(name, self.seed, error.to_string()),
        };

        let mut feed = if self.mode == RuntimeMode::Live {
            match LiveFeed::new(config, LiveFeedConfig::default(), context.derive_rng(FEED_STREAM)) {
                Ok(feed) => Some(feed),
                Err(error) => return ScenarioResult::failed(name, self.seed, error.to_string()),
            }
        } else {
            None
        };

        let mut failures: Vec<String> = runtime
            .rejected()
            .iter()
            .map(|r| format!("entity {} rejected: {}", r.id, r.error))
            .collect();

        if let Err(error) = runtime.publish_tracks() {
            failures.push(format!("tracks not published: {}", error));
        }

        let max_rates: BTreeMap<EntityId, f64> = runtime
            .model()
            .ids()
            .filter_map(|id| {
                let schedule = runtime.model().schedule(id.as_str())?;
                let rate = schedule.segments().iter().map(|s| s.rate().abs()).fold(0.0, f64::max);
                Some((id.clone(), rate))
            })
            .collect();

        let dt = self.tick_interval.as_secs_f64();
        let virtual_dt = dt * self.speed_factor;
        let target_ticks = (self.max_duration_secs / dt).round() as u64;

        let mut metrics = ScenarioMetrics::default();
        let mut previous: BTreeMap<EntityId, f64> = BTreeMap::new();
        let mut export = self.export_interval.map(|_| SimExport::new(name, self.seed));
        let mut outage_active = false;
        let mut awaiting_recovery = false;
        let mut time = 0.0;

        for tick in 1..=target_ticks {
            context.advance_time(self.tick_interval);
            let real = context.now().as_secs_f64();
            let mut events = Vec::new();

            let in_outage = self.outage.map_or(false, |(start, end)| real >= start && real < end);
            if in_outage != outage_active {
                surface.set_available(!in_outage);
                outage_active = in_outage;
                awaiting_recovery = !in_outage;
                events.push(if in_outage {
                    SimEvent::warning("surface down")
                } else {
                    SimEvent::info("surface back")
                });
            }

            match (&mut feed, runtime.mode()) {
                (Some(feed), RuntimeMode::Live) => {
                    time = (tick as f64 * virtual_dt) % config.horizon;
                    for batch in feed.poll(time) {
                        match runtime.ingest_live(&batch) {
                            Ok(ReconcileOutcome::Applied(_)) if awaiting_recovery => {
                                metrics.recoveries += 1;
                                awaiting_recovery = false;
                            }
                            Ok(_) => {}
                            Err(error) if outage_active => debug!(%error, "live batch lost during outage"),
                            Err(error) => failures.push(format!("tick {}: {}", tick, error)),
                        }
                    }
                }
                _ => match runtime.step(dt) {
                    Ok(report) => {
                        time = report.time;
                        if report.wrapped {
                            previous.clear();
                            events.push(SimEvent::info(format!("loop {}", report.loops)));
                        }
                        if awaiting_recovery && matches!(report.outcome, Some(ReconcileOutcome::Applied(_))) {
                            metrics.recoveries += 1;
                            awaiting_recovery = false;
                        }
                        Self::check_continuity(&runtime, report.time, virtual_dt, &max_rates, &mut previous, &mut metrics);
                    }
                    Err(error) => {
                        // The clock moved but nothing was compared this tick
                        previous.clear();
                        if outage_active {
                            debug!(%error, "tick lost during outage");
                        } else {
                            failures.push(format!("tick {}: {}", tick, error));
                        }
                    }
                },
            }

            if let Err(error) = runtime.advance_blink(self.tick_interval) {
                if !outage_active {
                    failures.push(format!("tick {}: blink: {}", tick, error));
                }
            }

            if let (Some(export), Some(every)) = (export.as_mut(), self.export_interval) {
                for event in events {
                    export.add_event(event);
                }
                if tick % every == 0 {
                    let opacity = surface
                        .style(TRAINS_COLLECTION, HELD_OPACITY_KEY)
                        .and_then(|v| v.as_f64())
                        .unwrap_or(1.0);
                    let frame =
                        SimFrame::from_collection(time, runtime.loops(), &surface.collection(TRAINS_COLLECTION), opacity);
                    export.add_frame(frame);
                }
            }

            if tick % 100 == 0 {
                debug!("  t={:.1}s | real={:.1}s | loops={}", time, real, runtime.loops());
            }
        }

        if let Some(feed) = feed.as_mut() {
            if let Some(batch) = feed.flush() {
                // Nothing newer was delivered after it, so it applies
                match runtime.ingest_live(&batch) {
                    Ok(ReconcileOutcome::Applied(_)) => debug!(sequence = batch.sequence, "held-back batch applied"),
                    Ok(ReconcileOutcome::Stale { last_applied, .. }) => failures.push(format!(
                        "held-back batch {} dropped behind {}",
                        batch.sequence, last_applied
                    )),
                    Err(error) if outage_active => debug!(%error, "held-back batch lost during outage"),
                    Err(error) => failures.push(format!("held-back batch {}: {}", batch.sequence, error)),
                }
            }
            metrics.batches_reordered = feed.stats().reordered;
        }

        let overlay = runtime.metrics();
        metrics.passes_applied = overlay.passes_applied;
        metrics.stale_dropped = overlay.stale_dropped;
        metrics.surface_failures = overlay.surface_failures;
        metrics.entities_excluded = overlay.entities_excluded;
        metrics.blink_toggles = runtime.blink_toggles();
        metrics.loops = runtime.loops();

        // Invariant checks
        if metrics.continuity_violations > 0 {
            failures.push(format!(
                "{} continuity violations (max jump {:.3})",
                metrics.continuity_violations, metrics.max_step_jump
            ));
        }

        let elapsed = self.tick_interval * target_ticks as u32;
        let expected_toggles = (elapsed.as_nanos() / blink_cadence.as_nanos().max(1)) as u64;
        if metrics.blink_toggles != expected_toggles {
            failures.push(format!(
                "blink toggled {} times, expected {}",
                metrics.blink_toggles, expected_toggles
            ));
        }

        let contacts = match detect_contacts(runtime.model(), runtime.tracks(), config.horizon, CONTACT_RESOLUTION) {
            Ok(contacts) => contacts,
            Err(error) => {
                failures.push(format!("contact scan failed: {}", error));
                Vec::new()
            }
        };
        let passes = contacts.iter().filter(|c| c.kind == ContactKind::Pass).count();
        if let Some(expected) = expected_passes {
            if passes != expected {
                failures.push(format!("found {} passes, expected {}", passes, expected));
            }
        }

        let final_entity_count = surface.collection(TRAINS_COLLECTION).len();
        if self.mode == RuntimeMode::Simulated && !outage_active && target_ticks > 0 {
            if final_entity_count != runtime.model().len() {
                failures.push(format!(
                    "{} markers rendered for {} entities",
                    final_entity_count,
                    runtime.model().len()
                ));
            }
        }

        let passed = failures.is_empty();
        if passed {
            info!(
                "✓ {} complete: {} passes, {} loops, {} blink toggles",
                name, passes, metrics.loops, metrics.blink_toggles
            );
        } else {
            warn!("✗ {} failed: {}", name, failures.join("; "));
        }

        if let Some(export) = export.as_mut() {
            export.finalize(passed, time);
        }

        ScenarioResult {
            scenario: name.to_string(),
            seed: self.seed,
            passed,
            total_ticks: target_ticks,
            final_time_secs: time,
            final_entity_count,
            failure_reason: (!passed).then(|| failures.join("; ")),
            contacts,
            metrics,
            export,
        }
    }

    /// Compares every entity's progress with the previous tick.
    fn check_continuity(
        runtime: &SimulationRuntime<SimContext, MemorySurface>,
        time: f64,
        virtual_dt: f64,
        max_rates: &BTreeMap<EntityId, f64>,
        previous: &mut BTreeMap<EntityId, f64>,
        metrics: &mut ScenarioMetrics,
    ) {
        for (id, result) in runtime.model().evaluate_all(time) {
            let Ok(progress) = result else {
                continue;
            };
            if let Some(last) = previous.get(id) {
                let jump = (progress - last).abs();
                let bound = max_rates.get(id).copied().unwrap_or(0.0) * virtual_dt + CONTINUITY_EPSILON;
                metrics.max_step_jump = metrics.max_step_jump.max(jump);
                if jump > bound {
                    metrics.continuity_violations += 1;
                    warn!(entity = %id, jump, bound, "progress jumped");
                }
            }
            previous.insert(id.clone(), progress);
        }
    }
}
