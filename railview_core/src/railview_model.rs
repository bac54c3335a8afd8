//! The "POSITION" Engine - Piecewise time-to-progress model
//!
//! Every entity owns an ordered, contiguous list of segments. A segment maps
//! a half-open time interval `[start, end)` to progress along the route:
//! either held at a fixed point or moving linearly between two points.
//! Outside the schedule the entity sits at its first or last progress.
//!
//! Evaluation is a pure function of `(entity, t)`: nothing is accumulated,
//! so a scenario can be scrubbed backward as freely as forward.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use thiserror::Error;

/// Tolerance for segment boundaries meeting in time.
pub const TIME_EPSILON: f64 = 1e-9;

/// Tolerance for progress continuity at segment boundaries.
pub const CONTINUITY_EPSILON: f64 = 1e-6;

/// Stable identity of a rail vehicle (e.g. "IC 512").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schedule and lookup errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Schedule has no segments")]
    EmptySchedule,

    #[error("Segment {index} has a non-finite bound or progress")]
    NonFinite { index: usize },

    #[error("Segment {index} interval [{start}, {end}) is empty or inverted")]
    InvertedInterval { index: usize, start: f64, end: f64 },

    #[error("Gap after segment {index}: ends at {end}, next starts at {next_start}")]
    Gap { index: usize, end: f64, next_start: f64 },

    #[error("Segment {index} ends at {end} but the next one starts earlier, at {next_start}")]
    NonMonotonic { index: usize, end: f64, next_start: f64 },

    #[error("Progress jumps after segment {index}: {end_progress} -> {next_progress}")]
    Discontinuity { index: usize, end_progress: f64, next_progress: f64 },

    #[error("Segment {index} progress {progress} outside [0, {route_length}]")]
    ProgressOutOfRange { index: usize, progress: f64, route_length: f64 },

    #[error("Route length must be finite and positive, got {0}")]
    InvalidRouteLength(f64),

    #[error("Entity {0} is already defined")]
    DuplicateEntity(EntityId),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Evaluation time must be finite, got {0}")]
    InvalidTime(f64),
}

/// How progress evolves inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentRule {
    /// Standing at `at` (station stop, or waiting to be overtaken)
    Held {
        at: f64,
        #[serde(default)]
        awaiting_overtake: bool,
    },

    /// Moving from `from` to `to` at constant speed
    Linear { from: f64, to: f64 },
}

/// A half-open time interval `[start, end)` with its progress rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    #[serde(flatten)]
    pub rule: SegmentRule,
}

impl Segment {
    /// A station stop.
    pub fn held(start: f64, end: f64, at: f64) -> Self {
        Self {
            start,
            end,
            rule: SegmentRule::Held {
                at,
                awaiting_overtake: false,
            },
        }
    }

    /// A stop spent waiting for another train to pass.
    pub fn awaiting(start: f64, end: f64, at: f64) -> Self {
        Self {
            start,
            end,
            rule: SegmentRule::Held {
                at,
                awaiting_overtake: true,
            },
        }
    }

    /// A constant-speed run.
    pub fn linear(start: f64, end: f64, from: f64, to: f64) -> Self {
        Self {
            start,
            end,
            rule: SegmentRule::Linear { from, to },
        }
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn start_progress(&self) -> f64 {
        match self.rule {
            SegmentRule::Held { at, .. } => at,
            SegmentRule::Linear { from, .. } => from,
        }
    }

    pub fn end_progress(&self) -> f64 {
        match self.rule {
            SegmentRule::Held { at, .. } => at,
            SegmentRule::Linear { to, .. } => to,
        }
    }

    /// Progress per virtual second (zero for held segments).
    pub fn rate(&self) -> f64 {
        match self.rule {
            SegmentRule::Held { .. } => 0.0,
            SegmentRule::Linear { from, to } => (to - from) / (self.end - self.start),
        }
    }

    /// Progress at `t`, clamped to the segment's progress range so that
    /// floating-point overshoot at the interval edges never leaks out.
    pub fn progress_at(&self, t: f64) -> f64 {
        match self.rule {
            SegmentRule::Held { at, .. } => at,
            SegmentRule::Linear { from, to } => {
                let p = from + (t - self.start) * self.rate();
                p.clamp(from.min(to), from.max(to))
            }
        }
    }
}

/// Where an entity is within its schedule at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeStart,
    Held { awaiting_overtake: bool },
    Moving,
    Finished,
}

/// A validated, immutable segment sequence for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchedule {
    segments: Vec<Segment>,

    /// Reported before the first segment starts
    before: f64,

    /// Reported once the last segment has ended
    after: f64,
}

impl EntitySchedule {
    /// Validates `segments` and builds the schedule.
    ///
    /// Segments must be in time order, contiguous, and continuous in
    /// progress; every progress value must lie on the route.
    pub fn new(mut segments: Vec<Segment>, route_length: f64) -> Result<Self, ModelError> {
        let (first, last) = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(ModelError::EmptySchedule),
        };

        for (index, seg) in segments.iter().enumerate() {
            let values = [seg.start, seg.end, seg.start_progress(), seg.end_progress()];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite { index });
            }
            if seg.end <= seg.start {
                return Err(ModelError::InvertedInterval {
                    index,
                    start: seg.start,
                    end: seg.end,
                });
            }
            for progress in [seg.start_progress(), seg.end_progress()] {
                if progress < 0.0 || progress > route_length {
                    return Err(ModelError::ProgressOutOfRange {
                        index,
                        progress,
                        route_length,
                    });
                }
            }
        }

        for (index, pair) in segments.windows(2).enumerate() {
            let (current, next) = (pair[0], pair[1]);
            let gap = next.start - current.end;
            if gap > TIME_EPSILON {
                return Err(ModelError::Gap {
                    index,
                    end: current.end,
                    next_start: next.start,
                });
            }
            if gap < -TIME_EPSILON {
                return Err(ModelError::NonMonotonic {
                    index,
                    end: current.end,
                    next_start: next.start,
                });
            }
            if (next.start_progress() - current.end_progress()).abs() > CONTINUITY_EPSILON {
                return Err(ModelError::Discontinuity {
                    index,
                    end_progress: current.end_progress(),
                    next_progress: next.start_progress(),
                });
            }
        }

        // Boundaries within tolerance are made exact so no `t` falls between segments
        for index in 1..segments.len() {
            let end = segments[index - 1].end;
            let seg = &mut segments[index];
            seg.start = end;
            if seg.end <= seg.start {
                return Err(ModelError::InvertedInterval {
                    index,
                    start: seg.start,
                    end: seg.end,
                });
            }
        }

        Ok(Self {
            before: first.start_progress(),
            after: last.end_progress(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Internal boundary times (where one segment hands over to the next).
    pub fn boundaries(&self) -> impl Iterator<Item = f64> + '_ {
        self.segments.iter().skip(1).map(|s| s.start)
    }

    fn locate(&self, t: f64) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(t))
    }

    fn starts_after(&self, t: f64) -> bool {
        self.segments.first().map_or(false, |s| t < s.start)
    }

    /// Progress at `t`.
    pub fn progress_at(&self, t: f64) -> f64 {
        if self.starts_after(t) {
            return self.before;
        }
        match self.locate(t) {
            Some(segment) => segment.progress_at(t),
            None => self.after,
        }
    }

    /// Schedule phase at `t`.
    pub fn phase_at(&self, t: f64) -> Phase {
        if self.starts_after(t) {
            return Phase::BeforeStart;
        }
        match self.locate(t).map(|s| s.rule) {
            Some(SegmentRule::Held { awaiting_overtake, .. }) => Phase::Held { awaiting_overtake },
            Some(SegmentRule::Linear { .. }) => Phase::Moving,
            None => Phase::Finished,
        }
    }
}

/// An entity that failed validation and was not loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntity {
    pub id: EntityId,
    pub error: ModelError,
}

/// Data-driven table: entity identity → validated schedule.
#[derive(Debug, Clone)]
pub struct PositionModel {
    route_length: f64,
    schedules: BTreeMap<EntityId, EntitySchedule>,
}

impl PositionModel {
    /// Creates an empty model for a route of `route_length`.
    pub fn new(route_length: f64) -> Result<Self, ModelError> {
        if !route_length.is_finite() || route_length <= 0.0 {
            return Err(ModelError::InvalidRouteLength(route_length));
        }
        Ok(Self {
            route_length,
            schedules: BTreeMap::new(),
        })
    }

    /// Builds a model from `(id, segments)` rows.
    ///
    /// Each entity is validated on its own: invalid ones are refused and
    /// reported, valid ones are loaded.
    pub fn from_schedules<I>(route_length: f64, rows: I) -> Result<(Self, Vec<RejectedEntity>), ModelError>
    where
        I: IntoIterator<Item = (EntityId, Vec<Segment>)>,
    {
        let mut model = Self::new(route_length)?;
        let mut rejected = Vec::new();

        for (id, segments) in rows {
            if let Err(error) = model.insert(id.clone(), segments) {
                tracing::warn!(entity = %id, %error, "refusing entity schedule");
                rejected.push(RejectedEntity { id, error });
            }
        }

        Ok((model, rejected))
    }

    /// Validates and adds one entity.
    pub fn insert(&mut self, id: EntityId, segments: Vec<Segment>) -> Result<(), ModelError> {
        if self.schedules.contains_key(&id) {
            return Err(ModelError::DuplicateEntity(id));
        }
        let schedule = EntitySchedule::new(segments, self.route_length)?;
        self.schedules.insert(id, schedule);
        Ok(())
    }

    pub fn route_length(&self) -> f64 {
        self.route_length
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schedules.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.schedules.keys()
    }

    pub fn schedule(&self, id: &str) -> Option<&EntitySchedule> {
        self.schedules.get(id)
    }

    fn lookup(&self, id: &str, t: f64) -> Result<&EntitySchedule, ModelError> {
        if !t.is_finite() {
            return Err(ModelError::InvalidTime(t));
        }
        self.schedules
            .get(id)
            .ok_or_else(|| ModelError::UnknownEntity(id.to_string()))
    }

    /// Progress of `id` at virtual time `t`, in `[0, route_length]`.
    pub fn evaluate(&self, id: &str, t: f64) -> Result<f64, ModelError> {
        Ok(self.lookup(id, t)?.progress_at(t))
    }

    /// Schedule phase of `id` at `t`.
    pub fn phase(&self, id: &str, t: f64) -> Result<Phase, ModelError> {
        Ok(self.lookup(id, t)?.phase_at(t))
    }

    /// Evaluates every entity independently.
    pub fn evaluate_all(&self, t: f64) -> Vec<(&EntityId, Result<f64, ModelError>)> {
        self.schedules
            .keys()
            .map(|id| (id, self.evaluate(id.as_str(), t)))
            .collect()
    }

    /// Finds the first time in `[from, to]` where `a` and `b` meet or cross.
    ///
    /// The gap `a - b` is sampled every `resolution` seconds; a sign change
    /// is refined by bisection. Returns `from` if the two already coincide
    /// there. Overtakes are authored in the schedules; this only locates
    /// them.
    pub fn first_contact(
        &self,
        a: &str,
        b: &str,
        from: f64,
        to: f64,
        resolution: f64,
    ) -> Result<Option<f64>, ModelError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(ModelError::InvalidTime(resolution));
        }
        if !to.is_finite() || to < from {
            return Err(ModelError::InvalidTime(to));
        }

        let gap = |t: f64| -> Result<f64, ModelError> { Ok(self.evaluate(a, t)? - self.evaluate(b, t)?) };

        let mut prev_t = from;
        let mut prev_gap = gap(from)?;
        if prev_gap.abs() <= CONTINUITY_EPSILON {
            return Ok(Some(from));
        }

        let steps = ((to - from) / resolution).ceil().max(1.0) as usize;
        for step in 1..=steps {
            let t = (from + step as f64 * resolution).min(to);
            let g = gap(t)?;

            if g.abs() <= CONTINUITY_EPSILON {
                return Ok(Some(t));
            }
            if g.signum() != prev_gap.signum() {
                let (mut lo, mut hi) = (prev_t, t);
                for _ in 0..64 {
                    let mid = 0.5 * (lo + hi);
                    if gap(mid)?.signum() == prev_gap.signum() {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                return Ok(Some(hi));
            }

            prev_t = t;
            prev_gap = g;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const ROUTE: f64 = 100.0;

    fn entity_a() -> Vec<Segment> {
        vec![
            Segment::held(0.0, 10.0, 0.0),
            Segment::linear(10.0, 50.0, 0.0, 40.0),
            Segment::held(50.0, 60.0, 40.0),
        ]
    }

    fn entity_b() -> Vec<Segment> {
        vec![Segment::linear(30.0, 50.0, 0.0, 40.0)]
    }

    fn model_ab() -> PositionModel {
        let mut model = PositionModel::new(ROUTE).unwrap();
        model.insert("A".into(), entity_a()).unwrap();
        model.insert("B".into(), entity_b()).unwrap();
        model
    }

    #[test]
    fn test_concrete_schedule_a() {
        let model = model_ab();

        assert_relative_eq!(model.evaluate("A", 0.0).unwrap(), 0.0);
        assert_relative_eq!(model.evaluate("A", 30.0).unwrap(), 20.0);
        assert_relative_eq!(model.evaluate("A", 55.0).unwrap(), 40.0);
    }

    #[test]
    fn test_boundaries_outside_schedule() {
        let model = model_ab();

        // Before the first segment and after the last one
        assert_eq!(model.evaluate("B", -100.0).unwrap(), 0.0);
        assert_eq!(model.evaluate("B", 10.0).unwrap(), 0.0);
        assert_eq!(model.evaluate("B", 50.0).unwrap(), 40.0);
        assert_eq!(model.evaluate("A", 1e6).unwrap(), 40.0);

        assert_eq!(model.phase("B", 10.0).unwrap(), Phase::BeforeStart);
        assert_eq!(model.phase("B", 40.0).unwrap(), Phase::Moving);
        assert_eq!(model.phase("A", 5.0).unwrap(), Phase::Held { awaiting_overtake: false });
        assert_eq!(model.phase("A", 60.0).unwrap(), Phase::Finished);
    }

    #[test]
    fn test_overtake_curves_meet_without_jumps() {
        let model = model_ab();

        // B starts 20 behind A and closes the gap at twice A's speed
        let mut previous_gap = f64::MAX;
        let mut t = 30.0;
        while t < 50.0 {
            let gap = model.evaluate("A", t).unwrap() - model.evaluate("B", t).unwrap();
            assert!(gap > 0.0, "A must still lead at t={t}");
            assert!(gap < previous_gap, "gap must shrink at t={t}");
            previous_gap = gap;
            t += 0.5;
        }
        assert_relative_eq!(model.evaluate("A", 50.0).unwrap(), 40.0);
        assert_relative_eq!(model.evaluate("B", 50.0).unwrap(), 40.0);

        let contact = model.first_contact("A", "B", 30.0, 60.0, 1.0).unwrap();
        assert_relative_eq!(contact.unwrap(), 50.0, epsilon = 1e-6);

        // Neither curve jumps across the approach
        for id in ["A", "B"] {
            let mut t = 29.0;
            while t < 51.0 {
                let step = (model.evaluate(id, t + 0.01).unwrap() - model.evaluate(id, t).unwrap()).abs();
                assert!(step <= 0.021, "{id} jumped at t={t}");
                t += 0.01;
            }
        }
    }

    #[test]
    fn test_first_contact_bisects_crossing() {
        let mut model = PositionModel::new(ROUTE).unwrap();
        model.insert("slow".into(), vec![Segment::linear(0.0, 100.0, 10.0, 60.0)]).unwrap();
        model.insert("fast".into(), vec![Segment::linear(0.0, 100.0, 0.0, 100.0)]).unwrap();

        // slow = 10 + t/2, fast = t  ->  cross at t = 20
        let contact = model.first_contact("slow", "fast", 0.0, 100.0, 7.0).unwrap().unwrap();
        assert_relative_eq!(contact, 20.0, epsilon = 1e-6);

        assert_eq!(model.first_contact("slow", "fast", 30.0, 100.0, 1.0).unwrap(), None);
    }

    #[test]
    fn test_linear_clamps_overshoot() {
        let seg = Segment::linear(0.1, 0.3, 0.0, 1.0);
        assert!(seg.progress_at(0.3 - f64::EPSILON) <= 1.0);
        assert_eq!(seg.progress_at(10.0), 1.0);

        let down = Segment::linear(0.0, 10.0, 40.0, 0.0);
        assert_relative_eq!(down.progress_at(5.0), 20.0);
        assert_eq!(down.progress_at(-5.0), 40.0);
    }

    #[test]
    fn test_validation_rejects_malformed_schedules() {
        let check = |segments: Vec<Segment>| EntitySchedule::new(segments, ROUTE).unwrap_err();

        assert_eq!(check(vec![]), ModelError::EmptySchedule);
        assert!(matches!(check(vec![Segment::held(5.0, 5.0, 0.0)]), ModelError::InvertedInterval { .. }));
        assert!(matches!(
            check(vec![Segment::held(0.0, 5.0, 0.0), Segment::held(6.0, 8.0, 0.0)]),
            ModelError::Gap { index: 0, .. }
        ));
        assert!(matches!(
            check(vec![Segment::held(0.0, 5.0, 0.0), Segment::held(4.0, 8.0, 0.0)]),
            ModelError::NonMonotonic { index: 0, .. }
        ));
        assert!(matches!(
            check(vec![Segment::held(0.0, 5.0, 0.0), Segment::linear(5.0, 8.0, 3.0, 9.0)]),
            ModelError::Discontinuity { index: 0, .. }
        ));
        assert!(matches!(
            check(vec![Segment::linear(0.0, 5.0, 0.0, 150.0)]),
            ModelError::ProgressOutOfRange { .. }
        ));
        assert!(matches!(check(vec![Segment::held(0.0, f64::NAN, 0.0)]), ModelError::NonFinite { index: 0 }));
    }

    #[test]
    fn test_tolerated_gaps_and_overlaps_stay_continuous() {
        let gap = 5e-10;
        let mut model = PositionModel::new(ROUTE).unwrap();
        model
            .insert(
                "gap".into(),
                vec![
                    Segment::held(0.0, 10.0, 0.0),
                    Segment::linear(10.0 + gap, 50.0, 0.0, 40.0),
                    Segment::held(50.0, 60.0, 40.0),
                ],
            )
            .unwrap();
        model
            .insert(
                "overlap".into(),
                vec![
                    Segment::held(0.0, 10.0, 0.0),
                    Segment::linear(10.0 - gap, 50.0, 0.0, 40.0),
                    Segment::held(50.0 - gap, 60.0, 40.0),
                ],
            )
            .unwrap();

        for id in ["gap", "overlap"] {
            let schedule = model.schedule(id).unwrap();
            let segments = schedule.segments();
            assert_eq!(segments[1].start, segments[0].end);
            assert_eq!(segments[2].start, segments[1].end);

            for t in [10.0 - 1e-9, 10.0, 10.0 + gap / 2.0, 10.0 + gap, 50.0 - gap, 50.0] {
                let left = model.evaluate(id, t - 1e-9).unwrap();
                let here = model.evaluate(id, t).unwrap();
                assert!((left - here).abs() <= CONTINUITY_EPSILON, "{id} jumped at t={t}: {left} -> {here}");
            }
            assert_relative_eq!(model.evaluate(id, 10.0).unwrap(), 0.0);
            assert_relative_eq!(model.evaluate(id, 30.0).unwrap(), 20.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_invalid_entities_are_isolated() {
        let rows = vec![
            (EntityId::new("good"), entity_a()),
            (EntityId::new("gappy"), vec![Segment::held(0.0, 1.0, 0.0), Segment::held(2.0, 3.0, 0.0)]),
            (EntityId::new("good"), entity_b()),
        ];
        let (model, rejected) = PositionModel::from_schedules(ROUTE, rows).unwrap();

        assert_eq!(model.len(), 1);
        assert_eq!(rejected.len(), 2);
        assert!(matches!(rejected[0].error, ModelError::Gap { .. }));
        assert!(matches!(rejected[1].error, ModelError::DuplicateEntity(_)));
        assert_relative_eq!(model.evaluate("good", 30.0).unwrap(), 20.0);
    }

    #[test]
    fn test_lookup_errors() {
        let model = model_ab();
        assert!(matches!(model.evaluate("Z", 1.0), Err(ModelError::UnknownEntity(_))));
        assert!(matches!(model.evaluate("A", f64::NAN), Err(ModelError::InvalidTime(_))));
        assert!(PositionModel::new(0.0).is_err());

        let all = model.evaluate_all(30.0);
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|(_, r)| r.is_ok()));
    }

    #[test]
    fn test_segments_deserialize_from_table() {
        let json = r#"[
            {"start": 0, "end": 10, "kind": "held", "at": 0},
            {"start": 10, "end": 50, "kind": "linear", "from": 0, "to": 40},
            {"start": 50, "end": 60, "kind": "held", "at": 40, "awaiting_overtake": true}
        ]"#;
        let segments: Vec<Segment> = serde_json::from_str(json).unwrap();
        assert_eq!(segments, vec![
            Segment::held(0.0, 10.0, 0.0),
            Segment::linear(10.0, 50.0, 0.0, 40.0),
            Segment::awaiting(50.0, 60.0, 40.0),
        ]);
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_pure(times in prop::collection::vec(-20.0f64..80.0, 1..50)) {
            let model = model_ab();
            let forward: Vec<f64> = times.iter().map(|t| model.evaluate("A", *t).unwrap()).collect();
            let backward: Vec<f64> = times.iter().rev().map(|t| model.evaluate("A", *t).unwrap()).collect();

            for (f, b) in forward.iter().zip(backward.iter().rev()) {
                prop_assert_eq!(f.to_bits(), b.to_bits());
            }
        }

        #[test]
        fn prop_monotonic_within_linear_segment(
            from in 0.0f64..100.0,
            to in 0.0f64..100.0,
            t1 in 0.0f64..1.0,
            t2 in 0.0f64..1.0,
        ) {
            let mut model = PositionModel::new(ROUTE).unwrap();
            model.insert("x".into(), vec![Segment::linear(10.0, 30.0, from, to)]).unwrap();

            let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let p1 = model.evaluate("x", 10.0 + lo * 20.0).unwrap();
            let p2 = model.evaluate("x", 10.0 + hi * 20.0).unwrap();

            if to >= from {
                prop_assert!(p1 <= p2);
            } else {
                prop_assert!(p1 >= p2);
            }
            prop_assert!(p1 >= 0.0 && p1 <= ROUTE);
        }

        #[test]
        fn prop_continuous_at_boundaries(delta in 1e-9f64..1e-6) {
            let model = model_ab();
            let schedule = model.schedule("A").unwrap();
            for b in schedule.boundaries() {
                let left = model.evaluate("A", b - delta).unwrap();
                let right = model.evaluate("A", b).unwrap();
                prop_assert!((left - right).abs() <= CONTINUITY_EPSILON);
            }
        }
    }
}
