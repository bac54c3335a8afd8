//! Synthetic live source for exercising the live overlay path.
//!
//! The feed replays a scenario's schedules as if they were reported by an
//! external positioning service:
//! - Coordinates carry Gaussian jitter
//! - Reports randomly lose their id or a coordinate
//! - Batches occasionally arrive out of order
//!
//! All randomness comes from one ChaCha8 stream, so a seed reproduces the
//! exact same sequence of batches.

use railview_core::config::ScenarioConfig;
use railview_core::live::{LiveBatch, LiveReport};
use railview_core::railview_model::{ModelError, Phase, PositionModel};
use railview_core::route::{RouteError, RouteGeometry};
use railview_core::tracks::TrackAssignment;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Invalid feed parameter: {0}")]
    InvalidParameter(String),
}

/// Noise parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFeedConfig {
    /// Standard deviation of coordinate jitter (surface units)
    pub jitter_std: f64,

    /// Probability that a report loses one field
    pub missing_rate: f64,

    /// Probability that a batch is held back and delivered after the next one
    pub reorder_rate: f64,

    /// Lateral distance between tracks
    pub lane_spacing: f64,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            jitter_std: 0.0002,
            missing_rate: 0.1,
            reorder_rate: 0.2,
            lane_spacing: 0.002,
        }
    }
}

/// Counters describing what the feed did to its output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveFeedStats {
    pub batches: u64,
    pub reports: u64,
    pub fields_dropped: u64,
    pub reordered: u64,
}

struct Profile {
    label: String,
    category: &'static str,
}

pub struct LiveFeed {
    model: PositionModel,
    route: RouteGeometry,
    tracks: TrackAssignment,
    profiles: Vec<(String, Profile)>,
    config: LiveFeedConfig,
    jitter: Normal<f64>,
    rng: ChaCha8Rng,
    next_sequence: u64,
    held_back: Option<LiveBatch>,
    stats: LiveFeedStats,
}

impl LiveFeed {
    pub fn new(scenario: &ScenarioConfig, config: LiveFeedConfig, rng: ChaCha8Rng) -> Result<Self, FeedError> {
        let jitter = Normal::new(0.0, config.jitter_std)
            .map_err(|e| FeedError::InvalidParameter(format!("jitter_std: {}", e)))?;
        for (name, rate) in [("missing_rate", config.missing_rate), ("reorder_rate", config.reorder_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(FeedError::InvalidParameter(format!("{} {} outside [0, 1]", name, rate)));
            }
        }

        let route = RouteGeometry::new(&scenario.route)?;
        let (model, _) = PositionModel::from_schedules(
            scenario.route_length,
            scenario.entities.iter().map(|e| (e.id.clone(), e.segments.clone())),
        )?;

        // Out-of-range tracks fall back to 0, as in the runtime
        let mut tracks = TrackAssignment::new(scenario.track_count.max(1)).map_err(|e| {
            FeedError::InvalidParameter(e.to_string())
        })?;
        let mut profiles = Vec::new();
        for entity in &scenario.entities {
            if let Err(error) = tracks.assign(entity.id.clone(), entity.track) {
                warn!(entity = %entity.id, %error, "falling back to track 0");
            }
            profiles.push((
                entity.id.to_string(),
                Profile {
                    label: entity.label().to_string(),
                    category: entity.category.name(),
                },
            ));
        }

        Ok(Self {
            model,
            route,
            tracks,
            profiles,
            config,
            jitter,
            rng,
            next_sequence: 1,
            held_back: None,
            stats: LiveFeedStats::default(),
        })
    }

    /// Reports for virtual time `t`, in delivery order.
    ///
    /// Usually one batch; none when the fresh batch is held back; two when a
    /// held-back batch is released behind a newer one.
    pub fn poll(&mut self, t: f64) -> Vec<LiveBatch> {
        let batch = self.build_batch(t);
        self.stats.batches += 1;

        if let Some(older) = self.held_back.take() {
            return vec![batch, older];
        }
        if self.rng.gen_bool(self.config.reorder_rate) {
            self.stats.reordered += 1;
            self.held_back = Some(batch);
            return Vec::new();
        }
        vec![batch]
    }

    /// Releases a batch still held back, if any.
    pub fn flush(&mut self) -> Option<LiveBatch> {
        self.held_back.take()
    }

    pub fn stats(&self) -> &LiveFeedStats {
        &self.stats
    }

    fn build_batch(&mut self, t: f64) -> LiveBatch {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let route_length = self.model.route_length();
        let mut reports = Vec::with_capacity(self.profiles.len());

        for (id, profile) in &self.profiles {
            let Ok(progress) = self.model.evaluate(id, t) else {
                continue;
            };
            let held = matches!(self.model.phase(id, t), Ok(Phase::Held { awaiting_overtake: true }));
            let offset = self.tracks.lane_offset(self.tracks.track_of(id), self.config.lane_spacing);
            let [x, y] = self.route.point_at(progress / route_length, offset);

            let mut report = LiveReport {
                id: Some(id.clone()),
                label: Some(profile.label.clone()),
                lon: Some(x + self.jitter.sample(&mut self.rng)),
                lat: Some(y + self.jitter.sample(&mut self.rng)),
                category: Some(profile.category.to_string()),
                held: Some(held),
            };

            if self.rng.gen_bool(self.config.missing_rate) {
                self.stats.fields_dropped += 1;
                match self.rng.gen_range(0..3) {
                    0 => report.id = None,
                    1 => report.lon = None,
                    _ => report.lat = None,
                }
            }

            reports.push(report);
        }

        self.stats.reports += reports.len() as u64;
        LiveBatch { sequence, reports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioId;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn feed(seed: u64, config: LiveFeedConfig) -> LiveFeed {
        LiveFeed::new(&ScenarioId::Corridor.config(), config, ChaCha8Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_clean_feed_reports_every_entity() {
        let mut feed = feed(
            1,
            LiveFeedConfig {
                jitter_std: 0.0,
                missing_rate: 0.0,
                reorder_rate: 0.0,
                ..Default::default()
            },
        );

        let batches = feed.poll(60.0);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].sequence, 1);
        assert_eq!(batches[0].to_snapshot().entities.len(), 4);

        let re = batches[0].reports.iter().find(|r| r.id.as_deref() == Some("RE5")).unwrap();
        assert_eq!(re.held, Some(true));
    }

    #[test]
    fn test_same_seed_same_batches() {
        let mut a = feed(7, LiveFeedConfig::default());
        let mut b = feed(7, LiveFeedConfig::default());

        for step in 0..50 {
            let t = step as f64 * 2.0;
            assert_eq!(a.poll(t), b.poll(t));
        }
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn test_reordered_batches_arrive_late() {
        let mut feed = feed(
            3,
            LiveFeedConfig {
                reorder_rate: 1.0,
                ..Default::default()
            },
        );

        assert!(feed.poll(1.0).is_empty());
        let delivered: Vec<u64> = feed.poll(2.0).iter().map(|b| b.sequence).collect();
        assert_eq!(delivered, vec![2, 1]);
    }

    #[test]
    fn test_out_of_range_track_falls_back_to_zero() {
        let mut scenario = ScenarioId::Express.config();
        scenario.entities[0].track = 9;
        let mut feed = LiveFeed::new(
            &scenario,
            LiveFeedConfig {
                jitter_std: 0.0,
                missing_rate: 0.0,
                reorder_rate: 0.0,
                ..Default::default()
            },
            ChaCha8Rng::seed_from_u64(5),
        )
        .unwrap();

        let id = scenario.entities[0].id.to_string();
        assert_eq!(feed.tracks.track_of(&id), 0);
        assert_eq!(feed.poll(10.0)[0].reports.len(), 1);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let result = LiveFeed::new(
            &ScenarioId::Express.config(),
            LiveFeedConfig {
                missing_rate: 1.5,
                ..Default::default()
            },
            ChaCha8Rng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FeedError::InvalidParameter(_))));
    }

    proptest! {
        #[test]
        fn test_any_seed_keeps_sequences_unique(seed in any::<u64>()) {
            let mut feed = feed(seed, LiveFeedConfig::default());
            let mut seen = Vec::new();
            for step in 0..30 {
                for batch in feed.poll(step as f64 * 3.0) {
                    prop_assert!(batch.reports.len() <= 4);
                    seen.push(batch.sequence);
                }
            }
            seen.extend(feed.flush().map(|b| b.sequence));

            seen.sort_unstable();
            prop_assert_eq!(seen, (1..=30).collect::<Vec<u64>>());
        }
    }
}
