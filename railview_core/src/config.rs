//! Scenario and runtime configuration.
//!
//! A scenario is a JSON document describing the corridor: route polyline,
//! entity schedules and the view catalog. Runtime settings (tick cadence,
//! speed, blink) are separate so the same scenario can be replayed at
//! different rates.

use crate::railview_model::{EntityId, Segment};
use crate::railview_overlay::Category;
use crate::railview_view::{ViewCatalogConfig, ViewContext};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// One entity's schedule and presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub id: EntityId,

    /// Display label; defaults to the id
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub category: Category,

    #[serde(default)]
    pub track: u8,

    pub segments: Vec<Segment>,
}

impl EntityConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }
}

/// A complete corridor scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,

    /// Length of the route in progress units
    pub route_length: f64,

    /// Simulated seconds before the clock wraps
    pub horizon: f64,

    #[serde(default = "default_track_count")]
    pub track_count: u8,

    /// Route polyline as `[x, y]` surface coordinates
    pub route: Vec<[f64; 2]>,

    pub entities: Vec<EntityConfig>,

    pub views: ViewCatalogConfig,
}

fn default_track_count() -> u8 {
    1
}

impl ScenarioConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ScenarioConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whole-scenario checks. Per-entity problems are left to the model,
    /// which rejects only the offending entity.
    pub fn check(&self) -> Result<(), ConfigError> {
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(ConfigError::Invalid(format!("horizon {} must be > 0", self.horizon)));
        }
        if !self.route_length.is_finite() || self.route_length <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "route_length {} must be > 0",
                self.route_length
            )));
        }
        if self.track_count == 0 {
            return Err(ConfigError::Invalid("track_count must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Where snapshots come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// The clock drives the position model
    #[default]
    Simulated,
    /// Externally supplied batches; clock ticks are ignored
    Live,
}

/// Runtime knobs independent of the scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Period of the clock task
    pub tick_interval: Duration,

    /// Simulated seconds per real second
    pub speed_factor: f64,

    /// Half-period of the held blink
    pub blink_cadence: Duration,

    /// Lateral distance between neighbouring tracks, in surface units
    pub lane_spacing: f64,

    /// Duration of camera flights between contexts
    pub transition_duration: Duration,

    pub mode: RuntimeMode,

    pub initial_view: ViewContext,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            speed_factor: 1.0,
            blink_cadence: Duration::from_millis(500),
            lane_spacing: 0.002,
            transition_duration: Duration::from_millis(1500),
            mode: RuntimeMode::Simulated,
            initial_view: ViewContext::Wide,
        }
    }
}

impl RuntimeConfig {
    /// Rejects cadences and spacings the runtime cannot run with.
    ///
    /// The speed factor is checked by the clock.
    pub fn check(&self) -> Result<(), ConfigError> {
        for (name, period) in [
            ("tick_interval", self.tick_interval),
            ("blink_cadence", self.blink_cadence),
            ("transition_duration", self.transition_duration),
        ] {
            if period.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be > 0", name)));
            }
        }
        if !self.lane_spacing.is_finite() || self.lane_spacing <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "lane_spacing {} must be > 0",
                self.lane_spacing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::railview_model::SegmentRule;

    const SCENARIO: &str = r#"{
        "name": "mini",
        "route_length": 40.0,
        "horizon": 60.0,
        "track_count": 2,
        "route": [[0.0, 0.0], [0.4, 0.0]],
        "entities": [
            {
                "id": "A",
                "category": "intercity",
                "track": 1,
                "segments": [
                    {"start": 0.0, "end": 10.0, "kind": "held", "at": 0.0},
                    {"start": 10.0, "end": 50.0, "kind": "linear", "from": 0.0, "to": 40.0}
                ]
            }
        ],
        "views": {
            "wide": {"center": [0.2, 0.0], "zoom": 8.0},
            "regional": {"center": [0.1, 0.0], "zoom": 10.0},
            "detail": {"center": [0.05, 0.0], "zoom": 13.0}
        }
    }"#;

    #[test]
    fn test_parse_scenario() {
        let config = ScenarioConfig::from_json_str(SCENARIO).unwrap();
        assert_eq!(config.name, "mini");
        assert_eq!(config.track_count, 2);

        let entity = &config.entities[0];
        assert_eq!(entity.label(), "A");
        assert_eq!(entity.category, Category::Intercity);
        assert_eq!(entity.track, 1);
        assert!(matches!(entity.segments[1].rule, SegmentRule::Linear { .. }));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ScenarioConfig::from_json_str(SCENARIO).unwrap();
        let json = config.to_json_string().unwrap();
        assert_eq!(ScenarioConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_view_is_a_parse_error() {
        let broken = SCENARIO.replace(r#""detail": {"center": [0.05, 0.0], "zoom": 13.0}"#, r#""extra": 1"#);
        assert!(matches!(ScenarioConfig::from_json_str(&broken), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_horizon() {
        let broken = SCENARIO.replace(r#""horizon": 60.0"#, r#""horizon": 0.0"#);
        assert!(matches!(ScenarioConfig::from_json_str(&broken), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_runtime_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.blink_cadence, Duration::from_millis(500));
        assert_eq!(config.mode, RuntimeMode::Simulated);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_runtime_rejects_zero_cadences() {
        let zero_tick = RuntimeConfig {
            tick_interval: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(matches!(zero_tick.check(), Err(ConfigError::Invalid(_))));

        let zero_blink = RuntimeConfig {
            blink_cadence: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(matches!(zero_blink.check(), Err(ConfigError::Invalid(_))));

        let zero_flight = RuntimeConfig {
            transition_duration: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(zero_flight.check().is_err());

        for spacing in [0.0, -0.001, f64::NAN, f64::INFINITY] {
            let config = RuntimeConfig {
                lane_spacing: spacing,
                ..RuntimeConfig::default()
            };
            assert!(config.check().is_err(), "spacing {spacing} accepted");
        }
    }
}
