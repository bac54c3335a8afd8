//! Built-in corridor scenarios.

use railview_core::config::{EntityConfig, ScenarioConfig};
use railview_core::railview_model::Segment;
use railview_core::railview_overlay::Category;
use railview_core::railview_view::ViewCatalogConfig;
use railview_env::CameraTarget;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Four trains on two tracks, two overtakes at stations
    Corridor,

    /// A slow train caught by a faster one on the same track
    Overtake,

    /// One non-stop run
    Express,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::Corridor, ScenarioId::Overtake, ScenarioId::Express]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Corridor => "corridor",
            ScenarioId::Overtake => "overtake",
            ScenarioId::Express => "express",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Corridor => "4 trains, 2 tracks: ICE passes a waiting RE, IC passes a waiting freight",
            ScenarioId::Overtake => "A departs at 10s, B departs at 30s and catches A at the terminus at 50s",
            ScenarioId::Express => "Single high-speed run, no stops",
        }
    }

    /// Passes (sign changes of a same-track gap) the scenario is written to contain.
    pub fn expected_passes(&self) -> usize {
        match self {
            ScenarioId::Corridor => 2,
            ScenarioId::Overtake | ScenarioId::Express => 0,
        }
    }

    /// Builds the scenario configuration.
    pub fn config(&self) -> ScenarioConfig {
        match self {
            ScenarioId::Corridor => corridor(),
            ScenarioId::Overtake => overtake(),
            ScenarioId::Express => express(),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "corridor" | "rv-001" => Ok(ScenarioId::Corridor),
            "overtake" | "rv-002" => Ok(ScenarioId::Overtake),
            "express" | "rv-003" => Ok(ScenarioId::Express),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

fn entity(id: &str, label: &str, category: Category, track: u8, segments: Vec<Segment>) -> EntityConfig {
    EntityConfig {
        id: id.into(),
        label: Some(label.to_string()),
        category,
        track,
        segments,
    }
}

/// Zurich - Aarau - Olten - Bern, roughly.
const MAINLINE: [[f64; 2]; 4] = [[8.5402, 47.3782], [8.0510, 47.3914], [7.9077, 47.3519], [7.4391, 46.9490]];

fn mainline_views() -> ViewCatalogConfig {
    ViewCatalogConfig {
        wide: CameraTarget { center: [7.99, 47.16], zoom: 8.5 },
        regional: CameraTarget { center: [8.05, 47.38], zoom: 10.5 },
        detail: CameraTarget { center: [7.9077, 47.3519], zoom: 13.0 },
    }
}

fn corridor() -> ScenarioConfig {
    ScenarioConfig {
        name: "corridor".to_string(),
        route_length: 120.0,
        horizon: 180.0,
        track_count: 2,
        route: MAINLINE.to_vec(),
        entities: vec![
            // Track 0: RE 5 waits at km 40 while ICE 71 passes at t=55
            entity(
                "RE5",
                "RE 5",
                Category::Regional,
                0,
                vec![
                    Segment::held(0.0, 10.0, 0.0),
                    Segment::linear(10.0, 50.0, 0.0, 40.0),
                    Segment::awaiting(50.0, 80.0, 40.0),
                    Segment::linear(80.0, 140.0, 40.0, 120.0),
                    Segment::held(140.0, 180.0, 120.0),
                ],
            ),
            entity(
                "ICE71",
                "ICE 71",
                Category::HighSpeed,
                0,
                vec![
                    Segment::held(0.0, 35.0, 0.0),
                    Segment::linear(35.0, 75.0, 0.0, 80.0),
                    Segment::linear(75.0, 95.0, 80.0, 120.0),
                    Segment::held(95.0, 180.0, 120.0),
                ],
            ),
            // Track 1: the freight waits at km 30 while IC 8 passes at t=45
            entity(
                "IC8",
                "IC 8",
                Category::Intercity,
                1,
                vec![
                    Segment::held(0.0, 20.0, 0.0),
                    Segment::linear(20.0, 120.0, 0.0, 120.0),
                    Segment::held(120.0, 180.0, 120.0),
                ],
            ),
            entity(
                "CARGO402",
                "Cargo 402",
                Category::Freight,
                1,
                vec![
                    Segment::linear(0.0, 40.0, 0.0, 30.0),
                    Segment::awaiting(40.0, 90.0, 30.0),
                    Segment::linear(90.0, 180.0, 30.0, 120.0),
                ],
            ),
        ],
        views: mainline_views(),
    }
}

fn overtake() -> ScenarioConfig {
    ScenarioConfig {
        name: "overtake".to_string(),
        route_length: 40.0,
        horizon: 60.0,
        track_count: 1,
        route: vec![[8.0, 47.0], [8.4, 47.0]],
        entities: vec![
            entity(
                "A",
                "A",
                Category::Regional,
                0,
                vec![
                    Segment::held(0.0, 10.0, 0.0),
                    Segment::linear(10.0, 50.0, 0.0, 40.0),
                    Segment::held(50.0, 60.0, 40.0),
                ],
            ),
            entity("B", "B", Category::HighSpeed, 0, vec![Segment::linear(30.0, 50.0, 0.0, 40.0)]),
        ],
        views: ViewCatalogConfig {
            wide: CameraTarget { center: [8.2, 47.0], zoom: 10.0 },
            regional: CameraTarget { center: [8.3, 47.0], zoom: 12.0 },
            detail: CameraTarget { center: [8.4, 47.0], zoom: 14.0 },
        },
    }
}

fn express() -> ScenarioConfig {
    ScenarioConfig {
        name: "express".to_string(),
        route_length: 120.0,
        horizon: 80.0,
        track_count: 1,
        route: MAINLINE.to_vec(),
        entities: vec![entity(
            "ICE1",
            "ICE 1",
            Category::HighSpeed,
            0,
            vec![
                Segment::held(0.0, 5.0, 0.0),
                Segment::linear(5.0, 65.0, 0.0, 120.0),
                Segment::held(65.0, 80.0, 120.0),
            ],
        )],
        views: mainline_views(),
    }
}
