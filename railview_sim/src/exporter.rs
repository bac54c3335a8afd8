//! JSON exporter for offline inspection.
//!
//! Exports what the surface rendered on every sampled tick as JSON frames.

use railview_env::{Feature, FeatureCollection, Geometry};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of rendered data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Virtual scenario time in seconds
    pub time_sec: f64,

    /// Clock loops completed when the frame was taken
    pub loops: u64,

    /// Rendered train markers
    pub trains: Vec<TrainFrame>,

    /// Opacity currently applied to held trains
    pub held_opacity: f64,

    /// Notable events (passes, surface outages, ...)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

impl SimFrame {
    /// Builds a frame from the surface's train collection.
    pub fn from_collection(time_sec: f64, loops: u64, collection: &FeatureCollection, held_opacity: f64) -> Self {
        Self {
            time_sec,
            loops,
            trains: collection.features.iter().filter_map(TrainFrame::from_feature).collect(),
            held_opacity,
            events: Vec::new(),
        }
    }
}

/// One rendered marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainFrame {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub held: bool,
}

impl TrainFrame {
    /// Point features only; lines are not trains.
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let Geometry::Point([x, y]) = feature.geometry else {
            return None;
        };
        Some(Self {
            id: feature.id.clone(),
            x,
            y,
            progress: feature.property("progress").and_then(|v| v.as_f64()),
            held: feature.property("blink").and_then(|v| v.as_bool()).unwrap_or(false),
        })
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Events waiting for the next frame
    #[serde(skip)]
    pending: Vec<SimEvent>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            pending: Vec::new(),
        }
    }

    /// Adds a frame, carrying every event raised since the previous one.
    pub fn add_frame(&mut self, mut frame: SimFrame) {
        frame.events.append(&mut self.pending);
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Queues an event for the next frame.
    pub fn add_event(&mut self, event: SimEvent) {
        self.pending.push(event);
    }

    /// Finalizes the export. Events raised after the last frame go onto it.
    pub fn finalize(&mut self, passed: bool, duration_sec: f64) {
        self.passed = passed;
        self.duration_sec = duration_sec;
        if let Some(frame) = self.frames.last_mut() {
            frame.events.append(&mut self.pending);
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_keeps_point_features_only() {
        let collection = FeatureCollection::from_features(vec![
            Feature::new("IC8", Geometry::Point([8.0, 47.0]))
                .with_property("progress", 12.5)
                .with_property("blink", true),
            Feature::new("track-0", Geometry::LineString(vec![[0.0, 0.0], [1.0, 0.0]])),
        ]);

        let frame = SimFrame::from_collection(3.0, 0, &collection, 0.25);
        assert_eq!(frame.trains.len(), 1);
        assert_eq!(frame.trains[0].progress, Some(12.5));
        assert!(frame.trains[0].held);
    }

    #[test]
    fn test_events_land_on_next_frame() {
        let mut export = SimExport::new("corridor", 1);
        export.add_event(SimEvent::warning("surface down"));
        export.add_frame(SimFrame::from_collection(1.0, 0, &FeatureCollection::new(), 1.0));

        export.add_event(SimEvent::info("surface back"));
        export.add_frame(SimFrame::from_collection(2.0, 0, &FeatureCollection::new(), 1.0));
        export.add_event(SimEvent::info("loop 1"));
        export.finalize(true, 2.5);

        assert_eq!(export.frames[0].events.len(), 1);
        assert_eq!(export.frames[0].events[0].message, "surface down");
        let last: Vec<&str> = export.frames[1].events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(last, vec!["surface back", "loop 1"]);
    }

    #[test]
    fn test_export_serializes() {
        let mut export = SimExport::new("express", 42);
        export.add_event(SimEvent::info("start"));
        export.add_frame(SimFrame::from_collection(1.5, 0, &FeatureCollection::new(), 1.0));
        export.finalize(true, 1.5);

        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"scenario\":\"express\""));
        assert!(json.contains("\"start\""));
    }
}
