//! Live report ingestion.
//!
//! Live sources send batches of loosely-typed reports. Every field except the
//! batch sequence may be missing; incomplete reports are not errors, they are
//! simply not drawn.

use crate::railview_model::EntityId;
use crate::railview_overlay::{Category, EntityPosition, EntitySnapshot, Snapshot};
use serde::{Deserialize, Serialize};

/// One vehicle as reported by a live source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveReport {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub held: Option<bool>,
}

impl LiveReport {
    /// Converts to a snapshot entry. Reports without an id are dropped;
    /// reports without both coordinates keep their id but get no position,
    /// so the synchronizer excludes them.
    pub fn to_entity(&self) -> Option<EntitySnapshot> {
        let id = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;

        let position = match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Some(EntityPosition::Coordinates { lon, lat }),
            _ => None,
        };

        Some(EntitySnapshot {
            id: EntityId::new(id),
            label: self.label.clone().unwrap_or_else(|| id.to_string()),
            category: self
                .category
                .as_deref()
                .map(Category::parse_lenient)
                .unwrap_or_default(),
            held: self.held.unwrap_or(false),
            position,
        })
    }
}

/// A batch of reports. Batches may arrive out of order; `sequence` decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveBatch {
    pub sequence: u64,
    #[serde(default)]
    pub reports: Vec<LiveReport>,
}

impl LiveBatch {
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            sequence: self.sequence,
            entities: self.reports.iter().filter_map(LiveReport::to_entity).collect(),
        }
    }
}
