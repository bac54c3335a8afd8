//! Common types exchanged with rendering surfaces.
//!
//! The shapes follow GeoJSON closely (point / line string geometry plus a
//! flat property bag) so a map widget can consume them directly, but nothing
//! here depends on a particular rendering technology.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A scalar property or style value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Returns the value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as text, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

/// Surface geometry in `[x, y]` (or `[lon, lat]`) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
}

/// A single rendered feature, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Stable key (the entity identity for markers, the track for lines)
    pub id: String,

    /// Where the feature is drawn
    pub geometry: Geometry,

    /// Style inputs (label, colour, blink flag, ...)
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Feature {
    /// Creates a feature with no properties.
    pub fn new(id: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property (builder style).
    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Looks up a property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// A named set of features as stored by a surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection from features.
    pub fn from_features(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True if the collection has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Finds a feature by id.
    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Set of feature ids.
    pub fn ids(&self) -> BTreeSet<&str> {
        self.features.iter().map(|f| f.id.as_str()).collect()
    }
}

/// A camera framing: centre plus zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTarget {
    pub center: [f64; 2],
    pub zoom: f64,
}
