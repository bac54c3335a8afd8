//! Static entity → track assignment.
//!
//! Tracks only separate lanes visually; the position model never looks at
//! them.

use crate::railview_model::EntityId;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackError {
    #[error("Corridor needs at least one track")]
    NoTracks,

    #[error("Track {track} of {id} outside 0..{track_count}")]
    OutOfRange { id: EntityId, track: u8, track_count: u8 },
}

/// Which lane of the corridor each entity is drawn on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackAssignment {
    track_count: u8,
    tracks: BTreeMap<EntityId, u8>,
}

impl TrackAssignment {
    /// Creates an assignment for a corridor with `track_count` lanes.
    pub fn new(track_count: u8) -> Result<Self, TrackError> {
        if track_count == 0 {
            return Err(TrackError::NoTracks);
        }
        Ok(Self {
            track_count,
            tracks: BTreeMap::new(),
        })
    }

    /// Assigns `id` to `track`, replacing any earlier assignment.
    pub fn assign(&mut self, id: EntityId, track: u8) -> Result<(), TrackError> {
        if track >= self.track_count {
            return Err(TrackError::OutOfRange {
                id,
                track,
                track_count: self.track_count,
            });
        }
        self.tracks.insert(id, track);
        Ok(())
    }

    /// Track of `id`; unassigned entities run on track 0.
    pub fn track_of(&self, id: &str) -> u8 {
        self.tracks.get(id).copied().unwrap_or(0)
    }

    pub fn track_count(&self) -> u8 {
        self.track_count
    }

    /// Lateral offset of `track` with lanes centred on the route line.
    ///
    /// With three tracks and spacing `s` the offsets are `-s, 0, s`.
    pub fn lane_offset(&self, track: u8, spacing: f64) -> f64 {
        let centre = (self.track_count as f64 - 1.0) / 2.0;
        (track as f64 - centre) * spacing
    }
}
