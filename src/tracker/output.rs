//! Tracking results handed back to the caller.

use serde::{Deserialize, Serialize};

use crate::tracker::region::Region;
use crate::tracker::track_attribute::TrackAttribute;

/// Final objects of one frame, in channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFrame {
    pub frame: usize,
    pub regions: Vec<TrackedRegion>,
}

/// One object with its links and error annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRegion {
    pub region: Region,
    /// Index of the linked object in the previous frame
    pub prev: Option<usize>,
    /// Index of the linked object in the next frame (first daughter on division)
    pub next: Option<usize>,
    pub track_head: bool,
    pub division: bool,
    pub error_prev: bool,
    pub error_cur: bool,
    pub size_increment: Option<f64>,
    pub size_increment_error: bool,
    pub truncated_division: bool,
    pub end_of_channel_contact: f64,
}

impl TrackedRegion {
    pub fn new(region: Region, attr: &TrackAttribute) -> Self {
        Self {
            region,
            prev: attr.prev.map(|p| p.index),
            next: attr.next.map(|n| n.index),
            track_head: attr.track_head,
            division: attr.division,
            error_prev: attr.error_prev,
            error_cur: attr.error_cur,
            size_increment: attr.size_increment,
            size_increment_error: attr.size_increment_error,
            truncated_division: attr.truncated_division,
            end_of_channel_contact: attr.end_of_channel_contact,
        }
    }

    /// Link into this object is flagged for review.
    pub fn has_error(&self) -> bool {
        self.error_prev || self.size_increment_error
    }
}

impl TrackedFrame {
    /// Indices of the objects of this frame whose parent is `parent`.
    pub fn children_of(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.prev == Some(parent))
            .map(|(i, _)| i)
    }
}
