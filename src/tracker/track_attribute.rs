//! Per-object tracking metadata (links, error flags, size increment).

use serde::{Deserialize, Serialize};

use crate::tracker::region::Region;

/// Stable handle to an object: its frame and its rank within that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttrRef {
    pub frame: usize,
    pub index: usize,
}

impl AttrRef {
    #[inline]
    pub fn new(frame: usize, index: usize) -> Self {
        Self { frame, index }
    }
}

/// Tracking metadata of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAttribute {
    /// Frame of the object
    pub frame: usize,
    /// Rank of the object within its frame
    pub index: usize,
    /// Linked object in the previous frame
    pub prev: Option<AttrRef>,
    /// Continuation in the next frame (first daughter on division)
    pub next: Option<AttrRef>,
    /// The link from the previous frame is erroneous
    pub error_prev: bool,
    /// The link towards the next frame is erroneous
    pub error_cur: bool,
    /// Growth ratio of the assignment that produced this object
    pub size_increment: Option<f64>,
    /// Growth deviates significantly from the lineage's expected growth
    pub size_increment_error: bool,
    /// The object divides in the next frame
    pub division: bool,
    /// The object starts a new track
    pub track_head: bool,
    /// A division is suspected but one daughter left the visible channel
    pub truncated_division: bool,
    /// Fraction of the boundary touching the closed end of the channel
    pub end_of_channel_contact: f64,
}

impl TrackAttribute {
    pub fn new(frame: usize, index: usize, region: &Region) -> Self {
        Self {
            frame,
            index,
            prev: None,
            next: None,
            error_prev: false,
            error_cur: false,
            size_increment: None,
            size_increment_error: false,
            division: false,
            track_head: true,
            truncated_division: false,
            end_of_channel_contact: region.end_of_channel_contact,
        }
    }

    #[inline]
    pub fn handle(&self) -> AttrRef {
        AttrRef::new(self.frame, self.index)
    }

    /// Whether the link into this object needs correction.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.error_prev || self.size_increment_error
    }

    pub(crate) fn reset_prev_side(&mut self) {
        self.prev = None;
        self.error_prev = false;
        self.size_increment = None;
        self.size_increment_error = false;
        self.track_head = true;
    }

    pub(crate) fn reset_next_side(&mut self) {
        self.next = None;
        self.error_cur = false;
        self.division = false;
        self.truncated_division = false;
    }
}

/// Per-frame store of track attributes, created lazily for each frame.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    frames: Vec<Option<Vec<TrackAttribute>>>,
}

impl AttributeStore {
    pub fn with_frames(frame_count: usize) -> Self {
        Self {
            frames: vec![None; frame_count],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Attributes of a frame, empty if they were never created.
    pub fn frame(&self, frame: usize) -> &[TrackAttribute] {
        self.frames
            .get(frame)
            .and_then(|f| f.as_deref())
            .unwrap_or(&[])
    }

    pub fn get(&self, handle: AttrRef) -> Option<&TrackAttribute> {
        self.frame(handle.frame).get(handle.index)
    }

    pub fn get_mut(&mut self, handle: AttrRef) -> Option<&mut TrackAttribute> {
        self.frames
            .get_mut(handle.frame)?
            .as_mut()?
            .get_mut(handle.index)
    }

    /// Attributes of a frame, created from `regions` when missing or stale.
    pub fn ensure(&mut self, frame: usize, regions: &[Region]) -> &mut Vec<TrackAttribute> {
        let slot = &mut self.frames[frame];
        let stale = slot.as_ref().is_none_or(|attrs| attrs.len() != regions.len());
        if stale {
            *slot = Some(fresh(frame, regions));
        }
        slot.get_or_insert_with(Vec::new)
    }

    /// Drop all attributes of a frame after a structural edit and recreate them.
    pub fn rebuild(&mut self, frame: usize, regions: &[Region]) {
        self.frames[frame] = Some(fresh(frame, regions));
    }

    /// Restore `frame` and `index` of every attribute to its rank in the frame.
    pub fn reindex(&mut self, frame: usize) {
        if let Some(attrs) = self.frames[frame].as_mut() {
            for (i, attr) in attrs.iter_mut().enumerate() {
                attr.frame = frame;
                attr.index = i;
            }
        }
    }

    pub(crate) fn raw(&self, frame: usize) -> Option<Vec<TrackAttribute>> {
        self.frames[frame].clone()
    }

    pub(crate) fn set_raw(&mut self, frame: usize, attrs: Option<Vec<TrackAttribute>>) {
        self.frames[frame] = attrs;
    }
}

fn fresh(frame: usize, regions: &[Region]) -> Vec<TrackAttribute> {
    regions
        .iter()
        .enumerate()
        .map(|(i, r)| TrackAttribute::new(frame, i, r))
        .collect()
}
