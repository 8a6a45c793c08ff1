//! Lineage tracking of rod-shaped cells growing in closed microchannels.
//!
//! Objects detected in consecutive frames are linked into parent/child
//! lineages. Linkage errors are repaired locally by re-segmenting (splitting or
//! merging) objects near the error, keeping an edit only when it lowers the
//! number of errors in its time window.

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::{Result, TrackError};
pub use integration::{
    ChannelOutcome, ChannelTrack, ImageFilter, LineagePipeline, PassThrough, RegionBuilder,
    Segmenter,
};
pub use tracker::{
    FrameInput, LineageTracker, Region, Span, Stage, TrackAttribute, TrackedFrame, TrackedRegion,
    TrackerConfig,
};
