//! Integration module for connecting segmentation backends with the lineage tracker.
//!
//! This module provides the traits the tracker consumes (segmentation and
//! image filtering) and a pipeline running whole channel tracks, one by one
//! or in parallel.

mod builder;
mod pipeline;
mod segmenter;

pub use builder::RegionBuilder;
pub use pipeline::{ChannelOutcome, ChannelTrack, LineagePipeline};
pub use segmenter::{ImageFilter, PassThrough, Segmenter};
