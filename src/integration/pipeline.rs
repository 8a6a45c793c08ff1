//! LineagePipeline for combining segmentation with lineage tracking.

use rayon::prelude::*;
use tracing::{info_span, warn};

use crate::error::Result;
use crate::tracker::{FrameInput, LineageTracker, TrackedFrame, TrackerConfig};

use super::{ImageFilter, PassThrough, Segmenter};

/// Raw frames of one channel, in time order.
#[derive(Debug, Clone)]
pub struct ChannelTrack<R> {
    /// Identifier reported back with the outcome
    pub id: String,
    pub frames: Vec<FrameInput<R>>,
}

impl<R> ChannelTrack<R> {
    pub fn new(id: impl Into<String>, frames: Vec<FrameInput<R>>) -> Self {
        Self {
            id: id.into(),
            frames,
        }
    }
}

/// Result of one channel track in a batch.
#[derive(Debug)]
pub struct ChannelOutcome {
    pub id: String,
    pub result: Result<Vec<TrackedFrame>>,
}

/// A combined tracker that bundles segmentation with lineage tracking.
///
/// Each channel track is filtered, segmented and tracked on its own; state
/// is never shared between tracks, so batches run in parallel.
pub struct LineagePipeline<S: Segmenter, F = PassThrough> {
    segmenter: S,
    filter: F,
    config: TrackerConfig,
    segment: bool,
}

impl<S: Segmenter> LineagePipeline<S, PassThrough> {
    /// Create a new pipeline with the given segmenter and tracker config.
    pub fn new(segmenter: S, config: TrackerConfig) -> Self {
        Self::with_filter(segmenter, PassThrough, config)
    }

    /// Create a new pipeline with default tracker configuration.
    pub fn with_default_config(segmenter: S) -> Self {
        Self::new(segmenter, TrackerConfig::default())
    }
}

impl<S: Segmenter, F> LineagePipeline<S, F> {
    /// Create a new pipeline filtering every raw image before segmentation.
    pub fn with_filter(segmenter: S, filter: F, config: TrackerConfig) -> Self {
        Self {
            segmenter,
            filter,
            config,
            segment: true,
        }
    }

    /// Choose between re-segmenting frames and using their existing objects.
    pub fn segment(mut self, segment: bool) -> Self {
        self.segment = segment;
        self
    }

    /// Track one channel and return the objects of every frame with their links.
    ///
    /// Fails when the configuration is invalid or a frame cannot be segmented.
    pub fn process<R>(&self, track: ChannelTrack<R>) -> Result<Vec<TrackedFrame>>
    where
        F: ImageFilter<R, Output = S::Image>,
    {
        let frames = track
            .frames
            .into_iter()
            .enumerate()
            .map(|(frame, input)| FrameInput {
                image: self.filter.filter(&input.image, frame),
                regions: input.regions,
            })
            .collect();
        LineageTracker::new(&self.segmenter, self.config.clone(), frames, self.segment)?.run()
    }

    /// Track several channels in parallel.
    ///
    /// Returns one outcome per track, in input order. A failing track does
    /// not affect the others.
    pub fn process_all<R>(&self, tracks: Vec<ChannelTrack<R>>) -> Vec<ChannelOutcome>
    where
        R: Send,
        S: Sync,
        F: ImageFilter<R, Output = S::Image> + Sync,
    {
        tracks
            .into_par_iter()
            .map(|track| {
                let id = track.id.clone();
                let span = info_span!("channel", id = %id);
                let _guard = span.enter();
                let result = self.process(track);
                if let Err(error) = &result {
                    warn!(%error, "channel track failed");
                }
                ChannelOutcome { id, result }
            })
            .collect()
    }

    /// Get a reference to the underlying segmenter.
    pub fn segmenter(&self) -> &S {
        &self.segmenter
    }

    /// Get a reference to the image filter.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Get a reference to the tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
