//! Error types for lineage tracking.

use thiserror::Error;

/// Errors that abort the tracking of one channel track.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("segmentation failed at frame {frame}: {source}")]
    Segmentation {
        frame: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("frame {frame} out of range (track has {frames} frames)")]
    FrameOutOfRange { frame: usize, frames: usize },
}

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackError>;
