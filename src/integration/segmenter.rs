//! Traits for the segmentation and image filtering backends.

use crate::tracker::Region;

/// Segmentation backend used by the tracker.
///
/// Implement this trait to connect any segmentation method to the lineage
/// tracker. Costs are confidence penalties: lower is better, and infinity or
/// NaN means the operation is not supported by the evidence.
///
/// # Example
///
/// ```ignore
/// use channel_lineage::{Region, Segmenter};
///
/// struct ThresholdSegmenter {
///     // Your parameters here
/// }
///
/// impl Segmenter for ThresholdSegmenter {
///     type Image = Vec<f32>;
///     type Error = std::io::Error;
///
///     fn segment(&self, image: &Vec<f32>, frame: usize) -> Result<Vec<Region>, Self::Error> {
///         Ok(vec![])
///     }
///
///     fn split(&self, image: &Vec<f32>, region: &Region) -> (f64, Vec<Region>) {
///         (f64::INFINITY, vec![])
///     }
///
///     fn merge_cost(&self, image: &Vec<f32>, regions: &[Region]) -> f64 {
///         f64::INFINITY
///     }
/// }
/// ```
pub trait Segmenter {
    /// Image type the backend works on, after filtering.
    type Image;

    /// Error type for segmentation failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Detect the objects of one frame. A failure aborts the channel track.
    fn segment(&self, image: &Self::Image, frame: usize) -> Result<Vec<Region>, Self::Error>;

    /// Split one object, returning the cost and the fragments.
    fn split(&self, image: &Self::Image, region: &Region) -> (f64, Vec<Region>);

    /// Cost of merging contiguous objects into one.
    fn merge_cost(&self, image: &Self::Image, regions: &[Region]) -> f64;

    /// Object resulting from merging `regions`; the union by default.
    fn merge(&self, _image: &Self::Image, regions: &[Region]) -> Option<Region> {
        Region::union(regions)
    }
}

/// Transformation applied to each raw image before segmentation.
pub trait ImageFilter<R> {
    type Output;

    fn filter(&self, raw: &R, frame: usize) -> Self::Output;
}

/// Identity filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<R: Clone> ImageFilter<R> for PassThrough {
    type Output = R;

    fn filter(&self, raw: &R, _frame: usize) -> R {
        raw.clone()
    }
}
