//! Shared fixtures for unit tests.

use crate::integration::Segmenter;
use crate::tracker::population::{FrameInput, Population};
use crate::tracker::region::Region;
use crate::tracker::span::Span;

/// Segmenter cutting every region in two halves at a fixed cost.
pub(crate) struct HalvingSegmenter {
    pub split_cost: f64,
    pub merge_cost: f64,
}

impl Segmenter for HalvingSegmenter {
    type Image = ();
    type Error = std::convert::Infallible;

    fn segment(&self, _image: &(), _frame: usize) -> Result<Vec<Region>, Self::Error> {
        Ok(Vec::new())
    }

    fn split(&self, _image: &(), region: &Region) -> (f64, Vec<Region>) {
        let (a, b) = region.span.split_at(region.span.center());
        let half = region.pixels.len() / 2;
        let fragments = vec![
            Region::new(a, region.size / 2.0).with_pixels(region.pixels[..half].to_vec()),
            Region::new(b, region.size / 2.0).with_pixels(region.pixels[half..].to_vec()),
        ];
        (self.split_cost, fragments)
    }

    fn merge_cost(&self, _image: &(), _regions: &[Region]) -> f64 {
        self.merge_cost
    }
}

/// Regions laid end to end along the channel with the given sizes.
pub(crate) fn regions(sizes: &[f64]) -> Vec<Region> {
    let mut position = 0.0;
    sizes
        .iter()
        .map(|&size| {
            let region = Region::new(Span::new(position, position + size), size);
            position += size + 1.0;
            region
        })
        .collect()
}

pub(crate) fn population(frames: &[&[f64]]) -> Population<()> {
    Population::preloaded(
        frames
            .iter()
            .map(|sizes| FrameInput::with_regions((), regions(sizes)))
            .collect(),
    )
}
