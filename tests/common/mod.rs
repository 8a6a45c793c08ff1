#![allow(dead_code)]

use channel_lineage::tracker::FrameInput;
use channel_lineage::{Region, Segmenter, Span};

#[derive(Debug, thiserror::Error)]
#[error("negative object size in frame {0}")]
pub struct NegativeSize(pub usize);

/// Segmenter reading object sizes from the image and splitting in halves.
pub struct MockSegmenter {
    pub split_cost: f64,
    pub merge_cost: f64,
}

impl MockSegmenter {
    pub fn new(split_cost: f64, merge_cost: f64) -> Self {
        Self {
            split_cost,
            merge_cost,
        }
    }
}

impl Segmenter for MockSegmenter {
    type Image = Vec<f64>;
    type Error = NegativeSize;

    fn segment(&self, image: &Vec<f64>, frame: usize) -> Result<Vec<Region>, NegativeSize> {
        if image.iter().any(|&s| s < 0.0) {
            return Err(NegativeSize(frame));
        }
        Ok(regions(image))
    }

    fn split(&self, _image: &Vec<f64>, region: &Region) -> (f64, Vec<Region>) {
        let (a, b) = region.span.split_at(region.span.center());
        (
            self.split_cost,
            vec![
                Region::new(a, region.size / 2.0),
                Region::new(b, region.size / 2.0),
            ],
        )
    }

    fn merge_cost(&self, _image: &Vec<f64>, _regions: &[Region]) -> f64 {
        self.merge_cost
    }
}

/// Regions laid end to end along the channel with the given sizes.
pub fn regions(sizes: &[f64]) -> Vec<Region> {
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

/// Frames to be segmented from their size lists.
pub fn channel(sizes: &[&[f64]]) -> Vec<FrameInput<Vec<f64>>> {
    sizes.iter().map(|s| FrameInput::new(s.to_vec())).collect()
}

pub fn frame_sizes(frame: &channel_lineage::TrackedFrame) -> Vec<f64> {
    frame.regions.iter().map(|r| r.region.size).collect()
}
