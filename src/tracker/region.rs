//! Objects detected in one frame of a channel track.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::tracker::span::Span;

/// A detected object (typically one cell) in a single frame.
///
/// Regions are never edited in place by the tracker: merging and splitting
/// always produce brand-new regions that replace the old ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    /// Extent along the channel axis
    pub span: Span,
    /// Shape-derived scalar used for growth checks (e.g. maximal caliper length)
    pub size: f64,
    /// Pixel ownership, opaque to the tracker and interpreted by the segmenter
    pub pixels: Vec<u32>,
    /// Fraction of the boundary touching the closed end of the channel
    pub end_of_channel_contact: f64,
}

impl Region {
    pub fn new(span: Span, size: f64) -> Self {
        Self {
            span,
            size,
            pixels: Vec::new(),
            end_of_channel_contact: 0.0,
        }
    }

    pub fn with_pixels(mut self, pixels: Vec<u32>) -> Self {
        self.pixels = pixels;
        self
    }

    pub fn with_contact(mut self, contact: f64) -> Self {
        self.end_of_channel_contact = contact;
        self
    }

    /// Union of several regions: covering span, summed size, joined pixels.
    ///
    /// Returns `None` for an empty slice.
    pub fn union(regions: &[Region]) -> Option<Region> {
        let (first, rest) = regions.split_first()?;
        let mut merged = first.clone();
        for r in rest {
            merged.span = merged.span.union(&r.span);
            merged.size += r.size;
            merged.pixels.extend_from_slice(&r.pixels);
            merged.end_of_channel_contact =
                merged.end_of_channel_contact.max(r.end_of_channel_contact);
        }
        merged.pixels.sort_unstable();
        merged.pixels.dedup();
        Some(merged)
    }

    /// Ordering along the channel axis, from the closed end.
    pub fn cmp_position(&self, other: &Region) -> Ordering {
        self.span.center().total_cmp(&other.span.center())
    }
}

/// Sort regions along the channel axis.
pub fn sort_by_position(regions: &mut [Region]) {
    regions.sort_by(Region::cmp_position);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_sums_sizes() {
        let a = Region::new(Span::new(0.0, 10.0), 10.0).with_pixels(vec![1, 2]);
        let b = Region::new(Span::new(10.0, 21.0), 11.0)
            .with_pixels(vec![3])
            .with_contact(0.2);
        let merged = Region::union(&[a, b]).unwrap();
        assert_eq!(merged.span, Span::new(0.0, 21.0));
        assert_eq!(merged.size, 21.0);
        assert_eq!(merged.pixels, vec![1, 2, 3]);
        assert_eq!(merged.end_of_channel_contact, 0.2);
    }

    #[test]
    fn test_union_of_nothing() {
        assert!(Region::union(&[]).is_none());
    }

    #[test]
    fn test_sort_by_position() {
        let mut regions = vec![
            Region::new(Span::new(20.0, 30.0), 10.0),
            Region::new(Span::new(0.0, 10.0), 10.0),
        ];
        sort_by_position(&mut regions);
        assert_eq!(regions[0].span.start, 0.0);
    }
}
