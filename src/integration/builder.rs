//! Builder for creating Region objects from segmentation outputs.

use crate::tracker::{Region, Span};

/// Builder for creating `Region` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct RegionBuilder {
    start: f64,
    end: f64,
    size: Option<f64>,
    pixels: Vec<u32>,
    contact: f64,
}

impl RegionBuilder {
    /// Create a new region builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the extent along the channel axis from its two bounds.
    pub fn bounds(mut self, start: f64, end: f64) -> Self {
        self.start = start.min(end);
        self.end = start.max(end);
        self
    }

    /// Set the extent along the channel axis from its center and length.
    pub fn center(mut self, center: f64, length: f64) -> Self {
        let span = Span::from_center(center, length);
        self.start = span.start;
        self.end = span.end;
        self
    }

    /// Set the size used for growth checks. Defaults to the extent's length.
    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the owned pixels, as linear indices into the channel image.
    pub fn pixels(mut self, pixels: impl IntoIterator<Item = u32>) -> Self {
        self.pixels = pixels.into_iter().collect();
        self
    }

    /// Set the fraction of the boundary touching the channel's closed end.
    pub fn contact(mut self, contact: f64) -> Self {
        self.contact = contact.clamp(0.0, 1.0);
        self
    }

    /// Build the final `Region`.
    pub fn build(self) -> Region {
        let span = Span::new(self.start, self.end);
        let size = self.size.unwrap_or_else(|| span.length());
        let mut pixels = self.pixels;
        pixels.sort_unstable();
        pixels.dedup();
        Region::new(span, size)
            .with_pixels(pixels)
            .with_contact(self.contact)
    }
}
