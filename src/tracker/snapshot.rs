//! Save and restore of objects and attributes over a window of frames.

use std::ops::RangeInclusive;

use crate::tracker::population::Population;
use crate::tracker::region::Region;
use crate::tracker::track_attribute::TrackAttribute;

/// Value copy of the objects and attributes of a window of frames.
///
/// Attributes are also saved for the frame on each side of the window, so
/// links pointing into the window from outside are restored as well.
#[derive(Debug, Clone)]
pub struct Snapshot {
    window: RangeInclusive<usize>,
    regions: Vec<Option<Vec<Region>>>,
    attributes_from: usize,
    attributes: Vec<Option<Vec<TrackAttribute>>>,
}

impl Snapshot {
    pub fn capture<I>(population: &Population<I>, window: RangeInclusive<usize>) -> Self {
        let last_frame = population.frame_count().saturating_sub(1);
        let regions = window.clone().map(|f| population.raw_regions(f)).collect();
        let attributes_from = window.start().saturating_sub(1);
        let attributes_to = (*window.end() + 1).min(last_frame);
        let attributes = (attributes_from..=attributes_to)
            .map(|f| population.attributes().raw(f))
            .collect();
        Self {
            window,
            regions,
            attributes_from,
            attributes,
        }
    }

    pub fn window(&self) -> RangeInclusive<usize> {
        self.window.clone()
    }

    /// Put every saved object and attribute back, consuming the snapshot.
    pub fn restore<I>(self, population: &mut Population<I>) {
        for (frame, regions) in self.window.zip(self.regions) {
            population.set_raw_regions(frame, regions);
        }
        let store = population.attributes_mut();
        for (offset, attrs) in self.attributes.into_iter().enumerate() {
            store.set_raw(self.attributes_from + offset, attrs);
        }
    }
}
