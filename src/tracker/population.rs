//! Per-frame objects of one channel track and their tracking attributes.

use std::ops::RangeInclusive;

use crate::error::{Result, TrackError};
use crate::integration::Segmenter;
use crate::tracker::assigner::{Assignment, TrackAssigner, TransitionAssignments};
use crate::tracker::lineage_tracker::TrackerConfig;
use crate::tracker::matching::median;
use crate::tracker::region::{Region, sort_by_position};
use crate::tracker::track_attribute::{AttrRef, AttributeStore, TrackAttribute};
use crate::tracker::track_state::AssignmentKind;

/// One frame of a channel track as handed to the tracker.
#[derive(Debug, Clone)]
pub struct FrameInput<I> {
    /// Image the segmenter works on
    pub image: I,
    /// Objects already detected in this frame, used when not re-segmenting
    pub regions: Option<Vec<Region>>,
}

impl<I> FrameInput<I> {
    pub fn new(image: I) -> Self {
        Self {
            image,
            regions: None,
        }
    }

    pub fn with_regions(image: I, regions: Vec<Region>) -> Self {
        Self {
            image,
            regions: Some(regions),
        }
    }
}

/// Closed interval of usable frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub min: usize,
    pub max: usize,
}

impl FrameRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, frame: usize) -> bool {
        frame >= self.min && frame <= self.max
    }

    /// Frames `first - 1 ..= last + 1`, clamped to the range.
    pub fn window_around(&self, first: usize, last: usize) -> RangeInclusive<usize> {
        first.saturating_sub(1).max(self.min)..=(last + 1).min(self.max)
    }

    pub fn frames(&self) -> RangeInclusive<usize> {
        self.min..=self.max
    }
}

/// Objects and attributes of every frame of one channel track.
///
/// Objects of a frame are produced once, by the segmenter or from the frame's
/// pre-existing objects, and memoized. Attributes are created lazily.
pub struct Population<I> {
    images: Vec<I>,
    existing: Vec<Option<Vec<Region>>>,
    regions: Vec<Option<Vec<Region>>>,
    attributes: AttributeStore,
    segment: bool,
}

impl<I> Population<I> {
    /// `segment` selects re-segmentation over the frames' existing objects.
    pub fn new(frames: Vec<FrameInput<I>>, segment: bool) -> Self {
        let count = frames.len();
        let (images, existing) = frames.into_iter().map(|f| (f.image, f.regions)).unzip();
        Self {
            images,
            existing,
            regions: vec![None; count],
            attributes: AttributeStore::with_frames(count),
            segment,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, frame: usize) -> &I {
        &self.images[frame]
    }

    /// Produce the objects of a frame once; later calls reuse them.
    pub fn load<S>(&mut self, frame: usize, segmenter: &S) -> Result<&[Region]>
    where
        S: Segmenter<Image = I>,
    {
        if frame >= self.frame_count() {
            return Err(TrackError::FrameOutOfRange {
                frame,
                frames: self.frame_count(),
            });
        }
        if self.regions[frame].is_none() {
            let mut regions = if self.segment {
                segmenter
                    .segment(&self.images[frame], frame)
                    .map_err(|e| TrackError::Segmentation {
                        frame,
                        source: Box::new(e),
                    })?
            } else {
                self.existing[frame].take().unwrap_or_default()
            };
            sort_by_position(&mut regions);
            self.regions[frame] = Some(regions);
        }
        Ok(self.regions(frame))
    }

    /// Objects of a frame, empty if the frame was never loaded.
    pub fn regions(&self, frame: usize) -> &[Region] {
        self.regions
            .get(frame)
            .and_then(|r| r.as_deref())
            .unwrap_or(&[])
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn attribute(&self, handle: AttrRef) -> Option<&TrackAttribute> {
        self.attributes.get(handle)
    }

    /// Replace the objects of a frame after a merge or a split.
    ///
    /// The frame's attributes are recreated and reindexed; links into the
    /// frame are stale until the adjacent transitions are reassigned.
    pub fn replace_regions(&mut self, frame: usize, mut regions: Vec<Region>) {
        sort_by_position(&mut regions);
        self.attributes.rebuild(frame, &regions);
        self.attributes.reindex(frame);
        self.regions[frame] = Some(regions);
    }

    pub fn sizes(&self, frame: usize) -> Vec<f64> {
        self.regions(frame).iter().map(|r| r.size).collect()
    }

    /// Expected growth of every object of `frame`: median of the last
    /// `size_increment_frame_number` error-free growth ratios of its lineage,
    /// clamped to the growth bounds.
    pub fn expected_increments(&self, frame: usize, config: &TrackerConfig) -> Vec<Option<f64>> {
        (0..self.regions(frame).len())
            .map(|index| {
                let mut history = Vec::with_capacity(config.size_increment_frame_number);
                let mut cursor = Some(AttrRef::new(frame, index));
                while let Some(handle) = cursor {
                    if history.len() >= config.size_increment_frame_number {
                        break;
                    }
                    let Some(attr) = self.attributes.get(handle) else {
                        break;
                    };
                    if !attr.error_prev && !attr.size_increment_error {
                        history.extend(attr.size_increment);
                    }
                    cursor = attr.prev.filter(|p| p.frame < handle.frame);
                }
                median(&history)
                    .map(|m| m.clamp(config.min_growth_rate, config.max_growth_rate))
            })
            .collect()
    }

    /// Assignments of the transition `t-1 -> t` on the current state.
    pub fn compute_assignments(&self, t: usize, config: &TrackerConfig) -> TransitionAssignments {
        let prev_sizes = self.sizes(t - 1);
        let next_sizes = self.sizes(t);
        let expected = self.expected_increments(t - 1, config);
        TrackAssigner::new(&prev_sizes, &next_sizes, &expected, config).assign_all()
    }

    pub fn transition_errors(&self, t: usize, config: &TrackerConfig) -> usize {
        self.compute_assignments(t, config).error_count(config)
    }

    /// Errors of every transition inside `window`.
    pub fn count_errors(&self, window: RangeInclusive<usize>, config: &TrackerConfig) -> usize {
        let (first, last) = (*window.start(), *window.end());
        (first + 1..=last)
            .map(|t| self.transition_errors(t, config))
            .sum()
    }

    /// Relink the transition `t-1 -> t` and return its error count.
    pub fn assign_transition(&mut self, t: usize, config: &TrackerConfig) -> usize {
        let result = self.compute_assignments(t, config);
        self.clear_transition(t);
        for a in &result.assignments {
            self.link(t, a, config);
        }
        for index in result.appeared.clone() {
            if let Some(attr) = self.attributes.get_mut(AttrRef::new(t, index)) {
                attr.track_head = true;
                attr.error_prev = true;
            }
        }
        result.error_count(config)
    }

    /// Reset the links of the transition `t-1 -> t` on both sides.
    pub fn clear_transition(&mut self, t: usize) {
        for frame in [t - 1, t] {
            let regions = self.regions[frame].as_deref().unwrap_or(&[]);
            let attrs = self.attributes.ensure(frame, regions);
            for attr in attrs.iter_mut() {
                if frame == t {
                    attr.reset_prev_side();
                } else {
                    attr.reset_next_side();
                }
            }
        }
    }

    /// Reset the links of a frame that lies outside the usable range.
    pub fn clear_frame(&mut self, frame: usize) {
        let regions = self.regions[frame].as_deref().unwrap_or(&[]);
        for attr in self.attributes.ensure(frame, regions).iter_mut() {
            attr.reset_prev_side();
            attr.reset_next_side();
        }
    }

    fn link(&mut self, t: usize, a: &Assignment, config: &TrackerConfig) {
        let error = a.error_count(config) > 0;
        let truncated = a.is_truncated(config);
        let si_error = a.size_increment_error(config);
        let kind = a.kind();
        let ratio = a.ratio();
        let first_prev = AttrRef::new(t - 1, a.prev.start);
        let first_next = AttrRef::new(t, a.next.start);

        for index in a.prev.clone() {
            if let Some(attr) = self.attributes.get_mut(AttrRef::new(t - 1, index)) {
                attr.next = Some(first_next);
                attr.error_cur = error;
                attr.division = kind == AssignmentKind::Division;
                attr.truncated_division = truncated;
            }
        }
        for (k, index) in a.next.clone().enumerate() {
            if let Some(attr) = self.attributes.get_mut(AttrRef::new(t, index)) {
                attr.prev = Some(first_prev);
                attr.error_prev = error;
                attr.size_increment = Some(ratio);
                attr.size_increment_error = si_error;
                attr.track_head = k > 0;
            }
        }
    }

    pub(crate) fn raw_regions(&self, frame: usize) -> Option<Vec<Region>> {
        self.regions[frame].clone()
    }

    pub(crate) fn set_raw_regions(&mut self, frame: usize, regions: Option<Vec<Region>>) {
        self.regions[frame] = regions;
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }
}

#[cfg(test)]
impl<I> Population<I> {
    /// Population whose frames are loaded from their existing objects.
    pub(crate) fn preloaded(frames: Vec<FrameInput<I>>) -> Self {
        let mut population = Self::new(frames, false);
        for frame in 0..population.frame_count() {
            let mut regions = population.existing[frame].take().unwrap_or_default();
            sort_by_position(&mut regions);
            population.regions[frame] = Some(regions);
        }
        population
    }
}
