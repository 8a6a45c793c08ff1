//! Lineage tracking of one channel track with local error correction.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TrackError};
use crate::integration::Segmenter;
use crate::tracker::correction::Corrector;
use crate::tracker::output::{TrackedFrame, TrackedRegion};
use crate::tracker::population::{FrameInput, FrameRange, Population};
use crate::tracker::track_attribute::TrackAttribute;

/// Configuration for the LineageTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Lower bound of `size(t) / size(t-1)` for an error-free link
    pub min_growth_rate: f64,
    /// Upper bound of `size(t) / size(t-1)` for an error-free link
    pub max_growth_rate: f64,
    /// Largest cost of a single correction
    pub cost_limit: f64,
    /// Largest summed cost of a correction chain
    pub cumulative_cost_limit: f64,
    /// Correction passes over the channel track
    pub loop_limit: usize,
    /// Longest correction chain, in frames
    pub max_correction_length: usize,
    /// Growth ratios kept when estimating a lineage's expected growth
    pub size_increment_frame_number: usize,
    /// Score gain needed to widen an assignment, and truncation threshold
    pub si_increase_thld: f64,
    /// Deviation from the expected growth flagged as an error
    pub significative_si_error_thld: f64,
    /// Largest size of a leading fragment repaired as a beheaded cell
    pub beheaded_size_limit: f64,
    /// Objects smaller than this merge at no cost
    pub fusion_size_threshold: f64,
    /// Run the correction sweep
    pub correct: bool,
    /// Run the beheaded cell repair before the sweep
    pub correct_beheaded: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_growth_rate: 0.8,
            max_growth_rate: 1.5,
            cost_limit: 1.5,
            cumulative_cost_limit: 5.0,
            loop_limit: 3,
            max_correction_length: 500,
            size_increment_frame_number: 7,
            si_increase_thld: 0.1,
            significative_si_error_thld: 0.3,
            beheaded_size_limit: 300.0,
            fusion_size_threshold: 5.0,
            correct: true,
            correct_beheaded: true,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TrackError::InvalidConfig(msg));
        if !(self.min_growth_rate > 0.0) || !(self.max_growth_rate > 0.0) {
            return invalid(format!(
                "growth rates must be positive, got [{}, {}]",
                self.min_growth_rate, self.max_growth_rate
            ));
        }
        if self.min_growth_rate > self.max_growth_rate {
            return invalid(format!(
                "min_growth_rate {} exceeds max_growth_rate {}",
                self.min_growth_rate, self.max_growth_rate
            ));
        }
        if !(self.cost_limit >= 0.0) || !(self.cumulative_cost_limit >= 0.0) {
            return invalid("cost limits must be non-negative".to_string());
        }
        if self.loop_limit == 0 || self.size_increment_frame_number == 0 {
            return invalid(
                "loop_limit and size_increment_frame_number must be at least 1".to_string(),
            );
        }
        Ok(())
    }
}

/// Last completed step of a tracking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    InitialAssignment,
    BeheadedCellRepair,
    IndexSweepCorrection,
    FinalAssignment,
    Commit,
}

/// Tracker for one channel track.
///
/// Owns every object and attribute of the track for the duration of the
/// run. The steps can be called one by one, or chained with [`run`].
///
/// [`run`]: LineageTracker::run
pub struct LineageTracker<'a, S: Segmenter> {
    segmenter: &'a S,
    config: TrackerConfig,
    population: Population<S::Image>,
    range: Option<FrameRange>,
    stage: Stage,
}

impl<'a, S: Segmenter> LineageTracker<'a, S> {
    /// `segment` re-segments every frame instead of using its existing objects.
    pub fn new(
        segmenter: &'a S,
        config: TrackerConfig,
        frames: Vec<FrameInput<S::Image>>,
        segment: bool,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter,
            config,
            population: Population::new(frames, segment),
            range: None,
            stage: Stage::Init,
        })
    }

    /// Produce the objects of every frame. Fails on the first segmentation error.
    pub fn load(&mut self) -> Result<()> {
        for frame in 0..self.population.frame_count() {
            self.population.load(frame, self.segmenter)?;
        }
        Ok(())
    }

    /// Link every pair of consecutive frames without correction.
    ///
    /// The usable range starts at the first frame with objects and ends
    /// before the next frame without any. Returns the error count.
    pub fn initial_assignment(&mut self) -> Result<usize> {
        self.load()?;
        let count = self.population.frame_count();
        let occupied = |f: usize| !self.population.regions(f).is_empty();
        self.range = (0..count).find(|&f| occupied(f)).map(|min| {
            let max = (min..count)
                .take_while(|&f| occupied(f))
                .last()
                .unwrap_or(min);
            FrameRange::new(min, max)
        });
        let truncated = self.range.filter(|r| r.min > 0 || r.max + 1 < count);
        if let Some(range) = truncated {
            warn!(
                min = range.min,
                max = range.max,
                frames = count,
                "usable frame range truncated at empty frames"
            );
        }

        let errors = self.assign_range();
        self.stage = Stage::InitialAssignment;
        info!(errors, range = ?self.range, "initial assignment");
        Ok(errors)
    }

    /// Merge leading fragments left by imaging artifacts. Returns the runs merged.
    pub fn repair_beheaded(&mut self) -> usize {
        let repaired = match self.range {
            Some(range) if self.config.correct_beheaded => {
                Corrector::new(self.segmenter, &self.config, &mut self.population, range)
                    .repair_beheaded()
            }
            _ => 0,
        };
        self.stage = Stage::BeheadedCellRepair;
        info!(repaired, errors = self.error_count(), "beheaded cell repair");
        repaired
    }

    /// Correction sweep over object indices. Returns the accepted corrections.
    pub fn correct(&mut self) -> usize {
        let corrected = match self.range {
            Some(range) if self.config.correct => {
                Corrector::new(self.segmenter, &self.config, &mut self.population, range).sweep()
            }
            _ => 0,
        };
        self.stage = Stage::IndexSweepCorrection;
        info!(corrected, errors = self.error_count(), "correction sweep");
        corrected
    }

    /// Relink the whole range so every residual error is flagged. Frames
    /// outside the range are left unlinked. Returns the error count.
    pub fn final_assignment(&mut self) -> usize {
        let errors = self.assign_range();
        for frame in 0..self.population.frame_count() {
            if self.range.is_none_or(|r| !r.contains(frame)) {
                self.population.clear_frame(frame);
            }
        }
        self.stage = Stage::FinalAssignment;
        info!(errors, "final assignment");
        errors
    }

    /// Results of every frame, with final links and error flags.
    pub fn commit(&mut self) -> Vec<TrackedFrame> {
        let population = &self.population;
        let frames: Vec<TrackedFrame> = (0..population.frame_count())
            .map(|frame| {
                let attrs = population.attributes().frame(frame);
                let regions = population
                    .regions(frame)
                    .iter()
                    .enumerate()
                    .map(|(i, region)| match attrs.get(i) {
                        Some(attr) => TrackedRegion::new(region.clone(), attr),
                        None => TrackedRegion::new(
                            region.clone(),
                            &TrackAttribute::new(frame, i, region),
                        ),
                    })
                    .collect();
                TrackedFrame { frame, regions }
            })
            .collect();
        self.stage = Stage::Commit;
        info!(frames = frames.len(), "results committed");
        frames
    }

    /// All steps, from loading to commit. The tracker's state is dropped.
    pub fn run(mut self) -> Result<Vec<TrackedFrame>> {
        self.initial_assignment()?;
        self.repair_beheaded();
        self.correct();
        self.final_assignment();
        Ok(self.commit())
    }

    /// Errors over the usable range on the current state.
    pub fn error_count(&self) -> usize {
        self.range.map_or(0, |r| {
            self.population.count_errors(r.frames(), &self.config)
        })
    }

    pub fn population(&self) -> &Population<S::Image> {
        &self.population
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Usable frame range, known after the initial assignment.
    pub fn range(&self) -> Option<FrameRange> {
        self.range
    }

    fn assign_range(&mut self) -> usize {
        let Some(range) = self.range else {
            return 0;
        };
        (range.min + 1..=range.max)
            .map(|t| self.population.assign_transition(t, &self.config))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::test_utils::{HalvingSegmenter, regions};

    const SEGMENTER: HalvingSegmenter = HalvingSegmenter {
        split_cost: 0.1,
        merge_cost: 0.2,
    };

    fn frames(sizes: &[&[f64]]) -> Vec<FrameInput<()>> {
        sizes
            .iter()
            .map(|s| FrameInput::with_regions((), regions(s)))
            .collect()
    }

    #[test]
    fn test_validate() {
        assert!(TrackerConfig::default().validate().is_ok());
        let config = TrackerConfig {
            min_growth_rate: 1.6,
            ..TrackerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig(_))));
        let config = TrackerConfig {
            max_growth_rate: f64::NAN,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
        let config = TrackerConfig {
            loop_limit: 0,
            ..TrackerConfig::default()
        };
        assert!(LineageTracker::new(&SEGMENTER, config, Vec::new(), false).is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"min_growth_rate": 0.85, "cost_limit": 1.0}"#).unwrap();
        assert_eq!(config.min_growth_rate, 0.85);
        assert_eq!(config.cost_limit, 1.0);
        assert_eq!(config.loop_limit, 3);
    }

    #[test]
    fn test_range_stops_at_empty_frames() {
        let frames = frames(&[&[], &[100.0], &[110.0], &[], &[130.0]]);
        let mut tracker = LineageTracker::new(&SEGMENTER, TrackerConfig::default(), frames, false)
            .unwrap();
        assert_eq!(tracker.initial_assignment().unwrap(), 0);
        assert_eq!(tracker.range(), Some(FrameRange::new(1, 2)));
        assert_eq!(tracker.stage(), Stage::InitialAssignment);

        tracker.final_assignment();
        let output = tracker.commit();
        assert_eq!(tracker.stage(), Stage::Commit);
        assert_eq!(output.len(), 5);
        assert_eq!(output[2].regions[0].prev, Some(0));
        // the object after the gap is not linked
        assert_eq!(output[4].regions[0].prev, None);
        assert!(output[4].regions[0].track_head);
    }

    #[test]
    fn test_empty_track() {
        let frames = frames(&[&[], &[]]);
        let tracker = LineageTracker::new(&SEGMENTER, TrackerConfig::default(), frames, false)
            .unwrap();
        let output = tracker.run().unwrap();
        assert!(output.iter().all(|f| f.regions.is_empty()));
    }

    #[test]
    fn test_correction_can_be_disabled() {
        let config = TrackerConfig {
            min_growth_rate: 0.85,
            correct: false,
            ..TrackerConfig::default()
        };
        let frames = frames(&[&[10.0, 11.0], &[30.8]]);
        let mut tracker = LineageTracker::new(&SEGMENTER, config, frames, false).unwrap();
        assert_eq!(tracker.initial_assignment().unwrap(), 1);
        assert_eq!(tracker.correct(), 0);
        assert_eq!(tracker.final_assignment(), 1);
        let output = tracker.commit();
        assert!(output[1].regions[0].error_prev);
        assert!(output[0].regions[0].error_cur);
    }
}
