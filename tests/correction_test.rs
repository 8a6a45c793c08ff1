mod common;

use approx::assert_relative_eq;
use channel_lineage::{LineageTracker, TrackerConfig};
use common::{MockSegmenter, channel, frame_sizes};

#[test]
fn test_merge_fixes_over_segmented_pair() {
    let segmenter = MockSegmenter::new(f64::INFINITY, 0.2);
    let config = TrackerConfig {
        min_growth_rate: 0.85,
        max_growth_rate: 1.5,
        ..TrackerConfig::default()
    };
    let mut tracker =
        LineageTracker::new(&segmenter, config, channel(&[&[10.0, 11.0], &[30.8]]), true).unwrap();

    assert_eq!(tracker.initial_assignment().unwrap(), 1);
    assert_eq!(tracker.correct(), 1);
    assert_eq!(tracker.final_assignment(), 0);
    let output = tracker.commit();

    assert_eq!(frame_sizes(&output[0]), vec![21.0]);
    let merged = &output[1].regions[0];
    assert_eq!(merged.prev, Some(0));
    assert!(!merged.error_prev);
    assert!(!merged.size_increment_error);
    assert_relative_eq!(merged.size_increment.unwrap(), 30.8 / 21.0, epsilon = 1e-12);
}

#[test]
fn test_cheaper_split_wins_over_merge() {
    let segmenter = MockSegmenter::new(0.1, 0.3);
    let frames = channel(&[&[1000.0, 1000.0], &[2100.0], &[1150.0, 1150.0]]);
    let output = LineageTracker::new(&segmenter, TrackerConfig::default(), frames, true)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(frame_sizes(&output[0]), vec![1000.0, 1000.0]);
    assert_eq!(frame_sizes(&output[1]), vec![1050.0, 1050.0]);
    assert_eq!(output[1].regions[1].prev, Some(1));
    assert!(output.iter().flat_map(|f| &f.regions).all(|r| !r.has_error()));
}

#[test]
fn test_beheaded_cell_is_merged() {
    let segmenter = MockSegmenter::new(f64::INFINITY, 1.0);
    let frames = channel(&[&[30.0, 40.0], &[4.0, 29.0, 44.0], &[4.4, 31.9, 48.4]]);
    let mut tracker =
        LineageTracker::new(&segmenter, TrackerConfig::default(), frames, true).unwrap();
    tracker.initial_assignment().unwrap();
    assert_eq!(tracker.repair_beheaded(), 1);
    tracker.correct();
    assert_eq!(tracker.final_assignment(), 0);
    let output = tracker.commit();

    assert_eq!(frame_sizes(&output[1]), vec![33.0, 44.0]);
    assert_eq!(output[2].regions.len(), 2);
    assert_relative_eq!(output[2].regions[0].region.size, 36.3, epsilon = 1e-9);
    assert!(!output[0].regions[0].division);
}

#[test]
fn test_beheaded_repair_can_be_disabled() {
    let segmenter = MockSegmenter::new(f64::INFINITY, 1.0);
    let config = TrackerConfig {
        correct_beheaded: false,
        ..TrackerConfig::default()
    };
    let frames = channel(&[&[30.0, 40.0], &[4.0, 29.0, 44.0]]);
    let output = LineageTracker::new(&segmenter, config, frames, true)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(output[1].regions.len(), 3);
    assert!(output[0].regions[0].division);
}

#[test]
fn test_small_leading_daughter_keeps_its_division() {
    let segmenter = MockSegmenter::new(f64::INFINITY, 0.5);
    let frames = channel(&[&[100.0], &[110.0], &[45.0, 60.0], &[49.5, 66.0], &[54.5, 72.6]]);
    let output = LineageTracker::new(&segmenter, TrackerConfig::default(), frames, true)
        .unwrap()
        .run()
        .unwrap();

    assert!(output[1].regions[0].division);
    assert_eq!(frame_sizes(&output[2]), vec![45.0, 60.0]);
    assert_eq!(output[2].children_of(0).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(frame_sizes(&output[4]), vec![54.5, 72.6]);
    assert!(output.iter().flat_map(|f| &f.regions).all(|r| !r.has_error()));
}

#[test]
fn test_rearrangement_over_two_frames() {
    let segmenter = MockSegmenter::new(0.1, 0.5);
    let frames = channel(&[&[220.0, 100.0], &[60.0, 30.0, 60.0, 240.0]]);
    let mut tracker =
        LineageTracker::new(&segmenter, TrackerConfig::default(), frames, true).unwrap();

    assert_eq!(tracker.initial_assignment().unwrap(), 2);
    assert_eq!(tracker.repair_beheaded(), 0);
    assert_eq!(tracker.correct(), 2);
    assert_eq!(tracker.final_assignment(), 0);
    let output = tracker.commit();

    assert_eq!(frame_sizes(&output[0]), vec![110.0, 110.0, 100.0]);
    assert_eq!(frame_sizes(&output[1]), vec![60.0, 90.0, 120.0, 120.0]);
    assert!(output[0].regions[0].division);
    assert_eq!(output[1].regions[3].prev, Some(2));
}

#[test]
fn test_second_sweep_is_a_fixed_point() {
    let segmenter = MockSegmenter::new(0.1, 0.3);
    let frames = channel(&[
        &[1000.0, 1000.0],
        &[2100.0],
        &[1150.0, 1150.0],
        &[1250.0, 1250.0],
        &[3000.0],
    ]);
    let mut tracker =
        LineageTracker::new(&segmenter, TrackerConfig::default(), frames, true).unwrap();
    tracker.initial_assignment().unwrap();
    tracker.repair_beheaded();
    let first = tracker.correct();
    assert!(first > 0);
    let errors = tracker.error_count();

    assert_eq!(tracker.correct(), 0);
    assert_eq!(tracker.error_count(), errors);
}

#[test]
fn test_unfixable_error_stays_flagged() {
    // merging costs more than the per-link limit and splitting is impossible
    let segmenter = MockSegmenter::new(f64::INFINITY, 2.0);
    let frames = channel(&[&[1000.0, 1000.0], &[2100.0]]);
    let output = LineageTracker::new(&segmenter, TrackerConfig::default(), frames, true)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(output[0].regions.len(), 2);
    assert!(output[1].regions[0].error_prev);
    assert!(output[0].regions[0].error_cur);
    assert!(output[0].regions[1].error_cur);
}

#[test]
fn test_equal_errors_need_zero_cost() {
    // splitting the oversized object does not remove the growth error
    let frames = [&[100.0][..], &[300.0][..]];

    let segmenter = MockSegmenter::new(0.1, 0.5);
    let output = LineageTracker::new(&segmenter, TrackerConfig::default(), channel(&frames), true)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(frame_sizes(&output[1]), vec![300.0]);

    let segmenter = MockSegmenter::new(0.0, 0.5);
    let output = LineageTracker::new(&segmenter, TrackerConfig::default(), channel(&frames), true)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(frame_sizes(&output[1]), vec![150.0, 150.0]);
    assert!(output[1].regions[0].error_prev);
}
