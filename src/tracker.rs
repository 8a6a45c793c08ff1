mod assigner;
mod correction;
mod lineage_tracker;
mod matching;
mod output;
mod population;
mod region;
mod scenario;
mod snapshot;
mod span;
mod track_attribute;
mod track_state;

#[cfg(test)]
mod test_utils;

pub use assigner::{Assignment, TrackAssigner, TransitionAssignments};
pub use correction::{Corrector, merge_windows};
pub use lineage_tracker::{LineageTracker, Stage, TrackerConfig};
pub use matching::Score;
pub use output::{TrackedFrame, TrackedRegion};
pub use population::{FrameInput, FrameRange, Population};
pub use region::{Region, sort_by_position};
pub use scenario::{Scenario, ScenarioChain, Side};
pub use snapshot::Snapshot;
pub use span::Span;
pub use track_attribute::{AttrRef, AttributeStore, TrackAttribute};
pub use track_state::AssignmentKind;
