//! Alternative segmentations of a few objects, with their cost.
//!
//! A scenario is built against the current state: its cost is asked from the
//! segmenter right away and is infinite when the edit is infeasible. Applying
//! it replaces the affected objects of one frame. A scenario may propagate to
//! the adjacent frame (merges backward, splits forward), forming a chain.

use std::ops::RangeInclusive;

use crate::integration::Segmenter;
use crate::tracker::lineage_tracker::TrackerConfig;
use crate::tracker::population::{FrameRange, Population};
use crate::tracker::region::{Region, sort_by_position};
use crate::tracker::track_attribute::AttrRef;

/// Neighbour receiving a fragment in a split-and-merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The object just before, towards the closed end
    Preceding,
    /// The object just after, towards the open end
    Following,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scenario {
    /// Collapse objects `first..=last` of a frame into one
    Merge {
        frame: usize,
        first: usize,
        last: usize,
        merged: Region,
        cost: f64,
    },
    /// Break one object into fragments
    Split {
        frame: usize,
        index: usize,
        fragments: Vec<Region>,
        cost: f64,
    },
    /// Split one object and fold the fragment next to `side` into that neighbour
    SplitAndMerge {
        frame: usize,
        index: usize,
        side: Side,
        fragments: Vec<Region>,
        merged: Region,
        cost: f64,
    },
    /// Combination of edits in frames `frame - 1` and `frame`
    Rearrange {
        frame: usize,
        edits: Vec<Scenario>,
        cost: f64,
    },
}

/// Segmenter cost, with NaN mapped to infinity.
fn checked(cost: f64) -> f64 {
    if cost.is_nan() { f64::INFINITY } else { cost }
}

/// Merging a group that contains a fragment below the fusion size is free.
fn merge_cost<S: Segmenter>(
    segmenter: &S,
    image: &S::Image,
    regions: &[Region],
    config: &TrackerConfig,
) -> f64 {
    if regions.iter().any(|r| r.size < config.fusion_size_threshold) {
        0.0
    } else {
        checked(segmenter.merge_cost(image, regions))
    }
}

impl Scenario {
    pub fn merge<S: Segmenter>(
        segmenter: &S,
        population: &Population<S::Image>,
        config: &TrackerConfig,
        frame: usize,
        first: usize,
        last: usize,
    ) -> Option<Self> {
        let regions = population.regions(frame);
        if first >= last || last >= regions.len() {
            return None;
        }
        let group = &regions[first..=last];
        let image = population.image(frame);
        let merged = segmenter.merge(image, group)?;
        Some(Scenario::Merge {
            frame,
            first,
            last,
            merged,
            cost: merge_cost(segmenter, image, group, config),
        })
    }

    pub fn split<S: Segmenter>(
        segmenter: &S,
        population: &Population<S::Image>,
        frame: usize,
        index: usize,
    ) -> Option<Self> {
        let region = population.regions(frame).get(index)?;
        let (cost, mut fragments) = segmenter.split(population.image(frame), region);
        sort_by_position(&mut fragments);
        let cost = if fragments.len() < 2 {
            f64::INFINITY
        } else {
            checked(cost)
        };
        Some(Scenario::Split {
            frame,
            index,
            fragments,
            cost,
        })
    }

    pub fn split_and_merge<S: Segmenter>(
        segmenter: &S,
        population: &Population<S::Image>,
        config: &TrackerConfig,
        frame: usize,
        index: usize,
        side: Side,
    ) -> Option<Self> {
        let regions = population.regions(frame);
        let neighbour = match side {
            Side::Preceding => index.checked_sub(1)?,
            Side::Following => index + 1,
        };
        let region = regions.get(index)?;
        let other = regions.get(neighbour)?;
        let image = population.image(frame);

        let (split_cost, mut fragments) = segmenter.split(image, region);
        if fragments.len() < 2 {
            return None;
        }
        sort_by_position(&mut fragments);
        let pair = match side {
            Side::Preceding => [other.clone(), fragments.remove(0)],
            Side::Following => [fragments.pop()?, other.clone()],
        };
        let merged = segmenter.merge(image, &pair)?;
        let cost = checked(split_cost) + merge_cost(segmenter, image, &pair, config);
        Some(Scenario::SplitAndMerge {
            frame,
            index,
            side,
            fragments,
            merged,
            cost,
        })
    }

    pub fn rearrange(frame: usize, edits: Vec<Scenario>) -> Self {
        let cost = edits.iter().map(Scenario::cost).sum();
        Scenario::Rearrange { frame, edits, cost }
    }

    pub fn cost(&self) -> f64 {
        match self {
            Scenario::Merge { cost, .. }
            | Scenario::Split { cost, .. }
            | Scenario::SplitAndMerge { cost, .. }
            | Scenario::Rearrange { cost, .. } => *cost,
        }
    }

    /// Largest cost of a single edit, checked against the per-link limit.
    pub fn max_link_cost(&self) -> f64 {
        match self {
            Scenario::Rearrange { edits, .. } => edits
                .iter()
                .map(Scenario::cost)
                .fold(0.0, f64::max),
            other => other.cost(),
        }
    }

    #[inline]
    pub fn is_feasible(&self) -> bool {
        self.cost().is_finite()
    }

    /// First and last frame edited.
    pub fn frames(&self) -> (usize, usize) {
        match self {
            Scenario::Merge { frame, .. }
            | Scenario::Split { frame, .. }
            | Scenario::SplitAndMerge { frame, .. } => (*frame, *frame),
            Scenario::Rearrange { frame, edits, .. } => edits
                .iter()
                .map(Scenario::frames)
                .fold((*frame, *frame), |(lo, hi), (a, b)| (lo.min(a), hi.max(b))),
        }
    }

    /// Replace the affected objects; the frame is reindexed.
    pub fn apply<I>(&self, population: &mut Population<I>) {
        match self {
            Scenario::Merge {
                frame,
                first,
                last,
                merged,
                ..
            } => {
                let mut regions = population.regions(*frame).to_vec();
                if *last < regions.len() {
                    regions.splice(*first..=*last, [merged.clone()]);
                    population.replace_regions(*frame, regions);
                }
            }
            Scenario::Split {
                frame,
                index,
                fragments,
                ..
            } => {
                let mut regions = population.regions(*frame).to_vec();
                if *index < regions.len() {
                    regions.splice(*index..=*index, fragments.iter().cloned());
                    population.replace_regions(*frame, regions);
                }
            }
            Scenario::SplitAndMerge {
                frame,
                index,
                side,
                fragments,
                merged,
                ..
            } => {
                let mut regions = population.regions(*frame).to_vec();
                let span = match side {
                    Side::Preceding => index.checked_sub(1).map(|n| n..=*index),
                    Side::Following => Some(*index..=*index + 1),
                };
                let Some(span) = span.filter(|s| *s.end() < regions.len()) else {
                    return;
                };
                let replacement: Vec<Region> = match side {
                    Side::Preceding => std::iter::once(merged.clone())
                        .chain(fragments.iter().cloned())
                        .collect(),
                    Side::Following => fragments
                        .iter()
                        .cloned()
                        .chain(std::iter::once(merged.clone()))
                        .collect(),
                };
                regions.splice(span, replacement);
                population.replace_regions(*frame, regions);
            }
            Scenario::Rearrange { edits, .. } => {
                for edit in edits {
                    edit.apply(population);
                }
            }
        }
    }

    /// Same kind of edit in the adjacent frame, computed on the state before
    /// this scenario is applied.
    ///
    /// Merges propagate backward while the merged objects descend from
    /// distinct objects; splits propagate forward along a 1:1 continuation
    /// until a division or a size drop.
    pub fn next_scenario<S: Segmenter>(
        &self,
        segmenter: &S,
        population: &Population<S::Image>,
        config: &TrackerConfig,
        range: FrameRange,
    ) -> Option<Scenario> {
        match self {
            Scenario::Merge {
                frame, first, last, ..
            } => {
                if *frame <= range.min {
                    return None;
                }
                let mut parents = Vec::with_capacity(last - first + 1);
                for index in *first..=*last {
                    parents.push(population.attribute(AttrRef::new(*frame, index))?.prev?.index);
                }
                let lo = parents.iter().copied().min()?;
                let hi = parents.iter().copied().max()?;
                if lo == hi {
                    return None;
                }
                Scenario::merge(segmenter, population, config, frame - 1, lo, hi)
            }
            Scenario::Split { frame, index, .. } => {
                if *frame >= range.max {
                    return None;
                }
                let handle = AttrRef::new(*frame, *index);
                let attr = population.attribute(handle)?;
                if attr.division {
                    return None;
                }
                let next = attr.next?;
                let shared = [index.checked_sub(1), Some(index + 1)]
                    .into_iter()
                    .flatten()
                    .filter_map(|i| population.attribute(AttrRef::new(*frame, i)))
                    .any(|a| a.next == Some(next));
                if shared {
                    return None;
                }
                let size = population.regions(*frame).get(*index)?.size;
                let next_size = population.regions(next.frame).get(next.index)?.size;
                if next_size < size * config.min_growth_rate {
                    return None;
                }
                Scenario::split(segmenter, population, next.frame, next.index)
            }
            Scenario::SplitAndMerge { .. } | Scenario::Rearrange { .. } => None,
        }
    }
}

/// Scenario propagated over consecutive frames.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioChain {
    links: Vec<Scenario>,
    cost: f64,
}

fn within_budget(scenario: &Scenario, spent: f64, config: &TrackerConfig) -> bool {
    scenario.is_feasible()
        && scenario.max_link_cost() <= config.cost_limit
        && spent + scenario.cost() <= config.cumulative_cost_limit
}

impl ScenarioChain {
    /// Propagate `first` until it stops on its own, a link is infeasible or
    /// over budget, or the chain reaches `max_correction_length`.
    ///
    /// Returns `None` when `first` itself is infeasible or over budget.
    pub fn build<S: Segmenter>(
        first: Scenario,
        segmenter: &S,
        population: &Population<S::Image>,
        config: &TrackerConfig,
        range: FrameRange,
    ) -> Option<Self> {
        if !within_budget(&first, 0.0, config) {
            return None;
        }
        let mut cost = first.cost();
        let mut links = vec![first];
        while links.len() < config.max_correction_length {
            let Some(next) = links
                .last()
                .and_then(|l| l.next_scenario(segmenter, population, config, range))
            else {
                break;
            };
            if !within_budget(&next, cost, config) {
                break;
            }
            cost += next.cost();
            links.push(next);
        }
        Some(Self { links, cost })
    }

    /// Chain made of exactly `links`, all of which must fit the budget.
    pub fn from_links(links: Vec<Scenario>, config: &TrackerConfig) -> Option<Self> {
        if links.is_empty() || links.len() > config.max_correction_length {
            return None;
        }
        let mut cost = 0.0;
        for link in &links {
            if !within_budget(link, cost, config) {
                return None;
            }
            cost += link.cost();
        }
        Some(Self { links, cost })
    }

    pub fn links(&self) -> &[Scenario] {
        &self.links
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn frames(&self) -> (usize, usize) {
        self.links
            .iter()
            .map(Scenario::frames)
            .fold((usize::MAX, 0), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    /// Frames whose transitions the chain can affect.
    pub fn window(&self, range: FrameRange) -> RangeInclusive<usize> {
        let (first, last) = self.frames();
        range.window_around(first, last)
    }

    pub fn apply<I>(&self, population: &mut Population<I>) {
        for link in &self.links {
            link.apply(population);
        }
    }
}
