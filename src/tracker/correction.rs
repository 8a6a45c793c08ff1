//! Local correction of linkage errors by re-segmentation.
//!
//! At an error site the corrector proposes competing scenario chains, tries
//! each one on a snapshot of the affected window and keeps the best chain
//! that lowers the error count. Chains that only match the baseline are kept
//! when they are free.

use std::collections::HashSet;
use std::ops::{Range, RangeInclusive};

use ndarray::Array2;
use tracing::debug;

use crate::integration::Segmenter;
use crate::tracker::assigner::{Assignment, TransitionAssignments};
use crate::tracker::lineage_tracker::TrackerConfig;
use crate::tracker::population::{FrameRange, Population};
use crate::tracker::scenario::{Scenario, ScenarioChain, Side};
use crate::tracker::snapshot::Snapshot;
use crate::tracker::track_attribute::AttrRef;

/// Objects per side above which no rearrangement is searched.
const MAX_REARRANGE_OBJECTS: usize = 6;

/// Smallest window covering both.
fn span(a: &RangeInclusive<usize>, b: &RangeInclusive<usize>) -> RangeInclusive<usize> {
    *a.start().min(b.start())..=*a.end().max(b.end())
}

/// Merge overlapping or adjacent windows.
pub fn merge_windows(mut windows: Vec<RangeInclusive<usize>>) -> Vec<RangeInclusive<usize>> {
    windows.sort_by_key(|w| *w.start());
    let mut merged: Vec<RangeInclusive<usize>> = Vec::with_capacity(windows.len());
    for w in windows {
        match merged.last_mut() {
            Some(last) if *w.start() <= last.end() + 1 => *last = span(last, &w),
            _ => merged.push(w),
        }
    }
    merged
}

pub struct Corrector<'a, S: Segmenter> {
    segmenter: &'a S,
    config: &'a TrackerConfig,
    population: &'a mut Population<S::Image>,
    range: FrameRange,
}

impl<'a, S: Segmenter> Corrector<'a, S> {
    pub fn new(
        segmenter: &'a S,
        config: &'a TrackerConfig,
        population: &'a mut Population<S::Image>,
        range: FrameRange,
    ) -> Self {
        Self {
            segmenter,
            config,
            population,
            range,
        }
    }

    /// Relink every transition inside `window`.
    pub fn reassign(&mut self, window: RangeInclusive<usize>) {
        for t in *window.start() + 1..=*window.end() {
            self.population.assign_transition(t, self.config);
        }
    }

    pub fn errors(&self, window: RangeInclusive<usize>) -> usize {
        self.population.count_errors(window, self.config)
    }

    /// Error count of `window` with `chain` applied; the state is restored.
    pub fn trial(&mut self, chain: &ScenarioChain, window: RangeInclusive<usize>) -> usize {
        let snapshot = Snapshot::capture(self.population, window.clone());
        chain.apply(self.population);
        self.reassign(window.clone());
        let errors = self.errors(window);
        snapshot.restore(self.population);
        errors
    }

    /// Whether the link into object `index` of frame `t` is flagged.
    pub fn has_error(&self, t: usize, index: usize) -> bool {
        let Some(attr) = self.population.attribute(AttrRef::new(t, index)) else {
            return false;
        };
        attr.has_error()
            || attr
                .prev
                .and_then(|p| self.population.attribute(p))
                .is_some_and(|p| p.error_cur)
    }

    /// Try to fix the transition into object `index` of frame `t`.
    ///
    /// Returns the window that was corrected, `None` when every chain was
    /// rejected and the error stays flagged.
    pub fn correct_site(&mut self, t: usize, index: usize) -> Option<RangeInclusive<usize>> {
        let chains: Vec<ScenarioChain> = self
            .propose(t, index)
            .into_iter()
            .filter_map(|s| {
                ScenarioChain::build(s, self.segmenter, &*self.population, self.config, self.range)
            })
            .collect();
        let window = chains
            .iter()
            .map(|c| c.window(self.range))
            .reduce(|a, b| span(&a, &b))?;

        let baseline = self.errors(window.clone());
        let mut best: Option<(usize, usize, f64)> = None;
        for (i, chain) in chains.iter().enumerate() {
            let errors = self.trial(chain, window.clone());
            let eligible = errors < baseline || (errors == baseline && chain.cost() == 0.0);
            if !eligible {
                debug!(frame = t, index, errors, baseline, cost = chain.cost(), "chain rejected");
                continue;
            }
            let cost = chain.cost();
            if best.is_none_or(|(_, e, c)| errors < e || (errors == e && cost < c)) {
                best = Some((i, errors, cost));
            }
        }

        let (i, errors, cost) = best?;
        debug!(
            frame = t,
            index,
            errors,
            baseline,
            cost,
            links = chains[i].links().len(),
            "chain accepted"
        );
        chains[i].apply(self.population);
        self.reassign(window.clone());
        Some(window)
    }

    /// First links of the competing chains at an error site.
    fn propose(&mut self, t: usize, index: usize) -> Vec<Scenario> {
        let result = self.population.compute_assignments(t, self.config);
        let (seg, pop, cfg) = (self.segmenter, &*self.population, self.config);
        let mut proposals = Vec::new();

        let Some((k, a)) = result.containing_next(index) else {
            if result.appeared.contains(&index) && index > 0 {
                proposals.extend(Scenario::merge(seg, pop, cfg, t, index - 1, index));
            }
            return proposals;
        };
        if a.error_count(cfg) == 0 {
            return proposals;
        }

        if a.prev.len() > 1 {
            proposals.extend(Scenario::merge(seg, pop, cfg, t - 1, a.prev.start, a.prev.end - 1));
            for j in a.next.clone() {
                proposals.extend(Scenario::split(seg, pop, t, j));
            }
            if a.prev.len() > 2 {
                for i in a.prev.start..a.prev.end - 1 {
                    proposals.extend(Scenario::merge(seg, pop, cfg, t - 1, i, i + 1));
                }
            }
        } else if a.next.len() > 2 {
            proposals.extend(Scenario::split(seg, pop, t - 1, a.prev.start));
            for j in a.next.start..a.next.end - 1 {
                proposals.extend(Scenario::merge(seg, pop, cfg, t, j, j + 1));
            }
        } else if grows_too_much(a, cfg) {
            for j in a.next.clone() {
                proposals.extend(Scenario::split(seg, pop, t, j));
            }
            proposals.extend(Scenario::split_and_merge(
                seg,
                pop,
                cfg,
                t,
                a.next.end - 1,
                Side::Following,
            ));
            if a.next.len() == 2 {
                proposals.extend(Scenario::merge(seg, pop, cfg, t, a.next.start, a.next.end - 1));
            }
        } else {
            proposals.extend(Scenario::merge(seg, pop, cfg, t, a.next.end - 1, a.next.end));
            proposals.extend(Scenario::split(seg, pop, t - 1, a.prev.start));
            proposals.extend(Scenario::split_and_merge(
                seg,
                pop,
                cfg,
                t,
                a.next.end,
                Side::Preceding,
            ));
        }

        if let Some((prev, next)) = erroneous_block(&result, k, cfg) {
            proposals.extend(self.rearrange(t, prev, next));
        }
        proposals
    }

    /// Cheapest combination of one edit in frame `t-1` over `prev` and one
    /// edit in frame `t` over `next` that strictly lowers the errors.
    pub fn rearrange(&mut self, t: usize, prev: Range<usize>, next: Range<usize>) -> Option<Scenario> {
        if prev.len() > MAX_REARRANGE_OBJECTS || next.len() > MAX_REARRANGE_OBJECTS {
            return None;
        }
        let prev_edits = self.edits(t - 1, prev);
        let next_edits = self.edits(t, next);
        let costs = Array2::from_shape_fn((prev_edits.len(), next_edits.len()), |(i, j)| {
            edit_cost(&prev_edits[i]) + edit_cost(&next_edits[j])
        });

        let mut order: Vec<(usize, usize)> = costs
            .indexed_iter()
            .filter(|&((i, j), cost)| (i, j) != (0, 0) && cost.is_finite())
            .map(|(ix, _)| ix)
            .collect();
        order.sort_by(|a, b| costs[[a.0, a.1]].total_cmp(&costs[[b.0, b.1]]));

        let window = self.range.window_around(t - 1, t);
        let baseline = self.errors(window.clone());
        for (i, j) in order {
            let edits: Vec<Scenario> = [&prev_edits[i], &next_edits[j]]
                .into_iter()
                .flatten()
                .cloned()
                .collect();
            let scenario = Scenario::rearrange(t, edits);
            let Some(chain) = ScenarioChain::from_links(vec![scenario], self.config) else {
                continue;
            };
            if self.trial(&chain, window.clone()) < baseline {
                return chain.links().first().cloned();
            }
        }
        None
    }

    /// No edit, then every split, then every adjacent merge over `objects`.
    fn edits(&self, frame: usize, objects: Range<usize>) -> Vec<Option<Scenario>> {
        let (seg, pop, cfg) = (self.segmenter, &*self.population, self.config);
        let splits = objects
            .clone()
            .filter_map(|i| Scenario::split(seg, pop, frame, i));
        let merges = (objects.start..objects.end.saturating_sub(1))
            .filter_map(|i| Scenario::merge(seg, pop, cfg, frame, i, i + 1));
        std::iter::once(None)
            .chain(
                splits
                    .chain(merges)
                    .filter(|s| s.is_feasible() && s.cost() <= cfg.cost_limit)
                    .map(Some),
            )
            .collect()
    }

    /// Merge leading fragments cut from their cell at the channel's open end.
    ///
    /// A run starts at a division whose first daughter is smaller than both
    /// `beheaded_size_limit` and its sister, while the sister alone grows
    /// from the parent within the growth bounds. It follows both daughters
    /// until one of them divides. The whole run is merged without comparing errors.
    /// Returns the number of runs merged.
    pub fn repair_beheaded(&mut self) -> usize {
        let mut repaired = 0;
        let mut t = self.range.min + 1;
        while t <= self.range.max {
            let Some(last) = self.beheaded_run(t) else {
                t += 1;
                continue;
            };
            let links: Vec<Scenario> = (t..=last)
                .filter_map(|f| {
                    Scenario::merge(self.segmenter, &*self.population, self.config, f, 0, 1)
                })
                .collect();
            let chain = (links.len() == last - t + 1)
                .then(|| ScenarioChain::from_links(links, self.config))
                .flatten();
            if let Some(chain) = chain {
                debug!(first = t, last, cost = chain.cost(), "beheaded cell merged");
                chain.apply(self.population);
                self.reassign(self.range.window_around(t, last));
                repaired += 1;
            }
            t = last + 1;
        }
        repaired
    }

    /// Last frame of the beheaded run starting at `t`, if any.
    fn beheaded_run(&self, t: usize) -> Option<usize> {
        let pop = &*self.population;
        let limit = self.config.beheaded_size_limit;
        let parent = AttrRef::new(t - 1, 0);
        if !pop.attribute(parent)?.division {
            return None;
        }
        let sizes = pop.sizes(t);
        if sizes.len() < 2 || sizes[0] >= limit || sizes[0] >= sizes[1] {
            return None;
        }
        // the sister alone must be a valid continuation of the parent
        let parent_size = pop.regions(t - 1).first()?.size;
        let ratio = sizes[1] / parent_size;
        if !(ratio >= self.config.min_growth_rate && ratio <= self.config.max_growth_rate) {
            return None;
        }
        for i in 0..2 {
            if pop.attribute(AttrRef::new(t, i))?.prev != Some(parent) {
                return None;
            }
        }

        let mut f = t;
        while f < self.range.max {
            let first = pop.attribute(AttrRef::new(f, 0))?;
            let second = pop.attribute(AttrRef::new(f, 1))?;
            if first.division || second.division {
                break;
            }
            let follows = first.next == Some(AttrRef::new(f + 1, 0))
                && second.next == Some(AttrRef::new(f + 1, 1));
            let small = pop.regions(f + 1).first().is_some_and(|r| r.size < limit);
            if !follows || !small {
                break;
            }
            f += 1;
        }
        Some(f)
    }

    /// Sweep object indices upward over the usable range, correcting each
    /// flagged site at most once per pass. Later passes only revisit the
    /// windows corrected by the previous one. Returns the accepted chains.
    pub fn sweep(&mut self) -> usize {
        let mut windows = vec![self.range.frames()];
        let mut accepted = 0;
        for pass in 0..self.config.loop_limit {
            let mut tried = HashSet::new();
            let mut corrected = Vec::new();
            let mut index = 0;
            loop {
                let mut reached = false;
                for window in &windows {
                    for t in (*window.start()).max(self.range.min + 1)..=*window.end() {
                        if self.population.regions(t).len() <= index {
                            continue;
                        }
                        reached = true;
                        if !self.has_error(t, index) || !tried.insert((t, index)) {
                            continue;
                        }
                        if let Some(w) = self.correct_site(t, index) {
                            corrected.push(w);
                        }
                    }
                }
                if !reached {
                    break;
                }
                index += 1;
            }
            debug!(pass, corrected = corrected.len(), "correction pass");
            if corrected.is_empty() {
                break;
            }
            accepted += corrected.len();
            windows = merge_windows(corrected);
        }
        accepted
    }
}

fn edit_cost(edit: &Option<Scenario>) -> f64 {
    edit.as_ref().map_or(0.0, Scenario::cost)
}

fn grows_too_much(a: &Assignment, config: &TrackerConfig) -> bool {
    let ratio = a.ratio();
    match a.expected_increment {
        Some(expected) => ratio > expected,
        None => ratio > config.max_growth_rate,
    }
}

/// Objects covered by the run of erroneous assignments around `k`, when it
/// spans several objects on both sides.
fn erroneous_block(
    result: &TransitionAssignments,
    k: usize,
    config: &TrackerConfig,
) -> Option<(Range<usize>, Range<usize>)> {
    let list = &result.assignments;
    let erroneous = |i: usize| list[i].error_count(config) > 0;
    let mut first = k;
    while first > 0 && erroneous(first - 1) {
        first -= 1;
    }
    let mut last = k;
    while last + 1 < list.len() && erroneous(last + 1) {
        last += 1;
    }
    let prev = list[first].prev.start..list[last].prev.end;
    let next = list[first].next.start..list[last].next.end;
    (prev.len() >= 2 && next.len() >= 2).then_some((prev, next))
}
