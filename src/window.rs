//! Window selection and completeness gating.
//!
//! Every windowed path (historical, forward-looking, funnel) goes through
//! [`evaluate_windows`], so the selection and gate rules cannot drift between
//! the main queries and their diagnostics.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::{WindowAggregate, aggregate_window};
use crate::model::Appearance;
use crate::params::{Eligibility, RecencyCutoff, WindowCriteria};

/// Recency order: `start_time` descending, then `fixture_id` descending.
pub fn recency_order(a: &Appearance, b: &Appearance) -> Ordering {
    b.start_time
        .cmp(&a.start_time)
        .then_with(|| b.fixture_id.cmp(&a.fixture_id))
}

/// The most recent eligible appearances of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityWindow {
    pub entity_id: u32,
    /// Newest first, at most `window_size` rows.
    pub rows: Vec<Appearance>,
    /// Eligible appearances in scope before truncation, ignoring stat availability.
    pub eligible_total: usize,
}

impl EntityWindow {
    pub fn games(&self) -> usize {
        self.rows.len()
    }

    pub fn games_with_stat(&self) -> usize {
        self.rows.iter().filter(|r| r.value.is_some()).count()
    }
}

/// Groups rows by entity and keeps the top `window_size` eligible rows of each.
/// Entities come back in ascending id order.
pub fn select_windows(
    rows: &[Appearance],
    eligibility: &Eligibility,
    window_size: usize,
) -> Vec<EntityWindow> {
    let mut by_entity: BTreeMap<u32, Vec<&Appearance>> = BTreeMap::new();
    for row in rows.iter().filter(|r| eligibility.admits(r)) {
        by_entity.entry(row.entity_id).or_default().push(row);
    }

    by_entity
        .into_iter()
        .map(|(entity_id, mut eligible)| {
            eligible.sort_by(|a, b| recency_order(a, b));
            let eligible_total = eligible.len();
            let rows = eligible
                .into_iter()
                .take(window_size)
                .cloned()
                .collect::<Vec<_>>();
            EntityWindow {
                entity_id,
                rows,
                eligible_total,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Complete,
    TooFewAppearances,
    MissingValues,
    Stale,
}

/// Exact completeness: `games == N` and `games_with_stat == N`, plus the optional
/// recency cutoff on the newest window event.
pub fn gate(window: &EntityWindow, window_size: usize, recency: Option<&RecencyCutoff>) -> GateOutcome {
    if window.games() != window_size {
        return GateOutcome::TooFewAppearances;
    }
    if window.games_with_stat() != window_size {
        return GateOutcome::MissingValues;
    }
    if let Some(cutoff) = recency {
        let Some(newest) = window.rows.first() else {
            return GateOutcome::TooFewAppearances;
        };
        if !cutoff.admits(newest.start_time) {
            return GateOutcome::Stale;
        }
    }
    GateOutcome::Complete
}

/// Outcome of running one entity through selector, gate and aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEvaluation {
    pub window: EntityWindow,
    pub gate: GateOutcome,
    pub aggregate: Option<WindowAggregate>,
    pub qualified: bool,
}

impl WindowEvaluation {
    pub fn entity_id(&self) -> u32 {
        self.window.entity_id
    }

    pub fn is_candidate(&self, window_size: usize) -> bool {
        self.window.eligible_total >= window_size
    }

    pub fn is_complete(&self) -> bool {
        self.gate == GateOutcome::Complete
    }
}

pub fn evaluate_windows(rows: &[Appearance], criteria: &WindowCriteria) -> Vec<WindowEvaluation> {
    let windows = select_windows(rows, &criteria.eligibility, criteria.window_size);
    windows
        .into_par_iter()
        .map(|window| evaluate_one(window, criteria))
        .collect()
}

fn evaluate_one(window: EntityWindow, criteria: &WindowCriteria) -> WindowEvaluation {
    let outcome = gate(&window, criteria.window_size, criteria.recency.as_ref());
    if outcome != GateOutcome::Complete {
        return WindowEvaluation {
            window,
            gate: outcome,
            aggregate: None,
            qualified: false,
        };
    }

    let aggregate = aggregate_window(&window.rows, criteria.threshold);
    let meets_hits = match (criteria.required_hit_count, aggregate.games_hit) {
        (Some(required), Some(hit)) => hit >= required,
        (Some(_), None) => false,
        (None, _) => true,
    };
    let meets_average = criteria
        .minimum_average
        .is_none_or(|minimum| aggregate.avg_value >= minimum);

    WindowEvaluation {
        window,
        gate: outcome,
        aggregate: Some(aggregate),
        qualified: meets_hits && meets_average,
    }
}

/// Team of each entity's single most recent appearance in `rows`.
pub fn current_teams(rows: &[Appearance]) -> HashMap<u32, u32> {
    let mut latest: HashMap<u32, &Appearance> = HashMap::new();
    for row in rows {
        latest
            .entry(row.entity_id)
            .and_modify(|best| {
                if recency_order(row, best) == Ordering::Less {
                    *best = row;
                }
            })
            .or_insert(row);
    }
    latest
        .into_iter()
        .map(|(entity_id, row)| (entity_id, row.team_id))
        .collect()
}
