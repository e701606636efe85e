use serde::{Deserialize, Serialize};

use crate::window::WindowEvaluation;

/// Three-stage diagnostic counts: candidates, complete windows, qualified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelCounts {
    pub candidate_count: usize,
    pub complete_count: usize,
    pub qualified_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultCause {
    HasResults,
    InsufficientEntityPool,
    IncompleteData,
    NoEntityMeetsBar,
}

impl FunnelCounts {
    pub fn diagnosis(&self) -> EmptyResultCause {
        if self.qualified_count > 0 {
            EmptyResultCause::HasResults
        } else if self.candidate_count == 0 {
            EmptyResultCause::InsufficientEntityPool
        } else if self.complete_count == 0 {
            EmptyResultCause::IncompleteData
        } else {
            EmptyResultCause::NoEntityMeetsBar
        }
    }
}

/// Counts over the same evaluations the windowed queries emit rows from.
pub fn count_funnel(evaluations: &[WindowEvaluation], window_size: usize) -> FunnelCounts {
    let mut counts = FunnelCounts::default();
    for eval in evaluations {
        if !eval.is_candidate(window_size) {
            continue;
        }
        counts.candidate_count += 1;
        if !eval.is_complete() {
            continue;
        }
        counts.complete_count += 1;
        if eval.qualified {
            counts.qualified_count += 1;
        }
    }
    counts
}
