use std::cmp::Ordering;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Appearance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAggregate {
    pub games: usize,
    pub games_with_stat: usize,
    pub games_hit: Option<usize>,
    pub total_value: f64,
    pub avg_value: f64,
    pub last_values: Vec<f64>,
    pub last_fixture_ids: Vec<u64>,
    pub last_fixture_at: DateTime<Utc>,
    pub window_start_at: DateTime<Utc>,
}

/// Per-entity output of a windowed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationResult {
    pub entity_id: u32,
    pub team_id: u32,
    pub games: usize,
    pub games_with_stat: usize,
    pub games_hit: Option<usize>,
    pub hit_rate: Option<f64>,
    pub total_value: f64,
    pub avg_value: f64,
    /// Newest first.
    pub last_values: Vec<f64>,
    pub last_fixture_ids: Vec<u64>,
    pub last_fixture_at: DateTime<Utc>,
    pub window_start_at: DateTime<Utc>,
    #[serde(default)]
    pub roster_confidence: Option<f64>,
}

impl QualificationResult {
    pub fn from_aggregate(entity_id: u32, team_id: u32, agg: WindowAggregate) -> Self {
        let hit_rate = agg.games_hit.map(|hit| hit_rate(hit, agg.games));
        Self {
            entity_id,
            team_id,
            games: agg.games,
            games_with_stat: agg.games_with_stat,
            games_hit: agg.games_hit,
            hit_rate,
            total_value: agg.total_value,
            avg_value: agg.avg_value,
            last_values: agg.last_values,
            last_fixture_ids: agg.last_fixture_ids,
            last_fixture_at: agg.last_fixture_at,
            window_start_at: agg.window_start_at,
            roster_confidence: None,
        }
    }
}

/// Aggregates a window already ordered newest first. Missing values are skipped
/// rather than zero-filled; after the completeness gate there are none.
pub fn aggregate_window(rows: &[Appearance], threshold: Option<f64>) -> WindowAggregate {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.value).collect();
    let games_with_stat = values.len();
    let total_value: f64 = values.iter().sum();
    let avg_value = if games_with_stat > 0 {
        total_value / games_with_stat as f64
    } else {
        0.0
    };
    let games_hit = threshold.map(|t| values.iter().filter(|v| **v >= t).count());

    let last_fixture_at = rows
        .iter()
        .map(|r| r.start_time)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let window_start_at = rows
        .iter()
        .map(|r| r.start_time)
        .min()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    WindowAggregate {
        games: rows.len(),
        games_with_stat,
        games_hit,
        total_value,
        avg_value,
        last_values: values,
        last_fixture_ids: rows.iter().map(|r| r.fixture_id).collect(),
        last_fixture_at,
        window_start_at,
    }
}

/// `hits / window_size`, or exactly 0 for an empty window.
pub fn hit_rate(hits: usize, window_size: usize) -> f64 {
    if window_size == 0 {
        return 0.0;
    }
    hits as f64 / window_size as f64
}

/// Hits desc (when present), average desc, then entity id asc.
pub fn rank_results(rows: &mut [QualificationResult]) {
    rows.sort_by(|a, b| {
        b.games_hit
            .cmp(&a.games_hit)
            .then_with(|| b.avg_value.partial_cmp(&a.avg_value).unwrap_or(Ordering::Equal))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}

/// Stable digest of a result set, for caching and reproducibility checks.
pub fn results_fingerprint<T: Serialize>(rows: &[T]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        let bytes = serde_json::to_vec(row).unwrap_or_default();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
