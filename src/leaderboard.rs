use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::hit_rate;
use crate::model::Appearance;
use crate::params::Eligibility;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub entity_id: u32,
    /// Team of the entity's single most recent appearance in scope.
    pub team_id: u32,
    pub games: usize,
    pub games_with_stat: usize,
    pub total_value: f64,
    pub avg_value: f64,
    pub hit_count: Option<usize>,
    pub hit_rate: Option<f64>,
    pub minutes_played: Option<u32>,
    pub per_90: Option<f64>,
    pub last_fixture_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tally {
    games: usize,
    games_with_stat: usize,
    total: f64,
    hits: usize,
    minutes: u32,
    minutes_known: bool,
    last: Option<DateTime<Utc>>,
}

/// Cumulative totals over every eligible appearance; no window, no gate beyond
/// having at least one eligible event.
pub fn build_leaderboard(
    rows: &[Appearance],
    eligibility: &Eligibility,
    threshold: Option<f64>,
    minimum_games: Option<usize>,
    teams: &HashMap<u32, u32>,
) -> Vec<LeaderboardEntry> {
    let mut tallies: BTreeMap<u32, Tally> = BTreeMap::new();
    for row in rows.iter().filter(|r| eligibility.admits(r)) {
        let tally = tallies.entry(row.entity_id).or_default();
        tally.games += 1;
        if let Some(value) = row.value {
            tally.games_with_stat += 1;
            tally.total += value;
            if threshold.is_some_and(|t| value >= t) {
                tally.hits += 1;
            }
        }
        if let Some(minutes) = row.minutes_played {
            tally.minutes = tally.minutes.saturating_add(minutes);
            tally.minutes_known = true;
        }
        tally.last = Some(tally.last.map_or(row.start_time, |t| t.max(row.start_time)));
    }

    let mut out = Vec::with_capacity(tallies.len());
    for (entity_id, tally) in tallies {
        if minimum_games.is_some_and(|min| tally.games < min) {
            continue;
        }
        let Some(last_fixture_at) = tally.last else {
            continue;
        };
        let Some(team_id) = teams.get(&entity_id).copied() else {
            continue;
        };
        let avg_value = if tally.games_with_stat > 0 {
            tally.total / tally.games_with_stat as f64
        } else {
            0.0
        };
        let minutes_played = tally.minutes_known.then_some(tally.minutes);
        let per_90 = minutes_played
            .filter(|m| *m > 0)
            .map(|m| tally.total * 90.0 / f64::from(m));
        out.push(LeaderboardEntry {
            entity_id,
            team_id,
            games: tally.games,
            games_with_stat: tally.games_with_stat,
            total_value: tally.total,
            avg_value,
            hit_count: threshold.map(|_| tally.hits),
            hit_rate: threshold.map(|_| hit_rate(tally.hits, tally.games)),
            minutes_played,
            per_90,
            last_fixture_at,
        });
    }

    out.sort_by(|a, b| {
        b.total_value
            .partial_cmp(&a.total_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.avg_value.partial_cmp(&a.avg_value).unwrap_or(Ordering::Equal))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    out
}
