//! Pre-match queries. Windows are built exactly as in [`crate::queries`]; only
//! the team attribution and the candidate pool change, coming from the likely
//! roster of teams that play on the requested date.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{QualificationResult, rank_results};
use crate::error::QueryError;
use crate::event_store::load_fixtures_on;
use crate::model::Venue;
use crate::params::{FormQuery, TeamMetric};
use crate::queries::{player_rows, qualified_results, team_metric_rows};
use crate::roster::{LikelyRosterCache, LikelyRosterEntry};
use crate::window::{WindowEvaluation, evaluate_windows};

/// Players in form who are likely to feature for a team playing on `on_date`.
pub fn forward_player_form(
    conn: &Connection,
    cache: &LikelyRosterCache,
    q: &FormQuery,
    on_date: NaiveDate,
    min_confidence: f64,
) -> Result<Vec<QualificationResult>> {
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(QueryError::InvalidConfidence(min_confidence).into());
    }
    let rows = player_rows(conn, q)?;

    let fixtures = load_fixtures_on(conn, q.league_id, on_date)?;
    let playing: HashSet<u32> = fixtures
        .iter()
        .flat_map(|fx| [fx.home_team_id, fx.away_team_id])
        .collect();

    let mut roster: HashMap<u32, LikelyRosterEntry> = HashMap::new();
    for team_id in &playing {
        for entry in cache.entries_for_team(conn, *team_id)? {
            if entry.confidence < min_confidence {
                continue;
            }
            roster
                .entry(entry.player_id)
                .and_modify(|current| {
                    if prefers(&entry, current) {
                        *current = entry.clone();
                    }
                })
                .or_insert(entry);
        }
    }

    let pool: Vec<_> = rows
        .into_iter()
        .filter(|r| roster.contains_key(&r.entity_id))
        .collect();
    let evals = evaluate_windows(&pool, &q.criteria());
    let mut out = qualified_results(&evals, |id| roster.get(&id).map(|e| e.team_id), None);
    for row in &mut out {
        row.roster_confidence = roster.get(&row.entity_id).map(|e| e.confidence);
    }
    rank_results(&mut out);
    if let Some(limit) = q.result_limit {
        out.truncate(limit);
    }
    debug!(
        league_id = q.league_id,
        %on_date,
        teams = playing.len(),
        roster = roster.len(),
        results = out.len(),
        "forward player form evaluated"
    );
    Ok(out)
}

fn prefers(candidate: &LikelyRosterEntry, current: &LikelyRosterEntry) -> bool {
    candidate
        .last_seen_at
        .cmp(&current.last_seen_at)
        .then_with(|| {
            candidate
                .confidence
                .partial_cmp(&current.confidence)
                .unwrap_or(Ordering::Equal)
        })
        == Ordering::Greater
}

/// One side of an upcoming fixture whose own form and the opponent's
/// concession form both qualify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureMatchup {
    pub fixture_id: u64,
    pub start_time: DateTime<Utc>,
    pub team_id: u32,
    pub opponent_id: u32,
    pub venue: Venue,
    pub metric: TeamMetric,
    pub team_form: QualificationResult,
    pub opponent_allows: QualificationResult,
    /// Lower of the two hit rates (or averages without a threshold).
    pub strength: f64,
}

pub fn fixture_matchups(
    conn: &Connection,
    q: &FormQuery,
    metric: TeamMetric,
    on_date: NaiveDate,
) -> Result<Vec<FixtureMatchup>> {
    let own = qualified_by_team(&evaluate_windows(&team_metric_rows(conn, q, metric)?, &q.criteria()));
    let opponent_q = opponent_query(q);
    let allows = qualified_by_team(&evaluate_windows(
        &team_metric_rows(conn, &opponent_q, metric.conceded_counterpart())?,
        &opponent_q.criteria(),
    ));
    let side_filter = q.eligibility().venue;

    let mut out = Vec::new();
    for fx in load_fixtures_on(conn, q.league_id, on_date)? {
        for (team_id, opponent_id, venue) in [
            (fx.home_team_id, fx.away_team_id, Venue::Home),
            (fx.away_team_id, fx.home_team_id, Venue::Away),
        ] {
            if side_filter.is_some_and(|only| only != venue) {
                continue;
            }
            let (Some(team_form), Some(opponent_allows)) = (own.get(&team_id), allows.get(&opponent_id))
            else {
                continue;
            };
            let strength = match (team_form.hit_rate, opponent_allows.hit_rate) {
                (Some(a), Some(b)) => a.min(b),
                _ => team_form.avg_value.min(opponent_allows.avg_value),
            };
            out.push(FixtureMatchup {
                fixture_id: fx.fixture_id,
                start_time: fx.start_time,
                team_id,
                opponent_id,
                venue,
                metric,
                team_form: team_form.clone(),
                opponent_allows: opponent_allows.clone(),
                strength,
            });
        }
    }
    out.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.fixture_id.cmp(&b.fixture_id))
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    if let Some(limit) = q.result_limit {
        out.truncate(limit);
    }
    Ok(out)
}

/// Window parameters for the opponent side: entity and team filters name the
/// subject team only, and the opponent plays at the other venue.
fn opponent_query(q: &FormQuery) -> FormQuery {
    FormQuery {
        specific_entity_id: None,
        specific_team_id: None,
        home_only: q.away_only,
        away_only: q.home_only,
        ..q.clone()
    }
}

fn qualified_by_team(evals: &[WindowEvaluation]) -> HashMap<u32, QualificationResult> {
    qualified_results(evals, Some, None)
        .into_iter()
        .map(|r| (r.entity_id, r))
        .collect()
}
