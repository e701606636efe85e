//! Historical windowed queries, funnel diagnostics, leaderboards and the
//! supplementary streak ladder and form guide.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{QualificationResult, rank_results};
use crate::error::QueryError;
use crate::event_store::{load_finalized_fixtures, load_player_appearances, load_team_stat_values};
use crate::funnel::{FunnelCounts, count_funnel};
use crate::leaderboard::{LeaderboardEntry, build_leaderboard};
use crate::model::{Appearance, EntityKind, Venue};
use crate::params::{FormQuery, LeaderboardQuery, Scope, TeamMetric};
use crate::team_rows::{TeamStatValues, team_rows};
use crate::window::{WindowEvaluation, current_teams, evaluate_windows};

pub use crate::event_store::store_summary;

pub fn player_form(conn: &Connection, q: &FormQuery) -> Result<Vec<QualificationResult>> {
    let rows = player_rows(conn, q)?;
    let evals = evaluate_windows(&rows, &q.criteria());
    let teams = current_teams(&rows);
    let out = qualified_results(&evals, |entity_id| teams.get(&entity_id).copied(), q.result_limit);
    debug!(
        league_id = q.league_id,
        rows = rows.len(),
        entities = evals.len(),
        results = out.len(),
        "player form evaluated"
    );
    Ok(out)
}

pub fn team_form(conn: &Connection, q: &FormQuery, metric: TeamMetric) -> Result<Vec<QualificationResult>> {
    let rows = team_metric_rows(conn, q, metric)?;
    let evals = evaluate_windows(&rows, &q.criteria());
    let out = qualified_results(&evals, Some, q.result_limit);
    debug!(
        league_id = q.league_id,
        ?metric,
        rows = rows.len(),
        results = out.len(),
        "team form evaluated"
    );
    Ok(out)
}

pub fn player_funnel(conn: &Connection, q: &FormQuery) -> Result<FunnelCounts> {
    let rows = player_rows(conn, q)?;
    let evals = evaluate_windows(&rows, &q.criteria());
    Ok(count_funnel(&evals, q.window_size))
}

pub fn team_funnel(conn: &Connection, q: &FormQuery, metric: TeamMetric) -> Result<FunnelCounts> {
    let rows = team_metric_rows(conn, q, metric)?;
    let evals = evaluate_windows(&rows, &q.criteria());
    Ok(count_funnel(&evals, q.window_size))
}

pub fn player_leaderboard(conn: &Connection, q: &LeaderboardQuery) -> Result<Vec<LeaderboardEntry>> {
    q.validate(EntityKind::Player)?;
    let type_id = q.statistic_type_id.ok_or(QueryError::MissingStatistic)?;
    let rows = load_player_appearances(conn, &q.scope(), Some(type_id))?;
    let teams = current_teams(&rows);
    let mut board = build_leaderboard(&rows, &q.eligibility(), q.threshold, q.minimum_games, &teams);
    if let Some(limit) = q.result_limit {
        board.truncate(limit);
    }
    Ok(board)
}

pub fn team_leaderboard(
    conn: &Connection,
    q: &LeaderboardQuery,
    metric: TeamMetric,
) -> Result<Vec<LeaderboardEntry>> {
    q.validate(EntityKind::Team)?;
    let rows = load_team_rows(conn, &q.scope(), q.statistic_type_id, metric)?;
    let teams: HashMap<u32, u32> = rows.iter().map(|r| (r.entity_id, r.entity_id)).collect();
    let mut board = build_leaderboard(&rows, &q.eligibility(), q.threshold, q.minimum_games, &teams);
    if let Some(limit) = q.result_limit {
        board.truncate(limit);
    }
    Ok(board)
}

/// One (window size, required hits) step of a streak ladder, e.g. 9 of 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderRung {
    pub window_size: usize,
    pub required_hits: usize,
}

impl LadderRung {
    pub const fn new(required_hits: usize, window_size: usize) -> Self {
        Self {
            window_size,
            required_hits,
        }
    }
}

pub const DEFAULT_LADDER: [LadderRung; 4] = [
    LadderRung::new(9, 11),
    LadderRung::new(12, 14),
    LadderRung::new(13, 15),
    LadderRung::new(16, 20),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderHit {
    pub rung: LadderRung,
    pub result: QualificationResult,
}

/// Every satisfied rung per player, strongest hit rate first, longer windows
/// ahead of shorter ones at equal rate.
pub fn streak_ladder(conn: &Connection, q: &FormQuery, rungs: &[LadderRung]) -> Result<Vec<LadderHit>> {
    let rung_queries = rungs
        .iter()
        .map(|rung| {
            let mut rq = q.clone();
            rq.window_size = rung.window_size;
            rq.required_hit_count = Some(rung.required_hits);
            rq.result_limit = None;
            rq.validate(EntityKind::Player).map(|_| (*rung, rq))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rung_queries.is_empty() {
        q.validate(EntityKind::Player)?;
        return Ok(Vec::new());
    }

    // Rungs share statistic and scope.
    let rows = player_rows(conn, &rung_queries[0].1)?;
    let teams = current_teams(&rows);
    let mut hits = Vec::new();
    for (rung, rq) in &rung_queries {
        let evals = evaluate_windows(&rows, &rq.criteria());
        for result in qualified_results(&evals, |id| teams.get(&id).copied(), None) {
            hits.push(LadderHit {
                rung: *rung,
                result,
            });
        }
    }
    hits.sort_by(|a, b| {
        let rate = |h: &LadderHit| h.result.hit_rate.unwrap_or(0.0);
        rate(b)
            .partial_cmp(&rate(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.rung.window_size.cmp(&a.rung.window_size))
            .then_with(|| a.result.entity_id.cmp(&b.result.entity_id))
    });
    if let Some(limit) = q.result_limit {
        hits.truncate(limit);
    }
    Ok(hits)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

impl MatchOutcome {
    pub fn from_goals(goals_for: i32, goals_against: i32) -> Self {
        match goals_for.cmp(&goals_against) {
            Ordering::Greater => MatchOutcome::Win,
            Ordering::Equal => MatchOutcome::Draw,
            Ordering::Less => MatchOutcome::Loss,
        }
    }

    pub fn points(self) -> u32 {
        match self {
            MatchOutcome::Win => 3,
            MatchOutcome::Draw => 1,
            MatchOutcome::Loss => 0,
        }
    }

    pub fn letter(self) -> char {
        match self {
            MatchOutcome::Win => 'W',
            MatchOutcome::Draw => 'D',
            MatchOutcome::Loss => 'L',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormGuideEntry {
    pub fixture_id: u64,
    pub start_time: DateTime<Utc>,
    pub opponent_id: u32,
    pub venue: Venue,
    pub goals_for: i32,
    pub goals_against: i32,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormGuide {
    pub team_id: u32,
    /// Newest first.
    pub matches: Vec<FormGuideEntry>,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_for: i32,
    pub goals_against: i32,
    pub points: u32,
}

impl FormGuide {
    /// Compact string such as `WWDLW`, newest first.
    pub fn letters(&self) -> String {
        self.matches.iter().map(|m| m.outcome.letter()).collect()
    }
}

/// Last `n` finished results of one team.
pub fn team_form_guide(conn: &Connection, league_id: u32, team_id: u32, n: usize) -> Result<FormGuide> {
    if n == 0 {
        return Err(QueryError::InvalidWindowSize.into());
    }
    let scope = Scope {
        league_id,
        season_id: None,
        entity_id: None,
    };
    let mut fixtures: Vec<_> = load_finalized_fixtures(conn, &scope)?
        .into_iter()
        .filter(|fx| fx.venue_of(team_id).is_some())
        .collect();
    fixtures.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| b.fixture_id.cmp(&a.fixture_id))
    });

    let mut guide = FormGuide {
        team_id,
        matches: Vec::with_capacity(n.min(fixtures.len())),
        wins: 0,
        draws: 0,
        losses: 0,
        goals_for: 0,
        goals_against: 0,
        points: 0,
    };
    for fx in fixtures.iter().take(n) {
        let (Some(venue), Some(opponent_id), Some((gf, ga))) = (
            fx.venue_of(team_id),
            fx.opponent_of(team_id),
            fx.goals_for_against(team_id),
        ) else {
            continue;
        };
        let outcome = MatchOutcome::from_goals(gf, ga);
        match outcome {
            MatchOutcome::Win => guide.wins += 1,
            MatchOutcome::Draw => guide.draws += 1,
            MatchOutcome::Loss => guide.losses += 1,
        }
        guide.goals_for += gf;
        guide.goals_against += ga;
        guide.points += outcome.points();
        guide.matches.push(FormGuideEntry {
            fixture_id: fx.fixture_id,
            start_time: fx.start_time,
            opponent_id,
            venue,
            goals_for: gf,
            goals_against: ga,
            outcome,
        });
    }
    Ok(guide)
}

/// Validated player rows for `q`, with the requested statistic attached.
pub(crate) fn player_rows(conn: &Connection, q: &FormQuery) -> Result<Vec<Appearance>> {
    q.validate(EntityKind::Player)?;
    let type_id = q.statistic_type_id.ok_or(QueryError::MissingStatistic)?;
    load_player_appearances(conn, &q.scope(), Some(type_id))
}

/// Validated team rows for `q` and `metric`.
pub(crate) fn team_metric_rows(conn: &Connection, q: &FormQuery, metric: TeamMetric) -> Result<Vec<Appearance>> {
    q.validate(EntityKind::Team)?;
    load_team_rows(conn, &q.scope(), q.statistic_type_id, metric)
}

fn load_team_rows(
    conn: &Connection,
    scope: &Scope,
    statistic_type_id: Option<u32>,
    metric: TeamMetric,
) -> Result<Vec<Appearance>> {
    let stat_values = if metric.needs_statistic() {
        let type_id = statistic_type_id.ok_or(QueryError::MissingStatistic)?;
        load_team_stat_values(conn, scope, type_id)?
    } else {
        TeamStatValues::new()
    };
    let fixtures = load_finalized_fixtures(conn, scope)?;
    let mut rows = team_rows(&fixtures, metric, &stat_values)?;
    // Entity filter applies after pairing.
    if let Some(entity_id) = scope.entity_id {
        rows.retain(|r| r.entity_id == entity_id);
    }
    Ok(rows)
}

/// Qualified evaluations as ranked results. Entities without a resolvable team
/// are dropped.
pub(crate) fn qualified_results(
    evals: &[WindowEvaluation],
    team_of: impl Fn(u32) -> Option<u32>,
    limit: Option<usize>,
) -> Vec<QualificationResult> {
    let mut out: Vec<QualificationResult> = evals
        .iter()
        .filter(|e| e.qualified)
        .filter_map(|e| {
            let aggregate = e.aggregate.clone()?;
            let team_id = team_of(e.entity_id())?;
            Some(QualificationResult::from_aggregate(e.entity_id(), team_id, aggregate))
        })
        .collect();
    rank_results(&mut out);
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}
