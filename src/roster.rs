//! Likely-roster cache: a materialized guess of who currently plays for which
//! team, built from each team's most recent finished fixtures.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::QueryError;
use crate::event_store::{load_finalized_fixtures, load_player_appearances};
use crate::model::{Appearance, StoredFixture, format_timestamp, parse_timestamp};
use crate::params::{RecencyCutoff, Scope};

pub const DEFAULT_STARTER_CONFIDENCE: f64 = 1.0;
pub const DEFAULT_BENCH_CONFIDENCE: f64 = 0.6;

/// Confidence assigned to each kind of recent appearance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RosterPolicy {
    pub starter_confidence: f64,
    /// Non-starters who still played minutes.
    pub bench_confidence: f64,
}

impl Default for RosterPolicy {
    fn default() -> Self {
        Self {
            starter_confidence: DEFAULT_STARTER_CONFIDENCE,
            bench_confidence: DEFAULT_BENCH_CONFIDENCE,
        }
    }
}

impl RosterPolicy {
    pub fn new(starter_confidence: f64, bench_confidence: f64) -> Result<Self, QueryError> {
        for c in [starter_confidence, bench_confidence] {
            if !(0.0..=1.0).contains(&c) {
                return Err(QueryError::InvalidConfidence(c));
            }
        }
        Ok(Self {
            starter_confidence,
            bench_confidence,
        })
    }

    /// `None` when the appearance carries no signal (unused substitute).
    pub fn confidence_for(&self, row: &Appearance) -> Option<f64> {
        if row.is_starter == Some(true) {
            Some(self.starter_confidence)
        } else if row.minutes_played.unwrap_or(0) > 0 {
            Some(self.bench_confidence)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub league_id: u32,
    pub recency_cutoff_days: u32,
    pub lookback_depth: usize,
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

impl RefreshRequest {
    pub fn new(league_id: u32, recency_cutoff_days: u32, lookback_depth: usize) -> Self {
        Self {
            league_id,
            recency_cutoff_days,
            lookback_depth,
            as_of: None,
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.lookback_depth == 0 {
            return Err(QueryError::InvalidLookback);
        }
        RecencyCutoff::checked_calendar_days(self.as_of.unwrap_or_else(Utc::now), self.recency_cutoff_days)?;
        Ok(())
    }

    fn cutoff(&self) -> RecencyCutoff {
        RecencyCutoff::calendar_days(self.as_of.unwrap_or_else(Utc::now), self.recency_cutoff_days)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Rows inserted or changed; zero when the cache already matched.
    pub merged: usize,
    pub candidates: usize,
    pub teams: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikelyRosterEntry {
    pub team_id: u32,
    pub player_id: u32,
    pub confidence: f64,
    pub last_seen_at: DateTime<Utc>,
    pub source_fixture_id: u64,
    pub updated_at: DateTime<Utc>,
}

/// A projected (team, player) signal before it is merged into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSignal {
    pub team_id: u32,
    pub player_id: u32,
    pub confidence: f64,
    pub last_seen_at: DateTime<Utc>,
    pub source_fixture_id: u64,
}

/// Each team's `lookback` most recent fixtures (same order as window selection)
/// whose kickoff passes `cutoff`.
pub fn recent_fixtures_by_team(
    fixtures: &[StoredFixture],
    cutoff: &RecencyCutoff,
    lookback: usize,
) -> HashMap<u32, HashSet<u64>> {
    let mut by_team: HashMap<u32, Vec<&StoredFixture>> = HashMap::new();
    for fx in fixtures
        .iter()
        .filter(|fx| fx.is_finalized() && cutoff.admits(fx.start_time))
    {
        by_team.entry(fx.home_team_id).or_default().push(fx);
        by_team.entry(fx.away_team_id).or_default().push(fx);
    }
    by_team
        .into_iter()
        .map(|(team_id, mut list)| {
            list.sort_by(|a, b| {
                b.start_time
                    .cmp(&a.start_time)
                    .then_with(|| b.fixture_id.cmp(&a.fixture_id))
            });
            let ids = list.into_iter().take(lookback).map(|fx| fx.fixture_id).collect();
            (team_id, ids)
        })
        .collect()
}

/// Keeps the single most recent signal per (team, player): later kickoff wins,
/// then higher confidence, then higher fixture id. Output is sorted by key.
pub fn project_roster(
    appearances: &[Appearance],
    recent: &HashMap<u32, HashSet<u64>>,
    policy: &RosterPolicy,
) -> Vec<RosterSignal> {
    let mut best: HashMap<(u32, u32), RosterSignal> = HashMap::new();
    for row in appearances {
        let in_recent = recent
            .get(&row.team_id)
            .is_some_and(|ids| ids.contains(&row.fixture_id));
        if !in_recent {
            continue;
        }
        let Some(confidence) = policy.confidence_for(row) else {
            continue;
        };
        let signal = RosterSignal {
            team_id: row.team_id,
            player_id: row.entity_id,
            confidence,
            last_seen_at: row.start_time,
            source_fixture_id: row.fixture_id,
        };
        best.entry((row.team_id, row.entity_id))
            .and_modify(|current| {
                if supersedes(&signal, current) {
                    *current = signal.clone();
                }
            })
            .or_insert(signal);
    }
    let mut out: Vec<RosterSignal> = best.into_values().collect();
    out.sort_by_key(|s| (s.team_id, s.player_id));
    out
}

fn supersedes(candidate: &RosterSignal, current: &RosterSignal) -> bool {
    candidate
        .last_seen_at
        .cmp(&current.last_seen_at)
        .then_with(|| {
            candidate
                .confidence
                .partial_cmp(&current.confidence)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| candidate.source_fixture_id.cmp(&current.source_fixture_id))
        == Ordering::Greater
}

/// Owns refresh of the `likely_roster` table. Refreshes through one cache are
/// single-flight; the write transaction is `IMMEDIATE` so separate processes
/// serialize on the SQLite write lock as well.
#[derive(Debug, Default)]
pub struct LikelyRosterCache {
    policy: RosterPolicy,
    refresh_lock: Mutex<()>,
}

impl LikelyRosterCache {
    pub fn new(policy: RosterPolicy) -> Self {
        Self {
            policy,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RosterPolicy {
        &self.policy
    }

    pub fn refresh(&self, conn: &mut Connection, req: &RefreshRequest) -> Result<RefreshSummary> {
        req.validate()?;
        let _guard = self
            .refresh_lock
            .lock()
            .map_err(|_| anyhow!("roster refresh lock poisoned"))?;

        let scope = Scope {
            league_id: req.league_id,
            season_id: None,
            entity_id: None,
        };
        let fixtures = load_finalized_fixtures(conn, &scope)?;
        let recent = recent_fixtures_by_team(&fixtures, &req.cutoff(), req.lookback_depth);
        let appearances = load_player_appearances(conn, &scope, None)?;
        let signals = project_roster(&appearances, &recent, &self.policy);
        debug!(
            league_id = req.league_id,
            teams = recent.len(),
            signals = signals.len(),
            "roster projection built"
        );
        if recent.is_empty() {
            warn!(league_id = req.league_id, "no finished fixtures inside roster cutoff");
        }

        let updated_at = format_timestamp(Utc::now());
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin roster refresh transaction")?;
        let mut merged = 0usize;
        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO likely_roster (
                        team_id, player_id, confidence, last_seen_at, source_fixture_id, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(team_id, player_id) DO UPDATE SET
                        confidence = excluded.confidence,
                        last_seen_at = excluded.last_seen_at,
                        source_fixture_id = excluded.source_fixture_id,
                        updated_at = excluded.updated_at
                    WHERE likely_roster.confidence IS NOT excluded.confidence
                       OR likely_roster.last_seen_at IS NOT excluded.last_seen_at
                       OR likely_roster.source_fixture_id IS NOT excluded.source_fixture_id
                    "#,
                )
                .context("prepare likely_roster upsert")?;
            for s in &signals {
                merged += stmt
                    .execute(params![
                        s.team_id as i64,
                        s.player_id as i64,
                        s.confidence,
                        format_timestamp(s.last_seen_at),
                        s.source_fixture_id as i64,
                        updated_at,
                    ])
                    .with_context(|| {
                        format!("upsert likely_roster team={} player={}", s.team_id, s.player_id)
                    })?;
            }
        }
        tx.commit().context("commit roster refresh")?;

        let summary = RefreshSummary {
            merged,
            candidates: signals.len(),
            teams: recent.len(),
        };
        info!(
            league_id = req.league_id,
            merged = summary.merged,
            candidates = summary.candidates,
            teams = summary.teams,
            "likely roster refreshed"
        );
        Ok(summary)
    }

    /// Entries of one team, highest confidence first.
    pub fn entries_for_team(&self, conn: &Connection, team_id: u32) -> Result<Vec<LikelyRosterEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT team_id, player_id, confidence, last_seen_at, source_fixture_id, updated_at
                 FROM likely_roster WHERE team_id = ?1
                 ORDER BY confidence DESC, last_seen_at DESC, player_id ASC",
            )
            .context("prepare roster by team")?;
        let rows = stmt
            .query_map(params![team_id as i64], entry_from_row)
            .context("query roster by team")?;
        collect_entries(rows)
    }

    pub fn entry(&self, conn: &Connection, team_id: u32, player_id: u32) -> Result<Option<LikelyRosterEntry>> {
        let entry = conn
            .query_row(
                "SELECT team_id, player_id, confidence, last_seen_at, source_fixture_id, updated_at
                 FROM likely_roster WHERE team_id = ?1 AND player_id = ?2",
                params![team_id as i64, player_id as i64],
                entry_from_row,
            )
            .optional()
            .context("query roster entry")?;
        Ok(entry.flatten())
    }

    pub fn all_entries(&self, conn: &Connection) -> Result<Vec<LikelyRosterEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT team_id, player_id, confidence, last_seen_at, source_fixture_id, updated_at
                 FROM likely_roster ORDER BY team_id, player_id",
            )
            .context("prepare roster scan")?;
        let rows = stmt.query_map([], entry_from_row).context("query roster scan")?;
        collect_entries(rows)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Option<LikelyRosterEntry>> {
    let last_seen: String = row.get(3)?;
    let updated: String = row.get(5)?;
    let (Some(last_seen_at), Some(updated_at)) = (parse_timestamp(&last_seen), parse_timestamp(&updated))
    else {
        return Ok(None);
    };
    Ok(Some(LikelyRosterEntry {
        team_id: row.get::<_, i64>(0)? as u32,
        player_id: row.get::<_, i64>(1)? as u32,
        confidence: row.get(2)?,
        last_seen_at,
        source_fixture_id: row.get::<_, i64>(4)? as u64,
        updated_at,
    }))
}

fn collect_entries(
    rows: impl Iterator<Item = rusqlite::Result<Option<LikelyRosterEntry>>>,
) -> Result<Vec<LikelyRosterEntry>> {
    let mut out = Vec::new();
    for row in rows {
        match row.context("read roster row")? {
            Some(entry) => out.push(entry),
            None => warn!("skipping roster row with unparseable timestamp"),
        }
    }
    Ok(out)
}
