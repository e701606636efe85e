use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{Appearance, StoredFixture, Venue, day_bounds, format_timestamp, parse_timestamp};
use crate::params::Scope;
use crate::team_rows::TeamStatValues;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .context("enable WAL journal")?;
    debug!(path = %path.display(), journal_mode = %mode, "event store opened");
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            fixture_id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            season_id INTEGER NULL,
            start_time TEXT NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fixtures_league_start ON fixtures(league_id, start_time);

        CREATE TABLE IF NOT EXISTS appearances (
            player_id INTEGER NOT NULL,
            fixture_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            is_starter INTEGER NULL,
            minutes_played INTEGER NULL,
            PRIMARY KEY (player_id, fixture_id)
        );
        CREATE INDEX IF NOT EXISTS idx_appearances_fixture ON appearances(fixture_id);
        CREATE INDEX IF NOT EXISTS idx_appearances_team ON appearances(team_id);

        CREATE TABLE IF NOT EXISTS player_stat_values (
            player_id INTEGER NOT NULL,
            fixture_id INTEGER NOT NULL,
            type_id INTEGER NOT NULL,
            value REAL NULL,
            PRIMARY KEY (player_id, fixture_id, type_id)
        );

        CREATE TABLE IF NOT EXISTS team_stat_values (
            team_id INTEGER NOT NULL,
            fixture_id INTEGER NOT NULL,
            type_id INTEGER NOT NULL,
            value REAL NULL,
            PRIMARY KEY (team_id, fixture_id, type_id)
        );

        CREATE TABLE IF NOT EXISTS likely_roster (
            team_id INTEGER NOT NULL,
            player_id INTEGER NOT NULL,
            confidence REAL NOT NULL,
            last_seen_at TEXT NOT NULL,
            source_fixture_id INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (team_id, player_id)
        );
        CREATE INDEX IF NOT EXISTS idx_likely_roster_player ON likely_roster(player_id);

        CREATE TABLE IF NOT EXISTS import_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            fixtures_upserted INTEGER NOT NULL,
            appearances_upserted INTEGER NOT NULL,
            stat_values_upserted INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceRecord {
    pub player_id: u32,
    pub fixture_id: u64,
    pub team_id: u32,
    #[serde(default)]
    pub is_starter: Option<bool>,
    #[serde(default)]
    pub minutes_played: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatValueRecord {
    pub entity_id: u32,
    pub fixture_id: u64,
    pub type_id: u32,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A batch of upstream records, as handed over by the ingestion pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    #[serde(default)]
    pub fixtures: Vec<StoredFixture>,
    #[serde(default)]
    pub appearances: Vec<AppearanceRecord>,
    #[serde(default)]
    pub player_stats: Vec<StatValueRecord>,
    #[serde(default)]
    pub team_stats: Vec<StatValueRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub fixtures_upserted: usize,
    pub appearances_upserted: usize,
    pub stat_values_upserted: usize,
}

pub fn import_snapshot(conn: &mut Connection, snapshot: &EventSnapshot) -> Result<ImportSummary> {
    let started_at = format_timestamp(Utc::now());
    let tx = conn.transaction().context("begin import transaction")?;
    let mut summary = ImportSummary::default();
    for fx in &snapshot.fixtures {
        upsert_fixture(&tx, fx)?;
        summary.fixtures_upserted += 1;
    }
    for app in &snapshot.appearances {
        upsert_appearance(&tx, app)?;
        summary.appearances_upserted += 1;
    }
    for stat in &snapshot.player_stats {
        upsert_player_stat(&tx, stat)?;
        summary.stat_values_upserted += 1;
    }
    for stat in &snapshot.team_stats {
        upsert_team_stat(&tx, stat)?;
        summary.stat_values_upserted += 1;
    }
    tx.execute(
        "INSERT INTO import_runs(started_at, finished_at, fixtures_upserted, appearances_upserted, stat_values_upserted)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            started_at,
            format_timestamp(Utc::now()),
            summary.fixtures_upserted as i64,
            summary.appearances_upserted as i64,
            summary.stat_values_upserted as i64
        ],
    )
    .context("record import run")?;
    tx.commit().context("commit import transaction")?;
    info!(
        fixtures = summary.fixtures_upserted,
        appearances = summary.appearances_upserted,
        stat_values = summary.stat_values_upserted,
        "snapshot imported"
    );
    Ok(summary)
}

pub fn upsert_fixture(tx: &Transaction<'_>, fx: &StoredFixture) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO fixtures (
            fixture_id, league_id, season_id, start_time, home_team_id, away_team_id,
            home_score, away_score, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(fixture_id) DO UPDATE SET
            league_id = excluded.league_id,
            season_id = excluded.season_id,
            start_time = excluded.start_time,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            updated_at = excluded.updated_at
        "#,
        params![
            fx.fixture_id as i64,
            fx.league_id as i64,
            fx.season_id.map(i64::from),
            format_timestamp(fx.start_time),
            fx.home_team_id as i64,
            fx.away_team_id as i64,
            fx.home_score,
            fx.away_score,
            format_timestamp(Utc::now()),
        ],
    )
    .with_context(|| format!("upsert fixture {}", fx.fixture_id))?;
    Ok(())
}

pub fn upsert_appearance(tx: &Transaction<'_>, app: &AppearanceRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO appearances (player_id, fixture_id, team_id, is_starter, minutes_played)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(player_id, fixture_id) DO UPDATE SET
            team_id = excluded.team_id,
            is_starter = excluded.is_starter,
            minutes_played = excluded.minutes_played
        "#,
        params![
            app.player_id as i64,
            app.fixture_id as i64,
            app.team_id as i64,
            app.is_starter,
            app.minutes_played.map(i64::from),
        ],
    )
    .with_context(|| {
        format!(
            "upsert appearance player={} fixture={}",
            app.player_id, app.fixture_id
        )
    })?;
    Ok(())
}

pub fn upsert_player_stat(tx: &Transaction<'_>, stat: &StatValueRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO player_stat_values (player_id, fixture_id, type_id, value)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(player_id, fixture_id, type_id) DO UPDATE SET value = excluded.value
        "#,
        params![
            stat.entity_id as i64,
            stat.fixture_id as i64,
            stat.type_id as i64,
            stat.value
        ],
    )
    .context("upsert player stat value")?;
    Ok(())
}

pub fn upsert_team_stat(tx: &Transaction<'_>, stat: &StatValueRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO team_stat_values (team_id, fixture_id, type_id, value)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(team_id, fixture_id, type_id) DO UPDATE SET value = excluded.value
        "#,
        params![
            stat.entity_id as i64,
            stat.fixture_id as i64,
            stat.type_id as i64,
            stat.value
        ],
    )
    .context("upsert team stat value")?;
    Ok(())
}

const FIXTURE_COLUMNS: &str = "fixture_id, league_id, season_id, start_time, home_team_id, away_team_id, home_score, away_score";

fn fixture_from_row(row: &Row<'_>) -> rusqlite::Result<Option<StoredFixture>> {
    let raw_start: String = row.get(3)?;
    let Some(start_time) = parse_timestamp(&raw_start) else {
        return Ok(None);
    };
    Ok(Some(StoredFixture {
        fixture_id: row.get::<_, i64>(0)? as u64,
        league_id: row.get::<_, i64>(1)? as u32,
        season_id: row.get::<_, Option<i64>>(2)?.map(|v| v as u32),
        start_time,
        home_team_id: row.get::<_, i64>(4)? as u32,
        away_team_id: row.get::<_, i64>(5)? as u32,
        home_score: row.get(6)?,
        away_score: row.get(7)?,
    }))
}

/// Finalized fixtures (both scores present) in the league/season scope.
pub fn load_finalized_fixtures(conn: &Connection, scope: &Scope) -> Result<Vec<StoredFixture>> {
    let sql = format!(
        "SELECT {FIXTURE_COLUMNS} FROM fixtures
         WHERE league_id = ?1
           AND (?2 IS NULL OR season_id = ?2)
           AND home_score IS NOT NULL
           AND away_score IS NOT NULL"
    );
    let mut stmt = conn.prepare(&sql).context("prepare finalized fixtures")?;
    let rows = stmt
        .query_map(
            params![scope.league_id as i64, scope.season_id.map(i64::from)],
            fixture_from_row,
        )
        .context("query finalized fixtures")?;
    collect_fixtures(rows)
}

/// Fixtures kicking off on `date` (UTC), finished or not.
pub fn load_fixtures_on(conn: &Connection, league_id: u32, date: NaiveDate) -> Result<Vec<StoredFixture>> {
    let (start, end) = day_bounds(date);
    let sql = format!(
        "SELECT {FIXTURE_COLUMNS} FROM fixtures
         WHERE league_id = ?1 AND start_time >= ?2 AND start_time < ?3
         ORDER BY start_time, fixture_id"
    );
    let mut stmt = conn.prepare(&sql).context("prepare fixtures on date")?;
    let rows = stmt
        .query_map(
            params![league_id as i64, format_timestamp(start), format_timestamp(end)],
            fixture_from_row,
        )
        .context("query fixtures on date")?;
    collect_fixtures(rows)
}

fn collect_fixtures(
    rows: impl Iterator<Item = rusqlite::Result<Option<StoredFixture>>>,
) -> Result<Vec<StoredFixture>> {
    let mut out = Vec::new();
    for row in rows {
        match row.context("read fixture row")? {
            Some(fx) => out.push(fx),
            None => warn!("skipping fixture with unparseable start_time"),
        }
    }
    Ok(out)
}

/// Player appearances in finalized fixtures, with the value of `type_id`
/// (absent when no value row exists or the value is null).
pub fn load_player_appearances(
    conn: &Connection,
    scope: &Scope,
    type_id: Option<u32>,
) -> Result<Vec<Appearance>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT a.player_id, a.fixture_id, f.start_time, a.team_id,
                   f.home_team_id, f.away_team_id, a.is_starter, a.minutes_played, v.value
            FROM appearances a
            JOIN fixtures f ON f.fixture_id = a.fixture_id
            LEFT JOIN player_stat_values v
              ON v.player_id = a.player_id AND v.fixture_id = a.fixture_id AND v.type_id = ?3
            WHERE f.league_id = ?1
              AND (?2 IS NULL OR f.season_id = ?2)
              AND (?4 IS NULL OR a.player_id = ?4)
              AND f.home_score IS NOT NULL
              AND f.away_score IS NOT NULL
            "#,
        )
        .context("prepare player appearances")?;
    let rows = stmt
        .query_map(
            params![
                scope.league_id as i64,
                scope.season_id.map(i64::from),
                type_id.map(i64::from),
                scope.entity_id.map(i64::from)
            ],
            |row| {
                let raw_start: String = row.get(2)?;
                let Some(start_time) = parse_timestamp(&raw_start) else {
                    return Ok(None);
                };
                let team_id = row.get::<_, i64>(3)? as u32;
                let home = row.get::<_, i64>(4)? as u32;
                let away = row.get::<_, i64>(5)? as u32;
                let venue = if team_id == home {
                    Some(Venue::Home)
                } else if team_id == away {
                    Some(Venue::Away)
                } else {
                    None
                };
                Ok(Some(Appearance {
                    entity_id: row.get::<_, i64>(0)? as u32,
                    fixture_id: row.get::<_, i64>(1)? as u64,
                    start_time,
                    team_id,
                    venue,
                    is_starter: row.get(6)?,
                    minutes_played: row.get::<_, Option<i64>>(7)?.map(|m| m.max(0) as u32),
                    value: row.get(8)?,
                }))
            },
        )
        .context("query player appearances")?;

    let mut out = Vec::new();
    for row in rows {
        match row.context("read appearance row")? {
            Some(app) => out.push(app),
            None => warn!("skipping appearance with unparseable start_time"),
        }
    }
    Ok(out)
}

pub fn load_team_stat_values(conn: &Connection, scope: &Scope, type_id: u32) -> Result<TeamStatValues> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT v.team_id, v.fixture_id, v.value
            FROM team_stat_values v
            JOIN fixtures f ON f.fixture_id = v.fixture_id
            WHERE f.league_id = ?1
              AND (?2 IS NULL OR f.season_id = ?2)
              AND v.type_id = ?3
            "#,
        )
        .context("prepare team stat values")?;
    let rows = stmt
        .query_map(
            params![
                scope.league_id as i64,
                scope.season_id.map(i64::from),
                type_id as i64
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as u32,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, Option<f64>>(2)?,
                ))
            },
        )
        .context("query team stat values")?;
    let mut out = HashMap::new();
    for row in rows {
        let (team_id, fixture_id, value) = row.context("read team stat row")?;
        out.insert((team_id, fixture_id), value);
    }
    Ok(out)
}

/// Row counts and the latest finalized kickoff for one league.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub league_id: u32,
    pub fixtures: usize,
    pub finalized_fixtures: usize,
    pub latest_finalized_at: Option<DateTime<Utc>>,
    pub appearances: usize,
    pub player_stat_values: usize,
    pub team_stat_values: usize,
    pub roster_entries: usize,
}

pub fn store_summary(conn: &Connection, league_id: u32) -> Result<StoreSummary> {
    let count = |sql: &str| -> Result<usize> {
        conn.query_row(sql, params![league_id as i64], |row| row.get::<_, i64>(0))
            .map(|n| n.max(0) as usize)
            .with_context(|| format!("count rows: {sql}"))
    };
    let fixtures = count("SELECT COUNT(*) FROM fixtures WHERE league_id = ?1")?;
    let finalized_fixtures = count(
        "SELECT COUNT(*) FROM fixtures WHERE league_id = ?1 AND home_score IS NOT NULL AND away_score IS NOT NULL",
    )?;
    let appearances = count(
        "SELECT COUNT(*) FROM appearances a JOIN fixtures f ON f.fixture_id = a.fixture_id WHERE f.league_id = ?1",
    )?;
    let player_stat_values = count(
        "SELECT COUNT(*) FROM player_stat_values v JOIN fixtures f ON f.fixture_id = v.fixture_id WHERE f.league_id = ?1",
    )?;
    let team_stat_values = count(
        "SELECT COUNT(*) FROM team_stat_values v JOIN fixtures f ON f.fixture_id = v.fixture_id WHERE f.league_id = ?1",
    )?;
    let roster_entries = count(
        "SELECT COUNT(*) FROM likely_roster r
         WHERE r.team_id IN (SELECT home_team_id FROM fixtures WHERE league_id = ?1
                             UNION SELECT away_team_id FROM fixtures WHERE league_id = ?1)",
    )?;
    let latest_finalized_at = conn
        .query_row(
            "SELECT MAX(start_time) FROM fixtures
             WHERE league_id = ?1 AND home_score IS NOT NULL AND away_score IS NOT NULL",
            params![league_id as i64],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .context("query latest finalized start_time")?
        .flatten()
        .and_then(|raw| parse_timestamp(&raw));

    Ok(StoreSummary {
        league_id,
        fixtures,
        finalized_fixtures,
        latest_finalized_at,
        appearances,
        player_stat_values,
        team_stat_values,
        roster_entries,
    })
}
