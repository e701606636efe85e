#![allow(dead_code)]

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;

use form_engine::StoredFixture;
use form_engine::event_store::{
    AppearanceRecord, EventSnapshot, StatValueRecord, import_snapshot, init_schema,
};

pub const LEAGUE: u32 = 8;
pub const SEASON: u32 = 2025;
pub const GOALS: u32 = 52;
pub const SHOTS: u32 = 42;

/// Kickoff at 15:00 UTC, `day` days after 2025-01-01.
pub fn kickoff(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 15, 0, 0).unwrap() + Duration::days(day)
}

pub fn date(day: i64) -> NaiveDate {
    kickoff(day).date_naive()
}

/// Builds an in-memory event store through the public import path.
pub struct Seed {
    pub conn: Connection,
    pending: EventSnapshot,
    fixtures: HashSet<u64>,
}

impl Seed {
    pub fn new() -> Self {
        Self::with_connection(Connection::open_in_memory().unwrap())
    }

    pub fn with_connection(conn: Connection) -> Self {
        init_schema(&conn).unwrap();
        Self {
            conn,
            pending: EventSnapshot::default(),
            fixtures: HashSet::new(),
        }
    }

    pub fn fixture(&mut self, id: u64, day: i64, home: u32, away: u32, score: Option<(i32, i32)>) -> &mut Self {
        self.fixtures.insert(id);
        self.pending.fixtures.push(StoredFixture {
            fixture_id: id,
            league_id: LEAGUE,
            season_id: Some(SEASON),
            start_time: kickoff(day),
            home_team_id: home,
            away_team_id: away,
            home_score: score.map(|s| s.0),
            away_score: score.map(|s| s.1),
        });
        self
    }

    pub fn appearance(&mut self, player: u32, fixture: u64, team: u32, starter: bool, minutes: u32) -> &mut Self {
        self.pending.appearances.push(AppearanceRecord {
            player_id: player,
            fixture_id: fixture,
            team_id: team,
            is_starter: Some(starter),
            minutes_played: Some(minutes),
        });
        self
    }

    pub fn player_stat(&mut self, player: u32, fixture: u64, type_id: u32, value: Option<f64>) -> &mut Self {
        self.pending.player_stats.push(StatValueRecord {
            entity_id: player,
            fixture_id: fixture,
            type_id,
            value,
        });
        self
    }

    pub fn team_stat(&mut self, team: u32, fixture: u64, type_id: u32, value: Option<f64>) -> &mut Self {
        self.pending.team_stats.push(StatValueRecord {
            entity_id: team,
            fixture_id: fixture,
            type_id,
            value,
        });
        self
    }

    /// A started, full 90 for `player` at home for `team` in fixture `id`
    /// (created against team 999 if not seeded yet), with a GOALS value unless
    /// `value` is `None`.
    pub fn game(&mut self, player: u32, team: u32, id: u64, day: i64, value: Option<f64>) -> &mut Self {
        if !self.fixtures.contains(&id) {
            self.fixture(id, day, team, 999, Some((1, 1)));
        }
        self.appearance(player, id, team, true, 90);
        if let Some(v) = value {
            self.player_stat(player, id, GOALS, Some(v));
        }
        self
    }

    /// Games on consecutive days, `values` newest first, ending on `last_day`.
    pub fn series(&mut self, player: u32, team: u32, first_id: u64, last_day: i64, values: &[Option<f64>]) -> &mut Self {
        for (idx, value) in values.iter().enumerate() {
            let id = first_id + (values.len() - 1 - idx) as u64;
            self.game(player, team, id, last_day - idx as i64, *value);
        }
        self
    }

    pub fn commit(&mut self) -> &mut Self {
        let snapshot = std::mem::take(&mut self.pending);
        import_snapshot(&mut self.conn, &snapshot).unwrap();
        self
    }
}
