use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    pub fn as_str(self) -> &'static str {
        match self {
            Venue::Home => "home",
            Venue::Away => "away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Team,
}

/// One row per (entity, fixture). `value` is the requested statistic and may be
/// absent even though the appearance happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub entity_id: u32,
    pub fixture_id: u64,
    pub start_time: DateTime<Utc>,
    pub team_id: u32,
    pub venue: Option<Venue>,
    pub is_starter: Option<bool>,
    pub minutes_played: Option<u32>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFixture {
    pub fixture_id: u64,
    pub league_id: u32,
    pub season_id: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

impl StoredFixture {
    /// Only fixtures with both final scores are eligible input.
    pub fn is_finalized(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    pub fn venue_of(&self, team_id: u32) -> Option<Venue> {
        if team_id == self.home_team_id {
            Some(Venue::Home)
        } else if team_id == self.away_team_id {
            Some(Venue::Away)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, team_id: u32) -> Option<u32> {
        match self.venue_of(team_id)? {
            Venue::Home => Some(self.away_team_id),
            Venue::Away => Some(self.home_team_id),
        }
    }

    /// (goals for, goals against) from `team_id`'s point of view.
    pub fn goals_for_against(&self, team_id: u32) -> Option<(i32, i32)> {
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return None;
        };
        match self.venue_of(team_id)? {
            Venue::Home => Some((home, away)),
            Venue::Away => Some((away, home)),
        }
    }
}

/// Stored form of every timestamp. Kickoffs are whole seconds: sub-second
/// parts are dropped so that text order stays chronological, and fixtures
/// sharing a second fall back to fixture id.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Half-open UTC bounds `[start, next day start)` of a calendar date.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(home_score: Option<i32>, away_score: Option<i32>) -> StoredFixture {
        StoredFixture {
            fixture_id: 1,
            league_id: 8,
            season_id: None,
            start_time: parse_timestamp("2025-03-01T15:00:00Z").unwrap(),
            home_team_id: 10,
            away_team_id: 20,
            home_score,
            away_score,
        }
    }

    #[test]
    fn timestamps_round_trip_in_utc() {
        let ts = parse_timestamp("2025-03-01T16:00:00+01:00").unwrap();
        assert_eq!(format_timestamp(ts), "2025-03-01T15:00:00Z");
    }

    #[test]
    fn goals_are_seen_from_each_side() {
        let fx = fixture(Some(2), Some(1));
        assert!(fx.is_finalized());
        assert_eq!(fx.goals_for_against(10), Some((2, 1)));
        assert_eq!(fx.goals_for_against(20), Some((1, 2)));
        assert_eq!(fx.goals_for_against(30), None);
        assert_eq!(fx.opponent_of(20), Some(10));
    }

    #[test]
    fn unfinished_fixture_is_not_finalized() {
        assert!(!fixture(Some(1), None).is_finalized());
    }
}
