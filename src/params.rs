use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::model::{Appearance, EntityKind, Venue, format_timestamp};

/// Parameter set for windowed and funnel operations. Every optional field means
/// "no constraint" when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormQuery {
    pub league_id: u32,
    pub window_size: usize,
    #[serde(default)]
    pub statistic_type_id: Option<u32>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub required_hit_count: Option<usize>,
    #[serde(default)]
    pub minimum_average: Option<f64>,
    #[serde(default)]
    pub started_only: bool,
    #[serde(default)]
    pub minimum_minutes: Option<u32>,
    #[serde(default)]
    pub season_id: Option<u32>,
    #[serde(default)]
    pub recency_cutoff_days: Option<u32>,
    #[serde(default)]
    pub home_only: bool,
    #[serde(default)]
    pub away_only: bool,
    #[serde(default)]
    pub specific_entity_id: Option<u32>,
    #[serde(default)]
    pub specific_team_id: Option<u32>,
    #[serde(default)]
    pub fixtures_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fixtures_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result_limit: Option<usize>,
    /// Reference instant for the recency cutoff; `None` means now.
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

impl FormQuery {
    pub fn new(league_id: u32, window_size: usize) -> Self {
        Self {
            league_id,
            window_size,
            statistic_type_id: None,
            threshold: None,
            required_hit_count: None,
            minimum_average: None,
            started_only: false,
            minimum_minutes: None,
            season_id: None,
            recency_cutoff_days: None,
            home_only: false,
            away_only: false,
            specific_entity_id: None,
            specific_team_id: None,
            fixtures_from: None,
            fixtures_until: None,
            result_limit: None,
            as_of: None,
        }
    }

    pub fn with_statistic(mut self, type_id: u32) -> Self {
        self.statistic_type_id = Some(type_id);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_required_hits(mut self, required: usize) -> Self {
        self.required_hit_count = Some(required);
        self
    }

    pub fn with_minimum_average(mut self, minimum: f64) -> Self {
        self.minimum_average = Some(minimum);
        self
    }

    pub fn with_season(mut self, season_id: u32) -> Self {
        self.season_id = Some(season_id);
        self
    }

    pub fn with_recency_cutoff(mut self, days: u32, as_of: DateTime<Utc>) -> Self {
        self.recency_cutoff_days = Some(days);
        self.as_of = Some(as_of);
        self
    }

    pub fn starters_only(mut self) -> Self {
        self.started_only = true;
        self
    }

    pub fn with_minimum_minutes(mut self, minutes: u32) -> Self {
        self.minimum_minutes = Some(minutes);
        self
    }

    pub fn home(mut self) -> Self {
        self.home_only = true;
        self
    }

    pub fn away(mut self) -> Self {
        self.away_only = true;
        self
    }

    pub fn for_entity(mut self, entity_id: u32) -> Self {
        self.specific_entity_id = Some(entity_id);
        self
    }

    pub fn for_team(mut self, team_id: u32) -> Self {
        self.specific_team_id = Some(team_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.result_limit = Some(limit);
        self
    }

    pub fn validate(&self, kind: EntityKind) -> Result<(), QueryError> {
        if self.window_size == 0 {
            return Err(QueryError::InvalidWindowSize);
        }
        if let Some(threshold) = self.threshold
            && (!threshold.is_finite() || threshold < 0.0)
        {
            return Err(QueryError::InvalidThreshold(threshold));
        }
        if let Some(minimum) = self.minimum_average
            && (!minimum.is_finite() || minimum < 0.0)
        {
            return Err(QueryError::InvalidMinimumAverage(minimum));
        }
        if let Some(required) = self.required_hit_count {
            if self.threshold.is_none() {
                return Err(QueryError::MissingThreshold);
            }
            if required > self.window_size {
                return Err(QueryError::RequiredHitsExceedWindow {
                    required,
                    window: self.window_size,
                });
            }
        }
        if self.home_only && self.away_only {
            return Err(QueryError::ConflictingVenueFilters);
        }
        validate_range(self.fixtures_from, self.fixtures_until)?;
        if let Some(days) = self.recency_cutoff_days {
            RecencyCutoff::checked_calendar_days(self.as_of.unwrap_or_else(Utc::now), days)?;
        }
        if self.result_limit == Some(0) {
            return Err(QueryError::InvalidResultLimit);
        }
        if kind == EntityKind::Team {
            if self.started_only {
                return Err(QueryError::NotApplicable("started_only"));
            }
            if self.minimum_minutes.is_some() {
                return Err(QueryError::NotApplicable("minimum_minutes"));
            }
        }
        Ok(())
    }

    pub fn scope(&self) -> Scope {
        Scope {
            league_id: self.league_id,
            season_id: self.season_id,
            entity_id: self.specific_entity_id,
        }
    }

    pub fn eligibility(&self) -> Eligibility {
        Eligibility {
            started_only: self.started_only,
            minimum_minutes: self.minimum_minutes,
            team_id: self.specific_team_id,
            venue: venue_filter(self.home_only, self.away_only),
            from: self.fixtures_from,
            until: self.fixtures_until,
        }
    }

    pub fn recency(&self) -> Option<RecencyCutoff> {
        let days = self.recency_cutoff_days?;
        let as_of = self.as_of.unwrap_or_else(Utc::now);
        Some(RecencyCutoff::calendar_days(as_of, days))
    }

    pub fn criteria(&self) -> WindowCriteria {
        WindowCriteria {
            window_size: self.window_size,
            eligibility: self.eligibility(),
            recency: self.recency(),
            threshold: self.threshold,
            required_hit_count: self.required_hit_count,
            minimum_average: self.minimum_average,
        }
    }
}

/// Store-level scope: which rows are loaded before any windowing happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub league_id: u32,
    pub season_id: Option<u32>,
    pub entity_id: Option<u32>,
}

/// Per-event eligibility predicate shared by every windowed path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Eligibility {
    pub started_only: bool,
    pub minimum_minutes: Option<u32>,
    pub team_id: Option<u32>,
    pub venue: Option<Venue>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Eligibility {
    pub fn admits(&self, row: &Appearance) -> bool {
        if self.started_only && row.is_starter != Some(true) {
            return false;
        }
        if let Some(minimum) = self.minimum_minutes
            && row.minutes_played.unwrap_or(0) < minimum
        {
            return false;
        }
        if let Some(team_id) = self.team_id
            && row.team_id != team_id
        {
            return false;
        }
        if let Some(venue) = self.venue
            && row.venue != Some(venue)
        {
            return false;
        }
        if let Some(from) = self.from
            && row.start_time < from
        {
            return false;
        }
        if let Some(until) = self.until
            && row.start_time > until
        {
            return false;
        }
        true
    }
}

/// Calendar-day cutoff, normalized to UTC dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyCutoff {
    pub earliest_date: NaiveDate,
}

impl RecencyCutoff {
    /// Clamps to the earliest representable date when `days` reaches past it.
    pub fn calendar_days(as_of: DateTime<Utc>, days: u32) -> Self {
        Self::checked_calendar_days(as_of, days).unwrap_or(Self {
            earliest_date: NaiveDate::MIN,
        })
    }

    pub fn checked_calendar_days(as_of: DateTime<Utc>, days: u32) -> Result<Self, QueryError> {
        as_of
            .date_naive()
            .checked_sub_days(Days::new(u64::from(days)))
            .map(|earliest_date| Self { earliest_date })
            .ok_or(QueryError::InvalidRecencyCutoff(days))
    }

    pub fn admits(&self, latest: DateTime<Utc>) -> bool {
        latest.date_naive() >= self.earliest_date
    }
}

/// Everything the shared selector, gate and aggregator need, independent of
/// where the rows came from.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCriteria {
    pub window_size: usize,
    pub eligibility: Eligibility,
    pub recency: Option<RecencyCutoff>,
    pub threshold: Option<f64>,
    pub required_hit_count: Option<usize>,
    pub minimum_average: Option<f64>,
}

/// Value selected for a team row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamMetric {
    Stat,
    StatConceded,
    StatMatchTotal,
    GoalsFor,
    GoalsAgainst,
    TotalGoals,
    CleanSheet,
    BothTeamsScored,
    Win,
}

impl TeamMetric {
    pub fn needs_statistic(self) -> bool {
        matches!(
            self,
            TeamMetric::Stat | TeamMetric::StatConceded | TeamMetric::StatMatchTotal
        )
    }

    /// Metric describing what the opponent allows for the same quantity.
    pub fn conceded_counterpart(self) -> TeamMetric {
        match self {
            TeamMetric::Stat => TeamMetric::StatConceded,
            TeamMetric::StatConceded => TeamMetric::Stat,
            TeamMetric::GoalsFor => TeamMetric::GoalsAgainst,
            TeamMetric::GoalsAgainst => TeamMetric::GoalsFor,
            other => other,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let metric = match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stat" => TeamMetric::Stat,
            "stat_conceded" | "conceded" => TeamMetric::StatConceded,
            "stat_match_total" | "match_total" => TeamMetric::StatMatchTotal,
            "goals_for" | "gf" => TeamMetric::GoalsFor,
            "goals_against" | "ga" => TeamMetric::GoalsAgainst,
            "total_goals" => TeamMetric::TotalGoals,
            "clean_sheet" => TeamMetric::CleanSheet,
            "btts" | "both_teams_scored" => TeamMetric::BothTeamsScored,
            "win" => TeamMetric::Win,
            _ => return None,
        };
        Some(metric)
    }
}

/// Parameters for the cumulative, non-windowed leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    pub league_id: u32,
    #[serde(default)]
    pub season_id: Option<u32>,
    #[serde(default)]
    pub statistic_type_id: Option<u32>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub started_only: bool,
    #[serde(default)]
    pub minimum_minutes: Option<u32>,
    #[serde(default)]
    pub minimum_games: Option<usize>,
    #[serde(default)]
    pub home_only: bool,
    #[serde(default)]
    pub away_only: bool,
    #[serde(default)]
    pub specific_entity_id: Option<u32>,
    #[serde(default)]
    pub fixtures_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fixtures_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result_limit: Option<usize>,
}

impl LeaderboardQuery {
    pub fn new(league_id: u32) -> Self {
        Self {
            league_id,
            season_id: None,
            statistic_type_id: None,
            threshold: None,
            started_only: false,
            minimum_minutes: None,
            minimum_games: None,
            home_only: false,
            away_only: false,
            specific_entity_id: None,
            fixtures_from: None,
            fixtures_until: None,
            result_limit: None,
        }
    }

    pub fn with_statistic(mut self, type_id: u32) -> Self {
        self.statistic_type_id = Some(type_id);
        self
    }

    pub fn with_season(mut self, season_id: u32) -> Self {
        self.season_id = Some(season_id);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.result_limit = Some(limit);
        self
    }

    pub fn validate(&self, kind: EntityKind) -> Result<(), QueryError> {
        if let Some(threshold) = self.threshold
            && (!threshold.is_finite() || threshold < 0.0)
        {
            return Err(QueryError::InvalidThreshold(threshold));
        }
        if self.home_only && self.away_only {
            return Err(QueryError::ConflictingVenueFilters);
        }
        validate_range(self.fixtures_from, self.fixtures_until)?;
        if self.result_limit == Some(0) {
            return Err(QueryError::InvalidResultLimit);
        }
        if kind == EntityKind::Team {
            if self.started_only {
                return Err(QueryError::NotApplicable("started_only"));
            }
            if self.minimum_minutes.is_some() {
                return Err(QueryError::NotApplicable("minimum_minutes"));
            }
        }
        Ok(())
    }

    pub fn scope(&self) -> Scope {
        Scope {
            league_id: self.league_id,
            season_id: self.season_id,
            entity_id: self.specific_entity_id,
        }
    }

    pub fn eligibility(&self) -> Eligibility {
        Eligibility {
            started_only: self.started_only,
            minimum_minutes: self.minimum_minutes,
            team_id: None,
            venue: venue_filter(self.home_only, self.away_only),
            from: self.fixtures_from,
            until: self.fixtures_until,
        }
    }
}

fn venue_filter(home_only: bool, away_only: bool) -> Option<Venue> {
    match (home_only, away_only) {
        (true, false) => Some(Venue::Home),
        (false, true) => Some(Venue::Away),
        _ => None,
    }
}

fn validate_range(
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<(), QueryError> {
    if let (Some(from), Some(until)) = (from, until)
        && from > until
    {
        return Err(QueryError::InvalidDateRange {
            from: format_timestamp(from),
            until: format_timestamp(until),
        });
    }
    Ok(())
}
