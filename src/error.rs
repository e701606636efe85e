use thiserror::Error;

/// Contract violations caught once at the query boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("window size must be greater than zero")]
    InvalidWindowSize,

    #[error("threshold must be a finite, non-negative number (got {0})")]
    InvalidThreshold(f64),

    #[error("minimum average must be a finite, non-negative number (got {0})")]
    InvalidMinimumAverage(f64),

    #[error("required hit count {required} exceeds window size {window}")]
    RequiredHitsExceedWindow { required: usize, window: usize },

    #[error("required hit count given without a threshold")]
    MissingThreshold,

    #[error("a statistic type id is required for this metric")]
    MissingStatistic,

    #[error("home_only and away_only cannot both be set")]
    ConflictingVenueFilters,

    #[error("fixture range starts after it ends ({from} > {until})")]
    InvalidDateRange { from: String, until: String },

    #[error("result limit must be greater than zero")]
    InvalidResultLimit,

    #[error("recency cutoff of {0} days reaches before the earliest representable date")]
    InvalidRecencyCutoff(u32),

    #[error("roster lookback depth must be greater than zero")]
    InvalidLookback,

    #[error("confidence must lie within [0, 1] (got {0})")]
    InvalidConfidence(f64),

    #[error("filter `{0}` does not apply to team queries")]
    NotApplicable(&'static str),
}

/// Raised when a fixture cannot be paired into exactly two distinct sides.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("fixture {fixture_id} has more than two participants")]
    TooManyParticipants { fixture_id: u64 },

    #[error("fixture {fixture_id} lists team {team_id} twice")]
    DuplicateParticipant { fixture_id: u64, team_id: u32 },
}
