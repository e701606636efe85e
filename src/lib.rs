pub mod aggregate;
pub mod config;
pub mod derived;
pub mod error;
pub mod event_store;
pub mod export;
pub mod forward;
pub mod funnel;
pub mod leaderboard;
pub mod model;
pub mod params;
pub mod queries;
pub mod roster;
pub mod team_rows;
pub mod window;

pub use aggregate::{QualificationResult, results_fingerprint};
pub use error::{PairingError, QueryError};
pub use funnel::{EmptyResultCause, FunnelCounts};
pub use model::{Appearance, EntityKind, StoredFixture, Venue};
pub use params::{FormQuery, LeaderboardQuery, TeamMetric};
pub use roster::{LikelyRosterCache, RefreshRequest, RefreshSummary, RosterPolicy};
