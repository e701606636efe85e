use std::collections::HashMap;

use anyhow::Result;

use crate::derived::FixturePairing;
use crate::model::{Appearance, StoredFixture, Venue};
use crate::params::TeamMetric;

/// Raw team statistic per (team_id, fixture_id); `None` when recorded as null.
pub type TeamStatValues = HashMap<(u32, u64), Option<f64>>;

/// Two rows per finalized fixture, one per side, carrying `metric` as the value.
pub fn team_rows(
    fixtures: &[StoredFixture],
    metric: TeamMetric,
    stat_values: &TeamStatValues,
) -> Result<Vec<Appearance>> {
    let raw = side_rows(fixtures, |fx, team_id| match metric {
        TeamMetric::Stat | TeamMetric::StatConceded | TeamMetric::StatMatchTotal => {
            stat_values.get(&(team_id, fx.fixture_id)).copied().flatten()
        }
        _ => score_metric(fx, team_id, metric),
    });

    let rows = match metric {
        TeamMetric::StatConceded => FixturePairing::build(&raw)?.conceded_rows(),
        TeamMetric::StatMatchTotal => FixturePairing::build(&raw)?.match_total_rows(),
        _ => raw,
    };
    Ok(rows)
}

fn side_rows(
    fixtures: &[StoredFixture],
    mut value_of: impl FnMut(&StoredFixture, u32) -> Option<f64>,
) -> Vec<Appearance> {
    let mut out = Vec::with_capacity(fixtures.len() * 2);
    for fx in fixtures.iter().filter(|fx| fx.is_finalized()) {
        for (team_id, venue) in [
            (fx.home_team_id, Venue::Home),
            (fx.away_team_id, Venue::Away),
        ] {
            out.push(Appearance {
                entity_id: team_id,
                fixture_id: fx.fixture_id,
                start_time: fx.start_time,
                team_id,
                venue: Some(venue),
                is_starter: None,
                minutes_played: None,
                value: value_of(fx, team_id),
            });
        }
    }
    out
}

fn score_metric(fx: &StoredFixture, team_id: u32, metric: TeamMetric) -> Option<f64> {
    let (gf, ga) = fx.goals_for_against(team_id)?;
    let value = match metric {
        TeamMetric::GoalsFor => f64::from(gf),
        TeamMetric::GoalsAgainst => f64::from(ga),
        TeamMetric::TotalGoals => f64::from(gf + ga),
        TeamMetric::CleanSheet => flag(ga == 0),
        TeamMetric::BothTeamsScored => flag(gf > 0 && ga > 0),
        TeamMetric::Win => flag(gf > ga),
        TeamMetric::Stat | TeamMetric::StatConceded | TeamMetric::StatMatchTotal => return None,
    };
    Some(value)
}

fn flag(v: bool) -> f64 {
    if v { 1.0 } else { 0.0 }
}
