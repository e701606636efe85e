mod common;

use common::{LEAGUE, SHOTS, Seed};
use form_engine::queries::{team_form, team_form_guide, team_funnel, team_leaderboard};
use form_engine::{FormQuery, LeaderboardQuery, QueryError, TeamMetric};

/// Team 10 newest first: at 20 (3-2), v 30 (0-1), at 30 (1-1), v 20 (2-0);
/// plus one unfinished fixture.
fn seeded() -> Seed {
    let mut seed = Seed::new();
    seed.fixture(1, 1, 10, 20, Some((2, 0)))
        .team_stat(10, 1, SHOTS, Some(14.0))
        .team_stat(20, 1, SHOTS, Some(9.0))
        .fixture(2, 2, 30, 10, Some((1, 1)))
        .team_stat(30, 2, SHOTS, Some(11.0))
        .team_stat(10, 2, SHOTS, Some(8.0))
        .fixture(3, 3, 10, 30, Some((0, 1)))
        .team_stat(10, 3, SHOTS, Some(12.0))
        .team_stat(30, 3, SHOTS, Some(5.0))
        .fixture(4, 4, 20, 10, Some((2, 3)))
        .team_stat(20, 4, SHOTS, Some(7.0))
        .team_stat(10, 4, SHOTS, Some(10.0))
        .fixture(5, 9, 10, 20, None)
        .commit();
    seed
}

fn team_values(seed: &Seed, q: &FormQuery, metric: TeamMetric) -> Vec<f64> {
    let rows = team_form(&seed.conn, q, metric).unwrap();
    assert_eq!(rows.len(), 1, "{metric:?}");
    rows[0].last_values.clone()
}

#[test]
fn conceded_values_mirror_the_opponent_raw_values() {
    let seed = seeded();
    let q = FormQuery::new(LEAGUE, 4).with_statistic(SHOTS).for_entity(10);
    assert_eq!(team_values(&seed, &q, TeamMetric::Stat), vec![10.0, 12.0, 8.0, 14.0]);
    assert_eq!(team_values(&seed, &q, TeamMetric::StatConceded), vec![7.0, 5.0, 11.0, 9.0]);
    assert_eq!(
        team_values(&seed, &q, TeamMetric::StatMatchTotal),
        vec![17.0, 17.0, 19.0, 23.0]
    );

    let opp = FormQuery::new(LEAGUE, 2).with_statistic(SHOTS).for_entity(20);
    assert_eq!(team_values(&seed, &opp, TeamMetric::Stat), vec![7.0, 9.0]);
    assert_eq!(team_values(&seed, &opp, TeamMetric::StatConceded), vec![10.0, 14.0]);
}

#[test]
fn score_metrics_are_seen_from_each_side() {
    let seed = seeded();
    let q = FormQuery::new(LEAGUE, 4).for_entity(10);
    assert_eq!(team_values(&seed, &q, TeamMetric::GoalsFor), vec![3.0, 0.0, 1.0, 2.0]);
    assert_eq!(team_values(&seed, &q, TeamMetric::GoalsAgainst), vec![2.0, 1.0, 1.0, 0.0]);
    assert_eq!(team_values(&seed, &q, TeamMetric::TotalGoals), vec![5.0, 1.0, 2.0, 2.0]);
    assert_eq!(team_values(&seed, &q, TeamMetric::CleanSheet), vec![0.0, 0.0, 0.0, 1.0]);
    assert_eq!(
        team_values(&seed, &q, TeamMetric::BothTeamsScored),
        vec![1.0, 0.0, 1.0, 0.0]
    );
    assert_eq!(team_values(&seed, &q, TeamMetric::Win), vec![1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn venue_filters_select_one_side() {
    let seed = seeded();
    let home = FormQuery::new(LEAGUE, 2).for_entity(10).home();
    let rows = team_form(&seed.conn, &home, TeamMetric::GoalsFor).unwrap();
    assert_eq!(rows[0].last_fixture_ids, vec![3, 1]);

    let away = FormQuery::new(LEAGUE, 2).for_entity(10).away();
    let rows = team_form(&seed.conn, &away, TeamMetric::GoalsFor).unwrap();
    assert_eq!(rows[0].last_fixture_ids, vec![4, 2]);
    assert_eq!(rows[0].last_values, vec![3.0, 1.0]);
}

#[test]
fn player_filters_are_rejected_for_teams() {
    let seed = seeded();
    let err = team_form(&seed.conn, &FormQuery::new(LEAGUE, 2).starters_only(), TeamMetric::Win).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::NotApplicable("started_only"))
    );
    let err = team_funnel(
        &seed.conn,
        &FormQuery::new(LEAGUE, 2).with_minimum_minutes(30),
        TeamMetric::Win,
    )
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::NotApplicable("minimum_minutes"))
    );
}

#[test]
fn stat_metrics_need_a_statistic() {
    let seed = seeded();
    let err = team_form(&seed.conn, &FormQuery::new(LEAGUE, 2), TeamMetric::StatConceded).unwrap_err();
    assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::MissingStatistic));
    assert!(team_form(&seed.conn, &FormQuery::new(LEAGUE, 2), TeamMetric::GoalsFor).is_ok());
}

#[test]
fn unfinished_fixtures_do_not_count_toward_windows() {
    let seed = seeded();
    let q = FormQuery::new(LEAGUE, 5).for_entity(10);
    assert!(team_form(&seed.conn, &q, TeamMetric::GoalsFor).unwrap().is_empty());
    let counts = team_funnel(&seed.conn, &q, TeamMetric::GoalsFor).unwrap();
    assert_eq!(counts.candidate_count, 0);
}

#[test]
fn btts_streak_across_the_league() {
    let seed = seeded();
    let q = FormQuery::new(LEAGUE, 2).with_threshold(1.0).with_required_hits(1);
    let ids: Vec<u32> = team_form(&seed.conn, &q, TeamMetric::BothTeamsScored)
        .unwrap()
        .iter()
        .map(|r| r.entity_id)
        .collect();
    // Every team has exactly one both-teams-scored game in its last two.
    assert_eq!(ids, vec![10, 20, 30]);
}

#[test]
fn form_guide_lists_recent_results() {
    let seed = seeded();
    let guide = team_form_guide(&seed.conn, LEAGUE, 10, 3).unwrap();
    assert_eq!(guide.letters(), "WLD");
    assert_eq!(guide.points, 4);
    assert_eq!((guide.goals_for, guide.goals_against), (4, 4));
    assert_eq!(guide.matches[0].opponent_id, 20);

    let err = team_form_guide(&seed.conn, LEAGUE, 10, 0).unwrap_err();
    assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::InvalidWindowSize));
}

#[test]
fn form_guide_longer_than_history_lists_every_finished_match() {
    let seed = seeded();
    let guide = team_form_guide(&seed.conn, LEAGUE, 10, usize::MAX).unwrap();
    assert_eq!(guide.letters(), "WLDW");
    assert_eq!(guide.matches.len(), 4);
}

#[test]
fn team_leaderboard_totals_goals() {
    let seed = seeded();
    let board = team_leaderboard(&seed.conn, &LeaderboardQuery::new(LEAGUE), TeamMetric::GoalsFor).unwrap();
    let summary: Vec<(u32, usize, f64)> = board
        .iter()
        .map(|e| (e.entity_id, e.games, e.total_value))
        .collect();
    assert_eq!(summary, vec![(10, 4, 6.0), (20, 2, 2.0), (30, 2, 2.0)]);
    assert!(board.iter().all(|e| e.team_id == e.entity_id));
    assert!(board.iter().all(|e| e.per_90.is_none()));
}
