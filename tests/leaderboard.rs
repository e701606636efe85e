mod common;

use common::{GOALS, LEAGUE, SEASON, Seed};
use form_engine::queries::player_leaderboard;
use form_engine::{LeaderboardQuery, QueryError};

fn seeded() -> Seed {
    let mut seed = Seed::new();
    // Player 1 moves from team 10 to team 20 mid-season.
    seed.game(1, 10, 100, 10, Some(1.0))
        .game(1, 10, 101, 11, Some(2.0))
        .game(1, 20, 200, 20, Some(0.0))
        .fixture(102, 12, 10, 999, Some((3, 0)))
        .appearance(2, 102, 10, false, 45)
        .player_stat(2, 102, GOALS, Some(5.0))
        .game(3, 30, 300, 12, None)
        .commit();
    seed
}

fn goals() -> LeaderboardQuery {
    LeaderboardQuery::new(LEAGUE).with_statistic(GOALS)
}

#[test]
fn totals_rank_players_and_resolve_current_team() {
    let seed = seeded();
    let board = player_leaderboard(&seed.conn, &goals()).unwrap();
    let ids: Vec<u32> = board.iter().map(|e| e.entity_id).collect();
    assert_eq!(ids, vec![2, 1, 3]);

    let moved = &board[1];
    assert_eq!(moved.team_id, 20);
    assert_eq!(moved.games, 3);
    assert_eq!(moved.total_value, 3.0);
    assert_eq!(moved.minutes_played, Some(270));
    assert_eq!(moved.per_90, Some(1.0));

    let sub = &board[0];
    assert_eq!(sub.per_90, Some(10.0));

    let silent = &board[2];
    assert_eq!(silent.games, 1);
    assert_eq!(silent.games_with_stat, 0);
    assert_eq!(silent.avg_value, 0.0);
}

#[test]
fn threshold_rate_uses_all_qualifying_games() {
    let seed = seeded();
    let board = player_leaderboard(&seed.conn, &goals().with_threshold(1.0)).unwrap();
    let moved = board.iter().find(|e| e.entity_id == 1).unwrap();
    assert_eq!(moved.hit_count, Some(2));
    assert!((moved.hit_rate.unwrap() - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn minimum_games_season_and_limit_narrow_the_board() {
    let seed = seeded();
    let mut q = goals();
    q.minimum_games = Some(2);
    let board = player_leaderboard(&seed.conn, &q).unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].entity_id, 1);

    assert_eq!(player_leaderboard(&seed.conn, &goals().with_season(SEASON)).unwrap().len(), 3);
    assert!(player_leaderboard(&seed.conn, &goals().with_season(1999)).unwrap().is_empty());
    assert_eq!(player_leaderboard(&seed.conn, &goals().limit(1)).unwrap().len(), 1);
}

#[test]
fn starters_only_drops_substitute_appearances() {
    let seed = seeded();
    let mut q = goals();
    q.started_only = true;
    let ids: Vec<u32> = player_leaderboard(&seed.conn, &q)
        .unwrap()
        .iter()
        .map(|e| e.entity_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn leaderboard_needs_a_statistic() {
    let seed = seeded();
    let err = player_leaderboard(&seed.conn, &LeaderboardQuery::new(LEAGUE)).unwrap_err();
    assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::MissingStatistic));
}
