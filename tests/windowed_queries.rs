mod common;

use common::{GOALS, LEAGUE, Seed, kickoff};
use form_engine::queries::{LadderRung, player_form, streak_ladder};
use form_engine::{FormQuery, QueryError, results_fingerprint};

fn goals_query(window: usize) -> FormQuery {
    FormQuery::new(LEAGUE, window).with_statistic(GOALS)
}

#[test]
fn five_game_streak_with_three_hits_qualifies() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(2.0), Some(1.0), Some(3.0), Some(0.0), Some(2.0)])
        .commit();

    let q = goals_query(5).with_threshold(2.0).with_required_hits(3);
    let rows = player_form(&seed.conn, &q).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.entity_id, 1);
    assert_eq!(row.team_id, 10);
    assert_eq!(row.games, 5);
    assert_eq!(row.games_with_stat, 5);
    assert_eq!(row.games_hit, Some(3));
    assert_eq!(row.hit_rate, Some(0.6));
    assert_eq!(row.total_value, 8.0);
    assert!((row.avg_value - 1.6).abs() < 1e-9);
    assert_eq!(row.last_values, vec![2.0, 1.0, 3.0, 0.0, 2.0]);
    assert_eq!(row.last_fixture_ids, vec![104, 103, 102, 101, 100]);
    assert_eq!(row.last_fixture_at, kickoff(50));
    assert_eq!(row.window_start_at, kickoff(46));
    assert_eq!(row.roster_confidence, None);
}

#[test]
fn short_or_gappy_histories_never_appear() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(1.0); 5])
        .series(2, 20, 200, 50, &[Some(1.0); 4])
        .series(3, 30, 300, 50, &[Some(1.0), Some(1.0), None, Some(1.0), Some(1.0)])
        .commit();

    let rows = player_form(&seed.conn, &goals_query(5)).unwrap();
    let ids: Vec<u32> = rows.iter().map(|r| r.entity_id).collect();
    assert_eq!(ids, vec![1]);
    for row in &rows {
        assert_eq!(row.games, 5);
        assert_eq!(row.games_with_stat, 5);
    }
}

#[test]
fn same_kickoff_is_ordered_by_fixture_id_every_time() {
    let mut seed = Seed::new();
    seed.fixture(300, 60, 10, 998, Some((0, 0)))
        .fixture(301, 60, 10, 997, Some((1, 0)))
        .game(4, 10, 300, 60, Some(1.0))
        .game(4, 10, 301, 60, Some(2.0))
        .game(4, 10, 299, 55, Some(0.0))
        .commit();

    let q = goals_query(2);
    let first = player_form(&seed.conn, &q).unwrap();
    assert_eq!(first[0].last_fixture_ids, vec![301, 300]);
    assert_eq!(first[0].last_values, vec![2.0, 1.0]);
    for _ in 0..5 {
        let again = player_form(&seed.conn, &q).unwrap();
        assert_eq!(again, first);
        assert_eq!(results_fingerprint(&again), results_fingerprint(&first));
    }

    let single = player_form(&seed.conn, &goals_query(1)).unwrap();
    assert_eq!(single[0].last_fixture_ids, vec![301]);
}

#[test]
fn hits_and_average_both_gate_qualification() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(2.0), Some(1.0), Some(3.0), Some(0.0), Some(2.0)])
        .commit();

    let too_many_hits = goals_query(5).with_threshold(3.0).with_required_hits(2);
    assert!(player_form(&seed.conn, &too_many_hits).unwrap().is_empty());

    let average_met = goals_query(5).with_minimum_average(1.6);
    assert_eq!(player_form(&seed.conn, &average_met).unwrap().len(), 1);

    let average_missed = goals_query(5).with_minimum_average(1.7);
    assert!(player_form(&seed.conn, &average_missed).unwrap().is_empty());

    let both = goals_query(5)
        .with_threshold(2.0)
        .with_required_hits(3)
        .with_minimum_average(2.0);
    assert!(player_form(&seed.conn, &both).unwrap().is_empty());
}

#[test]
fn results_rank_by_hits_then_average_then_id() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(1.0), Some(1.0), Some(0.0)])
        .series(2, 10, 200, 50, &[Some(1.0), Some(1.0), Some(1.0)])
        .series(3, 20, 300, 50, &[Some(3.0), Some(1.0), Some(0.0)])
        .series(4, 20, 400, 50, &[Some(1.0), Some(1.0), Some(0.0)])
        .commit();

    let q = goals_query(3).with_threshold(1.0);
    let ids: Vec<u32> = player_form(&seed.conn, &q)
        .unwrap()
        .iter()
        .map(|r| r.entity_id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1, 4]);

    let limited = player_form(&seed.conn, &q.clone().limit(2)).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[1].entity_id, 3);
}

#[test]
fn recency_cutoff_drops_stale_windows() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(1.0); 3])
        .series(2, 10, 200, 20, &[Some(1.0); 3])
        .commit();

    let q = goals_query(3).with_recency_cutoff(14, kickoff(60));
    let ids: Vec<u32> = player_form(&seed.conn, &q)
        .unwrap()
        .iter()
        .map(|r| r.entity_id)
        .collect();
    assert_eq!(ids, vec![1]);
}

#[test]
fn starters_only_skips_bench_appearances_before_windowing() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(1.0), Some(1.0)])
        .fixture(110, 55, 10, 999, Some((0, 0)))
        .appearance(1, 110, 10, false, 20)
        .player_stat(1, 110, GOALS, Some(0.0))
        .commit();

    let all = player_form(&seed.conn, &goals_query(2)).unwrap();
    assert_eq!(all[0].last_fixture_ids, vec![110, 101]);

    let starts = player_form(&seed.conn, &goals_query(2).starters_only()).unwrap();
    assert_eq!(starts[0].last_fixture_ids, vec![101, 100]);

    let minutes = player_form(&seed.conn, &goals_query(2).with_minimum_minutes(45)).unwrap();
    assert_eq!(minutes[0].last_fixture_ids, vec![101, 100]);
}

#[test]
fn boundary_violations_fail_fast() {
    let seed = Seed::new();

    let err = player_form(&seed.conn, &FormQuery::new(LEAGUE, 5)).unwrap_err();
    assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::MissingStatistic));

    let err = player_form(&seed.conn, &goals_query(0)).unwrap_err();
    assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::InvalidWindowSize));

    let err = player_form(&seed.conn, &goals_query(5).with_threshold(-0.5)).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::InvalidThreshold(-0.5))
    );
}

#[test]
fn recency_cutoff_before_the_calendar_is_an_error() {
    let mut seed = Seed::new();
    seed.series(1, 10, 100, 50, &[Some(1.0); 3]).commit();

    let q = goals_query(3).with_recency_cutoff(u32::MAX, kickoff(60));
    let err = player_form(&seed.conn, &q).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::InvalidRecencyCutoff(u32::MAX))
    );
}

#[test]
fn empty_store_is_an_empty_result_not_an_error() {
    let seed = Seed::new();
    assert!(player_form(&seed.conn, &goals_query(5)).unwrap().is_empty());
}

#[test]
fn ladder_reports_every_satisfied_rung() {
    let mut seed = Seed::new();
    // 11 games newest first: 9 hits in the last 11, 4 in the last 5.
    let values = [1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0].map(Some);
    seed.series(1, 10, 100, 80, &values).commit();

    let q = goals_query(5).with_threshold(1.0);
    let rungs = [LadderRung::new(4, 5), LadderRung::new(9, 11), LadderRung::new(10, 11)];
    let hits = streak_ladder(&seed.conn, &q, &rungs).unwrap();
    let found: Vec<(usize, usize)> = hits
        .iter()
        .map(|h| (h.rung.required_hits, h.rung.window_size))
        .collect();
    assert_eq!(found, vec![(9, 11), (4, 5)]);
    assert_eq!(hits[0].result.games_hit, Some(9));
}

#[test]
fn ladder_needs_a_threshold() {
    let seed = Seed::new();
    let err = streak_ladder(&seed.conn, &goals_query(5), &[LadderRung::new(9, 11)]).unwrap_err();
    assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::MissingThreshold));
}
