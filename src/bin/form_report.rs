use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use form_engine::config::{self, arg_flag, arg_parse, arg_value};
use form_engine::event_store;
use form_engine::export::{self, ResultSheet};
use form_engine::forward;
use form_engine::queries::{self, DEFAULT_LADDER, LadderRung};
use form_engine::{FormQuery, LeaderboardQuery, LikelyRosterCache, TeamMetric, results_fingerprint};

const USAGE: &str = "usage: form_report --mode <form|funnel|leaderboard|ladder|guide|forward|matchups|summary> \
[--kind player|team] [--league ID] [--stat TYPE] [--window N] [--threshold X] [--required K] \
[--min-avg X] [--season ID] [--recency-days D] [--starters] [--min-minutes M] [--home|--away] \
[--entity ID] [--team ID] [--metric NAME] [--date YYYY-MM-DD] [--min-confidence C] \
[--min-games G] [--ladder 9/11,12/14] [--limit L] [--db PATH] [--xlsx PATH]";

fn main() -> Result<()> {
    config::load_dotenv();
    let settings = config::settings();
    config::init_logging(&settings.log_level);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if arg_flag(&args, "help") {
        println!("{USAGE}");
        return Ok(());
    }

    let db_path = match arg_value(&args, "db") {
        Some(path) => PathBuf::from(path),
        None => settings.require_db_path()?,
    };
    let league_id = match arg_parse::<u32>(&args, "league")? {
        Some(id) => id,
        None => settings
            .league_ids
            .first()
            .copied()
            .ok_or_else(|| anyhow!("no league given (pass --league or set FORM_LEAGUE_IDS)"))?,
    };
    let conn = event_store::open_db(&db_path)?;
    let mode = arg_value(&args, "mode").unwrap_or_else(|| "form".to_string());
    let team_kind = match arg_value(&args, "kind").as_deref() {
        None | Some("player") => false,
        Some("team") => true,
        Some(other) => bail!("unknown --kind {other}\n{USAGE}"),
    };
    let metric = match arg_value(&args, "metric") {
        Some(raw) => TeamMetric::parse(&raw).with_context(|| format!("unknown --metric {raw}"))?,
        None => TeamMetric::Stat,
    };
    let xlsx = arg_value(&args, "xlsx").map(PathBuf::from);

    let sheet = match mode.as_str() {
        "form" => {
            let q = form_query(&args, league_id)?;
            let results = if team_kind {
                queries::team_form(&conn, &q, metric)?
            } else {
                queries::player_form(&conn, &q)?
            };
            info!(
                results = results.len(),
                fingerprint = %results_fingerprint(&results),
                "form query complete"
            );
            print_json(&results)?;
            export::qualification_sheet("Form", &results)
        }
        "funnel" => {
            let q = form_query(&args, league_id)?;
            let counts = if team_kind {
                queries::team_funnel(&conn, &q, metric)?
            } else {
                queries::player_funnel(&conn, &q)?
            };
            print_json(&serde_json::json!({
                "counts": counts,
                "diagnosis": counts.diagnosis(),
            }))?;
            export::funnel_sheet("Funnel", &counts)
        }
        "leaderboard" => {
            let q = leaderboard_query(&args, league_id)?;
            let board = if team_kind {
                queries::team_leaderboard(&conn, &q, metric)?
            } else {
                queries::player_leaderboard(&conn, &q)?
            };
            print_json(&board)?;
            export::leaderboard_sheet("Leaderboard", &board)
        }
        "ladder" => {
            let q = form_query(&args, league_id)?;
            let rungs = match arg_value(&args, "ladder") {
                Some(raw) => parse_ladder(&raw)?,
                None => DEFAULT_LADDER.to_vec(),
            };
            let hits = queries::streak_ladder(&conn, &q, &rungs)?;
            print_json(&hits)?;
            export::ladder_sheet("Ladder", &hits)
        }
        "guide" => {
            let team_id = arg_parse::<u32>(&args, "team")?.context("--team is required for --mode guide")?;
            let n = arg_parse::<usize>(&args, "window")?.unwrap_or(5);
            let guide = queries::team_form_guide(&conn, league_id, team_id, n)?;
            print_json(&serde_json::json!({
                "form": guide.letters(),
                "guide": guide,
            }))?;
            export::form_guide_sheet("FormGuide", &guide)
        }
        "forward" => {
            let q = form_query(&args, league_id)?;
            let on_date = date_arg(&args)?;
            let min_confidence = arg_parse::<f64>(&args, "min-confidence")?.unwrap_or(0.0);
            let cache = LikelyRosterCache::new(settings.roster_policy()?);
            let results = forward::forward_player_form(&conn, &cache, &q, on_date, min_confidence)?;
            print_json(&results)?;
            export::qualification_sheet("Forward", &results)
        }
        "matchups" => {
            let q = form_query(&args, league_id)?;
            let on_date = date_arg(&args)?;
            let matchups = forward::fixture_matchups(&conn, &q, metric, on_date)?;
            print_json(&matchups)?;
            export::matchup_sheet("Matchups", &matchups)
        }
        "summary" => {
            let summary = queries::store_summary(&conn, league_id)?;
            print_json(&summary)?;
            return Ok(());
        }
        other => bail!("unknown --mode {other}\n{USAGE}"),
    };

    if let Some(path) = xlsx {
        write_sheet(&path, sheet)?;
    }
    Ok(())
}

fn form_query(args: &[String], league_id: u32) -> Result<FormQuery> {
    let window = arg_parse::<usize>(args, "window")?.unwrap_or(5);
    let mut q = FormQuery::new(league_id, window);
    q.statistic_type_id = arg_parse(args, "stat")?;
    q.threshold = arg_parse(args, "threshold")?;
    q.required_hit_count = arg_parse(args, "required")?;
    q.minimum_average = arg_parse(args, "min-avg")?;
    q.season_id = arg_parse(args, "season")?;
    q.recency_cutoff_days = arg_parse(args, "recency-days")?;
    q.started_only = arg_flag(args, "starters");
    q.minimum_minutes = arg_parse(args, "min-minutes")?;
    q.home_only = arg_flag(args, "home");
    q.away_only = arg_flag(args, "away");
    q.specific_entity_id = arg_parse(args, "entity")?;
    q.specific_team_id = arg_parse(args, "team")?;
    q.result_limit = arg_parse(args, "limit")?;
    q.as_of = Some(Utc::now());
    Ok(q)
}

fn leaderboard_query(args: &[String], league_id: u32) -> Result<LeaderboardQuery> {
    let mut q = LeaderboardQuery::new(league_id);
    q.statistic_type_id = arg_parse(args, "stat")?;
    q.season_id = arg_parse(args, "season")?;
    q.threshold = arg_parse(args, "threshold")?;
    q.started_only = arg_flag(args, "starters");
    q.minimum_minutes = arg_parse(args, "min-minutes")?;
    q.minimum_games = arg_parse(args, "min-games")?;
    q.home_only = arg_flag(args, "home");
    q.away_only = arg_flag(args, "away");
    q.specific_entity_id = arg_parse(args, "entity")?;
    q.result_limit = arg_parse(args, "limit")?;
    Ok(q)
}

fn date_arg(args: &[String]) -> Result<NaiveDate> {
    match arg_value(args, "date") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("invalid --date {raw} (expected YYYY-MM-DD)")),
        None => Ok(Utc::now().date_naive()),
    }
}

/// `9/11,12/14` -> rungs of (required hits / window size).
fn parse_ladder(raw: &str) -> Result<Vec<LadderRung>> {
    raw.split([',', ';', ' '])
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (hits, window) = part
                .trim()
                .split_once('/')
                .with_context(|| format!("invalid ladder rung {part} (expected HITS/WINDOW)"))?;
            let hits = hits.trim().parse::<usize>().with_context(|| format!("invalid rung {part}"))?;
            let window = window
                .trim()
                .parse::<usize>()
                .with_context(|| format!("invalid rung {part}"))?;
            Ok(LadderRung::new(hits, window))
        })
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}

fn write_sheet(path: &Path, sheet: ResultSheet) -> Result<()> {
    let report = export::write_results_xlsx(path, &[sheet])?;
    info!(
        path = %path.display(),
        sheets = report.sheets,
        rows = report.rows,
        "workbook written"
    );
    Ok(())
}
