use std::path::PathBuf;

use anyhow::{Result, anyhow};

use form_engine::config::{self, arg_parse, arg_value, parse_ids};
use form_engine::event_store;
use form_engine::{LikelyRosterCache, RefreshRequest};

fn main() -> Result<()> {
    config::load_dotenv();
    let settings = config::settings();
    config::init_logging(&settings.log_level);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let league_ids = arg_value(&args, "league-ids")
        .map(|raw| parse_ids(&raw))
        .unwrap_or_else(|| settings.league_ids.clone());
    if league_ids.is_empty() {
        return Err(anyhow!(
            "no league ids resolved for roster refresh (pass --league-ids or set FORM_LEAGUE_IDS)"
        ));
    }

    let db_path = match arg_value(&args, "db") {
        Some(path) => PathBuf::from(path),
        None => settings.require_db_path()?,
    };
    let lookback = arg_parse::<usize>(&args, "lookback")?.unwrap_or(settings.roster_lookback);
    let cutoff_days = arg_parse::<u32>(&args, "cutoff-days")?.unwrap_or(settings.roster_cutoff_days);

    let mut conn = event_store::open_db(&db_path)?;
    let cache = LikelyRosterCache::new(settings.roster_policy()?);

    println!("Likely roster refresh");
    println!("DB: {}", db_path.display());
    println!("Lookback: {lookback} fixtures, cutoff: {cutoff_days} days");
    let mut total_merged = 0usize;
    for league_id in league_ids {
        let req = RefreshRequest::new(league_id, cutoff_days, lookback);
        let summary = cache.refresh(&mut conn, &req)?;
        total_merged += summary.merged;
        println!(
            "League {league_id}: teams={} candidates={} merged={}",
            summary.teams, summary.candidates, summary.merged
        );
    }
    println!("Rows merged: {total_merged}");
    Ok(())
}
