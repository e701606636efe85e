use std::path::PathBuf;

use anyhow::{Context, Result};

use form_engine::config::{self, arg_value};
use form_engine::event_store::{self, EventSnapshot};

fn main() -> Result<()> {
    config::load_dotenv();
    let settings = config::settings();
    config::init_logging(&settings.log_level);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let input = arg_value(&args, "input").context("usage: store_import [--db PATH] --input SNAPSHOT.json")?;
    let db_path = match arg_value(&args, "db") {
        Some(path) => PathBuf::from(path),
        None => settings.require_db_path()?,
    };

    let raw = std::fs::read_to_string(&input).with_context(|| format!("read snapshot {input}"))?;
    let snapshot: EventSnapshot =
        serde_json::from_str(&raw).with_context(|| format!("parse snapshot {input}"))?;

    let mut conn = event_store::open_db(&db_path)?;
    let summary = event_store::import_snapshot(&mut conn, &snapshot)?;

    println!("Snapshot import complete");
    println!("DB: {}", db_path.display());
    println!("Fixtures upserted: {}", summary.fixtures_upserted);
    println!("Appearances upserted: {}", summary.appearances_upserted);
    println!("Stat values upserted: {}", summary.stat_values_upserted);
    Ok(())
}
