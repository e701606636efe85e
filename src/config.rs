use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::error::QueryError;
use crate::roster::{DEFAULT_BENCH_CONFIDENCE, DEFAULT_STARTER_CONFIDENCE, RosterPolicy};

const CACHE_DIR: &str = "form_engine";
const DB_FILE: &str = "events.sqlite";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_ROSTER_LOOKBACK: usize = 2;
pub const DEFAULT_ROSTER_CUTOFF_DAYS: u32 = 21;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// FORM_DB_PATH; `None` when neither it nor a cache dir can be resolved.
    pub db_path: Option<PathBuf>,
    /// FORM_LOG
    pub log_level: String,
    /// FORM_LEAGUE_IDS (comma, semicolon or space separated)
    pub league_ids: Vec<u32>,
    pub roster_starter_confidence: f64,
    pub roster_bench_confidence: f64,
    pub roster_lookback: usize,
    pub roster_cutoff_days: u32,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            db_path: env_nonempty("FORM_DB_PATH")
                .map(PathBuf::from)
                .or_else(default_db_path),
            log_level: env_nonempty("FORM_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            league_ids: env_nonempty("FORM_LEAGUE_IDS")
                .map(|raw| parse_ids(&raw))
                .unwrap_or_default(),
            roster_starter_confidence: env_parse("ROSTER_STARTER_CONFIDENCE")
                .unwrap_or(DEFAULT_STARTER_CONFIDENCE),
            roster_bench_confidence: env_parse("ROSTER_BENCH_CONFIDENCE")
                .unwrap_or(DEFAULT_BENCH_CONFIDENCE),
            roster_lookback: env_parse("ROSTER_LOOKBACK").unwrap_or(DEFAULT_ROSTER_LOOKBACK),
            roster_cutoff_days: env_parse("ROSTER_CUTOFF_DAYS").unwrap_or(DEFAULT_ROSTER_CUTOFF_DAYS),
        }
    }

    pub fn roster_policy(&self) -> Result<RosterPolicy, QueryError> {
        RosterPolicy::new(self.roster_starter_confidence, self.roster_bench_confidence)
    }

    pub fn require_db_path(&self) -> Result<PathBuf> {
        self.db_path
            .clone()
            .context("unable to resolve sqlite path (set FORM_DB_PATH or pass --db)")
    }
}

/// Process-wide settings, read from the environment on first use.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::from_env)
}

/// `.env.local` wins over `.env`; both are optional.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

fn app_cache_dir() -> Option<PathBuf> {
    if let Some(base) = env_nonempty("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = env_nonempty("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_nonempty(key)?.parse().ok()
}

pub fn parse_ids(raw: &str) -> Vec<u32> {
    let ids = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|id| *id != 0)
        .collect::<Vec<_>>();
    dedup_ids(ids)
}

pub fn dedup_ids(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

/// Value of `--name=value` or `--name value` in `args`.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let long = format!("--{name}");
    let prefix = format!("{long}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == long {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() && !next.starts_with("--") {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn arg_flag(args: &[String], name: &str) -> bool {
    let long = format!("--{name}");
    args.iter().any(|a| *a == long)
}

/// Parsed `--name` value; a present but malformed value is an error.
pub fn arg_parse<T>(args: &[String], name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    arg_value(args, name)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value for --{name}: {raw}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ids_are_split_and_deduplicated() {
        assert_eq!(parse_ids("8, 82;8 0 x 564"), vec![8, 82, 564]);
    }

    #[test]
    fn arg_value_accepts_both_forms() {
        let a = args(&["--league=8", "--window", "5", "--starters"]);
        assert_eq!(arg_value(&a, "league").as_deref(), Some("8"));
        assert_eq!(arg_value(&a, "window").as_deref(), Some("5"));
        assert_eq!(arg_value(&a, "starters"), None);
        assert!(arg_flag(&a, "starters"));
    }

    #[test]
    fn malformed_numeric_arg_is_an_error() {
        let a = args(&["--window=five"]);
        assert!(arg_parse::<usize>(&a, "window").is_err());
        assert_eq!(arg_parse::<usize>(&args(&[]), "window").unwrap(), None);
    }
}
