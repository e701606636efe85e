use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::aggregate::QualificationResult;
use crate::forward::FixtureMatchup;
use crate::funnel::FunnelCounts;
use crate::leaderboard::LeaderboardEntry;
use crate::model::format_timestamp;
use crate::queries::{FormGuide, LadderHit};

/// One worksheet: a header row followed by data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl ResultSheet {
    pub fn data_rows(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub sheets: usize,
    pub rows: usize,
}

pub fn write_results_xlsx(path: &Path, sheets: &[ResultSheet]) -> Result<ExportReport> {
    let mut workbook = Workbook::new();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .with_context(|| format!("invalid sheet name {}", sheet.name))?;
        write_rows(worksheet, &sheet.rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(ExportReport {
        sheets: sheets.len(),
        rows: sheets.iter().map(ResultSheet::data_rows).sum(),
    })
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

pub fn qualification_sheet(name: &str, results: &[QualificationResult]) -> ResultSheet {
    let mut rows = vec![header(&[
        "entity_id",
        "team_id",
        "games",
        "games_with_stat",
        "games_hit",
        "hit_rate",
        "total_value",
        "avg_value",
        "last_values",
        "last_fixture_at",
        "window_start_at",
        "roster_confidence",
    ])];
    for r in results {
        rows.push(vec![
            r.entity_id.to_string(),
            r.team_id.to_string(),
            r.games.to_string(),
            r.games_with_stat.to_string(),
            opt(r.games_hit),
            opt(r.hit_rate.map(fmt_f64)),
            fmt_f64(r.total_value),
            fmt_f64(r.avg_value),
            join_values(&r.last_values),
            format_timestamp(r.last_fixture_at),
            format_timestamp(r.window_start_at),
            opt(r.roster_confidence.map(fmt_f64)),
        ]);
    }
    ResultSheet {
        name: name.to_string(),
        rows,
    }
}

pub fn leaderboard_sheet(name: &str, entries: &[LeaderboardEntry]) -> ResultSheet {
    let mut rows = vec![header(&[
        "entity_id",
        "team_id",
        "games",
        "games_with_stat",
        "total_value",
        "avg_value",
        "hit_count",
        "hit_rate",
        "minutes_played",
        "per_90",
        "last_fixture_at",
    ])];
    for e in entries {
        rows.push(vec![
            e.entity_id.to_string(),
            e.team_id.to_string(),
            e.games.to_string(),
            e.games_with_stat.to_string(),
            fmt_f64(e.total_value),
            fmt_f64(e.avg_value),
            opt(e.hit_count),
            opt(e.hit_rate.map(fmt_f64)),
            opt(e.minutes_played),
            opt(e.per_90.map(fmt_f64)),
            format_timestamp(e.last_fixture_at),
        ]);
    }
    ResultSheet {
        name: name.to_string(),
        rows,
    }
}

pub fn ladder_sheet(name: &str, hits: &[LadderHit]) -> ResultSheet {
    let mut rows = vec![header(&[
        "entity_id",
        "team_id",
        "rung",
        "games_hit",
        "hit_rate",
        "avg_value",
        "last_values",
    ])];
    for h in hits {
        rows.push(vec![
            h.result.entity_id.to_string(),
            h.result.team_id.to_string(),
            format!("{}/{}", h.rung.required_hits, h.rung.window_size),
            opt(h.result.games_hit),
            opt(h.result.hit_rate.map(fmt_f64)),
            fmt_f64(h.result.avg_value),
            join_values(&h.result.last_values),
        ]);
    }
    ResultSheet {
        name: name.to_string(),
        rows,
    }
}

pub fn funnel_sheet(name: &str, counts: &FunnelCounts) -> ResultSheet {
    ResultSheet {
        name: name.to_string(),
        rows: vec![
            header(&["candidate_count", "complete_count", "qualified_count", "diagnosis"]),
            vec![
                counts.candidate_count.to_string(),
                counts.complete_count.to_string(),
                counts.qualified_count.to_string(),
                format!("{:?}", counts.diagnosis()),
            ],
        ],
    }
}

pub fn form_guide_sheet(name: &str, guide: &FormGuide) -> ResultSheet {
    let mut rows = vec![header(&[
        "fixture_id",
        "start_time",
        "opponent_id",
        "venue",
        "goals_for",
        "goals_against",
        "result",
    ])];
    for m in &guide.matches {
        rows.push(vec![
            m.fixture_id.to_string(),
            format_timestamp(m.start_time),
            m.opponent_id.to_string(),
            m.venue.as_str().to_string(),
            m.goals_for.to_string(),
            m.goals_against.to_string(),
            m.outcome.letter().to_string(),
        ]);
    }
    ResultSheet {
        name: name.to_string(),
        rows,
    }
}

pub fn matchup_sheet(name: &str, matchups: &[FixtureMatchup]) -> ResultSheet {
    let mut rows = vec![header(&[
        "fixture_id",
        "start_time",
        "team_id",
        "opponent_id",
        "venue",
        "team_hit_rate",
        "opponent_allows_hit_rate",
        "team_avg",
        "opponent_allows_avg",
        "strength",
    ])];
    for m in matchups {
        rows.push(vec![
            m.fixture_id.to_string(),
            format_timestamp(m.start_time),
            m.team_id.to_string(),
            m.opponent_id.to_string(),
            m.venue.as_str().to_string(),
            opt(m.team_form.hit_rate.map(fmt_f64)),
            opt(m.opponent_allows.hit_rate.map(fmt_f64)),
            fmt_f64(m.team_form.avg_value),
            fmt_f64(m.opponent_allows.avg_value),
            fmt_f64(m.strength),
        ]);
    }
    ResultSheet {
        name: name.to_string(),
        rows,
    }
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.3}")
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;

    #[test]
    fn qualification_sheet_has_header_and_one_row_per_result() {
        let ts = parse_timestamp("2025-03-01T15:00:00Z").unwrap();
        let result = QualificationResult {
            entity_id: 7,
            team_id: 10,
            games: 3,
            games_with_stat: 3,
            games_hit: Some(2),
            hit_rate: Some(2.0 / 3.0),
            total_value: 4.0,
            avg_value: 4.0 / 3.0,
            last_values: vec![2.0, 0.0, 2.0],
            last_fixture_ids: vec![3, 2, 1],
            last_fixture_at: ts,
            window_start_at: ts,
            roster_confidence: None,
        };
        let sheet = qualification_sheet("Form", &[result]);
        assert_eq!(sheet.data_rows(), 1);
        assert_eq!(sheet.rows[1][5], "0.667");
        assert_eq!(sheet.rows[1][8], "2,0,2");
        assert_eq!(sheet.rows[1][11], "");
    }
}
