use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::metrics::ValidationReport;
use crate::odds::{american_odds_string, clip_probability};
use crate::player_features::FeatureRow;

pub const PREDICTION_COLUMNS: [&str; 7] = [
    "player",
    "team",
    "opponent_team",
    "model",
    "probability",
    "american_odds",
    "upcoming_week",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub player: String,
    pub player_id: String,
    pub team: String,
    pub opponent_team: String,
    pub model: String,
    pub probability: f64,
    pub american_odds: String,
    pub season: i32,
    pub upcoming_week: u32,
}

impl Prediction {
    pub fn new(row: &FeatureRow, model: &str, probability: f64) -> Self {
        let probability = clip_probability(probability);
        Self {
            player: row.record.player.clone(),
            player_id: row.record.player_id.clone(),
            team: row.record.team.clone(),
            opponent_team: row.record.opponent_team.clone(),
            model: model.to_string(),
            probability,
            american_odds: american_odds_string(probability),
            season: row.season,
            upcoming_week: row.week,
        }
    }

    fn matchup(&self) -> (&str, &str, &str) {
        (&self.player, &self.team, &self.opponent_team)
    }

    fn csv_record(&self) -> [String; 7] {
        [
            self.player.clone(),
            self.team.clone(),
            self.opponent_team.clone(),
            self.model.clone(),
            format!("{:.6}", self.probability),
            self.american_odds.clone(),
            self.upcoming_week.to_string(),
        ]
    }
}

/// Sorts each model's predictions by descending probability and keeps the
/// first row per (player, team, opponent). Models come out in name order.
pub fn dedup_predictions(predictions: Vec<Prediction>) -> Vec<Prediction> {
    let mut sorted = predictions;
    sorted.sort_by(|a, b| {
        a.model
            .cmp(&b.model)
            .then(b.probability.total_cmp(&a.probability))
            .then_with(|| a.matchup().cmp(&b.matchup()))
    });

    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    sorted
        .into_iter()
        .filter(|p| {
            seen.insert((
                p.model.clone(),
                p.player.clone(),
                p.team.clone(),
                p.opponent_team.clone(),
            ))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCell {
    pub probability: f64,
    pub american_odds: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub player: String,
    pub team: String,
    pub opponent_team: String,
    pub upcoming_week: u32,
    pub models: BTreeMap<String, ModelCell>,
    pub sim_at_least_two: Option<f64>,
    pub highest: Option<(String, f64)>,
    pub lowest: Option<(String, f64)>,
}

impl ReportRow {
    pub fn spread(&self) -> Option<f64> {
        Some(self.highest.as_ref()?.1 - self.lowest.as_ref()?.1)
    }
}

pub type MatchupKey = (String, String, String);

pub fn build_report(
    predictions: &[Prediction],
    at_least_two: &HashMap<MatchupKey, f64>,
) -> Vec<ReportRow> {
    let mut rows: BTreeMap<MatchupKey, ReportRow> = BTreeMap::new();
    for p in dedup_predictions(predictions.to_vec()) {
        let key = (p.player.clone(), p.team.clone(), p.opponent_team.clone());
        let row = rows.entry(key.clone()).or_insert_with(|| ReportRow {
            player: p.player.clone(),
            team: p.team.clone(),
            opponent_team: p.opponent_team.clone(),
            upcoming_week: p.upcoming_week,
            models: BTreeMap::new(),
            sim_at_least_two: at_least_two.get(&key).copied(),
            highest: None,
            lowest: None,
        });
        if row
            .highest
            .as_ref()
            .is_none_or(|(_, best)| p.probability > *best)
        {
            row.highest = Some((p.model.clone(), p.probability));
        }
        if row
            .lowest
            .as_ref()
            .is_none_or(|(_, worst)| p.probability < *worst)
        {
            row.lowest = Some((p.model.clone(), p.probability));
        }
        row.models.insert(
            p.model,
            ModelCell {
                probability: p.probability,
                american_odds: p.american_odds,
            },
        );
    }

    let mut out = rows.into_values().collect::<Vec<_>>();
    out.sort_by(|a, b| {
        let pa = a.highest.as_ref().map_or(0.0, |h| h.1);
        let pb = b.highest.as_ref().map_or(0.0, |h| h.1);
        pb.total_cmp(&pa)
            .then_with(|| (&a.player, &a.team).cmp(&(&b.player, &b.team)))
    });
    out
}

fn report_model_names(rows: &[ReportRow]) -> Vec<String> {
    rows.iter()
        .flat_map(|r| r.models.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn prediction_table(predictions: &[Prediction]) -> Vec<Vec<String>> {
    let mut out = vec![PREDICTION_COLUMNS.iter().map(|c| c.to_string()).collect()];
    out.extend(predictions.iter().map(|p| p.csv_record().to_vec()));
    out
}

fn report_table(rows: &[ReportRow]) -> Vec<Vec<String>> {
    let models = report_model_names(rows);
    let mut header = vec![
        "player".to_string(),
        "team".to_string(),
        "opponent_team".to_string(),
        "upcoming_week".to_string(),
    ];
    for m in &models {
        header.push(format!("{m}_probability"));
        header.push(format!("{m}_odds"));
    }
    header.extend(
        [
            "sim_p_two_plus",
            "highest_model",
            "highest_probability",
            "lowest_model",
            "lowest_probability",
            "spread",
        ]
        .map(String::from),
    );

    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
    let mut out = vec![header];
    for row in rows {
        let mut record = vec![
            row.player.clone(),
            row.team.clone(),
            row.opponent_team.clone(),
            row.upcoming_week.to_string(),
        ];
        for m in &models {
            match row.models.get(m) {
                Some(cell) => {
                    record.push(format!("{:.6}", cell.probability));
                    record.push(cell.american_odds.clone());
                }
                None => record.extend([String::new(), String::new()]),
            }
        }
        record.push(fmt(row.sim_at_least_two));
        record.push(row.highest.as_ref().map(|h| h.0.clone()).unwrap_or_default());
        record.push(fmt(row.highest.as_ref().map(|h| h.1)));
        record.push(row.lowest.as_ref().map(|l| l.0.clone()).unwrap_or_default());
        record.push(fmt(row.lowest.as_ref().map(|l| l.1)));
        record.push(fmt(row.spread()));
        out.push(record);
    }
    out
}

fn validation_table(validation: &[(String, ValidationReport)]) -> Vec<Vec<String>> {
    let mut out = vec![
        ["model", "samples", "positives", "accuracy", "roc_auc", "log_loss", "brier"]
            .map(String::from)
            .to_vec(),
    ];
    for (model, report) in validation {
        let mut record = vec![model.clone()];
        match report.metrics() {
            Some(m) => record.extend([
                m.samples.to_string(),
                m.positives.to_string(),
                format!("{:.4}", m.accuracy),
                m.roc_auc.map(|v| format!("{v:.4}")).unwrap_or_default(),
                format!("{:.4}", m.log_loss),
                format!("{:.4}", m.brier),
            ]),
            None => record.extend(std::iter::repeat_n(String::new(), 6)),
        }
        out.push(record);
    }
    out
}

fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed creating {}", path.display()))?;
    for row in rows {
        writer
            .write_record(row)
            .with_context(|| format!("failed writing row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed flushing {}", path.display()))?;
    Ok(())
}

pub fn write_predictions_csv(path: &Path, predictions: &[Prediction]) -> Result<()> {
    write_csv(path, &prediction_table(predictions))
}

pub fn write_report_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    write_csv(path, &report_table(rows))
}

pub fn write_validation_csv(path: &Path, validation: &[(String, ValidationReport)]) -> Result<()> {
    write_csv(path, &validation_table(validation))
}

pub fn write_workbook(
    path: &Path,
    predictions: &[Prediction],
    report: &[ReportRow],
    validation: &[(String, ValidationReport)],
) -> Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_table(predictions))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Report")?;
        write_rows(sheet, &report_table(report))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Validation")?;
        write_rows(sheet, &validation_table(validation))?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            // Signed odds stay text; other numeric cells are written as numbers.
            let result = match value.parse::<f64>() {
                Ok(n) if row_idx > 0 && !value.starts_with(['+', '-']) => {
                    worksheet.write_number(row_idx as u32, col_idx as u16, n)
                }
                _ => worksheet.write_string(row_idx as u32, col_idx as u16, value),
            };
            result.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
