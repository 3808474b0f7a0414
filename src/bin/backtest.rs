//! Walk-forward evaluation: forecast each week of a past season using only
//! what was known beforehand, then score against what actually happened.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use anytime_td::config::{ConfigOverrides, PipelineConfig};
use anytime_td::dataset::Target;
use anytime_td::logging;
use anytime_td::metrics::{BinaryMetrics, evaluate_binary};
use anytime_td::pipeline::{self, InputPaths, PipelineInputs};
use anytime_td::positions::PositionResolver;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Walk-forward scoring of every component over a past season", long_about = None)]
struct Cli {
    #[arg(long, env = "TD_PLAYERS")]
    players: PathBuf,

    #[arg(long, env = "TD_TEAM_LOG")]
    team_log: PathBuf,

    #[arg(long, env = "TD_ROSTER")]
    roster: PathBuf,

    #[arg(long)]
    season: i32,

    #[arg(long, default_value_t = 2)]
    from_week: u32,

    #[arg(long, default_value_t = 18)]
    to_week: u32,

    /// Per-week metrics CSV
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Debug, Serialize)]
struct WeekScore {
    season: i32,
    week: u32,
    model: String,
    samples: usize,
    positives: usize,
    accuracy: f64,
    roc_auc: Option<f64>,
    log_loss: f64,
    brier: f64,
}

impl WeekScore {
    fn new(target: Target, model: &str, m: &BinaryMetrics) -> Self {
        Self {
            season: target.season,
            week: target.week,
            model: model.to_string(),
            samples: m.samples,
            positives: m.positives,
            accuracy: m.accuracy,
            roc_auc: m.roc_auc,
            log_loss: m.log_loss,
            brier: m.brier,
        }
    }
}

fn actual_scorers(inputs: &PipelineInputs, target: Target, roster_season: i32) -> HashMap<String, bool> {
    let resolver = PositionResolver::from_roster(&inputs.roster, roster_season);
    let week_rows = inputs
        .players
        .iter()
        .filter(|r| r.season_week() == Some((target.season, target.week)))
        .cloned()
        .collect::<Vec<_>>();
    let (resolved, _) = resolver.resolve(&week_rows);

    let mut out = HashMap::new();
    for row in resolved {
        let Some(stats) = row.stats else {
            continue;
        };
        let scored = stats.total_td(row.position) > 0.0;
        *out.entry(row.player_id).or_insert(false) |= scored;
    }
    out
}

fn main() -> Result<()> {
    let config = PipelineConfig::from_env();
    let cli = Cli::parse();
    logging::init("warn")?;
    let config = config.with_overrides(&cli.overrides);

    if cli.from_week < 1 || cli.to_week > 18 || cli.from_week > cli.to_week {
        bail!("invalid week range {}..={}", cli.from_week, cli.to_week);
    }

    let full = PipelineInputs::load(&InputPaths {
        players: cli.players,
        team_log: cli.team_log,
        roster: cli.roster,
        schedule: None,
    })?;
    let roster_season = config
        .roster_season
        .and_then(|s| i32::try_from(s).ok())
        .unwrap_or(cli.season);

    let mut scores = Vec::new();
    let mut pooled: BTreeMap<String, (Vec<f64>, Vec<bool>)> = BTreeMap::new();

    for week in cli.from_week..=cli.to_week {
        let target = Target {
            season: cli.season,
            week,
        };
        let inputs = match full.for_target(target) {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!(target = %target, "skipping week: {err:#}");
                continue;
            }
        };

        let output = pipeline::run(&inputs, target, &config);
        let actual = actual_scorers(&full, target, roster_season);

        let mut by_model: BTreeMap<&str, (Vec<f64>, Vec<bool>)> = BTreeMap::new();
        for p in &output.predictions {
            // Players projected but inactive that week have no outcome to score.
            let Some(scored) = actual.get(&p.player_id) else {
                continue;
            };
            let entry = by_model.entry(p.model.as_str()).or_default();
            entry.0.push(p.probability);
            entry.1.push(*scored);
        }

        for (model, (probs, labels)) in by_model {
            if let Some(m) = evaluate_binary(&probs, &labels) {
                info!(target = %target, model, samples = m.samples, brier = m.brier, "week scored");
                scores.push(WeekScore::new(target, model, &m));
            }
            let pool = pooled.entry(model.to_string()).or_default();
            pool.0.extend(probs);
            pool.1.extend(labels);
        }
    }

    if let Some(path) = &cli.out {
        let mut writer = csv::Writer::from_path(path)?;
        for score in &scores {
            writer.serialize(score)?;
        }
        writer.flush()?;
    }

    println!(
        "{:<12} {:>7} {:>8} {:>8} {:>9} {:>8}",
        "model", "n", "acc", "auc", "logloss", "brier"
    );
    for (model, (probs, labels)) in &pooled {
        let Some(m) = evaluate_binary(probs, labels) else {
            continue;
        };
        println!(
            "{:<12} {:>7} {:>8.3} {:>8} {:>9.4} {:>8.4}",
            model,
            m.samples,
            m.accuracy,
            m.roc_auc.map_or("n/a".to_string(), |v| format!("{v:.3}")),
            m.log_loss,
            m.brier
        );
    }
    Ok(())
}
