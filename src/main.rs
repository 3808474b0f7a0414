use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use anytime_td::config::{ConfigOverrides, PipelineConfig};
use anytime_td::dataset::Target;
use anytime_td::logging;
use anytime_td::pipeline::{self, InputPaths, PipelineInputs};

#[derive(Parser, Debug)]
#[command(name = "anytime_td")]
#[command(about = "Anytime touchdown probabilities for one upcoming week", long_about = None)]
struct Cli {
    /// Player-game statistics CSV
    #[arg(long, env = "TD_PLAYERS")]
    players: PathBuf,

    /// Team game log CSV
    #[arg(long, env = "TD_TEAM_LOG")]
    team_log: PathBuf,

    /// Roster CSV used to fill missing positions
    #[arg(long, env = "TD_ROSTER")]
    roster: PathBuf,

    /// Upcoming schedule CSV (home_team, away_team); defaults to the log's games for the week
    #[arg(long, env = "TD_SCHEDULE")]
    schedule: Option<PathBuf>,

    #[arg(long)]
    season: i32,

    #[arg(long)]
    week: u32,

    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Also write an xlsx workbook
    #[arg(long)]
    xlsx: bool,

    /// Report rows printed to stdout
    #[arg(long, default_value_t = 20)]
    top: usize,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn main() -> Result<()> {
    let config = PipelineConfig::from_env();
    let cli = Cli::parse();
    logging::init("info")?;
    let config = config.with_overrides(&cli.overrides);

    if !(1..=18).contains(&cli.week) {
        bail!("week must be between 1 and 18, got {}", cli.week);
    }
    let target = Target {
        season: cli.season,
        week: cli.week,
    };

    let full = PipelineInputs::load(&InputPaths {
        players: cli.players,
        team_log: cli.team_log,
        roster: cli.roster,
        schedule: cli.schedule,
    })?;
    let inputs = full.for_target(target)?;

    info!(target = %target, ?config, "starting run");
    let output = pipeline::run(&inputs, target, &config);
    let files = pipeline::write_outputs(&cli.out_dir, &output, &config, cli.xlsx)
        .with_context(|| format!("writing outputs to {}", cli.out_dir.display()))?;

    for (name, report) in output.validation() {
        match report.metrics() {
            Some(m) => println!(
                "{name:<12} n={:<5} acc={:.3} auc={} logloss={:.4} brier={:.4}",
                m.samples,
                m.accuracy,
                m.roc_auc.map_or("n/a".to_string(), |v| format!("{v:.3}")),
                m.log_loss,
                m.brier
            ),
            None => println!("{name:<12} no validation rows"),
        }
    }
    for omitted in &output.ensemble.omitted {
        println!("{:<12} omitted: {}", omitted.name, omitted.reason);
    }
    println!();
    for row in output.report.iter().take(cli.top) {
        let (best_model, best) = row.highest.clone().unwrap_or_default();
        println!(
            "{:<24} {:>4} vs {:<4} best {:.3} ({best_model}) spread {:.3}",
            row.player,
            row.team,
            row.opponent_team,
            best,
            row.spread().unwrap_or(0.0)
        );
    }

    println!("\npredictions: {}", files.predictions.display());
    println!("report:      {}", files.report.display());
    if let Some(path) = &files.workbook {
        println!("workbook:    {}", path.display());
    }
    Ok(())
}
