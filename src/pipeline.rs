use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::dataset::{DatasetBundle, LeagueBaselines, PartitionCounts, Target, partition};
use crate::ensemble::{
    Component, EnsembleOutcome, OmittedComponent, collect_predictions, run_components,
};
use crate::metrics::ValidationReport;
use crate::models::default_classifiers;
use crate::placeholders::{player_placeholders, team_placeholders};
use crate::player_features::build_player_features;
use crate::positions::{PositionResolver, ResolutionStats};
use crate::report::{
    Prediction, ReportRow, build_report, dedup_predictions, write_predictions_csv,
    write_report_csv, write_validation_csv, write_workbook,
};
use crate::simulator::PoissonSimulator;
use crate::tables::{
    GameKey, PlayerGameRecord, RosterEntry, ScheduledGame, TeamGameLogRow, dedup_player_games,
    dedup_team_log, load_player_games, load_roster, load_schedule, load_team_log, pivot_team_log,
    schedule_from_log,
};
use crate::team_features::build_team_features;

#[derive(Debug, Clone)]
pub struct InputPaths {
    pub players: PathBuf,
    pub team_log: PathBuf,
    pub roster: PathBuf,
    pub schedule: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub players: Vec<PlayerGameRecord>,
    pub team_log: Vec<TeamGameLogRow>,
    pub roster: Vec<RosterEntry>,
    pub schedule: Vec<ScheduledGame>,
}

impl PipelineInputs {
    pub fn load(paths: &InputPaths) -> Result<Self> {
        let players = load_player_games(&paths.players).context("loading player-game table")?;
        let team_log = load_team_log(&paths.team_log).context("loading team-game log")?;
        let roster = load_roster(&paths.roster).context("loading roster")?;
        let schedule = match &paths.schedule {
            Some(path) => load_schedule(path).context("loading upcoming schedule")?,
            None => Vec::new(),
        };
        info!(
            players = players.len(),
            team_log = team_log.len(),
            roster = roster.len(),
            schedule = schedule.len(),
            "loaded input tables"
        );
        Ok(Self {
            players,
            team_log,
            roster,
            schedule,
        })
    }

    /// Copy holding only what was known before `target` kicked off.
    pub fn known_before(&self, target: Target) -> Self {
        let before = |season: i32, week: u32| (season, week) < (target.season, target.week);
        Self {
            players: self
                .players
                .iter()
                .filter(|r| r.season_week().is_some_and(|(s, w)| before(s, w)))
                .cloned()
                .collect(),
            team_log: self
                .team_log
                .iter()
                .filter(|r| {
                    r.game_id
                        .parse::<GameKey>()
                        .map_or(true, |k| before(k.season, k.week))
                })
                .cloned()
                .collect(),
            roster: self.roster.clone(),
            schedule: self.schedule.clone(),
        }
    }

    pub fn for_target(&self, target: Target) -> Result<Self> {
        let schedule = if self.schedule.is_empty() {
            let games = schedule_from_log(&self.team_log, target.season, target.week);
            info!(games = games.len(), "schedule taken from team log");
            games
        } else {
            self.schedule.clone()
        };
        if schedule.is_empty() {
            bail!("no games scheduled for {target}");
        }
        Ok(Self {
            schedule,
            ..self.known_before(target)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub positions: ResolutionStats,
    pub skipped_log_rows: usize,
    pub duplicate_log_rows: usize,
    pub duplicate_player_rows: usize,
    pub team_placeholders: usize,
    pub player_placeholders: usize,
    pub ineligible_player_rows: usize,
    pub missing_team_joins: usize,
    pub missing_opponent_joins: usize,
    pub partition: PartitionCounts,
}

pub fn build_bundle(
    inputs: &PipelineInputs,
    target: Target,
    config: &PipelineConfig,
) -> (DatasetBundle, Diagnostics) {
    let roster_season = config
        .roster_season
        .and_then(|s| i32::try_from(s).ok())
        .unwrap_or(target.season);
    let resolver = PositionResolver::from_roster(&inputs.roster, roster_season);
    let (players, duplicate_player_rows) = dedup_player_games(&inputs.players);
    let (players, positions) = resolver.resolve(&players);

    let (team_log, duplicate_log_rows) = dedup_team_log(&inputs.team_log);
    let (mut team_records, skipped_log_rows) = pivot_team_log(&team_log);
    let team_extra = team_placeholders(&team_records, &inputs.schedule, target);
    let team_placeholder_count = team_extra.len();
    team_records.extend(team_extra);
    let teams = build_team_features(&team_records, config.window);

    let player_extra = player_placeholders(&players, &inputs.schedule, target);
    let player_placeholder_count = player_extra.len();
    let all_players = players.into_iter().chain(player_extra).collect::<Vec<_>>();
    let (rows, feature_stats) = build_player_features(&all_players, &teams, config.window);

    let (bundle, counts) = partition(rows, target, config.min_games);
    let diagnostics = Diagnostics {
        positions,
        skipped_log_rows,
        duplicate_log_rows,
        duplicate_player_rows,
        team_placeholders: team_placeholder_count,
        player_placeholders: player_placeholder_count,
        ineligible_player_rows: feature_stats.ineligible,
        missing_team_joins: feature_stats.missing_team_join,
        missing_opponent_joins: feature_stats.missing_opponent_join,
        partition: counts,
    };
    if skipped_log_rows > 0 {
        warn!(skipped = skipped_log_rows, "team log rows skipped");
    }
    info!(
        resolution_rate = positions.resolution_rate(),
        team_rows = teams.len(),
        feature_rows = counts.total,
        "feature tables built"
    );
    (bundle, diagnostics)
}

pub fn default_components(config: &PipelineConfig) -> Vec<Component> {
    let mut components = default_classifiers(config.seed)
        .into_iter()
        .map(Component::Classifier)
        .collect::<Vec<_>>();
    components.push(Component::Simulator(PoissonSimulator::new(
        config.sim_samples,
        config.seed,
    )));
    components
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub bundle: Arc<DatasetBundle>,
    pub diagnostics: Diagnostics,
    pub ensemble: EnsembleOutcome,
    pub predictions: Vec<Prediction>,
    pub report: Vec<ReportRow>,
}

impl PipelineOutput {
    pub fn validation(&self) -> Vec<(String, ValidationReport)> {
        self.ensemble
            .outputs
            .iter()
            .map(|o| (o.name.to_string(), o.validation.clone()))
            .collect()
    }
}

pub fn run(inputs: &PipelineInputs, target: Target, config: &PipelineConfig) -> PipelineOutput {
    run_with_components(inputs, target, config, default_components(config))
}

pub fn run_with_components(
    inputs: &PipelineInputs,
    target: Target,
    config: &PipelineConfig,
    components: Vec<Component>,
) -> PipelineOutput {
    let (bundle, diagnostics) = build_bundle(inputs, target, config);
    let bundle = Arc::new(bundle);
    let ensemble = run_components(Arc::clone(&bundle), components, config.trainer_deadline);
    if ensemble.outputs.is_empty() {
        warn!(target = %target, "every component was omitted; report will be empty");
    }

    let (predictions, at_least_two) = collect_predictions(&bundle, &ensemble.outputs);
    let predictions = dedup_predictions(predictions);
    let report = build_report(&predictions, &at_least_two);
    info!(
        target = %target,
        predictions = predictions.len(),
        report_rows = report.len(),
        omitted = ensemble.omitted.len(),
        "pipeline complete"
    );

    PipelineOutput {
        bundle,
        diagnostics,
        ensemble,
        predictions,
        report,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub predictions: PathBuf,
    pub report: PathBuf,
    pub validation: PathBuf,
    pub manifest: PathBuf,
    pub workbook: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunManifest<'a> {
    generated_at: String,
    target: Target,
    config: &'a PipelineConfig,
    diagnostics: &'a Diagnostics,
    baselines: LeagueBaselines,
    components: Vec<&'static str>,
    omitted: &'a [OmittedComponent],
    validation: &'a [(String, ValidationReport)],
}

pub fn write_outputs(
    out_dir: &Path,
    output: &PipelineOutput,
    config: &PipelineConfig,
    xlsx: bool,
) -> Result<OutputFiles> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed creating {}", out_dir.display()))?;
    let target = output.bundle.target();
    let stem = format!("td_{}_wk{:02}", target.season, target.week);

    let files = OutputFiles {
        predictions: out_dir.join(format!("{stem}_predictions.csv")),
        report: out_dir.join(format!("{stem}_report.csv")),
        validation: out_dir.join(format!("{stem}_validation.csv")),
        manifest: out_dir.join(format!("{stem}_run.json")),
        workbook: xlsx.then(|| out_dir.join(format!("{stem}.xlsx"))),
    };
    let validation = output.validation();

    write_predictions_csv(&files.predictions, &output.predictions)?;
    write_report_csv(&files.report, &output.report)?;
    write_validation_csv(&files.validation, &validation)?;
    if let Some(path) = &files.workbook {
        write_workbook(path, &output.predictions, &output.report, &validation)?;
    }

    let manifest = RunManifest {
        generated_at: Utc::now().to_rfc3339(),
        target,
        config,
        diagnostics: &output.diagnostics,
        baselines: output.bundle.baselines(),
        components: output.ensemble.outputs.iter().map(|o| o.name).collect(),
        omitted: &output.ensemble.omitted,
        validation: &validation,
    };
    let json = serde_json::to_string_pretty(&manifest).context("serializing run manifest")?;
    std::fs::write(&files.manifest, json)
        .with_context(|| format!("failed writing {}", files.manifest.display()))?;
    Ok(files)
}
