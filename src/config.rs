use std::env;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use crate::simulator::MIN_SAMPLES;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub window: usize,
    pub min_games: usize,
    pub sim_samples: usize,
    pub seed: u64,
    pub trainer_deadline: Duration,
    pub roster_season: Option<i64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: 3,
            min_games: 1,
            sim_samples: MIN_SAMPLES,
            seed: 42,
            trainer_deadline: Duration::from_secs(600),
            roster_season: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            window: parsed("TD_WINDOW").map_or(defaults.window, |v| v as usize),
            min_games: parsed("TD_MIN_GAMES").map_or(defaults.min_games, |v| v as usize),
            sim_samples: parsed("TD_SIM_SAMPLES").map_or(defaults.sim_samples, |v| v as usize),
            seed: parsed("TD_SEED").unwrap_or(defaults.seed),
            trainer_deadline: parsed("TD_TRAINER_DEADLINE_SECS")
                .map_or(defaults.trainer_deadline, Duration::from_secs),
            roster_season: lookup("TD_ROSTER_SEASON").and_then(|v| v.trim().parse::<i64>().ok()),
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            window: self.window.clamp(1, 17),
            min_games: self.min_games.min(17),
            sim_samples: self.sim_samples.clamp(MIN_SAMPLES, 10_000_000),
            trainer_deadline: self
                .trainer_deadline
                .clamp(Duration::from_secs(1), Duration::from_secs(24 * 3600)),
            ..self
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Trailing window in games
    #[arg(long)]
    pub window: Option<usize>,

    /// Minimum prior games for a row to be used
    #[arg(long)]
    pub min_games: Option<usize>,

    /// Poisson draws per player (at least 10000)
    #[arg(long)]
    pub sim_samples: Option<usize>,

    /// Seed shared by every stochastic component
    #[arg(long)]
    pub seed: Option<u64>,

    /// Seconds to wait for each model before dropping it
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Roster season for position lookups (defaults to the target season)
    #[arg(long)]
    pub roster_season: Option<i64>,
}

impl PipelineConfig {
    pub fn with_overrides(self, o: &ConfigOverrides) -> Self {
        Self {
            window: o.window.unwrap_or(self.window),
            min_games: o.min_games.unwrap_or(self.min_games),
            sim_samples: o.sim_samples.unwrap_or(self.sim_samples),
            seed: o.seed.unwrap_or(self.seed),
            trainer_deadline: o
                .deadline_secs
                .map_or(self.trainer_deadline, Duration::from_secs),
            roster_season: o.roster_season.or(self.roster_season),
        }
        .clamped()
    }
}
