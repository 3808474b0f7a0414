use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::player_features::{FEATURE_COLUMNS, FeatureRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub season: i32,
    pub week: u32,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} week {}", self.season, self.week)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            data: Vec::new(),
        }
    }

    pub fn from_rows(n_cols: usize, rows: &[Vec<f64>]) -> Self {
        let mut m = Self::new(n_cols);
        for row in rows {
            m.push_row(row);
        }
        m
    }

    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.n_cols, "row width must match matrix width");
        self.data.extend_from_slice(row);
    }

    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.data.len() / self.n_cols
        }
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.n_cols.max(1))
    }

    pub fn column(&self, j: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows().map(move |r| r[j])
    }
}

fn matrix_of(rows: &[FeatureRow]) -> FeatureMatrix {
    let mut m = FeatureMatrix::new(FEATURE_COLUMNS.len());
    for row in rows {
        m.push_row(&row.features());
    }
    m
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeagueBaselines {
    pub player_td_rate: f64,
    pub team_td_rate: f64,
    pub opp_td_allowed_rate: f64,
}

pub const DEFAULT_PLAYER_TD_RATE: f64 = 0.35;

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl LeagueBaselines {
    fn compute(train: &[FeatureRow], validation: &[FeatureRow], upcoming: &[FeatureRow]) -> Self {
        let player_td_rate = mean(validation.iter().filter_map(FeatureRow::total_td))
            .or_else(|| mean(train.iter().filter_map(FeatureRow::total_td)))
            .unwrap_or(DEFAULT_PLAYER_TD_RATE);
        Self {
            player_td_rate,
            team_td_rate: mean(upcoming.iter().map(|r| r.team_td_rate)).unwrap_or(0.0),
            opp_td_allowed_rate: mean(upcoming.iter().map(|r| r.opp_td_allowed_rate))
                .unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetBundle {
    target: Target,
    feature_columns: Vec<&'static str>,
    train: Vec<FeatureRow>,
    validation: Vec<FeatureRow>,
    upcoming: Vec<FeatureRow>,
    baselines: LeagueBaselines,
}

impl DatasetBundle {
    pub fn target(&self) -> Target {
        self.target
    }

    pub fn feature_columns(&self) -> &[&'static str] {
        &self.feature_columns
    }

    pub fn train(&self) -> &[FeatureRow] {
        &self.train
    }

    pub fn validation(&self) -> &[FeatureRow] {
        &self.validation
    }

    pub fn upcoming(&self) -> &[FeatureRow] {
        &self.upcoming
    }

    pub fn baselines(&self) -> LeagueBaselines {
        self.baselines
    }

    pub fn train_matrix(&self) -> FeatureMatrix {
        matrix_of(&self.train)
    }

    pub fn validation_matrix(&self) -> FeatureMatrix {
        matrix_of(&self.validation)
    }

    pub fn upcoming_matrix(&self) -> FeatureMatrix {
        matrix_of(&self.upcoming)
    }

    pub fn train_labels(&self) -> Vec<bool> {
        labels_of(&self.train)
    }

    pub fn validation_labels(&self) -> Vec<bool> {
        labels_of(&self.validation)
    }
}

fn labels_of(rows: &[FeatureRow]) -> Vec<bool> {
    rows.iter().map(|r| r.scored_td.unwrap_or(false)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionCounts {
    pub total: usize,
    pub invalid: usize,
    pub excluded: usize,
    pub train: usize,
    pub validation: usize,
    pub upcoming: usize,
}

pub fn partition(
    rows: Vec<FeatureRow>,
    target: Target,
    min_games: usize,
) -> (DatasetBundle, PartitionCounts) {
    let mut counts = PartitionCounts {
        total: rows.len(),
        ..PartitionCounts::default()
    };
    let mut train = Vec::new();
    let mut validation = Vec::new();
    let mut upcoming = Vec::new();

    for row in rows {
        if row.games_prior < min_games || row.record.opponent_team.trim().is_empty() {
            counts.invalid += 1;
            continue;
        }
        if row.is_placeholder() {
            if row.season == target.season && row.week == target.week {
                upcoming.push(row);
            } else {
                counts.excluded += 1;
            }
        } else if row.season < target.season {
            train.push(row);
        } else if row.season == target.season && row.week < target.week {
            validation.push(row);
        } else {
            counts.excluded += 1;
        }
    }

    counts.train = train.len();
    counts.validation = validation.len();
    counts.upcoming = upcoming.len();

    info!(
        target = %target,
        train = counts.train,
        validation = counts.validation,
        upcoming = counts.upcoming,
        invalid = counts.invalid,
        excluded = counts.excluded,
        "partitioned feature table"
    );
    if validation.is_empty() {
        warn!(target = %target, "validation set is empty; models will be reported unscored");
    }

    let baselines = LeagueBaselines::compute(&train, &validation, &upcoming);
    let bundle = DatasetBundle {
        target,
        feature_columns: FEATURE_COLUMNS.to_vec(),
        train,
        validation,
        upcoming,
        baselines,
    };
    (bundle, counts)
}
