use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("{table} table at {path} is missing required column(s): {}", missing.join(", "))]
    MissingColumns {
        table: &'static str,
        path: PathBuf,
        missing: Vec<String>,
    },

    #[error("{table} table at {path}: {source}")]
    Csv {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("cannot fit {model} on an empty training set")]
    EmptyTrainingSet { model: &'static str },

    #[error("{model}: feature matrix has {rows} rows but {labels} labels")]
    LabelMismatch {
        model: &'static str,
        rows: usize,
        labels: usize,
    },

    #[error("{model}: expected {expected} feature columns, got {got}")]
    ColumnMismatch {
        model: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{model} has not been fitted")]
    NotFitted { model: &'static str },
}

#[derive(Error, Debug, PartialEq)]
pub enum SimulationError {
    #[error("invalid Poisson rate {lambda} for {player}")]
    InvalidRate { player: String, lambda: f64 },
}
