pub mod config;
pub mod dataset;
pub mod ensemble;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod odds;
pub mod pipeline;
pub mod placeholders;
pub mod player_features;
pub mod positions;
pub mod report;
pub mod rolling;
pub mod simulator;
pub mod tables;
pub mod team_features;
