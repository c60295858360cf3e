pub mod args;
pub mod backtest;
pub mod calibration;
pub mod config;
pub mod edge;
pub mod error;
pub mod export;
pub mod features;
pub mod historical_dataset;
pub mod injury_impact;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod review;
pub mod snapshot;
pub mod stat_store;
pub mod synthetic;

pub use error::{PipelineError, Result};
