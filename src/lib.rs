pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{SimulatedPipette, TerminalConsole, ToneCommand};
pub use app::recipes::StepRecipe;
pub use config::{JsonCountStore, NoopCountStore, ProtocolConfig};
pub use crate::core::{
    engine::ProtocolEngine, height::estimate_depth, height::CylinderEstimator,
    reservoir::ReservoirState, tip_supply::TipSupplyTracker,
};
pub use utils::error::{ProtocolError, Result};
