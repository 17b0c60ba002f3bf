pub mod attention;
pub mod engine;
pub mod height;
pub mod reservoir;
pub mod tip_supply;

pub use crate::domain::model::{RunSummary, TipPosition, TipSupply, ToolId, WellLocation};
pub use crate::domain::ports::{
    CountStore, DepthEstimator, OperatorConsole, Pipette, Recipe, TipLedger, TipSource,
};
pub use crate::utils::error::Result;
