use crate::domain::model::{RunSummary, TipCountRecord, TipPosition, ToolId, WellLocation};
use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::time::Duration;

/// 儀器端的移液動作。找不到 tip 時必須回傳 `ProtocolError::OutOfTips`，
/// 其他錯誤一律視為硬體故障。
pub trait Pipette {
    fn pick_up_tip_at(&mut self, position: &TipPosition) -> Result<()>;
    fn aspirate(&mut self, tool: &ToolId, volume: f64, location: &WellLocation) -> Result<()>;
    fn dispense(&mut self, tool: &ToolId, volume: f64, location: &WellLocation) -> Result<()>;
    fn mix(
        &mut self,
        tool: &ToolId,
        repetitions: u32,
        volume: f64,
        location: &WellLocation,
    ) -> Result<()>;
    /// 移到指定位置但不吸放液，例如 blow out 前抬高到孔內安全高度
    fn move_to(&mut self, tool: &ToolId, location: &WellLocation) -> Result<()>;
    fn blow_out(&mut self, tool: &ToolId) -> Result<()>;
    fn drop_tip(&mut self, tool: &ToolId) -> Result<()>;
    fn home(&mut self) -> Result<()>;
    /// 吸液與放液速度 (µl/s)，小體積與黏稠液體需要調慢
    fn set_flow_rate(&mut self, tool: &ToolId, aspirate: f64, dispense: f64) -> Result<()>;
}

/// 面向操作員的能力：暫停等待確認、指示燈、提示音、延遲
pub trait OperatorConsole {
    /// 阻塞直到操作員確認，沒有逾時
    fn pause(&mut self, message: &str) -> Result<()>;
    fn set_indicator(&mut self, on: bool) -> Result<()>;
    fn indicator_on(&self) -> bool;
    fn play_tone(&mut self) -> Result<()>;
    fn delay(&mut self, duration: Duration);
}

pub trait CountStore {
    fn load(&self) -> Result<Option<TipCountRecord>>;
    fn save(&self, record: &TipCountRecord) -> Result<()>;
}

/// 取得 tip 的能力，注入到 recipe 中
pub trait TipSource {
    fn acquire<P: Pipette, C: OperatorConsole>(
        &mut self,
        tool_id: &ToolId,
        pipette: &mut P,
        console: &mut C,
    ) -> Result<TipPosition>;
}

/// tip 用量帳本，供持久化與執行摘要使用
pub trait TipLedger {
    fn restore(&mut self, record: &TipCountRecord);
    fn snapshot(&self) -> TipCountRecord;
    fn counts(&self) -> BTreeMap<String, usize>;
    fn rack_replacements(&self) -> usize;
}

/// 剩餘體積轉換成吸液深度 (距孔底 mm)
pub trait DepthEstimator {
    fn depth_for(&self, remaining_volume: f64) -> Result<f64>;
    fn bottom_offset(&self) -> f64;
}

pub trait Recipe {
    fn prepare(&mut self) -> Result<()>;
    fn execute(&mut self) -> Result<RunSummary>;
    fn teardown(&mut self, summary: &RunSummary) -> Result<()>;
}
