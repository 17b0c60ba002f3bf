use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const RACK_ROWS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// 一個移液器掛載位置 (例如 "left" / "right")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(pub String);

impl ToolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ToolId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 單一工具的 tip 庫存
#[derive(Debug, Clone, PartialEq)]
pub struct TipSupply {
    pub tool_id: ToolId,
    /// 依取用順序排列的 tip 盒所在槽位
    pub racks: Vec<String>,
    pub positions_per_rack: usize,
    pub channels: usize,
    used_count: usize,
}

impl TipSupply {
    pub fn new(
        tool_id: ToolId,
        racks: Vec<String>,
        positions_per_rack: usize,
        channels: usize,
    ) -> Self {
        Self {
            tool_id,
            racks,
            positions_per_rack,
            channels,
            used_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.racks.len() * self.positions_per_rack
    }

    pub fn used_count(&self) -> usize {
        self.used_count
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.used_count
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.capacity()
    }

    /// 下一個可取用的位置；用完時回傳 None
    pub fn next_position(&self) -> Option<TipPosition> {
        if self.is_exhausted() {
            return None;
        }
        let rack_index = self.used_count / self.positions_per_rack;
        let position_index = self.used_count % self.positions_per_rack;
        Some(TipPosition {
            tool_id: self.tool_id.clone(),
            rack_index,
            rack_slot: self.racks[rack_index].clone(),
            position_index,
            well: well_name(position_index, self.channels),
        })
    }

    pub(crate) fn mark_used(&mut self) {
        debug_assert!(self.used_count < self.capacity());
        self.used_count += 1;
    }

    pub(crate) fn reset(&mut self) {
        self.used_count = 0;
    }

    /// 還原持久化的計數，超過容量時截斷到容量
    pub(crate) fn restore(&mut self, used_count: usize) -> usize {
        self.used_count = used_count.min(self.capacity());
        self.used_count
    }
}

/// 盒內位置編號轉孔位名稱。
/// 單通道逐欄往下 (A1, B1 .. H1, A2)，八通道一次取一整欄 (A1, A2 .. A12)。
pub fn well_name(position_index: usize, channels: usize) -> String {
    if channels >= RACK_ROWS.len() {
        format!("A{}", position_index + 1)
    } else {
        let row = RACK_ROWS[position_index % RACK_ROWS.len()];
        let column = position_index / RACK_ROWS.len() + 1;
        format!("{}{}", row, column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipPosition {
    pub tool_id: ToolId,
    pub rack_index: usize,
    pub rack_slot: String,
    pub position_index: usize,
    pub well: String,
}

impl fmt::Display for TipPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rack {} (slot {}) {}", self.rack_index, self.rack_slot, self.well)
    }
}

/// aspirate / dispense 的目標位置，高度以孔底為基準 (mm)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellLocation {
    pub labware: String,
    pub well: String,
    pub height_from_bottom: f64,
}

impl WellLocation {
    pub fn bottom(labware: impl Into<String>, well: impl Into<String>, height: f64) -> Self {
        Self {
            labware: labware.into(),
            well: well.into(),
            height_from_bottom: height,
        }
    }

    /// 同一個孔，改用另一個高度
    pub fn at_height(&self, height: f64) -> Self {
        Self::bottom(self.labware.as_str(), self.well.as_str(), height)
    }
}

impl fmt::Display for WellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} @ {:.2}mm",
            self.labware, self.well, self.height_from_bottom
        )
    }
}

/// 持久化的 tip 計數檔內容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TipCountRecord {
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tools: BTreeMap<String, usize>,
}

/// 一次執行的摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub steps_executed: usize,
    pub tips_used: usize,
    pub rack_replacements: usize,
    pub volume_transferred: f64,
    pub final_counts: BTreeMap<String, usize>,
    pub remaining_volumes: BTreeMap<String, f64>,
}
