use crate::core::attention::AttentionSignal;
use crate::core::{OperatorConsole, Pipette, TipLedger, TipSource};
use crate::domain::model::{TipCountRecord, TipPosition, TipSupply, ToolId};
use crate::utils::error::{ProtocolError, Result};
use std::collections::BTreeMap;

/// 追蹤每個工具的 tip 用量，用完時走「提示 → 暫停 → 歸零 → 重試一次」流程
#[derive(Debug, Clone)]
pub struct TipSupplyTracker {
    supplies: BTreeMap<ToolId, TipSupply>,
    signal: AttentionSignal,
    rack_replacements: usize,
}

impl TipSupplyTracker {
    pub fn new(signal: AttentionSignal) -> Self {
        Self {
            supplies: BTreeMap::new(),
            signal,
            rack_replacements: 0,
        }
    }

    pub fn with_supplies(signal: AttentionSignal, supplies: Vec<TipSupply>) -> Self {
        let mut tracker = Self::new(signal);
        for supply in supplies {
            tracker.register(supply);
        }
        tracker
    }

    pub fn register(&mut self, supply: TipSupply) {
        tracing::debug!(
            "🧰 Registered tool {} with {} racks ({} positions)",
            supply.tool_id,
            supply.racks.len(),
            supply.capacity()
        );
        self.supplies.insert(supply.tool_id.clone(), supply);
    }

    pub fn supply(&self, tool_id: &ToolId) -> Result<&TipSupply> {
        self.supplies
            .get(tool_id)
            .ok_or_else(|| ProtocolError::UnknownTool {
                tool_id: tool_id.to_string(),
            })
    }

    fn supply_mut(&mut self, tool_id: &ToolId) -> Result<&mut TipSupply> {
        self.supplies
            .get_mut(tool_id)
            .ok_or_else(|| ProtocolError::UnknownTool {
                tool_id: tool_id.to_string(),
            })
    }

    pub fn remaining(&self, tool_id: &ToolId) -> Result<usize> {
        Ok(self.supply(tool_id)?.remaining())
    }

    /// 盒子實際更換後呼叫
    pub fn reset(&mut self, tool_id: &ToolId) -> Result<()> {
        self.supply_mut(tool_id)?.reset();
        tracing::info!("🔄 Tip count reset for tool {}", tool_id);
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for supply in self.supplies.values_mut() {
            supply.reset();
        }
    }

    fn try_acquire<P: Pipette>(&mut self, tool_id: &ToolId, pipette: &mut P) -> Result<TipPosition> {
        let supply = self.supply_mut(tool_id)?;
        let position = supply
            .next_position()
            .ok_or_else(|| ProtocolError::OutOfTips {
                tool_id: tool_id.to_string(),
            })?;
        pipette.pick_up_tip_at(&position)?;
        supply.mark_used();
        Ok(position)
    }
}

impl TipLedger for TipSupplyTracker {
    fn rack_replacements(&self) -> usize {
        self.rack_replacements
    }

    /// 從持久化紀錄還原計數；未登記的工具忽略
    fn restore(&mut self, record: &TipCountRecord) {
        for (tool, count) in &record.tools {
            match self.supplies.get_mut(&ToolId::new(tool.as_str())) {
                Some(supply) => {
                    let restored = supply.restore(*count);
                    if restored != *count {
                        tracing::warn!(
                            "⚠️ Stored count {} for tool {} exceeds capacity, clamped to {}",
                            count,
                            tool,
                            restored
                        );
                    } else {
                        tracing::info!("📥 Restored tool {} at {} used tips", tool, restored);
                    }
                }
                None => tracing::warn!("⚠️ Ignoring stored count for unknown tool {}", tool),
            }
        }
    }

    fn counts(&self) -> BTreeMap<String, usize> {
        self.supplies
            .iter()
            .map(|(id, supply)| (id.to_string(), supply.used_count()))
            .collect()
    }

    fn snapshot(&self) -> TipCountRecord {
        TipCountRecord {
            updated_at: Some(chrono::Utc::now()),
            tools: self.counts(),
        }
    }
}

impl TipSource for TipSupplyTracker {
    fn acquire<P: Pipette, C: OperatorConsole>(
        &mut self,
        tool_id: &ToolId,
        pipette: &mut P,
        console: &mut C,
    ) -> Result<TipPosition> {
        match self.try_acquire(tool_id, pipette) {
            Err(ProtocolError::OutOfTips { .. }) => {
                tracing::warn!("🚨 Tool {} is out of tips, waiting for rack replacement", tool_id);
                self.signal.emit(console)?;
                console.pause(&format!("Replace empty tip racks for tool {}", tool_id))?;
                self.reset(tool_id)?;
                self.rack_replacements += 1;

                // 只重試一次，避免無限迴圈
                match self.try_acquire(tool_id, pipette) {
                    Err(ProtocolError::OutOfTips { .. }) => {
                        tracing::error!("❌ Tool {} still has no tips after replacement", tool_id);
                        Err(ProtocolError::TipsStillExhausted {
                            tool_id: tool_id.to_string(),
                        })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }
}
