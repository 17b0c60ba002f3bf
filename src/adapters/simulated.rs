use crate::core::Pipette;
use crate::domain::model::{TipPosition, ToolId, WellLocation};
use crate::utils::error::{ProtocolError, Result};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub enum PipetteCommand {
    PickUpTip(TipPosition),
    Aspirate {
        tool: ToolId,
        volume: f64,
        location: WellLocation,
    },
    Dispense {
        tool: ToolId,
        volume: f64,
        location: WellLocation,
    },
    Mix {
        tool: ToolId,
        repetitions: u32,
        volume: f64,
        location: WellLocation,
    },
    MoveTo {
        tool: ToolId,
        location: WellLocation,
    },
    BlowOut(ToolId),
    DropTip(ToolId),
    Home,
    SetFlowRate {
        tool: ToolId,
        aspirate: f64,
        dispense: f64,
    },
}

/// 不接硬體的模擬移液器，記錄每個指令。
/// `with_tip_limit` 可模擬實體 tip 盒比計數更早用完。
#[derive(Debug, Clone, Default)]
pub struct SimulatedPipette {
    commands: Vec<PipetteCommand>,
    tips_attached: BTreeSet<ToolId>,
    tip_limits: BTreeMap<ToolId, usize>,
    flow_rates: BTreeMap<ToolId, (f64, f64)>,
}

impl SimulatedPipette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tip_limit(mut self, tool: impl Into<ToolId>, tips: usize) -> Self {
        self.tip_limits.insert(tool.into(), tips);
        self
    }

    pub fn commands(&self) -> &[PipetteCommand] {
        &self.commands
    }

    pub fn has_tip(&self, tool: &ToolId) -> bool {
        self.tips_attached.contains(tool)
    }

    /// 目前的 (aspirate, dispense) 速度；未設定時為 None，代表儀器預設值
    pub fn flow_rate(&self, tool: &ToolId) -> Option<(f64, f64)> {
        self.flow_rates.get(tool).copied()
    }

    pub fn count<F: Fn(&PipetteCommand) -> bool>(&self, predicate: F) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    fn require_tip(&self, tool: &ToolId, action: &str) -> Result<()> {
        if !self.has_tip(tool) {
            return Err(ProtocolError::HardwareFault {
                message: format!("{} on tool {} without a tip attached", action, tool),
            });
        }
        Ok(())
    }
}

impl Pipette for SimulatedPipette {
    fn pick_up_tip_at(&mut self, position: &TipPosition) -> Result<()> {
        let tool = &position.tool_id;
        if self.has_tip(tool) {
            return Err(ProtocolError::HardwareFault {
                message: format!("tool {} already carries a tip", tool),
            });
        }
        if let Some(remaining) = self.tip_limits.get_mut(tool) {
            if *remaining == 0 {
                return Err(ProtocolError::OutOfTips {
                    tool_id: tool.to_string(),
                });
            }
            *remaining -= 1;
        }

        tracing::debug!("🔹 {} pick up tip at {}", tool, position);
        self.tips_attached.insert(tool.clone());
        self.commands.push(PipetteCommand::PickUpTip(position.clone()));
        Ok(())
    }

    fn aspirate(&mut self, tool: &ToolId, volume: f64, location: &WellLocation) -> Result<()> {
        self.require_tip(tool, "aspirate")?;
        tracing::debug!("⬆️ {} aspirate {:.2} µl from {}", tool, volume, location);
        self.commands.push(PipetteCommand::Aspirate {
            tool: tool.clone(),
            volume,
            location: location.clone(),
        });
        Ok(())
    }

    fn dispense(&mut self, tool: &ToolId, volume: f64, location: &WellLocation) -> Result<()> {
        self.require_tip(tool, "dispense")?;
        tracing::debug!("⬇️ {} dispense {:.2} µl into {}", tool, volume, location);
        self.commands.push(PipetteCommand::Dispense {
            tool: tool.clone(),
            volume,
            location: location.clone(),
        });
        Ok(())
    }

    fn mix(
        &mut self,
        tool: &ToolId,
        repetitions: u32,
        volume: f64,
        location: &WellLocation,
    ) -> Result<()> {
        self.require_tip(tool, "mix")?;
        tracing::debug!("🔁 {} mix {}x {:.2} µl at {}", tool, repetitions, volume, location);
        self.commands.push(PipetteCommand::Mix {
            tool: tool.clone(),
            repetitions,
            volume,
            location: location.clone(),
        });
        Ok(())
    }

    fn move_to(&mut self, tool: &ToolId, location: &WellLocation) -> Result<()> {
        tracing::debug!("↕️ {} move to {}", tool, location);
        self.commands.push(PipetteCommand::MoveTo {
            tool: tool.clone(),
            location: location.clone(),
        });
        Ok(())
    }

    fn blow_out(&mut self, tool: &ToolId) -> Result<()> {
        self.require_tip(tool, "blow out")?;
        self.commands.push(PipetteCommand::BlowOut(tool.clone()));
        Ok(())
    }

    fn drop_tip(&mut self, tool: &ToolId) -> Result<()> {
        self.require_tip(tool, "drop tip")?;
        self.tips_attached.remove(tool);
        self.commands.push(PipetteCommand::DropTip(tool.clone()));
        Ok(())
    }

    fn home(&mut self) -> Result<()> {
        tracing::debug!("🏠 Homing");
        self.commands.push(PipetteCommand::Home);
        Ok(())
    }

    fn set_flow_rate(&mut self, tool: &ToolId, aspirate: f64, dispense: f64) -> Result<()> {
        if !(aspirate.is_finite() && aspirate > 0.0 && dispense.is_finite() && dispense > 0.0) {
            return Err(ProtocolError::HardwareFault {
                message: format!(
                    "tool {} rejected flow rate {} / {} µl/s",
                    tool, aspirate, dispense
                ),
            });
        }
        tracing::debug!("🌊 {} flow rate aspirate {} / dispense {} µl/s", tool, aspirate, dispense);
        self.flow_rates.insert(tool.clone(), (aspirate, dispense));
        self.commands.push(PipetteCommand::SetFlowRate {
            tool: tool.clone(),
            aspirate,
            dispense,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(tool: &str) -> TipPosition {
        TipPosition {
            tool_id: ToolId::new(tool),
            rack_index: 0,
            rack_slot: "1".to_string(),
            position_index: 0,
            well: "A1".to_string(),
        }
    }

    #[test]
    fn test_liquid_handling_requires_tip() {
        let mut pipette = SimulatedPipette::new();
        let tool = ToolId::new("right");
        let well = WellLocation::bottom("plate", "A1", 0.3);

        assert!(matches!(
            pipette.aspirate(&tool, 5.0, &well),
            Err(ProtocolError::HardwareFault { .. })
        ));

        pipette.pick_up_tip_at(&position("right")).unwrap();
        pipette.aspirate(&tool, 5.0, &well).unwrap();
        pipette.drop_tip(&tool).unwrap();
        assert!(!pipette.has_tip(&tool));
        assert_eq!(pipette.commands().len(), 3);
    }

    #[test]
    fn test_tip_limit_reports_out_of_tips() {
        let mut pipette = SimulatedPipette::new().with_tip_limit("right", 1);
        let tool = ToolId::new("right");

        pipette.pick_up_tip_at(&position("right")).unwrap();
        pipette.drop_tip(&tool).unwrap();

        assert!(matches!(
            pipette.pick_up_tip_at(&position("right")),
            Err(ProtocolError::OutOfTips { .. })
        ));
    }

    #[test]
    fn test_flow_rate_is_kept_per_tool() {
        let mut pipette = SimulatedPipette::new();
        let right = ToolId::new("right");

        assert_eq!(pipette.flow_rate(&right), None);
        pipette.set_flow_rate(&right, 5.0, 5.0).unwrap();

        assert_eq!(pipette.flow_rate(&right), Some((5.0, 5.0)));
        assert_eq!(pipette.flow_rate(&ToolId::new("left")), None);
        assert!(matches!(
            pipette.set_flow_rate(&right, 0.0, 5.0),
            Err(ProtocolError::HardwareFault { .. })
        ));
        assert_eq!(pipette.flow_rate(&right), Some((5.0, 5.0)));
    }

    #[test]
    fn test_double_pick_up_is_a_fault() {
        let mut pipette = SimulatedPipette::new();
        pipette.pick_up_tip_at(&position("left")).unwrap();
        assert!(matches!(
            pipette.pick_up_tip_at(&position("left")),
            Err(ProtocolError::HardwareFault { .. })
        ));
    }
}
