use libprep_core::core::attention::AttentionSignal;
use libprep_core::core::{OperatorConsole, Pipette, TipLedger, TipSource};
use libprep_core::domain::model::{TipPosition, TipSupply, ToolId, WellLocation};
use libprep_core::{ProtocolError, Result, SimulatedPipette, TipSupplyTracker};
use std::time::Duration;

/// Console double that records every interaction in order.
#[derive(Default)]
struct ScriptedConsole {
    light: bool,
    events: Vec<String>,
}

impl ScriptedConsole {
    fn toggles(&self) -> usize {
        self.events.iter().filter(|e| e.starts_with("light")).count()
    }

    fn pauses(&self) -> usize {
        self.events.iter().filter(|e| e.starts_with("pause")).count()
    }
}

impl OperatorConsole for ScriptedConsole {
    fn pause(&mut self, message: &str) -> Result<()> {
        self.events.push(format!("pause:{}", message));
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<()> {
        self.light = on;
        self.events.push(format!("light:{}", on));
        Ok(())
    }

    fn indicator_on(&self) -> bool {
        self.light
    }

    fn play_tone(&mut self) -> Result<()> {
        self.events.push("tone".to_string());
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        self.events.push(format!("delay:{}", duration.as_millis()));
    }
}

/// Pipette whose physical racks hold `physical_tips` regardless of what the tracker counts.
struct RackPipette {
    inner: SimulatedPipette,
    physical_tips: usize,
}

impl Pipette for RackPipette {
    fn pick_up_tip_at(&mut self, position: &TipPosition) -> Result<()> {
        if self.physical_tips == 0 {
            return Err(ProtocolError::OutOfTips {
                tool_id: position.tool_id.to_string(),
            });
        }
        self.physical_tips -= 1;
        self.inner.pick_up_tip_at(position)
    }

    fn aspirate(&mut self, tool: &ToolId, volume: f64, location: &WellLocation) -> Result<()> {
        self.inner.aspirate(tool, volume, location)
    }

    fn dispense(&mut self, tool: &ToolId, volume: f64, location: &WellLocation) -> Result<()> {
        self.inner.dispense(tool, volume, location)
    }

    fn mix(&mut self, tool: &ToolId, reps: u32, volume: f64, location: &WellLocation) -> Result<()> {
        self.inner.mix(tool, reps, volume, location)
    }

    fn move_to(&mut self, tool: &ToolId, location: &WellLocation) -> Result<()> {
        self.inner.move_to(tool, location)
    }

    fn blow_out(&mut self, tool: &ToolId) -> Result<()> {
        self.inner.blow_out(tool)
    }

    fn drop_tip(&mut self, tool: &ToolId) -> Result<()> {
        self.inner.drop_tip(tool)
    }

    fn home(&mut self) -> Result<()> {
        self.inner.home()
    }

    fn set_flow_rate(&mut self, tool: &ToolId, aspirate: f64, dispense: f64) -> Result<()> {
        self.inner.set_flow_rate(tool, aspirate, dispense)
    }
}

fn tracker(racks: usize, per_rack: usize) -> TipSupplyTracker {
    TipSupplyTracker::with_supplies(
        AttentionSignal::new(8, Duration::from_millis(200), true),
        vec![TipSupply::new(
            ToolId::new("right"),
            (1..=racks).map(|r| r.to_string()).collect(),
            per_rack,
            8,
        )],
    )
}

fn cycle(
    tips: &mut TipSupplyTracker,
    pipette: &mut impl Pipette,
    console: &mut ScriptedConsole,
) -> Result<TipPosition> {
    let tool = ToolId::new("right");
    let position = tips.acquire(&tool, pipette, console)?;
    pipette.drop_tip(&tool)?;
    Ok(position)
}

#[test]
fn test_exhaustion_triggers_exactly_once_after_capacity() {
    let mut tips = tracker(2, 3);
    let mut pipette = SimulatedPipette::new();
    let mut console = ScriptedConsole::default();

    let positions: Vec<TipPosition> = (0..6)
        .map(|_| cycle(&mut tips, &mut pipette, &mut console).unwrap())
        .collect();

    // Rack order first, then position order within the rack.
    let order: Vec<(String, String)> = positions
        .iter()
        .map(|p| (p.rack_slot.clone(), p.well.clone()))
        .collect();
    assert_eq!(order[0], ("1".to_string(), "A1".to_string()));
    assert_eq!(order[2], ("1".to_string(), "A3".to_string()));
    assert_eq!(order[3], ("2".to_string(), "A1".to_string()));
    assert_eq!(console.pauses(), 0);

    let next = cycle(&mut tips, &mut pipette, &mut console).unwrap();

    assert_eq!(console.pauses(), 1);
    assert_eq!(console.toggles(), 8);
    assert_eq!(tips.rack_replacements(), 1);
    assert_eq!(next.rack_slot, "1");
    assert_eq!(next.well, "A1");
    assert_eq!(tips.counts()["right"], 1);
}

#[test]
fn test_exhaustion_sequence_signals_before_pause_then_resets() {
    let mut tips = tracker(1, 1);
    let mut pipette = SimulatedPipette::new();
    let mut console = ScriptedConsole::default();

    cycle(&mut tips, &mut pipette, &mut console).unwrap();
    console.events.clear();
    cycle(&mut tips, &mut pipette, &mut console).unwrap();

    let pause_at = console
        .events
        .iter()
        .position(|e| e.starts_with("pause"))
        .unwrap();
    assert_eq!(pause_at, console.events.len() - 1);
    assert_eq!(console.toggles(), 8);
    assert_eq!(
        console.events.iter().filter(|e| e.starts_with("delay:200")).count(),
        8
    );
    // The indicator starts off, so it turns on at flips 1, 3, 5 and 7.
    assert_eq!(console.events.iter().filter(|e| *e == "tone").count(), 4);
    assert_eq!(tips.counts()["right"], 1);
}

#[test]
fn test_unreplaced_racks_are_fatal_after_one_retry() {
    let mut tips = tracker(1, 12);
    let mut pipette = RackPipette {
        inner: SimulatedPipette::new(),
        physical_tips: 0,
    };
    let mut console = ScriptedConsole::default();

    let err = tips
        .acquire(&ToolId::new("right"), &mut pipette, &mut console)
        .unwrap_err();

    assert!(matches!(err, ProtocolError::TipsStillExhausted { .. }));
    assert!(!err.is_recoverable());
    assert_eq!(console.pauses(), 1);
    assert_eq!(console.toggles(), 8);
    assert_eq!(tips.counts()["right"], 0);
}

#[test]
fn test_count_mismatch_recovers_when_racks_are_refilled() {
    let mut tips = tracker(1, 12);
    let mut pipette = RackPipette {
        inner: SimulatedPipette::new(),
        physical_tips: 2,
    };
    let mut console = ScriptedConsole::default();
    let tool = ToolId::new("right");

    cycle(&mut tips, &mut pipette, &mut console).unwrap();
    cycle(&mut tips, &mut pipette, &mut console).unwrap();

    // Racks are physically empty although the tracker still counts 10 tips.
    assert_eq!(tips.remaining(&tool).unwrap(), 10);
    pipette.physical_tips = 0;
    assert!(matches!(
        tips.acquire(&tool, &mut pipette, &mut console),
        Err(ProtocolError::TipsStillExhausted { .. })
    ));

    // Operator replaces the racks this time.
    pipette.physical_tips = 12;
    let position = cycle(&mut tips, &mut pipette, &mut console).unwrap();
    assert_eq!(position.well, "A1");
    assert_eq!(console.pauses(), 1);
}

#[test]
fn test_unregistered_tool_is_a_programming_error() {
    let mut tips = tracker(1, 12);
    let mut pipette = SimulatedPipette::new();
    let mut console = ScriptedConsole::default();

    let err = tips
        .acquire(&ToolId::new("left"), &mut pipette, &mut console)
        .unwrap_err();

    assert!(matches!(err, ProtocolError::UnknownTool { .. }));
    assert!(console.events.is_empty());
}
