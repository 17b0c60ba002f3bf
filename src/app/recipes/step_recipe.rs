use crate::config::toml_config::{
    DistributeStep, MixConfig, NewTip, ProtocolConfig, StepConfig, TransferStep,
};
use crate::core::attention::AttentionSignal;
use crate::core::reservoir::ReservoirState;
use crate::core::{
    CountStore, DepthEstimator, OperatorConsole, Pipette, Recipe, RunSummary, TipLedger,
    TipSource, ToolId, WellLocation,
};
use crate::utils::error::{ProtocolError, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// 依設定檔的步驟順序執行的 recipe。
/// tip 取用與液面深度都經由注入的能力完成，不直接操作計數。
pub struct StepRecipe<T, D, P, C, S>
where
    T: TipSource + TipLedger,
    D: DepthEstimator,
    P: Pipette,
    C: OperatorConsole,
    S: CountStore,
{
    config: ProtocolConfig,
    tips: T,
    estimator: D,
    pipette: P,
    console: C,
    store: S,
    reservoirs: BTreeMap<String, ReservoirState>,
    pause_signal: AttentionSignal,
    clearance_height: f64,
    reset_counts: bool,
}

impl<T, D, P, C, S> StepRecipe<T, D, P, C, S>
where
    T: TipSource + TipLedger,
    D: DepthEstimator,
    P: Pipette,
    C: OperatorConsole,
    S: CountStore,
{
    pub fn new(
        config: ProtocolConfig,
        tips: T,
        estimator: D,
        pipette: P,
        console: C,
        store: S,
    ) -> Result<Self> {
        let reservoirs = config.reservoir_states()?;
        let pause_signal = config.pause_signal();
        let clearance_height = config.clearance_height();
        Ok(Self {
            config,
            tips,
            estimator,
            pipette,
            console,
            store,
            reservoirs,
            pause_signal,
            clearance_height,
            reset_counts: false,
        })
    }

    /// 忽略已保存的計數，視為全新 tip 盒
    pub fn with_reset_counts(mut self, reset: bool) -> Self {
        self.reset_counts = reset;
        self
    }

    pub fn tips(&self) -> &T {
        &self.tips
    }

    pub fn pipette(&self) -> &P {
        &self.pipette
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn reservoir(&self, id: &str) -> Option<&ReservoirState> {
        self.reservoirs.get(id)
    }

    fn acquire(&mut self, tool: &ToolId, summary: &mut RunSummary) -> Result<()> {
        let position = self
            .tips
            .acquire(tool, &mut self.pipette, &mut self.console)?;
        tracing::debug!("🔹 {} took tip {}", tool, position);
        summary.tips_used += 1;
        Ok(())
    }

    fn distribute(&mut self, step: &DistributeStep, summary: &mut RunSummary) -> Result<()> {
        let tool = ToolId::new(step.tool.as_str());
        let source = self.config.reservoir(&step.reservoir)?.clone();
        let offset = self.estimator.bottom_offset();
        let single_tip = step.new_tip() == NewTip::Once;

        if single_tip {
            self.acquire(&tool, summary)?;
        }

        for destination in &step.destinations {
            if !single_tip {
                self.acquire(&tool, summary)?;
            }

            let reservoir = self.reservoirs.get_mut(&step.reservoir).ok_or_else(|| {
                ProtocolError::UnknownReservoir {
                    reservoir_id: step.reservoir.clone(),
                }
            })?;
            let depth = reservoir.withdraw(step.volume, &self.estimator)?;

            let from = WellLocation::bottom(source.labware.as_str(), source.well.as_str(), depth);
            let to = WellLocation::bottom(step.labware.as_str(), destination.as_str(), offset);

            self.pipette.aspirate(&tool, step.volume, &from)?;
            self.pipette.dispense(&tool, step.volume, &to)?;
            self.finish_well(&tool, &to, step.mix.as_ref(), step.blow_out.unwrap_or(false))?;
            summary.volume_transferred += step.volume;

            if !single_tip {
                self.pipette.drop_tip(&tool)?;
            }
        }

        if single_tip {
            self.pipette.drop_tip(&tool)?;
        }
        Ok(())
    }

    fn transfer(&mut self, step: &TransferStep, summary: &mut RunSummary) -> Result<()> {
        let tool = ToolId::new(step.tool.as_str());
        let offset = self.estimator.bottom_offset();
        let single_tip = step.new_tip() == NewTip::Once;

        if single_tip {
            self.acquire(&tool, summary)?;
        }

        for (source, destination) in step.pairs() {
            if !single_tip {
                self.acquire(&tool, summary)?;
            }

            let from = WellLocation::bottom(step.source_labware.as_str(), source.as_str(), offset);
            let to = WellLocation::bottom(step.labware.as_str(), destination.as_str(), offset);

            self.pipette.aspirate(&tool, step.volume, &from)?;
            self.pipette.dispense(&tool, step.volume, &to)?;
            self.finish_well(&tool, &to, step.mix.as_ref(), step.blow_out.unwrap_or(false))?;
            summary.volume_transferred += step.volume;

            if !single_tip {
                self.pipette.drop_tip(&tool)?;
            }
        }

        if single_tip {
            self.pipette.drop_tip(&tool)?;
        }
        Ok(())
    }

    /// 放液後在目標孔混勻；blow out 前先抬到安全高度
    fn finish_well(
        &mut self,
        tool: &ToolId,
        target: &WellLocation,
        mix: Option<&MixConfig>,
        blow_out: bool,
    ) -> Result<()> {
        if let Some(mix) = mix {
            self.pipette.mix(tool, mix.repetitions, mix.volume, target)?;
        }
        if blow_out {
            self.pipette
                .move_to(tool, &target.at_height(self.clearance_height))?;
            self.pipette.blow_out(tool)?;
        }
        Ok(())
    }

    fn operator_pause(&mut self, message: &str, attention: bool) -> Result<()> {
        if attention {
            self.pause_signal.emit(&mut self.console)?;
        }
        self.console.pause(message)
    }
}

impl<T, D, P, C, S> Recipe for StepRecipe<T, D, P, C, S>
where
    T: TipSource + TipLedger,
    D: DepthEstimator,
    P: Pipette,
    C: OperatorConsole,
    S: CountStore,
{
    fn prepare(&mut self) -> Result<()> {
        if self.reset_counts {
            tracing::info!("🆕 Starting with full tip racks (stored counts ignored)");
        } else if let Some(record) = self.store.load()? {
            self.tips.restore(&record);
        }

        if !self.console.indicator_on() {
            self.console.set_indicator(true)?;
        }
        self.pipette.home()?;

        for (tool, rate) in self.config.flow_rates() {
            self.pipette.set_flow_rate(&tool, rate.aspirate, rate.dispense)?;
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let replacements_before = self.tips.rack_replacements();
        let steps = self.config.steps.clone();
        let total = steps.len();

        for (index, step) in steps.iter().enumerate() {
            tracing::info!("▶️ Step {}/{}: {}", index + 1, total, describe(step));
            match step {
                StepConfig::Distribute(distribute) => self.distribute(distribute, &mut summary)?,
                StepConfig::Transfer(transfer) => self.transfer(transfer, &mut summary)?,
                StepConfig::Pause { message, attention } => {
                    self.operator_pause(message, attention.unwrap_or(true))?
                }
                StepConfig::Delay { seconds } => {
                    let duration = Duration::try_from_secs_f64(*seconds).map_err(|e| {
                        ProtocolError::InvalidConfigValueError {
                            field: "steps.seconds".to_string(),
                            value: seconds.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    self.console.delay(duration)
                }
            }
            summary.steps_executed += 1;
        }

        summary.rack_replacements = self.tips.rack_replacements() - replacements_before;
        summary.final_counts = self.tips.counts();
        summary.remaining_volumes = self
            .reservoirs
            .iter()
            .map(|(id, state)| (id.clone(), state.remaining_volume()))
            .collect();
        Ok(summary)
    }

    fn teardown(&mut self, _summary: &RunSummary) -> Result<()> {
        // 只在正常結束時寫回計數
        self.store.save(&self.tips.snapshot())
    }
}

pub fn describe(step: &StepConfig) -> String {
    match step {
        StepConfig::Distribute(d) => format!(
            "distribute {} µl from {} to {} wells with tool {}",
            d.volume,
            d.reservoir,
            d.destinations.len(),
            d.tool
        ),
        StepConfig::Transfer(t) => format!(
            "transfer {} µl from {} to {} ({} columns) with tool {}",
            t.volume,
            t.source_labware,
            t.labware,
            t.destinations.len(),
            t.tool
        ),
        StepConfig::Pause { message, .. } => format!("pause ({})", message),
        StepConfig::Delay { seconds } => format!("delay {}s", seconds),
    }
}

/// 一個 distribute 步驟預計使用的吸液深度
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSchedule {
    pub step_index: usize,
    pub reservoir: String,
    pub volume: f64,
    pub depths: Vec<f64>,
}

/// 依步驟順序推算每次抽取的深度，儲液孔的剩餘量跨步驟延續
pub fn depth_schedule<D: DepthEstimator>(
    config: &ProtocolConfig,
    estimator: &D,
) -> Result<Vec<DepthSchedule>> {
    let mut reservoirs = config.reservoir_states()?;
    let mut schedules = Vec::new();

    for (step_index, step) in config.steps.iter().enumerate() {
        if let StepConfig::Distribute(distribute) = step {
            let reservoir = reservoirs.get_mut(&distribute.reservoir).ok_or_else(|| {
                ProtocolError::UnknownReservoir {
                    reservoir_id: distribute.reservoir.clone(),
                }
            })?;
            let depths = distribute
                .destinations
                .iter()
                .map(|_| reservoir.withdraw(distribute.volume, estimator))
                .collect::<Result<Vec<_>>>()?;
            schedules.push(DepthSchedule {
                step_index,
                reservoir: distribute.reservoir.clone(),
                volume: distribute.volume,
                depths,
            });
        }
    }

    Ok(schedules)
}
