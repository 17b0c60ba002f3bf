use crate::core::attention::{AttentionSignal, EXHAUSTION_TOGGLES, PAUSE_TOGGLES};
use crate::core::height::{CylinderEstimator, DEFAULT_BOTTOM_OFFSET, DEFAULT_WELL_DIAMETER};
use crate::core::reservoir::ReservoirState;
use crate::domain::model::{TipSupply, ToolId};
use crate::utils::error::{ProtocolError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

const RACK_WELLS: usize = 96;
const DEFAULT_CHANNELS: usize = 8;
const DEFAULT_INTERVAL_MS: u64 = 200;
const DEFAULT_TONE_PLAYER: &str = "mpg123";
/// blow out 前抬到孔底上方 20 mm，避免噴濺與氣泡
pub const DEFAULT_CLEARANCE_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub protocol: ProtocolInfo,
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub reservoirs: Vec<ReservoirConfig>,
    pub geometry: Option<GeometryConfig>,
    pub attention: Option<AttentionConfig>,
    pub persistence: Option<PersistenceConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub id: String,
    pub model: Option<String>,
    pub channels: Option<usize>,
    pub racks: Vec<String>,
    pub positions_per_rack: Option<usize>,
    pub flow_rate: Option<FlowRateConfig>,
}

/// 吸液與放液速度 (µl/s)，未設定時沿用儀器預設
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowRateConfig {
    pub aspirate: f64,
    pub dispense: f64,
}

impl ToolConfig {
    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// 八通道一次取一整欄，96 孔盒只有 12 個位置
    pub fn positions_per_rack(&self) -> usize {
        self.positions_per_rack
            .unwrap_or_else(|| RACK_WELLS / self.channels().clamp(1, 8))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservoirConfig {
    pub id: String,
    pub labware: String,
    pub well: String,
    pub initial_volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub well_diameter: Option<f64>,
    pub bottom_offset: Option<f64>,
    pub clearance_height: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionConfig {
    pub exhaustion_toggles: Option<u32>,
    pub pause_toggles: Option<u32>,
    pub interval_ms: Option<u64>,
    pub tone: Option<bool>,
    pub tone_file: Option<String>,
    pub player: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub enabled: Option<bool>,
    pub count_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    Distribute(DistributeStep),
    Transfer(TransferStep),
    Pause {
        message: String,
        attention: Option<bool>,
    },
    Delay {
        seconds: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributeStep {
    pub tool: String,
    pub reservoir: String,
    pub volume: f64,
    pub labware: String,
    pub destinations: Vec<String>,
    pub new_tip: Option<NewTip>,
    pub blow_out: Option<bool>,
    pub mix: Option<MixConfig>,
}

impl DistributeStep {
    pub fn new_tip(&self) -> NewTip {
        self.new_tip.unwrap_or(NewTip::Always)
    }

    pub fn total_volume(&self) -> f64 {
        self.volume * self.destinations.len() as f64
    }
}

/// 盤對盤逐欄搬移，sources[i] 搬到 destinations[i]；來源孔不追蹤體積
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStep {
    pub tool: String,
    pub volume: f64,
    pub source_labware: String,
    pub sources: Vec<String>,
    pub labware: String,
    pub destinations: Vec<String>,
    pub new_tip: Option<NewTip>,
    pub blow_out: Option<bool>,
    pub mix: Option<MixConfig>,
}

impl TransferStep {
    pub fn new_tip(&self) -> NewTip {
        self.new_tip.unwrap_or(NewTip::Always)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&String, &String)> {
        self.sources.iter().zip(self.destinations.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewTip {
    Always,
    Once,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixConfig {
    pub repetitions: u32,
    pub volume: f64,
}

impl ProtocolConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProtocolError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProtocolError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TIP_COUNT_FILE})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProtocolError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("protocol.name", &self.protocol.name)?;

        if self.tools.is_empty() {
            return Err(ProtocolError::MissingConfigError {
                field: "tools".to_string(),
            });
        }
        validation::validate_unique_ids("tools.id", self.tools.iter().map(|t| t.id.as_str()))?;
        for tool in &self.tools {
            validation::validate_non_empty_string("tools.id", &tool.id)?;
            validation::validate_positive_number("tools.racks", tool.racks.len(), 1)?;
            validation::validate_range("tools.channels", tool.channels(), 1, 8)?;
            validation::validate_positive_number(
                "tools.positions_per_rack",
                tool.positions_per_rack(),
                1,
            )?;
            if let Some(flow_rate) = &tool.flow_rate {
                validation::validate_positive_measure("tools.flow_rate.aspirate", flow_rate.aspirate)?;
                validation::validate_positive_measure("tools.flow_rate.dispense", flow_rate.dispense)?;
            }
        }

        validation::validate_unique_ids(
            "reservoirs.id",
            self.reservoirs.iter().map(|r| r.id.as_str()),
        )?;
        for reservoir in &self.reservoirs {
            validation::validate_non_empty_string("reservoirs.well", &reservoir.well)?;
            validation::validate_non_negative_measure(
                "reservoirs.initial_volume",
                reservoir.initial_volume,
            )?;
        }

        let estimator = self.estimator();
        validation::validate_positive_measure("geometry.well_diameter", estimator.well_diameter)?;
        validation::validate_non_negative_measure(
            "geometry.bottom_offset",
            estimator.bottom_offset,
        )?;
        validation::validate_positive_measure("geometry.clearance_height", self.clearance_height())?;

        let exhaustion = self.exhaustion_signal();
        validation::validate_range("attention.exhaustion_toggles", exhaustion.toggles, 1, 64)?;
        validation::validate_range("attention.pause_toggles", self.pause_signal().toggles, 0, 64)?;
        if exhaustion.tone {
            validation::validate_required_field(
                "attention.tone_file",
                &self.attention.as_ref().and_then(|a| a.tone_file.clone()),
            )?;
        }

        if let Some(persistence) = &self.persistence {
            validation::validate_path("persistence.count_file", &persistence.count_file)?;
        }

        self.validate_steps()
    }

    fn validate_steps(&self) -> Result<()> {
        // 每個儲液孔的總抽取量不可超過初始體積
        let mut demand: HashMap<&str, f64> = HashMap::new();

        for step in &self.steps {
            match step {
                StepConfig::Distribute(distribute) => {
                    if !self.tools.iter().any(|t| t.id == distribute.tool) {
                        return Err(ProtocolError::UnknownTool {
                            tool_id: distribute.tool.clone(),
                        });
                    }
                    if !self.reservoirs.iter().any(|r| r.id == distribute.reservoir) {
                        return Err(ProtocolError::UnknownReservoir {
                            reservoir_id: distribute.reservoir.clone(),
                        });
                    }
                    validation::validate_positive_measure("steps.volume", distribute.volume)?;
                    validation::validate_positive_number(
                        "steps.destinations",
                        distribute.destinations.len(),
                        1,
                    )?;
                    if let Some(mix) = &distribute.mix {
                        validation::validate_positive_measure("steps.mix.volume", mix.volume)?;
                    }
                    *demand.entry(distribute.reservoir.as_str()).or_insert(0.0) +=
                        distribute.total_volume();
                }
                StepConfig::Transfer(transfer) => {
                    if !self.tools.iter().any(|t| t.id == transfer.tool) {
                        return Err(ProtocolError::UnknownTool {
                            tool_id: transfer.tool.clone(),
                        });
                    }
                    validation::validate_positive_measure("steps.volume", transfer.volume)?;
                    validation::validate_positive_number(
                        "steps.destinations",
                        transfer.destinations.len(),
                        1,
                    )?;
                    if transfer.sources.len() != transfer.destinations.len() {
                        return Err(ProtocolError::ConfigValidationError {
                            field: "steps.sources".to_string(),
                            message: format!(
                                "{} sources for {} destinations",
                                transfer.sources.len(),
                                transfer.destinations.len()
                            ),
                        });
                    }
                    if let Some(mix) = &transfer.mix {
                        validation::validate_positive_measure("steps.mix.volume", mix.volume)?;
                    }
                }
                StepConfig::Pause { message, .. } => {
                    validation::validate_non_empty_string("steps.message", message)?;
                }
                StepConfig::Delay { seconds } => {
                    validation::validate_non_negative_measure("steps.seconds", *seconds)?;
                }
            }
        }

        for reservoir in &self.reservoirs {
            let requested = demand.get(reservoir.id.as_str()).copied().unwrap_or(0.0);
            if requested > reservoir.initial_volume + 1e-9 {
                return Err(ProtocolError::ConfigValidationError {
                    field: format!("reservoirs.{}", reservoir.id),
                    message: format!(
                        "steps withdraw {:.2} but initial_volume is {:.2}",
                        requested, reservoir.initial_volume
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn estimator(&self) -> CylinderEstimator {
        let geometry = self.geometry.as_ref();
        CylinderEstimator::new(
            geometry
                .and_then(|g| g.well_diameter)
                .unwrap_or(DEFAULT_WELL_DIAMETER),
            geometry
                .and_then(|g| g.bottom_offset)
                .unwrap_or(DEFAULT_BOTTOM_OFFSET),
        )
    }

    pub fn clearance_height(&self) -> f64 {
        self.geometry
            .as_ref()
            .and_then(|g| g.clearance_height)
            .unwrap_or(DEFAULT_CLEARANCE_HEIGHT)
    }

    /// 有設定速度的工具及其 (aspirate, dispense)
    pub fn flow_rates(&self) -> Vec<(ToolId, FlowRateConfig)> {
        self.tools
            .iter()
            .filter_map(|tool| {
                tool.flow_rate
                    .map(|rate| (ToolId::new(tool.id.as_str()), rate))
            })
            .collect()
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(
            self.attention
                .as_ref()
                .and_then(|a| a.interval_ms)
                .unwrap_or(DEFAULT_INTERVAL_MS),
        )
    }

    /// 未設定 tone_file 時預設不播放提示音
    pub fn tone_enabled(&self) -> bool {
        self.attention
            .as_ref()
            .map(|a| a.tone.unwrap_or(a.tone_file.is_some()))
            .unwrap_or(false)
    }

    pub fn exhaustion_signal(&self) -> AttentionSignal {
        AttentionSignal::new(
            self.attention
                .as_ref()
                .and_then(|a| a.exhaustion_toggles)
                .unwrap_or(EXHAUSTION_TOGGLES),
            self.interval(),
            self.tone_enabled(),
        )
    }

    pub fn pause_signal(&self) -> AttentionSignal {
        AttentionSignal::new(
            self.attention
                .as_ref()
                .and_then(|a| a.pause_toggles)
                .unwrap_or(PAUSE_TOGGLES),
            self.interval(),
            self.tone_enabled(),
        )
    }

    pub fn tone_file(&self) -> Option<&str> {
        self.attention.as_ref().and_then(|a| a.tone_file.as_deref())
    }

    pub fn tone_player(&self) -> &str {
        self.attention
            .as_ref()
            .and_then(|a| a.player.as_deref())
            .unwrap_or(DEFAULT_TONE_PLAYER)
    }

    pub fn tip_supplies(&self) -> Vec<TipSupply> {
        self.tools
            .iter()
            .map(|tool| {
                TipSupply::new(
                    ToolId::new(tool.id.as_str()),
                    tool.racks.clone(),
                    tool.positions_per_rack(),
                    tool.channels(),
                )
            })
            .collect()
    }

    pub fn reservoir_states(&self) -> Result<BTreeMap<String, ReservoirState>> {
        self.reservoirs
            .iter()
            .map(|r| {
                ReservoirState::new(r.id.as_str(), r.initial_volume)
                    .map(|state| (r.id.clone(), state))
            })
            .collect()
    }

    pub fn reservoir(&self, id: &str) -> Result<&ReservoirConfig> {
        self.reservoirs
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ProtocolError::UnknownReservoir {
                reservoir_id: id.to_string(),
            })
    }

    /// 持久化檔案路徑；未設定或停用時為 None
    pub fn count_file(&self) -> Option<&str> {
        self.persistence
            .as_ref()
            .filter(|p| p.enabled.unwrap_or(true))
            .map(|p| p.count_file.as_str())
    }
}

impl Validate for ProtocolConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
