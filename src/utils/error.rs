use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Unknown tool: {tool_id}")]
    UnknownTool { tool_id: String },

    #[error("Unknown reservoir: {reservoir_id}")]
    UnknownReservoir { reservoir_id: String },

    #[error("Out of tips on tool {tool_id}")]
    OutOfTips { tool_id: String },

    #[error("Tool {tool_id} is still out of tips after rack replacement")]
    TipsStillExhausted { tool_id: String },

    #[error("Negative volume {volume} passed to depth estimation")]
    NegativeVolume { volume: f64 },

    #[error("Reservoir {reservoir_id} holds {remaining} but {requested} was requested")]
    InsufficientVolume {
        reservoir_id: String,
        requested: f64,
        remaining: f64,
    },

    #[error("Hardware fault: {message}")]
    HardwareFault { message: String },

    #[error("Audio playback failed: {message}")]
    AudioError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Supply,
    Volume,
    Hardware,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ProtocolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProtocolError::ConfigError { .. }
            | ProtocolError::MissingConfigError { .. }
            | ProtocolError::InvalidConfigValueError { .. }
            | ProtocolError::ConfigValidationError { .. }
            | ProtocolError::UnknownTool { .. }
            | ProtocolError::UnknownReservoir { .. } => ErrorCategory::Configuration,
            ProtocolError::OutOfTips { .. } | ProtocolError::TipsStillExhausted { .. } => {
                ErrorCategory::Supply
            }
            ProtocolError::NegativeVolume { .. } | ProtocolError::InsufficientVolume { .. } => {
                ErrorCategory::Volume
            }
            ProtocolError::HardwareFault { .. } | ProtocolError::AudioError { .. } => {
                ErrorCategory::Hardware
            }
            ProtocolError::IoError(_) | ProtocolError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 操作員換盒後可恢復
            ProtocolError::OutOfTips { .. } => ErrorSeverity::Medium,
            ProtocolError::ConfigError { .. }
            | ProtocolError::MissingConfigError { .. }
            | ProtocolError::InvalidConfigValueError { .. }
            | ProtocolError::ConfigValidationError { .. }
            | ProtocolError::UnknownTool { .. }
            | ProtocolError::UnknownReservoir { .. }
            | ProtocolError::TipsStillExhausted { .. }
            | ProtocolError::NegativeVolume { .. }
            | ProtocolError::InsufficientVolume { .. } => ErrorSeverity::High,
            ProtocolError::HardwareFault { .. }
            | ProtocolError::AudioError { .. }
            | ProtocolError::IoError(_)
            | ProtocolError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    /// 只有缺少 tip 可以由操作員處理後繼續
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::OutOfTips { .. })
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ProtocolError::OutOfTips { tool_id } => {
                format!("Replace the empty tip racks of tool '{}' and acknowledge", tool_id)
            }
            ProtocolError::TipsStillExhausted { tool_id } => format!(
                "Check that the racks of tool '{}' were really replaced, then restart the run with --reset-counts",
                tool_id
            ),
            ProtocolError::UnknownTool { tool_id } => {
                format!("Add a [[tools]] entry with id = \"{}\" to the configuration", tool_id)
            }
            ProtocolError::UnknownReservoir { reservoir_id } => format!(
                "Add a [[reservoirs]] entry with id = \"{}\" to the configuration",
                reservoir_id
            ),
            ProtocolError::NegativeVolume { .. } | ProtocolError::InsufficientVolume { .. } => {
                "Increase the reservoir's initial_volume or reduce the per-step volume".to_string()
            }
            ProtocolError::ConfigError { .. }
            | ProtocolError::MissingConfigError { .. }
            | ProtocolError::InvalidConfigValueError { .. }
            | ProtocolError::ConfigValidationError { .. } => {
                "Fix the protocol configuration file and run again".to_string()
            }
            ProtocolError::HardwareFault { .. } => {
                "Inspect the instrument, home it and restart the run".to_string()
            }
            ProtocolError::AudioError { .. } => {
                "Check the tone file and the audio player, or disable the tone in [attention]"
                    .to_string()
            }
            ProtocolError::IoError(_) => "Check file paths and permissions".to_string(),
            ProtocolError::SerializationError(_) => {
                "Delete or repair the tip count file".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ProtocolError::TipsStillExhausted { tool_id } => format!(
                "Tool '{}' found no tips even after the racks were reported as replaced; the run was stopped",
                tool_id
            ),
            ProtocolError::InsufficientVolume {
                reservoir_id,
                requested,
                remaining,
            } => format!(
                "Reservoir '{}' would run dry: {:.2} µl requested, {:.2} µl left",
                reservoir_id, requested, remaining
            ),
            other => format!("Protocol run failed: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
