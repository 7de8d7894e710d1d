use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One line of an execution log, attributed to a stage (or `System`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(agent: impl Into<String>, message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.into(),
            message: message.into(),
            level,
        }
    }

    pub fn info(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(agent, message, LogLevel::Info)
    }

    pub fn success(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(agent, message, LogLevel::Success)
    }

    pub fn error(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(agent, message, LogLevel::Error)
    }
}
