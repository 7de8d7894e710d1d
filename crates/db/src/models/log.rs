use scribe_core::{LogEntry, LogLevel};
use uuid::Uuid;

use super::timestamp_to_datetime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectLogRow {
    pub id: i64,
    pub project_id: String,
    pub run_id: Option<String>,
    pub agent: String,
    pub message: String,
    pub level: String,
    pub created_at: i64,
}

/// Durable copy of an execution log entry.
#[derive(Debug, Clone)]
pub struct ProjectLog {
    pub id: i64,
    pub project_id: Uuid,
    pub run_id: Option<Uuid>,
    pub entry: LogEntry,
}

impl ProjectLogRow {
    pub fn into_domain(self) -> ProjectLog {
        ProjectLog {
            id: self.id,
            project_id: Uuid::parse_str(&self.project_id).unwrap_or_default(),
            run_id: self.run_id.and_then(|s| Uuid::parse_str(&s).ok()),
            entry: LogEntry {
                timestamp: timestamp_to_datetime(self.created_at),
                agent: self.agent,
                message: self.message,
                level: LogLevel::parse(&self.level).unwrap_or_default(),
            },
        }
    }
}
