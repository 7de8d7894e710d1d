use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Attempts per autonomous stage before the project fails
    pub max_attempts: u32,
    pub stage_timeout_ms: u64,
    /// Base delay, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// `approve-plan` immediately runs the pipeline
    pub auto_run_on_plan_approval: bool,
    /// `select-title` immediately generates the plan
    pub auto_plan_on_title_select: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            stage_timeout_ms: 300_000,
            retry_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
            auto_run_on_plan_approval: true,
            auto_plan_on_title_select: false,
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration, max: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    pub fn with_auto_run(mut self, enabled: bool) -> Self {
        self.auto_run_on_plan_approval = enabled;
        self
    }

    pub fn with_auto_plan(mut self, enabled: bool) -> Self {
        self.auto_plan_on_title_select = enabled;
        self
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    /// Linear backoff after the failed `attempt`, capped at `max_backoff_ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let delay = self.retry_backoff_ms.saturating_mul(attempt as u64);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}
