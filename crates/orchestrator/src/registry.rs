//! Live pipeline runs, one per project at most.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

#[derive(Debug)]
pub struct ExecutionHandle {
    pub run_id: Uuid,
    pub cancel_token: CancellationToken,
    pub join_handle: Option<JoinHandle<()>>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionHandle {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            cancel_token: CancellationToken::new(),
            join_handle: None,
            started_at: Utc::now(),
        }
    }

    /// Not cancelled and its task, if attached, has not exited.
    pub fn is_live(&self) -> bool {
        !self.cancel_token.is_cancelled()
            && self
                .join_handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(true)
    }
}

#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    runs: Mutex<HashMap<Uuid, ExecutionHandle>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<Uuid, ExecutionHandle>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new run. A finished entry left behind is replaced.
    pub fn register(&self, project_id: Uuid, handle: ExecutionHandle) -> Result<CancellationToken> {
        let mut runs = self.runs();
        if runs.get(&project_id).is_some_and(|h| h.is_live()) {
            return Err(OrchestratorError::AlreadyRunning(project_id));
        }
        debug!(project_id = %project_id, run_id = %handle.run_id, "Registered execution");
        let token = handle.cancel_token.clone();
        runs.insert(project_id, handle);
        Ok(token)
    }

    /// Attach the spawned task to its entry. Ignored if the run was retired meanwhile.
    pub fn attach(&self, project_id: Uuid, run_id: Uuid, join_handle: JoinHandle<()>) {
        if let Some(handle) = self
            .runs()
            .get_mut(&project_id)
            .filter(|h| h.run_id == run_id)
        {
            handle.join_handle = Some(join_handle);
        }
    }

    /// Remove the entry only if it still belongs to `run_id`.
    pub fn retire(&self, project_id: Uuid, run_id: Uuid) -> bool {
        let mut runs = self.runs();
        if runs.get(&project_id).is_some_and(|h| h.run_id == run_id) {
            runs.remove(&project_id);
            debug!(project_id = %project_id, run_id = %run_id, "Retired execution");
            true
        } else {
            false
        }
    }

    /// Cancel and remove the project's run, returning its id.
    pub fn cancel(&self, project_id: Uuid) -> Option<Uuid> {
        let handle = self.runs().remove(&project_id)?;
        handle.cancel_token.cancel();
        debug!(project_id = %project_id, run_id = %handle.run_id, "Cancelled execution");
        Some(handle.run_id)
    }

    pub fn is_current(&self, project_id: Uuid, run_id: Uuid) -> bool {
        self.runs()
            .get(&project_id)
            .is_some_and(|h| h.run_id == run_id && !h.cancel_token.is_cancelled())
    }

    pub fn is_running(&self, project_id: Uuid) -> bool {
        self.runs().get(&project_id).is_some_and(|h| h.is_live())
    }

    pub fn current_run(&self, project_id: Uuid) -> Option<Uuid> {
        self.runs().get(&project_id).map(|h| h.run_id)
    }

    pub fn len(&self) -> usize {
        self.runs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
