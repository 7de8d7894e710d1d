use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per project.
///
/// Status transitions, registry changes and executor commits for a project
/// all happen while holding its guard.
#[derive(Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, project_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(project_id).or_default())
        };
        mutex.lock_owned().await
    }

    /// Drop the project's mutex if nobody holds or awaits it.
    ///
    /// `lock` clones the mutex while holding the map, so a count of one seen
    /// under the map lock means no task can still be using the old entry.
    pub fn remove_if_idle(&self, project_id: Uuid) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(&project_id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if idle {
            locks.remove(&project_id);
        }
        idle
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
