// Per-case serialization of transitions

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::case_lifecycle::errors::TransitionError;
use crate::case_lifecycle::types::CaseId;

/// Registry of one async mutex per case
#[derive(Debug, Default)]
pub struct CaseLocks {
    slots: Mutex<HashMap<CaseId, Arc<AsyncMutex<()>>>>,
}

impl CaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `case_id`.
    pub async fn acquire(
        &self,
        case_id: CaseId,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, TransitionError> {
        let slot = self.slot(case_id);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                tracing::warn!(case_id = %case_id, timeout_ms, "Timed out waiting for case lock");
                Err(TransitionError::Busy(case_id))
            }
        }
    }

    /// Number of cases with a live lock slot
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, case_id: CaseId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Drop slots nobody holds or waits on
        slots.retain(|id, slot| *id == case_id || Arc::strong_count(slot) > 1);
        slots
            .entry(case_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
