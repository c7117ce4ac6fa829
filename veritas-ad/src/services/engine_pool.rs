//! Bounded pool of analysis engine workers
//!
//! Acquire a worker slot, submit the job, release the slot. Caps how many
//! engine processes run at once so a burst of uploads cannot exhaust the
//! host; requests beyond the cap queue on the semaphore.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::models::MediaKind;
use crate::services::engine_adapter::{AnalysisEngine, EngineError, EngineInvocation};

#[derive(Clone)]
pub struct EnginePool {
    engine: Arc<dyn AnalysisEngine>,
    slots: Arc<Semaphore>,
    size: usize,
}

impl EnginePool {
    pub fn new(engine: Arc<dyn AnalysisEngine>, max_concurrent: usize) -> Self {
        let size = max_concurrent.max(1);
        Self {
            engine,
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Run one job on a free worker slot
    pub async fn invoke(&self, kind: MediaKind, staged_path: &Path) -> Result<EngineInvocation, EngineError> {
        let _slot = self.slots.acquire().await.map_err(|_| EngineError::PoolClosed)?;
        self.engine.invoke(kind, staged_path).await
    }

    /// Fail queued and future jobs with [`EngineError::PoolClosed`]
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently running a job
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}
