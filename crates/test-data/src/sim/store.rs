use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use runs::{
    errors::StoreError,
    models::{Run, RunInsert},
    store::RunStore,
};

use super::lock;

/// Run store kept in memory, with a switch to make saves fail.
#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<Run>>,
    failing: AtomicBool,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<Run> {
        lock(&self.runs).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.runs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, run: RunInsert) -> Result<Run, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        let mut runs = lock(&self.runs);
        let id = runs.len() as i64 + 1;
        let run = Run::from_insert(id, run);
        runs.push(run.clone());
        Ok(run)
    }

    async fn list(&self) -> Result<Vec<Run>, StoreError> {
        let mut runs = self.runs();
        runs.sort_by(|a, b| b.start_time_ms.cmp(&a.start_time_ms));
        Ok(runs)
    }

    async fn get(&self, id: i64) -> Result<Option<Run>, StoreError> {
        Ok(lock(&self.runs).iter().find(|r| r.id == id).cloned())
    }
}
