//! Task Store: a durable, TTL-bounded keyed map from `taskId` to
//! `TaskRecord`. Backed by an embedded Fjall LSM keyspace — single-key
//! operations only, no cross-key transactions.
//!
//! TTL is not native to Fjall's key/value API, so each record carries its
//! own expiry and [`TaskStore::reap_expired`] performs the sweep. `create`
//! is a check-and-insert guarded by an in-process mutex: the Ingress and
//! Worker share one Store handle inside a single OS process, so a mutex
//! gives the same atomicity a networked store's `SET IF NOT EXISTS` would.

pub mod error;

use std::path::Path;
use std::sync::Arc;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::TaskRecord;
pub use error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Fjall-backed Task Store.
#[derive(Clone)]
pub struct TaskStore {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    admission_lock: Arc<Mutex<()>>,
}

impl TaskStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening task store");
        let keyspace = Config::new(path).open()?;
        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            tasks,
            admission_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Atomic insert-if-absent-with-expiry. Returns
    /// `AlreadyExists` without writing when a record with this `taskId` is
    /// already present — this is the admission idempotency gate.
    pub async fn create(&self, record: &TaskRecord) -> Result<CreateOutcome> {
        let _guard = self.admission_lock.lock().await;
        let key = record.task_id.as_bytes();
        if self.tasks.get(key)?.is_some() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let value = serde_json::to_vec(record)?;
        self.tasks.insert(key, value)?;
        debug!(task_id = %record.task_id, "task record created");
        Ok(CreateOutcome::Created)
    }

    pub fn get(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        match self.tasks.get(task_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, task_id: &str) -> Result<bool> {
        Ok(self.tasks.get(task_id.as_bytes())?.is_some())
    }

    pub fn delete(&self, task_id: &str) -> Result<bool> {
        let existed = self.tasks.get(task_id.as_bytes())?.is_some();
        self.tasks.remove(task_id.as_bytes())?;
        if existed {
            debug!(task_id, "task record deleted");
        }
        Ok(existed)
    }

    /// Scans all records and deletes any past `createdAt + ttl_sec`.
    /// Returns the number reaped.
    pub fn reap_expired(&self) -> Result<usize> {
        let now = OffsetDateTime::now_utc();
        let mut expired_keys = Vec::new();
        for item in self.tasks.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<TaskRecord>(&value) {
                Ok(record) if record.is_expired(now) => expired_keys.push(key),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping unparseable task record during reap"),
            }
        }
        let reaped = expired_keys.len();
        for key in expired_keys {
            self.tasks.remove(key)?;
        }
        if reaped > 0 {
            info!(reaped, "reaped expired task records");
        }
        Ok(reaped)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn health_check(&self) -> Result<()> {
        let _ = self.tasks.get(b"__health__")?;
        Ok(())
    }

    /// Writes unparseable bytes under `task_id` so the next `get`/`delete`
    /// surfaces a `StoreError::Serialization` — used by worker tests to
    /// simulate a Store-side failure mid-processing.
    #[cfg(test)]
    pub(crate) fn poison(&self, task_id: &str) -> Result<()> {
        self.tasks.insert(task_id.as_bytes(), b"not json".to_vec())?;
        Ok(())
    }
}
