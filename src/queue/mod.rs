//! Task Queue: FIFO, at-least-once delivery of `taskId`s to
//! workers with a visibility timeout. Backed by the same embedded Fjall
//! keyspace style as the Task Store, so queue state survives a process
//! restart — Ingress and Worker run as tasks inside one process, and a
//! crash-restart must not lose either side's work.
//!
//! Items are keyed by a monotonic sequence number. `pop` scans for the
//! lowest-sequence item whose lease has expired, leases it for
//! `visibility_timeout`, and returns it; an un-acked lease simply becomes
//! visible again once it expires, which is what gives at-least-once
//! redelivery after a worker crash without a separate mutating sweep.

pub mod error;

use std::path::Path;
use std::time::Duration as StdDuration;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

pub use error::{QueueError, Result};

const POLL_INTERVAL: StdDuration = StdDuration::from_millis(50);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueItem {
    task_id: String,
    visible_at_ms: i64,
}

/// A leased queue entry returned from `pop`.
#[derive(Debug, Clone)]
pub struct Lease {
    pub seq: u64,
    pub task_id: String,
}

pub struct TaskQueue {
    keyspace: Keyspace,
    items: PartitionHandle,
    meta: PartitionHandle,
    next_seq_lock: Mutex<()>,
    visibility_timeout: StdDuration,
    notify: Notify,
}

impl TaskQueue {
    pub fn open<P: AsRef<Path>>(path: P, visibility_timeout: StdDuration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening task queue");
        let keyspace = Config::new(path).open()?;
        let items = keyspace.open_partition("items", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            items,
            meta,
            next_seq_lock: Mutex::new(()),
            visibility_timeout,
            notify: Notify::new(),
        })
    }

    fn next_seq(&self) -> Result<u64> {
        let seq = self
            .meta
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);
        self.meta.insert(b"next_seq", (seq + 1).to_be_bytes())?;
        Ok(seq)
    }

    /// Append `task_id` to the tail, immediately visible.
    pub async fn push(&self, task_id: &str) -> Result<u64> {
        let _guard = self.next_seq_lock.lock().await;
        let seq = self.next_seq()?;
        let item = QueueItem {
            task_id: task_id.to_string(),
            visible_at_ms: now_ms(),
        };
        self.items.insert(seq.to_be_bytes(), serde_json::to_vec(&item)?)?;
        debug!(task_id, seq, "task pushed to queue");
        self.notify.notify_waiters();
        Ok(seq)
    }

    /// Blocking receive with long-poll. Returns `None` if
    /// nothing became visible within `timeout`.
    pub async fn pop(&self, timeout: StdDuration) -> Result<Option<Lease>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(lease) = self.try_pop()? {
                return Ok(Some(lease));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let wait = remaining.min(POLL_INTERVAL);
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn try_pop(&self) -> Result<Option<Lease>> {
        let now = now_ms();
        for entry in self.items.iter() {
            let (key, value) = entry?;
            let mut item: QueueItem = serde_json::from_slice(&value)?;
            if item.visible_at_ms <= now {
                let seq = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));
                item.visible_at_ms = now + self.visibility_timeout.as_millis() as i64;
                self.items.insert(key, serde_json::to_vec(&item)?)?;
                return Ok(Some(Lease {
                    seq,
                    task_id: item.task_id,
                }));
            }
        }
        Ok(None)
    }

    /// Removes the item permanently.
    pub fn ack(&self, seq: u64) -> Result<()> {
        self.items.remove(seq.to_be_bytes())?;
        debug!(seq, "queue item acked");
        Ok(())
    }

    /// Returns the item to immediate visibility; the lowest surviving
    /// sequence number effectively puts it back near the head of the FIFO.
    pub fn nack(&self, seq: u64) -> Result<()> {
        let key = seq.to_be_bytes();
        if let Some(value) = self.items.get(key)? {
            let mut item: QueueItem = serde_json::from_slice(&value)?;
            item.visible_at_ms = now_ms();
            self.items.insert(key, serde_json::to_vec(&item)?)?;
            self.notify.notify_waiters();
            debug!(seq, "queue item nacked");
        }
        Ok(())
    }

    /// Number of items currently resident (leased or visible); used for
    /// operational logging by the recovery sweep.
    pub fn depth(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.items.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn health_check(&self) -> Result<()> {
        let _ = self.meta.get(b"next_seq")?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
