//! # Schedule state and its repository.
//!
//! One [`ScheduleState`] record per job: `{ job_id, last_ran_at }`.
//!
//! ## Lifecycle
//! ```text
//! unknown job ──create(zero time)──► record ──update(last_ran_at = now)──► record ...
//! ```
//! - Created on the first scheduled attempt for an unknown job, with
//!   [`ScheduleState::ZERO_TIME`] (the distant past, so the job is due immediately).
//! - Updated only after a successful execution, while holding the job's lock.
//! - Never deleted by the scheduler ([`ScheduleStore::delete_by_id`] exists for operators).
//!
//! The physical storage format is the store's concern; the record derives `serde` so adapters
//! can persist it as they like.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::scope::Scope;

/// Persisted scheduling fact for one job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// Primary key.
    pub job_id: String,
    /// Last successful execution (UTC).
    pub last_ran_at: DateTime<Utc>,
}

impl ScheduleState {
    /// The "never ran" timestamp.
    pub const ZERO_TIME: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

    /// A fresh record for `job_id` that has never run.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            last_ran_at: Self::ZERO_TIME,
        }
    }
}

/// Repository of [`ScheduleState`] records.
///
/// Every operation receives the caller's scope so backends can abort I/O on cancellation.
#[async_trait]
pub trait ScheduleStore: Send + Sync + 'static {
    /// Looks up a record; `Ok(None)` when absent.
    async fn find_by_id(&self, scope: &Scope, job_id: &str)
    -> Result<Option<ScheduleState>, StoreError>;

    /// Inserts a record; fails with [`StoreError::AlreadyExists`] on id collision.
    async fn create(&self, scope: &Scope, state: &ScheduleState) -> Result<(), StoreError>;

    /// Replaces a record; fails with [`StoreError::NotFound`] when absent.
    async fn update(&self, scope: &Scope, state: &ScheduleState) -> Result<(), StoreError>;

    /// Removes a record; fails with [`StoreError::NotFound`] when absent.
    async fn delete_by_id(&self, scope: &Scope, job_id: &str) -> Result<(), StoreError>;
}

/// Process-local store.
///
/// Sharing one instance (behind an `Arc`) between several schedulers models competing
/// processes sharing a database.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    records: RwLock<HashMap<String, ScheduleState>>,
}

impl MemoryScheduleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn find_by_id(
        &self,
        _scope: &Scope,
        job_id: &str,
    ) -> Result<Option<ScheduleState>, StoreError> {
        Ok(self.records.read().await.get(job_id).cloned())
    }

    async fn create(&self, _scope: &Scope, state: &ScheduleState) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&state.job_id) {
            return Err(StoreError::AlreadyExists {
                id: state.job_id.clone(),
            });
        }
        records.insert(state.job_id.clone(), state.clone());
        Ok(())
    }

    async fn update(&self, _scope: &Scope, state: &ScheduleState) -> Result<(), StoreError> {
        match self.records.write().await.get_mut(&state.job_id) {
            Some(existing) => {
                existing.clone_from(state);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                id: state.job_id.clone(),
            }),
        }
    }

    async fn delete_by_id(&self, _scope: &Scope, job_id: &str) -> Result<(), StoreError> {
        match self.records.write().await.remove(job_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                id: job_id.to_owned(),
            }),
        }
    }
}
