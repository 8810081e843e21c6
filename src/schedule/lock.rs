//! # Named mutual-exclusion locks.
//!
//! The [`Scheduler`](crate::Scheduler) serializes ticks of one job through a lock named after
//! the job id. Locks are obtained from a [`LockFactory`]; a [`Locker`] is a handle on one name.
//!
//! ```text
//! factory.locker("job") ──► acquire(scope) ──► locked scope ──► release(locked scope)
//!                                │                 │
//!                   blocks until free          cancelled on release (or loss)
//!                   or scope cancelled
//! ```
//!
//! ## Rules
//! - Independent names never interfere.
//! - The locked scope is distinct from the input scope and carries the lease as a value.
//! - Releasing a scope that was not produced by `acquire` (or a second time) yields
//!   [`LockError::NoSuchLock`], never a panic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::LockError;
use crate::scope::Scope;

/// Shared handle to a locker.
pub type LockerRef = Arc<dyn Locker>;

/// Source of named locks.
pub trait LockFactory: Send + Sync + 'static {
    /// Returns the locker for `name`. Pure: no lock is taken.
    fn locker(&self, name: &str) -> LockerRef;
}

/// Handle on one named lock.
#[async_trait]
pub trait Locker: Send + Sync + 'static {
    /// Lock name.
    fn name(&self) -> &str;

    /// Blocks until the lock is held or `scope` is cancelled ([`LockError::Canceled`]).
    ///
    /// Returns a new scope, derived from `scope`, that is cancelled when the lock is released
    /// or lost.
    async fn acquire(&self, scope: &Scope) -> Result<Scope, LockError>;

    /// Releases the lock identified by `locked` (a scope returned by [`Locker::acquire`]).
    async fn release(&self, locked: &Scope) -> Result<(), LockError>;
}

static NEXT_LEASE: AtomicU64 = AtomicU64::new(1);

/// Lease attached to locked scopes by [`MemoryLockFactory`].
#[derive(Clone, Debug, PartialEq, Eq)]
struct Lease {
    name: String,
    id: u64,
}

struct Held {
    lease: u64,
    locked: Scope,
    _permit: OwnedSemaphorePermit,
}

struct NamedLock {
    name: String,
    permits: Arc<Semaphore>,
    held: Mutex<Option<Held>>,
}

/// Process-local lock factory: one non-reentrant lock per name.
///
/// Sharing one instance (behind an `Arc`) between several schedulers models competing
/// processes sharing a lock service.
///
/// # Example
/// ```
/// use runlet::{LockError, LockFactory, Locker, MemoryLockFactory, Scope};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let locks = MemoryLockFactory::new();
/// let locker = locks.locker("nightly-report");
///
/// let locked = locker.acquire(&Scope::new()).await.unwrap();
/// locker.release(&locked).await.unwrap();
/// assert!(locked.is_cancelled());
/// assert_eq!(locker.release(&locked).await, Err(LockError::NoSuchLock));
/// # }
/// ```
#[derive(Default)]
pub struct MemoryLockFactory {
    locks: Mutex<HashMap<String, Arc<NamedLock>>>,
}

impl MemoryLockFactory {
    /// Creates a factory with no locks.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockFactory for MemoryLockFactory {
    fn locker(&self, name: &str) -> LockerRef {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks
            .entry(name.to_owned())
            .or_insert_with(|| {
                Arc::new(NamedLock {
                    name: name.to_owned(),
                    permits: Arc::new(Semaphore::new(1)),
                    held: Mutex::new(None),
                })
            })
            .clone();
        Arc::new(MemoryLocker { lock })
    }
}

struct MemoryLocker {
    lock: Arc<NamedLock>,
}

#[async_trait]
impl Locker for MemoryLocker {
    fn name(&self) -> &str {
        &self.lock.name
    }

    async fn acquire(&self, scope: &Scope) -> Result<Scope, LockError> {
        let permit = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(LockError::Canceled),
            permit = self.lock.permits.clone().acquire_owned() => {
                permit.map_err(|e| LockError::Backend { error: e.to_string() })?
            }
        };

        let lease = Lease {
            name: self.lock.name.clone(),
            id: NEXT_LEASE.fetch_add(1, Ordering::Relaxed),
        };
        let id = lease.id;
        let locked = scope.child().with_value(lease);

        *self.lock.held.lock().unwrap_or_else(PoisonError::into_inner) = Some(Held {
            lease: id,
            locked: locked.clone(),
            _permit: permit,
        });
        Ok(locked)
    }

    async fn release(&self, locked: &Scope) -> Result<(), LockError> {
        let lease = match locked.value::<Lease>() {
            Some(lease) if lease.name == self.lock.name => lease.id,
            _ => return Err(LockError::NoSuchLock),
        };

        let held = {
            let mut slot = self.lock.held.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|h| h.lease == lease) {
                slot.take()
            } else {
                None
            }
        };

        match held {
            Some(h) => {
                h.locked.cancel();
                Ok(())
            }
            None => Err(LockError::NoSuchLock),
        }
    }
}
