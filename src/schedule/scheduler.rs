//! # Scheduler: at-most-once execution per interval tick across processes.
//!
//! Several processes may drive the same job. They share a [`LockFactory`] and a
//! [`ScheduleStore`]; the lock serializes ticks and the stored `last_ran_at` tells the loser
//! that the winner already ran.
//!
//! ## One tick
//! ```text
//! Idle ──acquire(job)──► Locked
//!   Locked ──state absent──► create(zero time) ──► Locked
//!   Locked ──next_after(last) > now──────────────────────────► release ──► Ok(next - now)
//!   Locked ──due──► run task ──Ok──► update(last = now) ─────► release ──► Ok(0)
//!                            └─Err─────────────────────────► release ──► Err (state untouched)
//! ```
//!
//! ## Driver ([`Scheduler::with_schedule`])
//! ```text
//! loop {
//!   ├─► delay = tick()?          (error ends the driver)
//!   └─► wait(delay) | scope.cancelled() ─► return Ok
//! }
//! ```
//!
//! ## Failure semantics
//! - Lock, store and task errors are surfaced unchanged; `last_ran_at` is only written after
//!   a successful run.
//! - If the run succeeds but the state update fails, the next tick may run the task again
//!   (at-least-once on infrastructure faults).
//! - The task runs on the *locked* scope, so losing the lock cancels it.
//! - A tick dropped mid-flight (aborted driver, timed-out caller) still releases its lock:
//!   the release is spawned onto the runtime from the guard's `Drop`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{ClockRef, SystemClock};
use crate::error::{LockError, TaskError};
use crate::schedule::interval::Interval;
use crate::schedule::lock::{LockFactory, LockerRef};
use crate::schedule::state::{ScheduleState, ScheduleStore};
use crate::scope::Scope;
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

/// Distributed interval scheduler.
///
/// Cheap to clone; clones share collaborators.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use runlet::{Every, MemoryLockFactory, MemoryScheduleStore, Scheduler, Task, TaskError};
///
/// let scheduler = Scheduler::new(
///     Arc::new(MemoryLockFactory::new()),
///     Arc::new(MemoryScheduleStore::new()),
/// );
/// let job = scheduler.with_schedule("cleanup", Every(Duration::from_secs(3600)), || async {
///     Ok::<_, TaskError>(())
/// });
/// assert_eq!(job.name(), "schedule:cleanup");
/// ```
#[derive(Clone)]
pub struct Scheduler {
    locks: Arc<dyn LockFactory>,
    store: Arc<dyn ScheduleStore>,
    clock: ClockRef,
}

impl Scheduler {
    /// Creates a scheduler on the system clock.
    pub fn new(locks: Arc<dyn LockFactory>, store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            locks,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one tick for `job_id` and returns how long to wait before the next one.
    ///
    /// `Duration::ZERO` after a successful execution (the next tick recomputes the real delay),
    /// `next_at - now` when the job is not yet due.
    pub async fn tick(
        &self,
        scope: &Scope,
        job_id: &str,
        interval: &dyn Interval,
        task: &dyn Task,
    ) -> Result<Duration, TaskError> {
        let locker = self.locks.locker(job_id);
        let locked = locker.acquire(scope).await?;
        let guard = LockGuard {
            locker,
            locked: Some(locked.clone()),
        };

        let res = self.tick_locked(&locked, job_id, interval, task).await;
        let released = guard.release().await;

        match (res, released) {
            (Ok(delay), Ok(())) => Ok(delay),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(job = job_id, error = %release_err, "lock release failed after tick error");
                Err(e)
            }
        }
    }

    async fn tick_locked(
        &self,
        locked: &Scope,
        job_id: &str,
        interval: &dyn Interval,
        task: &dyn Task,
    ) -> Result<Duration, TaskError> {
        let mut state = match self.store.find_by_id(locked, job_id).await? {
            Some(state) => state,
            None => {
                let state = ScheduleState::new(job_id);
                self.store.create(locked, &state).await?;
                debug!(job = job_id, "schedule state initialized");
                state
            }
        };

        let now = self.clock.now();
        let next_at = interval.next_after(state.last_ran_at);
        if next_at > now {
            debug!(job = job_id, next_at = %next_at, "job not due");
            return Ok((next_at - now).to_std().unwrap_or(Duration::ZERO));
        }

        debug!(job = job_id, last_ran_at = %state.last_ran_at, "job due; running");
        task.spawn(locked.clone()).await?;

        state.last_ran_at = now;
        self.store.update(locked, &state).await?;
        info!(job = job_id, ran_at = %now, "scheduled job executed");
        Ok(Duration::ZERO)
    }

    /// Wraps `task` in a driver that runs it at most once per `interval` tick for `job_id`.
    pub fn with_schedule<M>(
        &self,
        job_id: impl Into<String>,
        interval: impl Interval,
        task: impl IntoTask<M>,
    ) -> TaskRef {
        let job_id = job_id.into();
        Arc::new(Scheduled {
            name: format!("schedule:{job_id}"),
            job_id,
            interval: Arc::new(interval),
            task: task.into_task(),
            scheduler: self.clone(),
        })
    }
}

/// Held lock; released on drop if the tick never got to release it.
struct LockGuard {
    locker: LockerRef,
    locked: Option<Scope>,
}

impl LockGuard {
    async fn release(mut self) -> Result<(), LockError> {
        match self.locked.take() {
            Some(locked) => self.locker.release(&locked).await,
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(locked) = self.locked.take() else {
            return;
        };
        let locker = self.locker.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(lock = locker.name(), "tick dropped while locked; releasing");
                handle.spawn(async move {
                    if let Err(e) = locker.release(&locked).await {
                        warn!(lock = locker.name(), error = %e, "deferred lock release failed");
                    }
                });
            }
            Err(_) => {
                locked.cancel();
                warn!(lock = locker.name(), "no runtime to release dropped lock");
            }
        }
    }
}

/// Driver task built by [`Scheduler::with_schedule`].
struct Scheduled {
    name: String,
    job_id: String,
    interval: Arc<dyn Interval>,
    task: TaskRef,
    scheduler: Scheduler,
}

impl Task for Scheduled {
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let job_id = self.job_id.clone();
        let interval = self.interval.clone();
        let task = self.task.clone();
        let scheduler = self.scheduler.clone();

        Box::pin(async move {
            loop {
                let delay = match scheduler
                    .tick(&scope, &job_id, interval.as_ref(), task.as_ref())
                    .await
                {
                    Ok(delay) => delay,
                    Err(e) if scope.is_own_cancellation(&e) => return Ok(()),
                    Err(e) => return Err(e),
                };

                tokio::select! {
                    biased;
                    _ = scope.cancelled() => return Ok(()),
                    _ = scheduler.clock.after(delay) => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, MockClock};
    use crate::error::{LockError, StoreError};
    use crate::schedule::interval::Every;
    use crate::schedule::lock::{Locker, MemoryLockFactory};
    use crate::schedule::state::MemoryScheduleStore;
    use crate::tasks::to_task;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    fn fixture() -> (Scheduler, Arc<MemoryScheduleStore>, Arc<MockClock>) {
        let store = Arc::new(MemoryScheduleStore::new());
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let scheduler = Scheduler::new(Arc::new(MemoryLockFactory::new()), store.clone())
            .with_clock(clock.clone());
        (scheduler, store, clock)
    }

    fn counter(count: &Arc<AtomicUsize>) -> TaskRef {
        let count = count.clone();
        to_task(move || {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_creates_state_and_runs() {
        let (scheduler, store, clock) = fixture();
        let count = Arc::new(AtomicUsize::new(0));
        let task = counter(&count);
        let scope = Scope::new();

        let delay = scheduler.tick(&scope, "job", &Every(HOUR), task.as_ref()).await.unwrap();
        assert_eq!(delay, Duration::ZERO);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let state = store.find_by_id(&scope, "job").await.unwrap().unwrap();
        assert_eq!(state.last_ran_at, clock.now());

        let delay = scheduler.tick(&scope, "job", &Every(HOUR), task.as_ref()).await.unwrap();
        assert_eq!(delay, HOUR);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_error_leaves_state_untouched() {
        let (scheduler, store, _clock) = fixture();
        let failing = to_task(|| async { Err::<(), _>(TaskError::fail("boom")) });
        let scope = Scope::new();

        let res = scheduler.tick(&scope, "job", &Every(HOUR), failing.as_ref()).await;
        assert!(matches!(res, Err(TaskError::Fail { .. })));

        let state = store.find_by_id(&scope, "job").await.unwrap().unwrap();
        assert_eq!(state.last_ran_at, ScheduleState::ZERO_TIME);

        // The lock was released on the error path.
        let ok = to_task(|| async {});
        assert!(scheduler.tick(&scope, "job", &Every(HOUR), ok.as_ref()).await.is_ok());
    }

    struct BrokenStore;

    #[async_trait]
    impl ScheduleStore for BrokenStore {
        async fn find_by_id(
            &self,
            _scope: &Scope,
            _job_id: &str,
        ) -> Result<Option<ScheduleState>, StoreError> {
            Err(StoreError::Backend {
                error: "offline".into(),
            })
        }
        async fn create(&self, _: &Scope, _: &ScheduleState) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn update(&self, _: &Scope, _: &ScheduleState) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn delete_by_id(&self, _: &Scope, _: &str) -> Result<(), StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_store_error_is_surfaced_and_task_not_run() {
        let locks = Arc::new(MemoryLockFactory::new());
        let scheduler = Scheduler::new(locks.clone(), Arc::new(BrokenStore));
        let count = Arc::new(AtomicUsize::new(0));

        let res = scheduler
            .tick(&Scope::new(), "job", &Every(HOUR), counter(&count).as_ref())
            .await;
        assert!(matches!(res, Err(TaskError::Store(StoreError::Backend { .. }))));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let locked = locks.locker("job").acquire(&Scope::new()).await;
        assert!(locked.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_scope_fails_lock_acquisition() {
        let (scheduler, _store, _clock) = fixture();
        let scope = Scope::new();
        scope.cancel();
        let task = to_task(|| async {});

        let res = scheduler.tick(&scope, "job", &Every(HOUR), task.as_ref()).await;
        assert!(matches!(res, Err(TaskError::Lock(LockError::Canceled))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_runs_once_per_interval_and_stops_on_cancel() {
        let (scheduler, _store, _clock) = fixture();
        let count = Arc::new(AtomicUsize::new(0));
        let scope = Scope::new();

        let job = scheduler.with_schedule("job", Every(HOUR), counter(&count));
        let handle = tokio::spawn(job.run(scope.clone()));

        tokio::time::sleep(HOUR * 3 + Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        scope.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_returns_task_error() {
        let (scheduler, _store, _clock) = fixture();
        let job = scheduler.with_schedule("job", Every(HOUR), || async {
            Err::<(), _>(TaskError::fail("boom"))
        });

        let res = job.run(Scope::new()).await;
        assert!(matches!(res, Err(TaskError::Fail { error }) if error == "boom"));
    }

    #[tokio::test]
    async fn test_aborted_tick_releases_lock() {
        let locks = Arc::new(MemoryLockFactory::new());
        let scheduler = Scheduler::new(locks.clone(), Arc::new(MemoryScheduleStore::new()));
        let stuck = to_task(|| std::future::pending::<()>());

        let handle = tokio::spawn(async move {
            scheduler
                .tick(&Scope::new(), "job", &Every(HOUR), stuck.as_ref())
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let locker = locks.locker("job");
        let acquired = tokio::time::timeout(
            Duration::from_millis(200),
            locker.acquire(&Scope::new()),
        )
        .await;
        assert!(matches!(acquired, Ok(Ok(_))));
    }

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryScheduleStore,
        fail_create: bool,
        fail_update: bool,
    }

    fn offline() -> StoreError {
        StoreError::Backend {
            error: "offline".into(),
        }
    }

    #[async_trait]
    impl ScheduleStore for FlakyStore {
        async fn find_by_id(
            &self,
            scope: &Scope,
            job_id: &str,
        ) -> Result<Option<ScheduleState>, StoreError> {
            self.inner.find_by_id(scope, job_id).await
        }
        async fn create(&self, scope: &Scope, state: &ScheduleState) -> Result<(), StoreError> {
            if self.fail_create {
                return Err(offline());
            }
            self.inner.create(scope, state).await
        }
        async fn update(&self, scope: &Scope, state: &ScheduleState) -> Result<(), StoreError> {
            if self.fail_update {
                return Err(offline());
            }
            self.inner.update(scope, state).await
        }
        async fn delete_by_id(&self, scope: &Scope, job_id: &str) -> Result<(), StoreError> {
            self.inner.delete_by_id(scope, job_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_failure_is_surfaced_and_state_kept() {
        let locks = Arc::new(MemoryLockFactory::new());
        let store = Arc::new(FlakyStore {
            fail_update: true,
            ..FlakyStore::default()
        });
        let scheduler = Scheduler::new(locks.clone(), store.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let task = counter(&count);
        let scope = Scope::new();

        let res = scheduler.tick(&scope, "job", &Every(HOUR), task.as_ref()).await;
        assert!(matches!(res, Err(TaskError::Store(StoreError::Backend { .. }))));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let state = store.find_by_id(&scope, "job").await.unwrap().unwrap();
        assert_eq!(state.last_ran_at, ScheduleState::ZERO_TIME);
        assert!(locks.locker("job").acquire(&Scope::new()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_is_surfaced_and_task_not_run() {
        let locks = Arc::new(MemoryLockFactory::new());
        let store = Arc::new(FlakyStore {
            fail_create: true,
            ..FlakyStore::default()
        });
        let scheduler = Scheduler::new(locks.clone(), store.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let scope = Scope::new();

        let res = scheduler
            .tick(&scope, "job", &Every(HOUR), counter(&count).as_ref())
            .await;
        assert!(matches!(res, Err(TaskError::Store(StoreError::Backend { .. }))));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(store.find_by_id(&scope, "job").await.unwrap().is_none());
        assert!(locks.locker("job").acquire(&Scope::new()).await.is_ok());
    }
}
