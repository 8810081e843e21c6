//! # Callable shapes → canonical task.
//!
//! Every combinator and wrapper accepts `impl IntoTask<M>`, so callers can pass whichever
//! shape is natural. The set of shapes is closed:
//!
//! | Shape                               | Cancellation | Outcome            |
//! |-------------------------------------|--------------|--------------------|
//! | `Fn(Scope) -> Future<Result<..>>`   | observed     | returned           |
//! | `Fn(Scope) -> Future<()>`           | observed     | always success     |
//! | `Fn() -> Future<Result<..>>`        | ignored      | returned           |
//! | `Fn() -> Future<()>`                | ignored      | always success     |
//! | `TaskRef` / `Arc<impl Task>`        | (as is)      | (as is)            |
//!
//! The marker type `M` only steers trait selection; callers never name it.
//! Closure parameters must be annotated (`|scope: Scope|`) and `Result` outputs need a
//! concrete error type (`Ok::<_, TaskError>(())`) so exactly one shape matches.

use std::future::Future;
use std::sync::Arc;

use crate::error::TaskError;
use crate::scope::Scope;
use crate::tasks::task::{BoxTaskFuture, Task, TaskRef};
use crate::tasks::task_fn::TaskFn;

/// Name given to tasks adapted from anonymous closures.
const ANONYMOUS: &str = "fn";

/// Marker types selecting an [`IntoTask`] shape.
pub mod shape {
    /// Already a task.
    pub struct Ready;
    /// `Fn(Scope) -> Future<Output = Result<(), TaskError>>`
    pub struct Scoped;
    /// `Fn(Scope) -> Future<Output = ()>`
    pub struct ScopedUnit;
    /// `Fn() -> Future<Output = Result<(), TaskError>>`
    pub struct Plain;
    /// `Fn() -> Future<Output = ()>`
    pub struct PlainUnit;
}

/// Conversion of a supported callable shape into a [`TaskRef`].
pub trait IntoTask<M>: Send + 'static {
    /// Performs the conversion.
    fn into_task(self) -> TaskRef;
}

/// Normalizes any supported shape into a canonical [`TaskRef`].
///
/// # Example
/// ```
/// use runlet::{to_task, Scope, Task, TaskError};
///
/// let a = to_task(|_scope: Scope| async { Ok::<_, TaskError>(()) });
/// let b = to_task(|_scope: Scope| async {});
/// let c = to_task(|| async { Err::<(), _>(TaskError::fail("nope")) });
/// let d = to_task(|| async {});
/// assert_eq!(a.name(), "fn");
/// # let _ = (b, c, d);
/// ```
pub fn to_task<M>(task: impl IntoTask<M>) -> TaskRef {
    task.into_task()
}

impl IntoTask<shape::Ready> for TaskRef {
    fn into_task(self) -> TaskRef {
        self
    }
}

impl<T: Task> IntoTask<shape::Ready> for Arc<T> {
    fn into_task(self) -> TaskRef {
        self
    }
}

impl<F, Fut> IntoTask<shape::Scoped> for F
where
    F: Fn(Scope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn into_task(self) -> TaskRef {
        TaskFn::arc(ANONYMOUS, self)
    }
}

impl<F, Fut> IntoTask<shape::ScopedUnit> for F
where
    F: Fn(Scope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_task(self) -> TaskRef {
        Arc::new(ScopedUnitFn(self))
    }
}

impl<F, Fut> IntoTask<shape::Plain> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn into_task(self) -> TaskRef {
        Arc::new(PlainFn(self))
    }
}

impl<F, Fut> IntoTask<shape::PlainUnit> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_task(self) -> TaskRef {
        Arc::new(PlainUnitFn(self))
    }
}

struct ScopedUnitFn<F>(F);

impl<F, Fut> Task for ScopedUnitFn<F>
where
    F: Fn(Scope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn name(&self) -> &str {
        ANONYMOUS
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let fut = (self.0)(scope);
        Box::pin(async move {
            fut.await;
            Ok(())
        })
    }
}

struct PlainFn<F>(F);

impl<F, Fut> Task for PlainFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        ANONYMOUS
    }

    fn spawn(&self, _scope: Scope) -> BoxTaskFuture {
        Box::pin((self.0)())
    }
}

struct PlainUnitFn<F>(F);

impl<F, Fut> Task for PlainUnitFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn name(&self) -> &str {
        ANONYMOUS
    }

    fn spawn(&self, _scope: Scope) -> BoxTaskFuture {
        let fut = (self.0)();
        Box::pin(async move {
            fut.await;
            Ok(())
        })
    }
}
