//! # WithSignalNotify: translate process signals into cancellation.
//!
//! ```text
//! scope ──► child ──► task(child)
//!             ▲
//! notifier ───┘ signal received: child.cancel()
//! ```
//!
//! ## Rules
//! - Subscribes before the task starts, unsubscribes after it returns (on every path).
//! - Only the first signal matters; later ones are ignored.
//! - If a signal fired and the task then ended with the cancellation that signal caused,
//!   the result is `Ok`: the process asked to stop. Any other result is returned verbatim,
//!   including a `DeadlineExceeded` from a stop function that overran its grace window.
//! - Subscription failure is returned as [`TaskError::Signal`] and the task is not run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::error::TaskError;
use crate::scope::Scope;
use crate::signals::{NotifierRef, OsSignals, Signal};
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

/// Signal-to-cancellation wrapper.
///
/// Defaults to [`OsSignals`] and [`Signal::DEFAULT`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use runlet::{ManualSignals, Scope, Signal, Task, TaskError, WithSignalNotify};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let signals = Arc::new(ManualSignals::new());
/// let task = WithSignalNotify::new(|scope: Scope| async move {
///     scope.cancelled().await;
///     Err::<(), _>(TaskError::Canceled)
/// })
/// .with_notifier(signals.clone());
///
/// let handle = tokio::spawn(task.run(Scope::new()));
/// while signals.subscribers() == 0 {
///     tokio::task::yield_now().await;
/// }
/// signals.fire(Signal::Terminate);
/// assert!(handle.await.unwrap().is_ok());
/// # }
/// ```
#[derive(Clone)]
pub struct WithSignalNotify {
    task: TaskRef,
    notifier: NotifierRef,
    signals: Vec<Signal>,
}

impl WithSignalNotify {
    /// Wraps `task`, listening for the default signals on the OS notifier.
    pub fn new<M>(task: impl IntoTask<M>) -> Self {
        Self {
            task: task.into_task(),
            notifier: Arc::new(OsSignals::new()),
            signals: Signal::DEFAULT.to_vec(),
        }
    }

    /// Replaces the notifier.
    pub fn with_notifier(mut self, notifier: NotifierRef) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the set of signals listened for.
    pub fn with_signals(mut self, signals: impl Into<Vec<Signal>>) -> Self {
        self.signals = signals.into();
        self
    }
}

impl Task for WithSignalNotify {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let this = self.clone();
        Box::pin(async move {
            let child = scope.child();
            let (tx, mut rx) = mpsc::unbounded_channel();
            this.notifier
                .subscribe(tx.clone(), &this.signals)
                .map_err(|error| TaskError::Signal { error })?;

            let mut fut = this.task.spawn(child.clone());
            let mut fired = None;
            let res = loop {
                tokio::select! {
                    res = &mut fut => break res,
                    Some(sig) = rx.recv(), if fired.is_none() => {
                        info!(signal = %sig, task = this.task.name(), "signal received; cancelling");
                        fired = Some(sig);
                        child.cancel();
                    }
                }
            };
            this.notifier.unsubscribe(&tx);

            match res {
                Err(e) if fired.is_some() && child.is_own_cancellation(&e) => Ok(()),
                other => other,
            }
        })
    }
}

/// Wraps `task` with the default signals on the OS notifier.
pub fn with_signal_notify<M>(task: impl IntoTask<M>) -> TaskRef {
    Arc::new(WithSignalNotify::new(task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{ManualSignals, SignalNotifier};
    use std::io;

    async fn wait_subscribed(signals: &ManualSignals) {
        while signals.subscribers() == 0 {
            tokio::task::yield_now().await;
        }
    }

    fn wait_then(err: fn() -> TaskError) -> TaskRef {
        crate::tasks::to_task(move |scope: Scope| async move {
            scope.cancelled().await;
            Err::<(), _>(err())
        })
    }

    #[tokio::test]
    async fn test_signal_cancellation_becomes_success() {
        let signals = Arc::new(ManualSignals::new());
        let task = WithSignalNotify::new(wait_then(|| TaskError::Canceled))
            .with_notifier(signals.clone());

        let handle = tokio::spawn(task.run(Scope::new()));
        wait_subscribed(&signals).await;
        assert_eq!(signals.fire(Signal::Interrupt), 1);

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(signals.subscribers(), 0);
    }

    #[tokio::test]
    async fn test_other_errors_after_signal_pass_through() {
        let signals = Arc::new(ManualSignals::new());
        let task = WithSignalNotify::new(wait_then(|| TaskError::fail("cleanup failed")))
            .with_notifier(signals.clone());

        let handle = tokio::spawn(task.run(Scope::new()));
        wait_subscribed(&signals).await;
        signals.fire(Signal::Hangup);

        let res = handle.await.unwrap();
        assert!(matches!(res, Err(TaskError::Fail { error }) if error == "cleanup failed"));
    }

    #[tokio::test]
    async fn test_deadline_after_signal_passes_through() {
        let signals = Arc::new(ManualSignals::new());
        let task = WithSignalNotify::new(wait_then(|| TaskError::DeadlineExceeded))
            .with_notifier(signals.clone());

        let handle = tokio::spawn(task.run(Scope::new()));
        wait_subscribed(&signals).await;
        signals.fire(Signal::Terminate);

        assert!(matches!(handle.await.unwrap(), Err(TaskError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_outer_cancellation_without_signal_is_returned() {
        let signals = Arc::new(ManualSignals::new());
        let task = WithSignalNotify::new(wait_then(|| TaskError::Canceled))
            .with_notifier(signals.clone());

        let scope = Scope::new();
        scope.cancel();
        assert!(matches!(task.run(scope).await, Err(TaskError::Canceled)));
        assert_eq!(signals.subscribers(), 0);
    }

    #[tokio::test]
    async fn test_unlisted_signal_is_ignored() {
        let signals = Arc::new(ManualSignals::new());
        let task = WithSignalNotify::new(|| async {})
            .with_notifier(signals.clone())
            .with_signals([Signal::Terminate]);
        assert!(task.run(Scope::new()).await.is_ok());
        assert_eq!(signals.fire(Signal::Interrupt), 0);
    }

    struct Refusing;

    impl SignalNotifier for Refusing {
        fn subscribe(&self, _: mpsc::UnboundedSender<Signal>, _: &[Signal]) -> io::Result<()> {
            Err(io::Error::other("no signal support"))
        }

        fn unsubscribe(&self, _: &mpsc::UnboundedSender<Signal>) {}
    }

    #[tokio::test]
    async fn test_subscription_failure_is_reported() {
        let task = WithSignalNotify::new(|| async {}).with_notifier(Arc::new(Refusing));
        assert!(matches!(
            task.run(Scope::new()).await,
            Err(TaskError::Signal { .. })
        ));
    }
}
