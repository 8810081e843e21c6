//! # Hierarchical cancellation scope.
//!
//! [`Scope`] is what every task receives. It wraps a [`CancellationToken`] and adds:
//! - an optional **deadline**: the scope cancels itself when it is reached;
//! - immutable **values** looked up by type (request ids, tracing context, lock leases, ...);
//! - **detachment**: a scope that keeps the values but not the cancellation of its parent.
//!
//! ```text
//! Scope::new() ──► child() ──► with_timeout(5s) ──► child()
//!      │             │               │                 │
//!      └─ cancel() propagates downward to every derived scope ─┘
//!
//! detached(): values ✓   parent cancellation ✗   deadline ✗
//! ```
//!
//! ## Rules
//! - Cancellation is **cooperative**: a task observes it via [`Scope::is_cancelled`]
//!   or by awaiting [`Scope::cancelled`].
//! - Cancelling a child never affects its parent.
//! - [`Scope::with_value`] shares the token with its parent: it adds data, not a new
//!   cancellation boundary.
//! - Deadlines use tokio's clock, so `tokio::time::pause` drives them in tests.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{LockError, TaskError};

/// One link of the immutable value chain.
struct ValueNode {
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<ValueNode>>,
}

/// What cancelled a token first.
#[derive(Clone, Copy, Debug)]
enum Cause {
    Canceled,
    DeadlineExceeded,
}

/// Cause slot of one cancellation boundary, linked to the boundary it derives from.
#[derive(Default)]
struct CauseNode {
    cause: OnceLock<Cause>,
    parent: Option<Arc<CauseNode>>,
}

impl CauseNode {
    fn derive(parent: &Arc<CauseNode>) -> Arc<CauseNode> {
        Arc::new(CauseNode {
            cause: OnceLock::new(),
            parent: Some(parent.clone()),
        })
    }

    /// Records `cause` unless the token was already cancelled some other way, then cancels.
    fn finish(&self, token: &CancellationToken, cause: Cause) {
        if !token.is_cancelled() {
            let _ = self.cause.set(cause);
        }
        token.cancel();
    }

    /// The nearest recorded cause, walking towards the root.
    fn resolve(&self) -> Cause {
        let mut node = Some(self);
        while let Some(n) = node {
            if let Some(cause) = n.cause.get() {
                return *cause;
            }
            node = n.parent.as_deref();
        }
        Cause::Canceled
    }
}

/// Cancellation scope handed to every task.
///
/// Cheap to clone: clones observe and control the same cancellation.
///
/// # Example
/// ```
/// use runlet::Scope;
///
/// #[derive(Debug, PartialEq)]
/// struct RequestId(u64);
///
/// let root = Scope::new().with_value(RequestId(7));
/// let child = root.child();
/// let detached = child.detached();
///
/// root.cancel();
/// assert!(child.is_cancelled());
/// assert!(!detached.is_cancelled());
/// assert_eq!(detached.value::<RequestId>(), Some(&RequestId(7)));
/// ```
#[derive(Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Option<Arc<ValueNode>>,
    causes: Arc<CauseNode>,
}

impl Scope {
    /// Creates a root scope: no deadline, no values, cancelled only via [`Scope::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child scope that is cancelled with this one (and can be cancelled on its own).
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            values: self.values.clone(),
            causes: CauseNode::derive(&self.causes),
        }
    }

    /// Derives a child scope that is additionally cancelled at `deadline`.
    ///
    /// The effective deadline is the earlier of `deadline` and the inherited one.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime when `deadline` is in the future.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        };
        let child = Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            values: self.values.clone(),
            causes: CauseNode::derive(&self.causes),
        };

        if deadline <= Instant::now() {
            child.causes.finish(&child.token, Cause::DeadlineExceeded);
            return child;
        }

        let token = child.token.clone();
        let causes = child.causes.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    causes.finish(&token, Cause::DeadlineExceeded);
                }
            }
        });
        child
    }

    /// Derives a child scope cancelled after `timeout`. See [`Scope::with_deadline`].
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a scope that keeps this scope's values but is immune to its cancellation
    /// and deadline.
    pub fn detached(&self) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            values: self.values.clone(),
            causes: Arc::default(),
        }
    }

    /// Returns a scope carrying `value`, sharing this scope's cancellation.
    ///
    /// A later value of the same type shadows earlier ones.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            values: Some(Arc::new(ValueNode {
                value: Arc::new(value),
                parent: self.values.clone(),
            })),
            causes: self.causes.clone(),
        }
    }

    /// Looks up the nearest value of type `T`.
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let mut node = self.values.as_deref();
        while let Some(n) = node {
            if let Some(v) = (*n.value).downcast_ref::<T>() {
                return Some(v);
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// Cancels this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.causes.finish(&self.token, Cause::Canceled);
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the scope is cancelled (or its deadline passes).
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the scope is done, or `None` while it is still live.
    ///
    /// Reports whichever fired first on this scope or the nearest ancestor that was
    /// cancelled: [`TaskError::DeadlineExceeded`] for a deadline, [`TaskError::Canceled`]
    /// for an explicit [`Scope::cancel`] or a raw token cancellation.
    pub fn err(&self) -> Option<TaskError> {
        if !self.token.is_cancelled() {
            return None;
        }
        match self.causes.resolve() {
            Cause::DeadlineExceeded => Some(TaskError::DeadlineExceeded),
            Cause::Canceled => Some(TaskError::Canceled),
        }
    }

    /// Whether `err` is this scope's own cancellation surfacing from a task.
    ///
    /// Plain cancellations ([`TaskError::Canceled`], a canceled lock wait) match any
    /// cancelled scope; [`TaskError::DeadlineExceeded`] matches only when the scope's
    /// own deadline fired. An aggregate matches when every member does.
    pub fn is_own_cancellation(&self, err: &TaskError) -> bool {
        let Some(cause) = self.err() else {
            return false;
        };
        match err {
            TaskError::Canceled | TaskError::Lock(LockError::Canceled) => true,
            TaskError::DeadlineExceeded => matches!(cause, TaskError::DeadlineExceeded),
            TaskError::Multiple(m) => m.iter().all(|e| self.is_own_cancellation(e)),
            _ => false,
        }
    }

    /// The underlying token, for interop with `tokio_util`-based code.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl From<CancellationToken> for Scope {
    fn from(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            values: None,
            causes: Arc::default(),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
