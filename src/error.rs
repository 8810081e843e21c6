//! Error types used by tasks, combinators and the scheduler.
//!
//! This module defines the error enums of the crate:
//!
//! - [`TaskError`] - the terminal outcome of a failed task (including cancellation).
//! - [`MultiError`] - the composite produced by [`Concurrence`](crate::Concurrence).
//! - [`LockError`] - failures reported by a [`Locker`](crate::Locker).
//! - [`StoreError`] - failures reported by a [`ScheduleStore`](crate::ScheduleStore).
//! - [`IntervalError`] - invalid parameters for calendar interval strategies.
//!
//! Every enum exposes `as_label` (a short stable snake_case label for logs/metrics).

use std::fmt;

use thiserror::Error;

/// # Errors produced by task execution.
///
/// A task either succeeds (`Ok(())`) or returns one of these.
/// [`TaskError::Canceled`] and [`TaskError::DeadlineExceeded`] are cancellation errors;
/// wrappers that document it suppress them when they match the scope's own cause
/// (see [`Scope::is_own_cancellation`](crate::Scope::is_own_cancellation)).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task's scope was cancelled.
    #[error("scope cancelled")]
    Canceled,

    /// The task's scope reached its deadline.
    #[error("scope deadline exceeded")]
    DeadlineExceeded,

    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Several peers failed (produced by `Concurrence`).
    #[error(transparent)]
    Multiple(#[from] MultiError),

    /// Named lock acquisition or release failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Schedule state repository failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// OS signal subscription failed.
    #[error("signal subscription failed: {error}")]
    Signal {
        /// The underlying I/O error.
        #[source]
        error: std::io::Error,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use runlet::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::DeadlineExceeded => "task_deadline_exceeded",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Multiple(_) => "task_multiple",
            TaskError::Lock(e) => e.as_label(),
            TaskError::Store(e) => e.as_label(),
            TaskError::Signal { .. } => "task_signal",
        }
    }

    /// Indicates whether the error is (or only wraps) a scope cancellation.
    ///
    /// True for [`TaskError::Canceled`], [`TaskError::DeadlineExceeded`], an interrupted lock
    /// acquisition, and a composite made only of cancellations.
    ///
    /// # Example
    /// ```
    /// use runlet::TaskError;
    ///
    /// assert!(TaskError::Canceled.is_cancellation());
    /// assert!(!TaskError::fail("boom").is_cancellation());
    /// ```
    pub fn is_cancellation(&self) -> bool {
        match self {
            TaskError::Canceled | TaskError::DeadlineExceeded => true,
            TaskError::Lock(LockError::Canceled) => true,
            TaskError::Multiple(m) => m.iter().all(TaskError::is_cancellation),
            _ => false,
        }
    }
}

/// # Composite of several task errors.
///
/// Produced by [`Concurrence`](crate::Concurrence) when one or more peers fail.
/// Always holds at least one error. Element order is unspecified.
///
/// # Example
/// ```
/// use runlet::{MultiError, TaskError};
///
/// let multi = MultiError::new(vec![TaskError::fail("boom")]).unwrap();
/// assert_eq!(multi.len(), 1);
/// assert!(multi.contains(|e| matches!(e, TaskError::Fail { error } if error == "boom")));
/// ```
#[derive(Debug)]
pub struct MultiError {
    errors: Vec<TaskError>,
}

impl MultiError {
    /// Builds a composite, or `None` when `errors` is empty.
    pub fn new(errors: Vec<TaskError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Underlying errors.
    pub fn errors(&self) -> &[TaskError] {
        &self.errors
    }

    /// Number of underlying errors (always `>= 1`).
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the underlying errors.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskError> {
        self.errors.iter()
    }

    /// Consumes the composite, returning the underlying errors.
    pub fn into_errors(self) -> Vec<TaskError> {
        self.errors
    }

    /// Returns `true` if any underlying error (searching nested composites) matches `pred`.
    pub fn contains<P>(&self, pred: P) -> bool
    where
        P: Fn(&TaskError) -> bool + Copy,
    {
        self.errors.iter().any(|e| match e {
            TaskError::Multiple(inner) => pred(e) || inner.contains(pred),
            other => pred(other),
        })
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors: ", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a TaskError;
    type IntoIter = std::slice::Iter<'a, TaskError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// # Errors produced by a named lock.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The scope was cancelled while waiting for the lock.
    #[error("lock acquisition cancelled")]
    Canceled,

    /// The released scope was not produced by `acquire` (or was already released).
    #[error("no such lock")]
    NoSuchLock,

    /// The lock backend failed.
    #[error("lock backend failed: {error}")]
    Backend {
        /// The underlying error message.
        error: String,
    },
}

impl LockError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LockError::Canceled => "lock_canceled",
            LockError::NoSuchLock => "lock_no_such_lock",
            LockError::Backend { .. } => "lock_backend",
        }
    }
}

/// # Errors produced by a schedule state repository.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    #[error("schedule state not found: {id}")]
    NotFound {
        /// The missing job id.
        id: String,
    },

    /// A record with this id already exists.
    #[error("schedule state already exists: {id}")]
    AlreadyExists {
        /// The colliding job id.
        id: String,
    },

    /// The storage backend failed.
    #[error("schedule store failed: {error}")]
    Backend {
        /// The underlying error message.
        error: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::AlreadyExists { .. } => "store_already_exists",
            StoreError::Backend { .. } => "store_backend",
        }
    }
}

/// # Invalid calendar interval parameters.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    /// A field is outside its valid range.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Field name (`day`, `hour` or `minute`).
        field: &'static str,
        /// The rejected value.
        value: u32,
    },
}

impl IntervalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            IntervalError::OutOfRange { .. } => "interval_out_of_range",
        }
    }
}
