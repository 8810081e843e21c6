//! Combinators: functions taking tasks and returning a task.
//!
//! - [`Sequence`] runs tasks one after another, stopping on the first error.
//! - [`Concurrence`] runs tasks in parallel, cancelling peers on failure.

mod concurrence;
mod sequence;

pub use concurrence::{Concurrence, concurrence};
pub use sequence::{Sequence, sequence};
