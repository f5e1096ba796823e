//! Folio Scheduling Primitives
//!
//! Cooperative scheduling building blocks for the viewer core: cancellation
//! tokens, a per-key single-flight task table with generation tagging and
//! timeout reaping, and the poll-driven timers (debounce, interval, idle
//! yielding) that the viewer pumps from its tick.
//!
//! Nothing in this crate owns a thread. Hosts decide where work runs; these
//! types only sequence it.
//!
//! # Example
//!
//! ```
//! use folio_scheduler::TaskTable;
//! use std::time::Instant;
//!
//! let table: TaskTable<u32> = TaskTable::new();
//! let now = Instant::now();
//!
//! // Starting a task for a page cancels any task already running for it.
//! let first = table.begin(7, now);
//! let second = table.begin(7, now);
//! assert!(first.token().is_cancelled());
//!
//! // A superseded ticket cannot write its result back.
//! assert!(!table.try_finish(&first));
//! assert!(table.try_finish(&second));
//! ```

mod cancel;
mod idle;
mod task;
mod timer;

pub use cancel::CancellationToken;
pub use idle::IdleRunner;
pub use task::{TaskTable, TaskTicket};
pub use timer::{Debouncer, Interval};
