//! Keyed dispatch: per-key FIFO ordering under a global concurrency cap.
//!
//! Pieces, leaves first:
//! - [`queue`]: pending items grouped by key.
//! - [`admission`]: in-flight keys and the global budget.
//! - [`scheduler`]: the scheduling pass over both.
//! - [`completion`]: when the output may close.
//! - [`Dispatcher`]: the single-owner loop driving them from inbound items
//!   and processing completions.

pub mod admission;
pub mod completion;
pub mod queue;
pub mod scheduler;

mod dispatcher;

pub use admission::Admission;
pub use completion::{CompletionTracker, InboundState};
pub use dispatcher::{DispatchConfig, Dispatcher, FailurePolicy, ResultStream};
pub use queue::KeyedQueues;
pub use scheduler::{Launch, Scheduler};
