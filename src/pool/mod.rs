//! Worker pool: partitioning, transport, worker threads and notification routing.

pub mod board;
pub mod message;
pub mod partition;
#[allow(clippy::module_inception)]
pub mod pool;
pub mod worker;

pub use board::AssignmentBoard;
pub use message::{CompletionNotification, Slot, TransformRequest, WorkerMessage};
pub use partition::{assign, partition, PixelRange};
pub use pool::WorkerPool;
pub use worker::WorkerHandle;
