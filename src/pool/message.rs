//! Messages exchanged between the pool and its workers.

use crate::core::buffer::SharedBuffer;
use crate::core::error::{AssignmentId, RegionId, WorkerId};
use crate::core::types::{Parameter, PixelFormat};
use crate::pool::partition::PixelRange;
use std::sync::Arc;

/// One range of a job handed to one worker.
///
/// Completion is tracked per slot, so a worker may hold several slots of the
/// same job when ranges are reassigned away from an unreachable worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Worker that owns the range.
    pub worker_id: WorkerId,
    /// Pixels to transform.
    pub range: PixelRange,
}

/// One unit of work: apply a transform to one range of a shared buffer.
///
/// Sent once per slot and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    /// Assignment this request belongs to.
    pub job_id: AssignmentId,
    /// Region that owns the buffer.
    pub region_id: RegionId,
    /// Buffer shared by every worker of the job.
    pub buffer: Arc<SharedBuffer>,
    /// Pixels this worker owns.
    pub range: PixelRange,
    /// Channel layout of the buffer.
    pub format: PixelFormat,
    /// Registered transform name.
    pub transform_name: String,
    /// Parameter passed to the transform.
    pub parameter: Parameter,
}

/// Sent by a worker once it has finished writing its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionNotification {
    /// Worker that finished.
    pub worker_id: WorkerId,
    /// Assignment the finished range belonged to.
    pub job_id: AssignmentId,
    /// Region that owns the assignment.
    pub region_id: RegionId,
    /// Range the worker finished.
    pub range: PixelRange,
}

impl CompletionNotification {
    /// Slot this notification closes.
    pub fn slot(&self) -> Slot {
        Slot {
            worker_id: self.worker_id,
            range: self.range,
        }
    }
}

/// Messages a worker accepts.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Identity handshake. Must arrive before any work.
    Identify(WorkerId),
    /// Apply a transform.
    Apply(TransformRequest),
    /// Stop after the current message.
    Shutdown,
}
