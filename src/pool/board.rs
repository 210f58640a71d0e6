//! Table of assignments that can still receive completion notifications.

use crate::core::error::{AssignmentId, NotificationError, StaleReason};
use crate::pool::message::CompletionNotification;
use crate::project::assignment::{Assignment, Delivery};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Live assignments keyed by job ID, shared between the scheduler and the
/// notification router.
#[derive(Debug, Clone, Default)]
pub struct AssignmentBoard {
    live: Arc<RwLock<HashMap<AssignmentId, Arc<Assignment>>>>,
}

impl AssignmentBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an assignment reachable by notifications.
    pub fn register(&self, assignment: Arc<Assignment>) {
        self.live.write().insert(assignment.id(), assignment);
    }

    /// Remove an assignment. Later notifications for it are stale.
    pub fn unregister(&self, id: AssignmentId) -> Option<Arc<Assignment>> {
        self.live.write().remove(&id)
    }

    /// Look up a live assignment.
    pub fn get(&self, id: AssignmentId) -> Option<Arc<Assignment>> {
        self.live.read().get(&id).cloned()
    }

    /// Number of live assignments.
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    /// Whether no assignment is live.
    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    /// Route a notification to its assignment.
    ///
    /// The lookup lock is released before the assignment is updated, so
    /// deliveries to different assignments never wait on each other.
    pub fn deliver(&self, notification: &CompletionNotification) -> Result<Delivery, NotificationError> {
        let assignment = self
            .get(notification.job_id)
            .ok_or(NotificationError::StaleNotification {
                worker_id: notification.worker_id,
                job_id: notification.job_id,
                reason: StaleReason::UnknownJob,
            })?;
        assignment.receive(notification)
    }
}
