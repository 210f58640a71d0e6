//! Assignments: one dispatch of a transform over a region's whole buffer.
//!
//! An assignment moves through `Created → Working → Complete` and never
//! backwards. Completion notifications can arrive from any thread, in any
//! order, any number of times; the completion set only ever counts each
//! dispatched slot once.
//!
//! While the dispatcher is still handing out slots the assignment is
//! unsealed, and it cannot complete even if every slot sent so far has
//! reported. [`Assignment::seal`] closes the dispatched set.

use crate::core::error::{AssignmentId, NotificationError, RegionId, StaleReason};
use crate::core::types::Parameter;
use crate::pool::message::{CompletionNotification, Slot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Lifecycle state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssignmentState {
    /// Waiting for the scheduler to pick it up.
    Created,
    /// Dispatched to workers.
    Working,
    /// Finished; terminal.
    Complete,
}

/// Result of delivering a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Counted; other slots are still outstanding.
    Accepted,
    /// Counted, and it closed the completion set. Returned at most once.
    Completed,
    /// This slot had already reported.
    Duplicate,
}

#[derive(Debug)]
struct Progress {
    state: AssignmentState,
    dispatched: HashSet<Slot>,
    completed: HashSet<Slot>,
    sealed: bool,
    deadline: Option<Instant>,
    partial: bool,
    cancelled: bool,
}

impl Progress {
    fn all_reported(&self) -> bool {
        !self.dispatched.is_empty() && self.completed.len() == self.dispatched.len()
    }
}

/// One job: a transform with a parameter, fanned out over a region's buffer.
#[derive(Debug)]
pub struct Assignment {
    id: AssignmentId,
    region_id: RegionId,
    transform_name: String,
    parameter: Parameter,
    progress: Mutex<Progress>,
}

impl Assignment {
    /// Create an assignment in the `Created` state.
    pub fn new(region_id: RegionId, transform_name: &str, parameter: Parameter) -> Self {
        Self {
            id: AssignmentId::new(),
            region_id,
            transform_name: transform_name.to_string(),
            parameter,
            progress: Mutex::new(Progress {
                state: AssignmentState::Created,
                dispatched: HashSet::new(),
                completed: HashSet::new(),
                sealed: false,
                deadline: None,
                partial: false,
                cancelled: false,
            }),
        }
    }

    /// Unique ID, also used as the job ID on the wire.
    pub fn id(&self) -> AssignmentId {
        self.id
    }

    /// Region that owns this assignment.
    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    /// Transform name.
    pub fn transform_name(&self) -> &str {
        &self.transform_name
    }

    /// Transform parameter.
    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    /// Current state.
    pub fn state(&self) -> AssignmentState {
        self.progress.lock().state
    }

    /// Move `Created → Working`. Returns `false` in any other state.
    pub fn advance(&self) -> bool {
        let mut progress = self.progress.lock();
        if progress.state == AssignmentState::Created {
            progress.state = AssignmentState::Working;
            true
        } else {
            false
        }
    }

    /// Add slots to the dispatched set.
    ///
    /// Must be called before the matching request goes out, so that an early
    /// notification finds its slot. Ignored once sealed or complete.
    pub fn record_dispatch(&self, slots: impl IntoIterator<Item = Slot>) {
        let mut progress = self.progress.lock();
        if progress.sealed || progress.state == AssignmentState::Complete {
            return;
        }
        progress.dispatched.extend(slots);
    }

    /// Drop a slot whose request never reached its worker.
    ///
    /// Only possible before sealing. Returns whether the slot was removed.
    pub fn retract(&self, slot: Slot) -> bool {
        let mut progress = self.progress.lock();
        if progress.sealed || progress.state == AssignmentState::Complete {
            return false;
        }
        progress.completed.remove(&slot);
        progress.dispatched.remove(&slot)
    }

    /// Close the dispatched set and start the deadline clock.
    ///
    /// Refused while nothing is dispatched or outside `Working`. Completes the
    /// assignment straight away if every slot has already reported.
    pub fn seal(&self, deadline: Option<Instant>) -> bool {
        let mut progress = self.progress.lock();
        if progress.sealed || progress.state != AssignmentState::Working || progress.dispatched.is_empty() {
            return false;
        }
        progress.sealed = true;
        progress.deadline = deadline;
        if progress.all_reported() {
            progress.state = AssignmentState::Complete;
        }
        true
    }

    /// Whether the dispatched set is closed.
    pub fn is_sealed(&self) -> bool {
        self.progress.lock().sealed
    }

    /// Whether the scheduler still has to send this job out.
    pub fn needs_dispatch(&self) -> bool {
        let progress = self.progress.lock();
        match progress.state {
            AssignmentState::Created => true,
            AssignmentState::Working => !progress.sealed,
            AssignmentState::Complete => false,
        }
    }

    /// Count a completion notification.
    pub fn receive(&self, notification: &CompletionNotification) -> Result<Delivery, NotificationError> {
        let stale = |reason| NotificationError::StaleNotification {
            worker_id: notification.worker_id,
            job_id: notification.job_id,
            reason,
        };

        if notification.job_id != self.id {
            return Err(stale(StaleReason::UnknownJob));
        }

        let mut progress = self.progress.lock();
        if progress.state != AssignmentState::Working {
            return Err(stale(StaleReason::NotWorking));
        }
        let slot = notification.slot();
        if !progress.dispatched.contains(&slot) {
            return Err(stale(StaleReason::UnknownWorker));
        }
        if !progress.completed.insert(slot) {
            return Ok(Delivery::Duplicate);
        }

        if progress.sealed && progress.all_reported() {
            progress.state = AssignmentState::Complete;
            Ok(Delivery::Completed)
        } else {
            Ok(Delivery::Accepted)
        }
    }

    /// Whether a sealed, working assignment has passed its deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        let progress = self.progress.lock();
        progress.state == AssignmentState::Working
            && progress.sealed
            && progress.deadline.is_some_and(|d| now >= d)
    }

    /// Complete a working assignment without waiting for every slot.
    ///
    /// The result is flagged partial. Returns the slots that never reported,
    /// or `None` if the assignment was not working.
    pub fn force_complete(&self) -> Option<Vec<Slot>> {
        let mut progress = self.progress.lock();
        if progress.state != AssignmentState::Working {
            return None;
        }
        progress.state = AssignmentState::Complete;
        progress.partial = true;

        let missing = progress
            .dispatched
            .difference(&progress.completed)
            .copied()
            .collect();
        Some(missing)
    }

    /// Flag the result partial without completing it.
    pub(crate) fn mark_partial(&self) {
        self.progress.lock().partial = true;
    }

    /// Complete the assignment early and mark it cancelled.
    ///
    /// Returns `false` if it had already completed.
    pub fn cancel(&self) -> bool {
        let mut progress = self.progress.lock();
        if progress.state == AssignmentState::Complete {
            return false;
        }
        progress.state = AssignmentState::Complete;
        progress.cancelled = true;
        true
    }

    /// Slots the job was sent to.
    pub fn dispatched(&self) -> HashSet<Slot> {
        self.progress.lock().dispatched.clone()
    }

    /// Slots that have reported completion.
    pub fn completed(&self) -> HashSet<Slot> {
        self.progress.lock().completed.clone()
    }

    /// Whether part of the buffer was left untransformed.
    pub fn is_partial(&self) -> bool {
        self.progress.lock().partial
    }

    /// Whether the assignment was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.progress.lock().cancelled
    }
}
