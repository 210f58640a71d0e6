//! Regions: one pixel buffer and the jobs running against it.
//!
//! A region owns its canonical buffer exclusively and writes it only in
//! [`Region::reclaim`], after every assignment has finished. While a job is
//! live the region also holds the shared buffer the workers write into; a
//! second `apply` is rejected until that buffer is reclaimed.

use crate::core::buffer::{PixelBuffer, SharedBuffer};
use crate::core::error::{AssignmentId, JobError, RegionId, SourceError, WorkerError, WorkerId};
use crate::core::events::{Event, EventEmitter};
use crate::core::types::Parameter;
use crate::pool::message::{Slot, TransformRequest};
use crate::pool::partition::assign;
use crate::pool::pool::WorkerPool;
use crate::project::assignment::{Assignment, AssignmentState};
use crate::project::source::{BackingStore, ImageFileStore, MemoryStore};
use crate::transforms::registry::TransformRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Events a region publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionEvent {
    /// The buffer was loaded.
    Ready {
        /// Region that loaded.
        region_id: RegionId,
    },
    /// A job was reclaimed and the canonical buffer is up to date.
    JobComplete {
        /// Region that finished.
        region_id: RegionId,
        /// What the reclaim did.
        outcome: ReclaimOutcome,
    },
}

/// Kinds of [`RegionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionEventKind {
    /// [`RegionEvent::Ready`].
    Ready,
    /// [`RegionEvent::JobComplete`].
    JobComplete,
}

impl Event for RegionEvent {
    type Kind = RegionEventKind;

    fn kind(&self) -> RegionEventKind {
        match self {
            RegionEvent::Ready { .. } => RegionEventKind::Ready,
            RegionEvent::JobComplete { .. } => RegionEventKind::JobComplete,
        }
    }
}

/// What a reclaim did with the shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimOutcome {
    /// Number of finished assignments removed.
    pub assignments: usize,
    /// At least one assignment was force-completed, so some ranges may be untransformed.
    pub partial: bool,
    /// Every finished assignment was cancelled and the shared buffer was discarded.
    pub cancelled: bool,
}

/// Result of sending one assignment to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Requests successfully queued.
    pub sent: usize,
    /// Requests that could not be queued because the worker had gone away.
    pub failed: usize,
    /// The dispatched set was closed. `false` means the job is still waiting to go out.
    pub sealed: bool,
}

/// One independent pixel buffer and its jobs.
#[derive(Debug)]
pub struct Region {
    id: RegionId,
    store: Box<dyn BackingStore>,
    canonical: Option<PixelBuffer>,
    shared: Option<Arc<SharedBuffer>>,
    assignments: Vec<Arc<Assignment>>,
    x: i64,
    y: i64,
    events: EventEmitter<RegionEvent>,
}

impl Region {
    /// Create an unloaded region backed by `store`.
    pub fn new(store: impl BackingStore + 'static) -> Self {
        Self {
            id: RegionId::new(),
            store: Box::new(store),
            canonical: None,
            shared: None,
            assignments: Vec::new(),
            x: 0,
            y: 0,
            events: EventEmitter::new(),
        }
    }

    /// Create a region from an in-memory buffer.
    pub fn from_buffer(buffer: PixelBuffer) -> Self {
        Self::new(MemoryStore::new(buffer))
    }

    /// Create a region that decodes `path` on load.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::new(ImageFileStore::new(path))
    }

    /// Set the region's position on the canvas.
    pub fn with_position(mut self, x: i64, y: i64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Region ID.
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Canvas position.
    pub fn position(&self) -> (i64, i64) {
        (self.x, self.y)
    }

    /// Subscribe to region events.
    pub fn events(&mut self) -> &mut EventEmitter<RegionEvent> {
        &mut self.events
    }

    /// Whether a non-empty buffer is loaded.
    pub fn is_loaded(&self) -> bool {
        self.canonical.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Whether a job is live (a shared buffer exists).
    pub fn is_working(&self) -> bool {
        self.shared.is_some()
    }

    /// The canonical buffer.
    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.canonical.as_ref()
    }

    /// Live assignments.
    pub fn assignments(&self) -> &[Arc<Assignment>] {
        &self.assignments
    }

    /// Whether any assignment is in `state`.
    pub fn has_assignment_in(&self, state: AssignmentState) -> bool {
        self.assignments.iter().any(|a| a.state() == state)
    }

    /// Load the buffer from the backing store and publish [`RegionEvent::Ready`].
    pub fn load(&mut self) -> Result<(), SourceError> {
        let buffer = self.store.load()?;
        log::debug!(
            "Region {} loaded {}x{} from {}",
            self.id,
            buffer.width(),
            buffer.height(),
            self.store.describe()
        );
        self.canonical = Some(buffer);
        self.events.trigger(&RegionEvent::Ready { region_id: self.id });
        Ok(())
    }

    /// Replace the canonical buffer and optionally move the region.
    ///
    /// Rejected while a job is live, since reclaim would overwrite it.
    pub fn set_buffer(&mut self, buffer: PixelBuffer, offset: Option<(i64, i64)>) -> Result<(), JobError> {
        if self.is_working() {
            return Err(JobError::ConflictingJob { region_id: self.id });
        }
        if let Some((x, y)) = offset {
            self.x = x;
            self.y = y;
        }
        self.canonical = Some(buffer);
        Ok(())
    }

    /// Request a transform over the whole buffer.
    ///
    /// Snapshots the canonical buffer into a new shared buffer and queues an
    /// assignment in the `Created` state. Returns immediately; the scheduler
    /// dispatches on its next tick.
    pub fn apply(
        &mut self,
        registry: &TransformRegistry,
        transform_name: &str,
        parameter: impl Into<Parameter>,
    ) -> Result<AssignmentId, JobError> {
        let parameter = parameter.into();
        let canonical = match &self.canonical {
            Some(buffer) if !buffer.is_empty() => buffer,
            _ => return Err(JobError::NotLoaded { region_id: self.id }),
        };
        if self.shared.is_some() {
            return Err(JobError::ConflictingJob { region_id: self.id });
        }
        registry.resolve(transform_name)?;
        if parameter.as_f64().is_none() {
            return Err(JobError::InvalidParameter {
                name: transform_name.to_string(),
                value: parameter.to_string(),
            });
        }

        self.shared = Some(Arc::new(SharedBuffer::from_bytes(canonical.as_bytes())));
        let assignment = Arc::new(Assignment::new(self.id, transform_name, parameter));
        let id = assignment.id();
        self.assignments.push(assignment);

        log::debug!("Region {} queued job {} ('{}')", self.id, id, transform_name);
        Ok(id)
    }

    /// Assignments still waiting to be sent out, oldest first.
    pub fn pending_dispatch(&self) -> Vec<Arc<Assignment>> {
        self.assignments
            .iter()
            .filter(|a| a.needs_dispatch())
            .cloned()
            .collect()
    }

    /// Fan an assignment out over the pool's live workers.
    ///
    /// Ranges are split across whichever workers are alive; if that is fewer
    /// than the pool was built with, the shortfall is logged and the work is
    /// redistributed. With no live worker the assignment stays `Created`.
    pub fn dispatch(&self, assignment: &Arc<Assignment>, pool: &WorkerPool, deadline: Option<Duration>) -> DispatchReport {
        let live = pool.live_workers();
        if live.len() < pool.size() {
            log::warn!(
                "{}; redistributing job {}",
                WorkerError::WorkerUnavailable {
                    expected: pool.size(),
                    live: live.len()
                },
                assignment.id()
            );
        }
        self.dispatch_to(assignment, pool, &live, deadline)
    }

    /// Send an assignment to `workers`.
    ///
    /// Each slot is recorded before its request goes out and retracted if the
    /// send fails. The range of a worker that cannot be reached is handed to a
    /// worker that accepted its own. The dispatched set is sealed once at
    /// least one request is out; if none is, the assignment stays unsealed
    /// and is retried on the next call.
    fn dispatch_to(
        &self,
        assignment: &Arc<Assignment>,
        pool: &WorkerPool,
        workers: &[WorkerId],
        deadline: Option<Duration>,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            sent: 0,
            failed: 0,
            sealed: false,
        };

        if !assignment.needs_dispatch() {
            return report;
        }
        let (Some(canonical), Some(shared)) = (&self.canonical, &self.shared) else {
            log::warn!("Region {} has no live buffer for job {}", self.id, assignment.id());
            return report;
        };

        let ranges = assign(canonical.pixel_count(), workers);
        if ranges.is_empty() {
            log::warn!("No worker available for job {} on region {}", assignment.id(), self.id);
            return report;
        }
        assignment.advance();
        pool.board().register(assignment.clone());

        let send = |slot: Slot| {
            assignment.record_dispatch([slot]);
            let request = TransformRequest {
                job_id: assignment.id(),
                region_id: self.id,
                buffer: shared.clone(),
                range: slot.range,
                format: canonical.format(),
                transform_name: assignment.transform_name().to_string(),
                parameter: assignment.parameter().clone(),
            };
            match pool.submit(slot.worker_id, request) {
                Ok(()) => true,
                Err(error) => {
                    log::warn!("Failed to send job {} to worker {}: {}", assignment.id(), slot.worker_id, error);
                    assignment.retract(slot);
                    false
                }
            }
        };

        let mut accepted = Vec::with_capacity(ranges.len());
        let mut orphaned = Vec::new();
        for (worker_id, range) in ranges {
            if send(Slot { worker_id, range }) {
                report.sent += 1;
                accepted.push(worker_id);
            } else {
                report.failed += 1;
                orphaned.push(range);
            }
        }

        let mut next = 0;
        while let Some(range) = orphaned.pop() {
            if accepted.is_empty() {
                orphaned.push(range);
                break;
            }
            let worker_id = accepted[next % accepted.len()];
            if send(Slot { worker_id, range }) {
                report.sent += 1;
                next += 1;
            } else {
                report.failed += 1;
                accepted.retain(|w| *w != worker_id);
                orphaned.push(range);
            }
        }

        if report.sent == 0 {
            pool.board().unregister(assignment.id());
            log::warn!("Job {} on region {} reached no worker, will retry", assignment.id(), self.id);
            return report;
        }
        if !orphaned.is_empty() {
            log::error!(
                "Job {} on region {} left {} range(s) unsent",
                assignment.id(),
                self.id,
                orphaned.len()
            );
            assignment.mark_partial();
        }

        report.sealed = assignment.seal(deadline.map(|d| Instant::now() + d));
        log::info!(
            "Region {} dispatched job {} as {} request(s)",
            self.id,
            assignment.id(),
            report.sent
        );
        report
    }

    /// Force-complete working assignments past their deadline.
    ///
    /// Returns how many were expired.
    pub fn expire(&self, now: Instant) -> usize {
        let mut expired = 0;
        for assignment in self.assignments.iter().filter(|a| a.is_expired(now)) {
            if let Some(missing) = assignment.force_complete() {
                log::warn!(
                    "Job {} on region {} missed its deadline; {} range(s) never reported",
                    assignment.id(),
                    self.id,
                    missing.len()
                );
                expired += 1;
            }
        }
        expired
    }

    /// Cancel a live assignment. Its output is discarded at reclaim.
    pub fn cancel(&mut self, assignment_id: AssignmentId) -> Result<(), JobError> {
        let assignment = self
            .assignments
            .iter()
            .find(|a| a.id() == assignment_id)
            .ok_or(JobError::AssignmentNotFound {
                region_id: self.id,
                assignment_id,
            })?;

        if assignment.cancel() {
            log::info!("Job {} on region {} cancelled", assignment_id, self.id);
        }
        Ok(())
    }

    /// Drop finished assignments and, once none remain, fold the shared buffer
    /// back into the canonical buffer.
    ///
    /// Returns `None` when nothing was finished or other assignments are still
    /// outstanding. When every finished assignment was cancelled the shared
    /// buffer is discarded instead of copied.
    pub fn reclaim(&mut self, pool: &WorkerPool) -> Option<ReclaimOutcome> {
        let (finished, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.assignments)
            .into_iter()
            .partition(|a| a.state() == AssignmentState::Complete);
        self.assignments = remaining;

        if finished.is_empty() {
            return None;
        }
        for assignment in &finished {
            pool.board().unregister(assignment.id());
        }

        let outcome = ReclaimOutcome {
            assignments: finished.len(),
            partial: finished.iter().any(|a| a.is_partial()),
            cancelled: finished.iter().all(|a| a.is_cancelled()),
        };

        if !self.assignments.is_empty() {
            log::debug!(
                "Region {} deferring reclaim; {} assignment(s) outstanding",
                self.id,
                self.assignments.len()
            );
            return None;
        }

        let shared = self.shared.take()?;
        if !outcome.cancelled {
            if let Some(canonical) = &self.canonical {
                match PixelBuffer::new(shared.to_vec(), canonical.width(), canonical.height(), canonical.format()) {
                    Ok(buffer) => self.canonical = Some(buffer),
                    Err(error) => log::error!("Region {} could not reclaim its buffer: {}", self.id, error),
                }
            }
        }

        log::info!(
            "Region {} reclaimed (partial: {}, cancelled: {})",
            self.id,
            outcome.partial,
            outcome.cancelled
        );
        self.events.trigger(&RegionEvent::JobComplete {
            region_id: self.id,
            outcome,
        });
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::partition::PixelRange;
    use crate::core::types::{Color, PixelFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loaded(width: u32, color: Color) -> Region {
        let buffer = PixelBuffer::filled(width, 1, PixelFormat::Rgba, color).unwrap();
        let mut region = Region::from_buffer(buffer);
        region.load().unwrap();
        region
    }

    fn pool(size: usize) -> WorkerPool {
        WorkerPool::spawn(size, Arc::new(TransformRegistry::with_builtins()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_load_publishes_ready() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        let mut region = Region::from_buffer(PixelBuffer::filled(1, 1, PixelFormat::Rgb, Color::rgb(1, 1, 1)).unwrap());
        region.events().once(RegionEventKind::Ready, move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        assert!(!region.is_loaded());

        region.load().unwrap();
        region.load().unwrap();
        assert!(region.is_loaded());
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_apply_preconditions() {
        let registry = TransformRegistry::with_builtins();

        let mut unloaded = Region::from_buffer(PixelBuffer::filled(1, 1, PixelFormat::Rgba, Color::rgb(0, 0, 0)).unwrap());
        assert!(matches!(unloaded.apply(&registry, "invert", 0), Err(JobError::NotLoaded { .. })));

        let mut region = loaded(2, Color::rgb(1, 2, 3));
        assert!(matches!(
            region.apply(&registry, "sharpen", 1),
            Err(JobError::UnknownTransform { .. })
        ));
        assert!(matches!(
            region.apply(&registry, "brightness", "a lot"),
            Err(JobError::InvalidParameter { .. })
        ));
        assert!(!region.is_working());

        region.apply(&registry, "brightness", "5").unwrap();
        assert!(region.is_working());
        assert!(region.has_assignment_in(AssignmentState::Created));
        assert!(matches!(
            region.apply(&registry, "invert", 0),
            Err(JobError::ConflictingJob { .. })
        ));
        assert!(matches!(
            region.set_buffer(PixelBuffer::filled(1, 1, PixelFormat::Rgba, Color::rgb(0, 0, 0)).unwrap(), None),
            Err(JobError::ConflictingJob { .. })
        ));
    }

    #[test]
    fn test_full_cycle_with_pool() {
        let registry = TransformRegistry::with_builtins();
        let pool = pool(3);
        let mut region = loaded(7, Color::new(10, 20, 30, 40));

        let done = Arc::new(AtomicUsize::new(0));
        let seen = done.clone();
        region.events().on(RegionEventKind::JobComplete, move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });

        region.apply(&registry, "brightness", 5).unwrap();
        let started = region.pending_dispatch();
        assert_eq!(started.len(), 1);
        let report = region.dispatch(&started[0], &pool, None);
        assert_eq!(
            report,
            DispatchReport {
                sent: 3,
                failed: 0,
                sealed: true
            }
        );
        assert!(region.pending_dispatch().is_empty());

        let deadline = Instant::now() + Duration::from_secs(5);
        while started[0].state() != AssignmentState::Complete && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let outcome = region.reclaim(&pool).unwrap();
        assert!(!outcome.partial && !outcome.cancelled);
        assert!(!region.is_working());
        assert!(region.assignments().is_empty());
        assert!(pool.board().is_empty());
        assert_eq!(done.load(Ordering::Relaxed), 1);

        let expected = PixelBuffer::filled(7, 1, PixelFormat::Rgba, Color::new(15, 25, 35, 40)).unwrap();
        assert_eq!(region.buffer(), Some(&expected));
    }

    #[test]
    fn test_reclaim_waits_for_completion() {
        let registry = TransformRegistry::with_builtins();
        let pool = pool(1);
        let mut region = loaded(2, Color::rgb(1, 1, 1));

        region.apply(&registry, "invert", 0).unwrap();
        assert!(region.reclaim(&pool).is_none());
        assert!(region.is_working());
    }

    #[test]
    fn test_cancel_discards_output() {
        let registry = TransformRegistry::with_builtins();
        let pool = pool(1);
        let original = Color::new(1, 2, 3, 4);
        let mut region = loaded(4, original);

        let id = region.apply(&registry, "invert", 0).unwrap();
        assert!(matches!(
            region.cancel(AssignmentId::new()),
            Err(JobError::AssignmentNotFound { .. })
        ));
        region.cancel(id).unwrap();

        let outcome = region.reclaim(&pool).unwrap();
        assert!(outcome.cancelled);
        assert!(!region.is_working());
        assert_eq!(region.buffer().unwrap().pixel(0), Some(original));
    }

    #[test]
    fn test_expire_forces_partial() {
        let registry = TransformRegistry::with_builtins();
        let pool = pool(1);
        let mut region = loaded(1, Color::rgb(0, 0, 0));
        region.apply(&registry, "invert", 0).unwrap();

        let started = region.pending_dispatch();
        started[0].advance();
        started[0].record_dispatch([Slot {
            worker_id: WorkerId::new(),
            range: PixelRange::new(0, 1),
        }]);
        started[0].seal(Some(Instant::now()));

        assert_eq!(region.expire(Instant::now() + Duration::from_millis(1)), 1);
        let outcome = region.reclaim(&pool).unwrap();
        assert!(outcome.partial);
        assert!(!outcome.cancelled);
    }

    fn wait_complete(assignment: &Assignment) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while assignment.state() != AssignmentState::Complete {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    #[test]
    fn test_dispatch_without_live_workers_keeps_job_queued() {
        let registry = TransformRegistry::with_builtins();
        let mut stopped = pool(1);
        stopped.shutdown();
        let mut region = loaded(3, Color::rgb(0, 0, 0));
        let id = region.apply(&registry, "invert", 0).unwrap();

        let job = region.pending_dispatch().remove(0);
        let report = region.dispatch(&job, &stopped, None);
        assert_eq!(report.sent, 0);
        assert!(!report.sealed);
        assert_eq!(job.state(), AssignmentState::Created);
        assert!(job.dispatched().is_empty());
        assert!(stopped.board().is_empty());

        // A later pool picks the job up where it was left.
        let pool = pool(2);
        assert_eq!(region.pending_dispatch()[0].id(), id);
        assert!(region.dispatch(&job, &pool, None).sealed);
        assert!(wait_complete(&job));
        let outcome = region.reclaim(&pool).unwrap();
        assert!(!outcome.partial);
        assert_eq!(region.buffer().unwrap().pixel(2), Some(Color::rgb(255, 255, 255)));
    }

    #[test]
    fn test_unreachable_worker_range_is_reassigned() {
        let registry = TransformRegistry::with_builtins();
        let pool = pool(2);
        let mut region = loaded(6, Color::rgb(0, 0, 0));
        region.apply(&registry, "invert", 0).unwrap();
        let job = region.pending_dispatch().remove(0);

        let gone = WorkerId::new();
        let reachable = pool.live_workers()[0];
        let report = region.dispatch_to(&job, &pool, &[gone, reachable], None);
        assert_eq!(
            report,
            DispatchReport {
                sent: 2,
                failed: 1,
                sealed: true
            }
        );
        assert!(job.dispatched().iter().all(|slot| slot.worker_id == reachable));
        let covered: usize = job.dispatched().iter().map(|slot| slot.range.len()).sum();
        assert_eq!(covered, 6);

        assert!(wait_complete(&job));
        let outcome = region.reclaim(&pool).unwrap();
        assert!(!outcome.partial);
        let buffer = region.buffer().unwrap();
        assert!((0..6).all(|i| buffer.pixel(i) == Some(Color::rgb(255, 255, 255))));
    }

    #[test]
    fn test_job_that_reaches_no_worker_is_retried() {
        let registry = TransformRegistry::with_builtins();
        let pool = pool(1);
        let mut region = loaded(4, Color::rgb(0, 0, 0));
        let id = region.apply(&registry, "invert", 0).unwrap();
        let job = region.pending_dispatch().remove(0);

        let report = region.dispatch_to(&job, &pool, &[WorkerId::new(), WorkerId::new()], Some(Duration::ZERO));
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 2);
        assert!(!report.sealed);
        assert!(job.dispatched().is_empty());
        assert!(!job.is_expired(Instant::now() + Duration::from_secs(1)));
        assert!(pool.board().is_empty());
        assert!(region.reclaim(&pool).is_none());

        // Still owned by the region, so it can be cancelled or sent again.
        assert_eq!(region.pending_dispatch()[0].id(), id);
        assert!(region.dispatch(&job, &pool, None).sealed);
        assert!(wait_complete(&job));
        assert!(!region.reclaim(&pool).unwrap().partial);
    }
}
