//! The scheduler: regions, the worker pool, and the tick that drives them.
//!
//! A tick is a short, non-blocking pass over every region:
//! 1. Assignments not yet sent out are advanced and fanned out to workers.
//!    With no live worker they stay queued.
//! 2. Working assignments past their deadline are force-completed.
//! 3. Regions with finished assignments are reclaimed.
//!
//! Completion notifications are delivered by the pool's router as they
//! arrive, so the tick only ever observes state.

use crate::core::config::SchedulerConfig;
use crate::core::error::{AssignmentId, JobError, JobResult, PaintResult, RegionId, SourceError};
use crate::core::events::{Event, EventEmitter};
use crate::core::types::Parameter;
use crate::pool::pool::WorkerPool;
use crate::project::assignment::AssignmentState;
use crate::project::region::{ReclaimOutcome, Region};
use crate::transforms::registry::TransformRegistry;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Events the scheduler publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A region was added and loaded.
    RegionReady {
        /// The new region.
        region_id: RegionId,
    },
    /// A region's job was reclaimed.
    RegionJobComplete {
        /// Region that finished.
        region_id: RegionId,
        /// What the reclaim did.
        outcome: ReclaimOutcome,
    },
}

/// Kinds of [`SchedulerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEventKind {
    /// [`SchedulerEvent::RegionReady`].
    RegionReady,
    /// [`SchedulerEvent::RegionJobComplete`].
    RegionJobComplete,
}

impl Event for SchedulerEvent {
    type Kind = SchedulerEventKind;

    fn kind(&self) -> SchedulerEventKind {
        match self {
            SchedulerEvent::RegionReady { .. } => SchedulerEventKind::RegionReady,
            SchedulerEvent::RegionJobComplete { .. } => SchedulerEventKind::RegionJobComplete,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Workers alive at the start of the tick.
    pub live_workers: usize,
    /// Assignments whose requests went out and whose dispatched set was sealed.
    pub dispatched: usize,
    /// Transform requests sent to workers.
    pub requests: usize,
    /// Assignments force-completed past their deadline.
    pub expired: usize,
    /// Regions whose shared buffer was reclaimed.
    pub reclaimed: usize,
}

/// Owns the regions and the worker pool.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<TransformRegistry>,
    pool: WorkerPool,
    regions: IndexMap<RegionId, Region>,
    events: EventEmitter<SchedulerEvent>,
}

impl Scheduler {
    /// Validate `config` and start the worker pool.
    pub fn new(config: SchedulerConfig, registry: TransformRegistry) -> PaintResult<Self> {
        config.validate()?;
        let registry = Arc::new(registry);
        let pool = WorkerPool::spawn(config.workers, registry.clone(), config.shutdown_grace())?;

        Ok(Self {
            config,
            registry,
            pool,
            regions: IndexMap::new(),
            events: EventEmitter::new(),
        })
    }

    /// Create a scheduler with the built-in transforms registered.
    pub fn with_builtins(config: SchedulerConfig) -> PaintResult<Self> {
        Self::new(config, TransformRegistry::with_builtins())
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Transform registry shared with the workers.
    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// The worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Number of workers whose thread is still running.
    pub fn live_workers(&self) -> usize {
        self.pool.live_workers().len()
    }

    /// Subscribe to scheduler events.
    pub fn events(&mut self) -> &mut EventEmitter<SchedulerEvent> {
        &mut self.events
    }

    /// Add a region, loading it first if needed.
    pub fn add_region(&mut self, mut region: Region) -> Result<RegionId, SourceError> {
        if !region.is_loaded() {
            region.load()?;
        }
        let region_id = region.id();
        self.regions.insert(region_id, region);
        self.events.trigger(&SchedulerEvent::RegionReady { region_id });
        Ok(region_id)
    }

    /// Remove an idle region.
    pub fn remove_region(&mut self, region_id: RegionId) -> JobResult<Region> {
        let region = self
            .regions
            .get(&region_id)
            .ok_or(JobError::RegionNotFound(region_id))?;
        if region.is_working() {
            return Err(JobError::ConflictingJob { region_id });
        }
        self.regions
            .shift_remove(&region_id)
            .ok_or(JobError::RegionNotFound(region_id))
    }

    /// Look up a region.
    pub fn region(&self, region_id: RegionId) -> Option<&Region> {
        self.regions.get(&region_id)
    }

    /// Look up a region mutably.
    pub fn region_mut(&mut self, region_id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(&region_id)
    }

    /// All regions in insertion order.
    pub fn regions(&self) -> &IndexMap<RegionId, Region> {
        &self.regions
    }

    /// Queue a transform on a region. Dispatch happens on the next tick.
    pub fn apply(
        &mut self,
        region_id: RegionId,
        transform_name: &str,
        parameter: impl Into<Parameter>,
    ) -> JobResult<AssignmentId> {
        let region = self
            .regions
            .get_mut(&region_id)
            .ok_or(JobError::RegionNotFound(region_id))?;
        region.apply(&self.registry, transform_name, parameter)
    }

    /// Cancel a queued or running job.
    pub fn cancel(&mut self, region_id: RegionId, assignment_id: AssignmentId) -> JobResult<()> {
        self.regions
            .get_mut(&region_id)
            .ok_or(JobError::RegionNotFound(region_id))?
            .cancel(assignment_id)
    }

    /// Whether no region has a live assignment.
    pub fn is_idle(&self) -> bool {
        self.regions.values().all(|r| r.assignments().is_empty())
    }

    /// Run one scheduling pass.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            live_workers: self.live_workers(),
            ..TickReport::default()
        };

        if report.live_workers == 0 {
            let queued = self
                .regions
                .values()
                .filter(|r| !r.pending_dispatch().is_empty())
                .count();
            if queued > 0 {
                log::warn!("No live workers; {} region(s) left queued", queued);
            }
        } else {
            let deadline = self.config.job_deadline();
            for region in self.regions.values_mut() {
                for assignment in region.pending_dispatch() {
                    let sent = region.dispatch(&assignment, &self.pool, deadline);
                    if sent.sealed {
                        report.dispatched += 1;
                    }
                    report.requests += sent.sent;
                }
            }
        }

        let now = Instant::now();
        for region in self.regions.values() {
            report.expired += region.expire(now);
        }

        for (&region_id, region) in self.regions.iter_mut() {
            if !region.has_assignment_in(AssignmentState::Complete) {
                continue;
            }
            if let Some(outcome) = region.reclaim(&self.pool) {
                report.reclaimed += 1;
                self.events
                    .trigger(&SchedulerEvent::RegionJobComplete { region_id, outcome });
            }
        }

        log::trace!("Tick: {:?}", report);
        report
    }

    /// Tick until every region is idle or `timeout` passes.
    ///
    /// Sleeps the configured poll interval between ticks. Returns whether the
    /// scheduler became idle.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.is_idle() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!("Scheduler still busy after {:?}", timeout);
                return false;
            }
            thread::sleep(self.config.poll_interval().min(deadline - now));
        }
    }

    /// Size of the canvas covering every loaded region, measured from the origin.
    pub fn canvas_extent(&self) -> (u64, u64) {
        self.regions
            .values()
            .filter_map(|region| {
                let buffer = region.buffer()?;
                let (x, y) = region.position();
                let right = (x + i64::from(buffer.width())).max(0) as u64;
                let bottom = (y + i64::from(buffer.height())).max(0) as u64;
                Some((right, bottom))
            })
            .fold((0, 0), |(w, h), (right, bottom)| (w.max(right), h.max(bottom)))
    }

    /// Stop the worker pool.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}
