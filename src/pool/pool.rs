//! Worker pool and notification router.
//!
//! The pool owns a fixed set of [`WorkerHandle`]s. All workers report to one
//! completion channel; a router thread drains it and hands each notification
//! to its live assignment through the [`AssignmentBoard`]. Delivery is thus
//! independent of the scheduler tick.

use crate::core::error::{WorkerError, WorkerId};
use crate::pool::board::AssignmentBoard;
use crate::pool::message::{CompletionNotification, TransformRequest};
use crate::pool::worker::WorkerHandle;
use crate::project::assignment::Delivery;
use crate::transforms::registry::TransformRegistry;
use crossbeam::channel::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A fixed-size pool of workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    board: AssignmentBoard,
    router: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl WorkerPool {
    /// Spawn `size` workers and the router.
    pub fn spawn(
        size: usize,
        registry: Arc<TransformRegistry>,
        shutdown_grace: Duration,
    ) -> Result<Self, WorkerError> {
        let (outbox, notifications) = channel::unbounded();
        let board = AssignmentBoard::new();

        let router = {
            let board = board.clone();
            thread::Builder::new()
                .name("paintbucket-router".to_string())
                .spawn(move || route(notifications, board))
                .map_err(WorkerError::SpawnFailed)?
        };

        let mut pool = Self {
            workers: Vec::with_capacity(size),
            board,
            router: Some(router),
            shutdown_grace,
        };
        for _ in 0..size {
            pool.workers.push(WorkerHandle::spawn(registry.clone(), outbox.clone())?);
        }

        log::info!("Worker pool started with {} workers", size);
        Ok(pool)
    }

    /// Number of workers in the pool, including any whose thread has died.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// All worker handles.
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// IDs of the workers whose threads are still running, in pool order.
    pub fn live_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| w.is_alive())
            .map(WorkerHandle::id)
            .collect()
    }

    /// The live-assignment table notifications are routed through.
    pub fn board(&self) -> &AssignmentBoard {
        &self.board
    }

    /// Send a request to a worker.
    pub fn submit(&self, worker_id: WorkerId, request: TransformRequest) -> Result<(), WorkerError> {
        self.workers
            .iter()
            .find(|w| w.id() == worker_id)
            .ok_or(WorkerError::Disconnected(worker_id))?
            .submit(request)
    }

    /// Stop every worker, waiting at most one grace period for the whole pool.
    ///
    /// The grace period is a single deadline shared by all workers and the
    /// router, not a per-worker allowance. Workers still running when it
    /// passes are detached. The router exits once every worker has dropped its
    /// end of the completion channel.
    pub fn shutdown(&mut self) {
        for worker in &self.workers {
            worker.request_shutdown();
        }

        let deadline = Instant::now() + self.shutdown_grace;
        for worker in &mut self.workers {
            while !worker.try_join() {
                if Instant::now() >= deadline {
                    log::warn!("Worker {} did not stop within the grace period, detaching", worker.id());
                    worker.detach();
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
        self.workers.clear();

        if let Some(router) = self.router.take() {
            while !router.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if router.is_finished() {
                let _ = router.join();
            }
        }
        log::info!("Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn route(notifications: Receiver<CompletionNotification>, board: AssignmentBoard) {
    for notification in notifications.iter() {
        match board.deliver(&notification) {
            Ok(Delivery::Completed) => log::info!(
                "Job {} on region {} complete",
                notification.job_id,
                notification.region_id
            ),
            Ok(Delivery::Accepted) => log::trace!(
                "Worker {} finished its range of job {}",
                notification.worker_id,
                notification.job_id
            ),
            Ok(Delivery::Duplicate) => log::debug!(
                "Duplicate notification from worker {} for job {}",
                notification.worker_id,
                notification.job_id
            ),
            Err(error) => log::debug!("{}", error),
        }
    }
}
