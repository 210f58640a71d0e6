//! Worker handles.
//!
//! Each worker is a long-lived thread with its own inbox. A worker handles
//! one message at a time, so requests sent to the same worker run strictly
//! in order, while different workers run concurrently.

use crate::core::error::{WorkerError, WorkerId};
use crate::pool::message::{CompletionNotification, TransformRequest, WorkerMessage};
use crate::transforms::engine::apply_range;
use crate::transforms::registry::TransformRegistry;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Handle to one worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    inbox: Sender<WorkerMessage>,
    busy: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker and send it its identity.
    ///
    /// Completion notifications go to `outbox`.
    pub fn spawn(
        registry: Arc<TransformRegistry>,
        outbox: Sender<CompletionNotification>,
    ) -> Result<Self, WorkerError> {
        let id = WorkerId::new();
        let (inbox, receiver) = channel::unbounded();
        let busy = Arc::new(AtomicBool::new(false));

        let thread = {
            let busy = busy.clone();
            thread::Builder::new()
                .name(format!("paintbucket-worker-{}", id))
                .spawn(move || run(receiver, outbox, registry, busy))
                .map_err(WorkerError::SpawnFailed)?
        };

        let handle = Self {
            id,
            inbox,
            busy,
            thread: Some(thread),
        };
        handle.send(WorkerMessage::Identify(id))?;
        log::debug!("Worker {} spawned", id);
        Ok(handle)
    }

    /// The worker's stable ID.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Whether the worker is applying a transform right now.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Queue a transform request.
    pub fn submit(&self, request: TransformRequest) -> Result<(), WorkerError> {
        self.send(WorkerMessage::Apply(request))
    }

    fn send(&self, message: WorkerMessage) -> Result<(), WorkerError> {
        self.inbox
            .send(message)
            .map_err(|_| WorkerError::Disconnected(self.id))
    }

    /// Ask the worker to stop once its queued work is done.
    pub fn request_shutdown(&self) {
        // A dead worker has already stopped.
        let _ = self.inbox.send(WorkerMessage::Shutdown);
    }

    /// Join the thread if it has finished. Returns `false` if it is still running.
    pub fn try_join(&mut self) -> bool {
        match self.thread.take() {
            Some(thread) if thread.is_finished() => {
                if thread.join().is_err() {
                    log::warn!("Worker {} had panicked", self.id);
                }
                true
            }
            Some(thread) => {
                self.thread = Some(thread);
                false
            }
            None => true,
        }
    }

    /// Give up on joining the thread; it keeps running detached.
    pub fn detach(&mut self) {
        self.thread.take();
    }
}

/// Raises the busy flag for its lifetime, lowering it again on unwind.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn hold(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Worker message loop.
///
/// Work sent before the identity handshake is ignored. Each processed request
/// produces exactly one completion notification, even when the transform name
/// or parameter cannot be used, so the owning assignment never waits on it.
pub(crate) fn run(
    inbox: Receiver<WorkerMessage>,
    outbox: Sender<CompletionNotification>,
    registry: Arc<TransformRegistry>,
    busy: Arc<AtomicBool>,
) {
    let mut identity: Option<WorkerId> = None;

    for message in inbox.iter() {
        match message {
            WorkerMessage::Identify(id) => match identity {
                None => identity = Some(id),
                Some(current) => log::debug!("Worker {} ignored second identity {}", current, id),
            },
            WorkerMessage::Apply(request) => {
                let Some(worker_id) = identity else {
                    log::debug!("Unidentified worker dropped job {}", request.job_id);
                    continue;
                };

                {
                    let _busy = BusyGuard::hold(&busy);
                    process(&registry, &request, worker_id);
                }

                let notification = CompletionNotification {
                    worker_id,
                    job_id: request.job_id,
                    region_id: request.region_id,
                    range: request.range,
                };
                if outbox.send(notification).is_err() {
                    log::debug!("Worker {} has no listener, stopping", worker_id);
                    break;
                }
            }
            WorkerMessage::Shutdown => break,
        }
    }
}

fn process(registry: &TransformRegistry, request: &TransformRequest, worker_id: WorkerId) {
    let Some(entry) = registry.get(&request.transform_name) else {
        log::warn!(
            "Worker {} skipped job {}: unknown transform '{}'",
            worker_id,
            request.job_id,
            request.transform_name
        );
        return;
    };
    let Some(amount) = request.parameter.as_f64() else {
        log::warn!(
            "Worker {} skipped job {}: parameter '{}' is not a number",
            worker_id,
            request.job_id,
            request.parameter
        );
        return;
    };

    let written = apply_range(&request.buffer, request.range, request.format, entry, amount);
    log::trace!(
        "Worker {} applied '{}' to {} pixels of job {}",
        worker_id,
        request.transform_name,
        written,
        request.job_id
    );
}
