//! Periodic tick driver.

use crate::core::error::WorkerError;
use crate::project::scheduler::Scheduler;
use crossbeam::channel::{self, select, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Calls [`Scheduler::tick`] on a fixed interval from a background thread.
///
/// The scheduler lock is held for the whole tick, so ticks never overlap
/// each other or a caller's `apply`.
#[derive(Debug)]
pub struct PollLoop {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl PollLoop {
    /// Start ticking `scheduler` every `interval`.
    pub fn spawn(scheduler: Arc<Mutex<Scheduler>>, interval: Duration) -> Result<Self, WorkerError> {
        let (stop, stopped) = channel::bounded::<()>(1);
        let ticks = Arc::new(AtomicU64::new(0));

        let thread = {
            let ticks = ticks.clone();
            thread::Builder::new()
                .name("paintbucket-poll".to_string())
                .spawn(move || {
                    let ticker = channel::tick(interval);
                    loop {
                        select! {
                            recv(ticker) -> _ => {
                                let report = scheduler.lock().tick();
                                ticks.fetch_add(1, Ordering::Relaxed);
                                if report.reclaimed > 0 {
                                    log::debug!("Poll tick reclaimed {} region(s)", report.reclaimed);
                                }
                            }
                            recv(stopped) -> _ => break,
                        }
                    }
                })
                .map_err(WorkerError::SpawnFailed)?
        };

        log::debug!("Poll loop started every {:?}", interval);
        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
            ticks,
        })
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Whether the loop thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for the current tick to finish.
    pub fn stop(&mut self) {
        // Dropping the sender also wakes the select.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Poll loop panicked");
            }
            log::debug!("Poll loop stopped");
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::PixelBuffer;
    use crate::core::config::SchedulerConfig;
    use crate::core::types::{Color, PixelFormat};
    use crate::project::region::Region;
    use std::time::Instant;

    #[test]
    fn test_poll_loop_drives_jobs() {
        let mut scheduler = Scheduler::with_builtins(SchedulerConfig::new().with_workers(2)).unwrap();
        let buffer = PixelBuffer::filled(6, 1, PixelFormat::Rgba, Color::rgb(10, 10, 10)).unwrap();
        let id = scheduler.add_region(Region::from_buffer(buffer)).unwrap();
        scheduler.apply(id, "brightness", 1).unwrap();

        let scheduler = Arc::new(Mutex::new(scheduler));
        let mut poll = PollLoop::spawn(scheduler.clone(), Duration::from_millis(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !scheduler.lock().is_idle() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        poll.stop();

        assert!(!poll.is_running());
        assert!(poll.ticks() > 0);
        let scheduler = scheduler.lock();
        assert!(scheduler.is_idle());
        assert_eq!(
            scheduler.region(id).unwrap().buffer().unwrap().pixel(5),
            Some(Color::rgb(11, 11, 11))
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let scheduler = Scheduler::with_builtins(SchedulerConfig::new().with_workers(1)).unwrap();
        let mut poll = PollLoop::spawn(Arc::new(Mutex::new(scheduler)), Duration::from_secs(60)).unwrap();
        assert!(poll.is_running());
        poll.stop();
        poll.stop();
        assert!(!poll.is_running());
    }
}
