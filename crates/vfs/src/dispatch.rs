//! Event dispatch seam.
//!
//! Consumer callbacks run inline on the signaling thread unless the
//! filesystem is built with a dispatcher. [`QueueDispatcher`] is the stock
//! implementation: a dedicated background thread draining a queue, keeping
//! the store's signal callbacks fast.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// A queued unit of consumer delivery work.
pub type DispatchJob = Box<dyn FnOnce() + Send>;

/// Redirects consumer callbacks away from the signaling thread.
pub trait EventDispatcher: Send + Sync {
    /// Run or enqueue one delivery job.
    fn dispatch(&self, job: DispatchJob);
}

/// Background-thread dispatcher.
///
/// Jobs queue to a worker thread woken by a condvar. Shutdown drains
/// already-queued jobs before the worker exits.
pub struct QueueDispatcher {
    /// Job queue plus its wakeup condvar.
    queue: Arc<(Mutex<VecDeque<DispatchJob>>, Condvar)>,
    /// Worker thread.
    thread: Mutex<Option<JoinHandle<()>>>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
}

impl QueueDispatcher {
    /// Create a dispatcher with a running worker thread.
    pub fn new() -> Self {
        let queue: Arc<(Mutex<VecDeque<DispatchJob>>, Condvar)> =
            Arc::new((Mutex::new(VecDeque::new()), Condvar::new()));
        let shutdown: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));

        let queue_clone = queue.clone();
        let shutdown_clone = shutdown.clone();

        let thread: JoinHandle<()> = thread::Builder::new()
            .name("sentinelfs-dispatch".to_string())
            .spawn(move || loop {
                let job: Option<DispatchJob> = {
                    let (lock, cvar) = &*queue_clone;
                    let mut queue = lock.lock().unwrap();

                    while queue.is_empty() {
                        if shutdown_clone.load(Ordering::SeqCst) {
                            return;
                        }
                        queue = cvar.wait(queue).unwrap();
                    }

                    queue.pop_front()
                };

                if let Some(job) = job {
                    job();
                }
            })
            .expect("Failed to spawn dispatch thread");

        Self {
            queue,
            thread: Mutex::new(Some(thread)),
            shutdown,
        }
    }

    /// Number of jobs waiting in the queue.
    pub fn pending(&self) -> usize {
        let (lock, _) = &*self.queue;
        lock.lock().unwrap().len()
    }

    /// Stop the worker after it drains the queue, and join it.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let (_, cvar) = &*self.queue;
        cvar.notify_all();

        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
        }
    }
}

impl EventDispatcher for QueueDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        if self.shutdown.load(Ordering::SeqCst) {
            tracing::warn!("Dispatch after shutdown dropped");
            return;
        }
        let (lock, cvar) = &*self.queue;
        lock.lock().unwrap().push_back(job);
        cvar.notify_one();
    }
}

impl Default for QueueDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for QueueDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_on_worker() {
        let dispatcher: QueueDispatcher = QueueDispatcher::new();
        let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            dispatcher.dispatch(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        // Wait for the worker to drain.
        for _ in 0..100 {
            if count.load(Ordering::SeqCst) == 3 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let dispatcher: QueueDispatcher = QueueDispatcher::new();
        let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let count = count.clone();
            dispatcher.dispatch(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        dispatcher.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_dispatch_after_shutdown_is_dropped() {
        let dispatcher: QueueDispatcher = QueueDispatcher::new();
        dispatcher.shutdown();

        let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        dispatcher.dispatch(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
