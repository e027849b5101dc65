use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error};

use super::ThreadPool;
use crate::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool implemented with a shared job queue (i.e. channel).
///
/// This implementation uses the MPMC [`channel`] provided by the crossbeam crate as a single
/// producer, multiple consumer queue. The single producer is the pool itself, and the threads in
/// the pool are the consumers.
///
/// If a job panics, the thread running it is replaced by a new one.
///
/// [`channel`]: https://docs.rs/crossbeam/0.8.1/crossbeam/channel/index.html
pub struct SharedQueueThreadPool {
    /// the sending part of the channel
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {
    /// create a new thread pool with the given number of `threads`.
    /// Every thread created will have a handle to the receiving end of the channel
    fn new(threads: u32) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        for idx in 0..threads {
            let task_rx = TaskReceiver(rx.clone());
            thread::Builder::new()
                .name(format!("schoolstore-worker-{}", idx))
                .spawn(move || run_tasks(task_rx))?;
        }
        Ok(SharedQueueThreadPool { tx })
    }

    /// Spawns a function into the thread pool.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            error!("job dropped, there are no threads left in the pool");
        }
    }
}

/// A type that can receive jobs from a channel and run them.
/// Additionally, this type is responsible for restarting any threads that panicked
#[derive(Clone, Debug)]
struct TaskReceiver(Receiver<Job>);

impl Drop for TaskReceiver {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("worker panicked, starting a new thread");
            let task_rx = self.clone();
            if let Err(e) = thread::Builder::new().spawn(move || run_tasks(task_rx)) {
                error!("Failed to spawn a thread: {}", e);
            }
        }
    }
}

/// waits for jobs to arrive on the (wrapped) receiver and runs them, until the pool is dropped
fn run_tasks(rx: TaskReceiver) {
    loop {
        match rx.0.recv() {
            Ok(job) => job(),
            Err(_) => {
                debug!("worker exited because the thread pool was destroyed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn jobs_run_and_panics_do_not_shrink_the_pool() {
        let pool = SharedQueueThreadPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.spawn(|| panic!("job failure"));
        pool.spawn(|| panic!("job failure"));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 8 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
