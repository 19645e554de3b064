//! Execution contexts for logingate.
//!
//! The server runs two kinds of context. The main (simulation) context is
//! a single thread that must never stall; it holds the [`MainQueue`].
//! Worker contexts run on a tokio runtime and may block on I/O; they are
//! reached through a [`Worker`].
//!
//! Store operations are `async`, and only a [`Worker`] can drive a
//! future, so the main context cannot call them directly. Results travel
//! back to the main context as continuations drained by
//! [`MainQueue::run_pending`].

use std::future::Future;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Work to be run on the main context.
type Continuation = Box<dyn FnOnce() + Send>;

/// Handle for running work on the worker context.
#[derive(Clone)]
pub struct Worker {
    handle: Handle,
    main: Sender<Continuation>,
}

/// Queue of continuations owned by the main context.
pub struct MainQueue {
    pending: Receiver<Continuation>,
}

/// Create a linked worker handle and main queue over a runtime.
pub fn contexts(handle: Handle) -> (Worker, MainQueue) {
    let (main, pending) = mpsc::channel();
    (Worker { handle, main }, MainQueue { pending })
}

impl Worker {
    /// Run a future on the worker context.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run `work` on the worker context, then hand its output to `then`
    /// on the main context.
    pub fn submit<F, C>(&self, work: F, then: C) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) + Send + 'static,
    {
        let main = self.main.clone();
        self.handle.spawn(async move {
            let output = work.await;
            if main.send(Box::new(move || then(output))).is_err() {
                debug!("Main queue closed, dropping continuation");
            }
        })
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").finish_non_exhaustive()
    }
}

impl MainQueue {
    /// Run every continuation that is ready, without blocking.
    ///
    /// Returns the number of continuations run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(continuation) = self.pending.try_recv() {
            continuation();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one continuation and run it.
    ///
    /// This blocks the calling thread; use it only outside the tick loop,
    /// e.g. while shutting down.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.pending.recv_timeout(timeout) {
            Ok(continuation) => {
                continuation();
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tokio::runtime::Runtime;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_submit_delivers_on_main_thread() {
        let runtime = Runtime::new().unwrap();
        let (worker, main) = contexts(runtime.handle().clone());
        let main_thread = thread::current().id();
        let seen = Arc::new(Mutex::new(None));

        let seen_in = Arc::clone(&seen);
        worker.submit(
            async { thread::current().id() },
            move |worker_thread| {
                *seen_in.lock().unwrap() = Some((worker_thread, thread::current().id()));
            },
        );

        assert!(main.run_next(WAIT));
        let (worker_thread, callback_thread) = seen.lock().unwrap().unwrap();
        assert_eq!(callback_thread, main_thread);
        assert_ne!(worker_thread, main_thread);
    }

    #[test]
    fn test_run_pending_does_not_block() {
        let runtime = Runtime::new().unwrap();
        let (_worker, main) = contexts(runtime.handle().clone());

        assert_eq!(main.run_pending(), 0);
    }

    #[test]
    fn test_run_pending_drains_finished_work() {
        let runtime = Runtime::new().unwrap();
        let (worker, main) = contexts(runtime.handle().clone());
        let total = Arc::new(Mutex::new(0));

        let handles: Vec<_> = (1..=3)
            .map(|n| {
                let total = Arc::clone(&total);
                worker.submit(async move { n }, move |n| *total.lock().unwrap() += n)
            })
            .collect();
        for handle in handles {
            runtime.block_on(handle).unwrap();
        }

        assert_eq!(main.run_pending(), 3);
        assert_eq!(*total.lock().unwrap(), 6);
        assert_eq!(main.run_pending(), 0);
    }

    #[test]
    fn test_submit_after_main_dropped() {
        let runtime = Runtime::new().unwrap();
        let (worker, main) = contexts(runtime.handle().clone());
        drop(main);

        let handle = worker.submit(async { 1 }, |_| panic!("must not run"));
        runtime.block_on(handle).unwrap();
    }

    #[test]
    fn test_spawn_returns_output() {
        let runtime = Runtime::new().unwrap();
        let (worker, _main) = contexts(runtime.handle().clone());

        let handle = worker.spawn(async { 40 + 2 });
        assert_eq!(runtime.block_on(handle).unwrap(), 42);
    }
}
