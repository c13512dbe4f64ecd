use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};

use tracing::error;

/// Handler invoked when a task submitted to a [`ForkJoinContext`] panics.
/// The default logs and swallows; callers that need to surface it as a
/// user notification (§4.9's failure semantics) install their own.
pub type ExceptionHandler = Arc<dyn Fn(String) + Send + Sync>;

fn default_handler() -> ExceptionHandler {
    Arc::new(|message: String| error!(%message, "uncaught exception in fork-join context"))
}

/// A dedicated worker pool plus an exception handler, modeling the two
/// execution contexts §4.9/§5 requires: `main` (CPU-bound reconstruction
/// and math, one thread per core) and `io` (a single serialized reader).
///
/// Grounded in the teacher's threshold-gated `rayon::par_iter`/`into_par_iter`
/// split, generalized into an explicit dedicated-pool wrapper since the
/// teacher never names its contexts but always implicitly has exactly one
/// (the global pool) for CPU work.
pub struct ForkJoinContext {
    pool: rayon::ThreadPool,
    handler: Mutex<ExceptionHandler>,
}

impl ForkJoinContext {
    /// CPU-bound context: one worker per available core.
    pub fn main() -> Self {
        let threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::with_threads(threads)
    }

    /// Serialized single-reader context (§4.1: "at most one active reader").
    pub fn io() -> Self {
        Self::with_threads(1)
    }

    fn with_threads(threads: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .expect("failed to build fork-join thread pool");
        Self {
            pool,
            handler: Mutex::new(default_handler()),
        }
    }

    pub fn set_uncaught_exception_handler(&self, handler: ExceptionHandler) {
        *self.handler.lock().expect("handler lock poisoned") = handler;
    }

    /// Enter a nested scope; every task submitted to it via
    /// [`Scope::spawn_task`] is joined before this call returns.
    pub fn blocking<F, R>(&self, body: F) -> R
    where
        F: FnOnce(&Scope<'_>) -> R + Send,
        R: Send,
    {
        let handler = self.handler.lock().expect("handler lock poisoned").clone();
        self.pool.scope(|rayon_scope| {
            let scope = Scope { rayon_scope, handler };
            body(&scope)
        })
    }
}

/// A nested submission scope, handed to the closure passed to
/// [`ForkJoinContext::blocking`].
pub struct Scope<'a> {
    rayon_scope: &'a rayon::Scope<'a>,
    handler: ExceptionHandler,
}

impl<'a> Scope<'a> {
    /// Fire-and-forget task submission. A panicking task is caught and
    /// routed to the context's handler instead of poisoning the pool
    /// (§4.9: "uncaught exceptions are routed to the context's handler").
    pub fn spawn_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'a,
    {
        let handler = self.handler.clone();
        self.rayon_scope.spawn(move |_| {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            if let Err(payload) = result {
                let message = panic_message(payload);
                (handler)(message);
            }
        });
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Bounded counting semaphore used to throttle the per-frame x per-shift
/// reconstruction fan-out to the CPU count (§4.9, §5). Built on
/// `Mutex`/`Condvar` since no crate in the dependency stack provides one
/// and it is a small enough primitive that the stdlib is the idiomatic
/// choice here.
pub struct Semaphore {
    state: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(permits),
            condvar: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> SemaphoreGuard<'_> {
        let mut permits = self.state.lock().expect("semaphore lock poisoned");
        while *permits == 0 {
            permits = self.condvar.wait(permits).expect("semaphore lock poisoned");
        }
        *permits -= 1;
        SemaphoreGuard { semaphore: self }
    }

    fn release(&self) {
        let mut permits = self.state.lock().expect("semaphore lock poisoned");
        *permits += 1;
        self.condvar.notify_one();
    }
}

/// Dropping the guard releases the permit, the idiomatic RAII substitute
/// for "release inside the task's finally" (§5).
pub struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn blocking_joins_all_spawned_tasks() {
        let ctx = ForkJoinContext::main();
        let counter = Arc::new(AtomicUsize::new(0));
        ctx.blocking(|scope| {
            for _ in 0..50 {
                let counter = counter.clone();
                scope.spawn_task(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn panicking_task_routes_to_handler_instead_of_crashing() {
        let ctx = ForkJoinContext::main();
        let caught = Arc::new(AtomicUsize::new(0));
        let caught_clone = caught.clone();
        ctx.set_uncaught_exception_handler(Arc::new(move |_msg| {
            caught_clone.fetch_add(1, Ordering::SeqCst);
        }));
        ctx.blocking(|scope| {
            scope.spawn_task(|| panic!("boom"));
        });
        assert_eq!(caught.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn semaphore_limits_concurrent_holders() {
        let semaphore = Arc::new(Semaphore::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let semaphore = semaphore.clone();
                let active = active.clone();
                let max_seen = max_seen.clone();
                std::thread::spawn(move || {
                    let _permit = semaphore.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
