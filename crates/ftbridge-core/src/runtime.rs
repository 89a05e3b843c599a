/*!
 * Controller runtime for ftbridge.
 *
 * The runtime pairs one controlling thread with a pool of blocking worker
 * threads. Code that owns device objects or settles pending requests runs on
 * the controller (a `LocalSet` driven by the thread that created the runtime);
 * blocking driver calls run on the worker pool and hand their results back.
 */
use std::future::Future;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tokio::runtime::Builder as TokioRuntimeBuilder;
use tokio::runtime::Runtime as TokioRuntime;
use tokio::task::{JoinHandle, LocalSet};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, SharedConfig};
use crate::error::{Error, Result};

/// Single-threaded controller plus a blocking worker pool.
///
/// `Runtime` is `!Send`: it stays on the thread that created it, and that
/// thread is the controller for its whole lifetime.
pub struct Runtime {
    /// Tasks that must run on the controller thread
    local: LocalSet,
    /// Tokio runtime providing the reactor and the blocking pool
    tokio_runtime: TokioRuntime,
    /// Configuration
    config: SharedConfig,
    /// Thread that owns the controller
    controller: ThreadId,
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a new runtime with a specific configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let runtime_config = &config.runtime;
        if runtime_config.max_blocking_threads == 0 {
            return Err(Error::config("runtime.max_blocking_threads must be at least 1"));
        }

        let tokio_runtime = TokioRuntimeBuilder::new_current_thread()
            .enable_all()
            .max_blocking_threads(runtime_config.max_blocking_threads)
            .thread_name(runtime_config.worker_thread_name.clone())
            .thread_keep_alive(Duration::from_millis(runtime_config.worker_keep_alive_ms))
            .build()
            .map_err(|e| Error::runtime(format!("Failed to create Tokio runtime: {}", e)))?;

        let controller = thread::current().id();
        info!(
            max_blocking_threads = runtime_config.max_blocking_threads,
            "Created ftbridge runtime"
        );

        Ok(Self {
            local: LocalSet::new(),
            tokio_runtime,
            config: SharedConfig::new(config),
            controller,
        })
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// The thread acting as controller
    pub fn controller_thread(&self) -> ThreadId {
        self.controller
    }

    /// Whether the calling thread is the controller
    pub fn is_controller_thread(&self) -> bool {
        thread::current().id() == self.controller
    }

    /// Fail with `Error::WrongThread` unless called on the controller
    pub fn ensure_controller(&self, operation: &str) -> Result<()> {
        if self.is_controller_thread() {
            Ok(())
        } else {
            Err(Error::wrong_thread(operation))
        }
    }

    /// Drive the controller until `future` completes.
    ///
    /// Completion tasks queued with [`Runtime::spawn_controller`] make
    /// progress only while the controller is being driven.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.local.block_on(&self.tokio_runtime, future)
    }

    /// Run a blocking closure on the worker pool
    pub fn spawn_worker<F, R>(&self, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        trace!("Queueing blocking work item");
        self.tokio_runtime.spawn_blocking(work)
    }

    /// Queue a task that must run on the controller thread.
    ///
    /// The task does not need to be `Send`; it only ever runs on the
    /// controller.
    pub fn spawn_controller<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.local.spawn_local(task)
    }

    /// Shut the runtime down.
    ///
    /// Controller tasks still queued (open completions among them) are run
    /// first, then worker threads still blocked in driver calls are given
    /// what is left of `timeout`.
    pub fn shutdown(self, timeout: Duration) {
        let Runtime {
            local,
            tokio_runtime,
            ..
        } = self;

        debug!(?timeout, "Shutting down ftbridge runtime");
        let started = Instant::now();
        // A `LocalSet` polled as a future completes once all its tasks have.
        let drained =
            tokio_runtime.block_on(async move { tokio::time::timeout(timeout, local).await });
        if drained.is_err() {
            warn!(?timeout, "Controller tasks still pending at shutdown, dropping them");
        }

        tokio_runtime.shutdown_timeout(timeout.saturating_sub(started.elapsed()));
        info!("ftbridge runtime shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::config::RuntimeConfig;

    #[test]
    fn test_runtime_creation() {
        let runtime = Runtime::new().unwrap();
        assert_eq!(runtime.config().get().general.app_name, "ftbridge");
        assert!(runtime.is_controller_thread());
        assert!(runtime.ensure_controller("test").is_ok());
    }

    #[test]
    fn test_zero_worker_threads_rejected() {
        let config = Config {
            runtime: RuntimeConfig {
                max_blocking_threads: 0,
                ..RuntimeConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(Runtime::with_config(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_worker_runs_off_controller() {
        let runtime = Runtime::new().unwrap();
        let controller = runtime.controller_thread();

        let worker = runtime.block_on(async {
            runtime
                .spawn_worker(|| thread::current().id())
                .await
                .unwrap()
        });

        assert_ne!(worker, controller);
    }

    #[test]
    fn test_worker_thread_name() {
        let mut config = Config::default();
        config.runtime.worker_thread_name = "d2xx-test".to_string();
        let runtime = Runtime::with_config(config).unwrap();

        let name = runtime.block_on(async {
            runtime
                .spawn_worker(|| thread::current().name().map(str::to_string))
                .await
                .unwrap()
        });

        assert_eq!(name.as_deref(), Some("d2xx-test"));
    }

    #[test]
    fn test_controller_task_runs_on_controller() {
        let runtime = Runtime::new().unwrap();
        let controller = runtime.controller_thread();
        let seen = Rc::new(Cell::new(None));

        let seen_in_task = seen.clone();
        let task = runtime.spawn_controller(async move {
            seen_in_task.set(Some(thread::current().id()));
        });
        runtime.block_on(task).unwrap();

        assert_eq!(seen.get(), Some(controller));
    }

    #[test]
    fn test_controller_id_differs_on_other_thread() {
        let runtime = Runtime::new().unwrap();
        let controller = runtime.controller_thread();

        let other = thread::spawn(move || thread::current().id() == controller)
            .join()
            .unwrap();
        assert!(!other);
    }

    #[test]
    fn test_shutdown_runs_pending_controller_tasks() {
        let runtime = Runtime::new().unwrap();
        let ran = Rc::new(Cell::new(false));

        let ran_in_task = ran.clone();
        let work = runtime.spawn_worker(|| 7);
        runtime.spawn_controller(async move {
            ran_in_task.set(work.await.unwrap() == 7);
        });

        runtime.shutdown(Duration::from_secs(5));
        assert!(ran.get());
    }

    #[test]
    fn test_shutdown() {
        let runtime = Runtime::new().unwrap();
        runtime.block_on(async {
            runtime.spawn_worker(|| 1 + 1).await.unwrap();
        });
        runtime.shutdown(Duration::from_millis(100));
    }
}
