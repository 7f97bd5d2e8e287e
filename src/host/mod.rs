//! # Module Host
//!
//! Owns the registered modules, binds each to a dedicated worker, schedules
//! periodic ticks, and routes fire-and-forget and request/response traffic
//! between named modules and from network sessions into modules.
//!
//! ## Lifecycle
//! ```text
//! configuring → starting → running → stopping → stopped
//! ```
//! - **configuring**: modules register by unique name; duplicates are a
//!   fatal configuration error.
//! - **starting**: every module gets a worker and runs `on_start` before any
//!   tick, message, or listener activity.
//! - **running**: per-module tick schedules active; the control loop polls a
//!   stop flag at a coarse interval.
//! - **stopping**: tickers cancelled, workers stopped (running `on_destroy`),
//!   optional shutdown callback, brief linger for in-flight teardown. A
//!   watchdog forces process exit if shutdown exceeds the grace period.

pub mod module;
pub(crate) mod worker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::config::HostConfig;
use crate::error::{Result, SwitchboardError};
use crate::registry::AnyPayload;
use crate::utils::timeout::{with_timeout_error, DEFAULT_REQUEST_TIMEOUT};

pub use module::Module;
use worker::{Command, WorkerHandle};

/// Host lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Configuring,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Cloneable routing handle into the host's module workers.
///
/// Safe to use from any task: session handlers, other modules, or tests.
#[derive(Clone)]
pub struct Router {
    routes: Arc<RwLock<HashMap<&'static str, mpsc::UnboundedSender<Command>>>>,
    default_timeout: Duration,
}

impl Default for Router {
    fn default() -> Self {
        Self::with_default_timeout(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Router {
    fn with_default_timeout(default_timeout: Duration) -> Self {
        Self {
            routes: Arc::default(),
            default_timeout,
        }
    }

    /// Enqueue a fire-and-forget message onto the named module's worker.
    ///
    /// Never blocks. An unknown name is a routing miss: logged and returned
    /// as a failure value, never raised.
    pub fn send(&self, module: &str, msg: AnyPayload) -> Result<()> {
        let routes = self
            .routes
            .read()
            .map_err(|_| SwitchboardError::InvalidState("router lock poisoned".into()))?;
        match routes.get(module) {
            Some(tx) => tx
                .send(Command::Message(msg))
                .map_err(|_| SwitchboardError::UnknownModule(module.to_string())),
            None => {
                warn!(module, "send to unregistered module");
                Err(SwitchboardError::UnknownModule(module.to_string()))
            }
        }
    }

    /// Enqueue a request and wait for the module's response or the timeout,
    /// whichever comes first. On timeout the module-side work is not
    /// cancelled; its eventual result is discarded.
    pub async fn request(
        &self,
        module: &str,
        msg: AnyPayload,
        timeout: Duration,
    ) -> Result<AnyPayload> {
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let routes = self
                .routes
                .read()
                .map_err(|_| SwitchboardError::InvalidState("router lock poisoned".into()))?;
            let tx = routes.get(module).ok_or_else(|| {
                warn!(module, "request to unregistered module");
                SwitchboardError::UnknownModule(module.to_string())
            })?;
            tx.send(Command::Request {
                payload: msg,
                reply: reply_tx,
            })
            .map_err(|_| SwitchboardError::UnknownModule(module.to_string()))?;
        }
        let module_name = module.to_string();
        with_timeout_error(
            async move {
                reply_rx
                    .await
                    .map_err(|_| SwitchboardError::UnknownModule(module_name))
            },
            timeout,
        )
        .await
    }

    /// [`Router::request`] with the host's configured default timeout
    /// ([`HostConfig::request_timeout`]).
    pub async fn request_default(&self, module: &str, msg: AnyPayload) -> Result<AnyPayload> {
        self.request(module, msg, self.default_timeout).await
    }

    fn insert(&self, name: &'static str, tx: mpsc::UnboundedSender<Command>) -> Result<()> {
        let mut routes = self
            .routes
            .write()
            .map_err(|_| SwitchboardError::InvalidState("router lock poisoned".into()))?;
        routes.insert(name, tx);
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut routes) = self.routes.write() {
            routes.clear();
        }
    }
}

/// Handle for signalling the host's control loop to stop.
#[derive(Clone)]
pub struct StopHandle {
    exit: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.exit.store(true, Ordering::Release);
    }
}

/// The module host. Construct, register modules, `start`, then `run` until
/// a stop signal arrives.
pub struct Host {
    config: HostConfig,
    state: HostState,
    pending: Vec<Box<dyn Module>>,
    workers: HashMap<&'static str, WorkerHandle>,
    router: Router,
    exit: Arc<AtomicBool>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let router = Router::with_default_timeout(config.request_timeout);
        Self {
            config,
            state: HostState::Configuring,
            pending: Vec::new(),
            workers: HashMap::new(),
            router,
            exit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    /// Routing handle, cloneable and usable from any task.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            exit: self.exit.clone(),
        }
    }

    /// Signal the control loop to begin stopping.
    pub fn stop(&self) {
        self.exit.store(true, Ordering::Release);
    }

    /// Register a module. Exactly one registration per name; a repeat is a
    /// fatal configuration error surfaced before the host starts.
    pub fn register(&mut self, module: Box<dyn Module>) -> Result<()> {
        if self.state != HostState::Configuring {
            return Err(SwitchboardError::InvalidState(format!(
                "register called in state {:?}",
                self.state
            )));
        }
        let name = module.name();
        if self.pending.iter().any(|m| m.name() == name) {
            return Err(SwitchboardError::DuplicateModule(name.to_string()));
        }
        info!(module = name, "module registered");
        self.pending.push(module);
        Ok(())
    }

    /// Start every registered module: one worker each, `on_start` completed
    /// before this returns — listeners must only be started afterwards, so
    /// no message can reach a module that is not ready.
    pub async fn start(&mut self) -> Result<()> {
        self.start_with(|| Ok(())).await
    }

    /// [`Host::start`] preceded by a fallible pre-start hook (database
    /// warm-up and similar). A hook failure aborts startup.
    pub async fn start_with<F>(&mut self, pre_start: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.state != HostState::Configuring {
            return Err(SwitchboardError::InvalidState(format!(
                "start called in state {:?}",
                self.state
            )));
        }
        self.state = HostState::Starting;

        pre_start()?;

        for module in self.pending.drain(..) {
            let name = module.name();
            let handle = WorkerHandle::spawn(module, self.router.clone()).await;
            self.router.insert(name, handle.cmd_tx.clone())?;
            self.workers.insert(name, handle);
        }
        info!(modules = self.workers.len(), "host started");
        Ok(())
    }

    /// Run until stopped: activate tick schedules, watch for ctrl-c, poll
    /// the stop flag at a coarse interval, then perform shutdown.
    pub async fn run(&mut self) -> Result<()> {
        self.run_with(|| {}).await
    }

    /// [`Host::run`] with a callback invoked during the stopping phase,
    /// after all modules are destroyed.
    pub async fn run_with<F>(&mut self, on_shutdown: F) -> Result<()>
    where
        F: FnOnce(),
    {
        if self.state != HostState::Starting {
            return Err(SwitchboardError::InvalidState(format!(
                "run called in state {:?}",
                self.state
            )));
        }
        self.state = HostState::Running;

        for handle in self.workers.values_mut() {
            handle.start_ticker();
        }

        let exit = self.exit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("termination signal caught");
                exit.store(true, Ordering::Release);
            }
        });

        while !self.exit.load(Ordering::Acquire) {
            tokio::time::sleep(self.config.poll_interval).await;
        }

        self.shutdown_with(on_shutdown).await
    }

    /// Perform the stopping sequence directly (embedders not using `run`).
    pub async fn shutdown(&mut self) -> Result<()> {
        self.shutdown_with(|| {}).await
    }

    async fn shutdown_with<F>(&mut self, on_shutdown: F) -> Result<()>
    where
        F: FnOnce(),
    {
        if matches!(self.state, HostState::Stopping | HostState::Stopped) {
            return Ok(());
        }
        self.state = HostState::Stopping;
        info!("host stopping");

        // Liveness watchdog: if a stuck worker keeps shutdown from
        // completing within the grace period, report it and force exit.
        let done = Arc::new(AtomicBool::new(false));
        let remaining: Arc<Mutex<Vec<&'static str>>> =
            Arc::new(Mutex::new(self.workers.keys().copied().collect()));
        let watchdog = {
            let done = done.clone();
            let remaining = remaining.clone();
            let grace = self.config.shutdown_grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if !done.load(Ordering::Acquire) {
                    let stuck = remaining
                        .lock()
                        .map(|names| names.join(", "))
                        .unwrap_or_else(|_| "<unknown>".to_string());
                    error!(stuck, "shutdown exceeded grace period, forcing exit");
                    std::process::exit(1);
                }
            })
        };

        // Tick schedules first: nothing new reaches a worker after this.
        for handle in self.workers.values_mut() {
            handle.stop_ticker();
        }
        for handle in self.workers.values() {
            handle.request_stop();
        }
        for (name, handle) in self.workers.iter_mut() {
            if let Some(join) = handle.take_join() {
                if let Err(e) = join.await {
                    warn!(module = name, error = %e, "worker task ended abnormally");
                }
            }
            if let Ok(mut names) = remaining.lock() {
                names.retain(|n| n != name);
            }
        }
        self.workers.clear();
        self.router.clear();

        on_shutdown();

        // Let in-flight asynchronous teardown (log sinks etc.) drain.
        tokio::time::sleep(self.config.teardown_linger).await;

        done.store(true, Ordering::Release);
        watchdog.abort();
        self.state = HostState::Stopped;
        info!("host stopped");
        Ok(())
    }
}
