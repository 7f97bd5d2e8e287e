//! Per-module workers.
//!
//! Each registered module gets one dedicated task draining one serialized
//! mailbox — the single-writer execution context for that module's state.
//! Ticks arrive on a separate capacity-1 channel: while the worker is busy,
//! a due tick is dropped rather than queued behind traffic.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::host::module::Module;
use crate::host::Router;
use crate::registry::AnyPayload;

pub(crate) enum Command {
    Message(AnyPayload),
    Request {
        payload: AnyPayload,
        reply: oneshot::Sender<AnyPayload>,
    },
    Stop,
}

pub(crate) struct WorkerHandle {
    pub(crate) name: &'static str,
    pub(crate) cmd_tx: mpsc::UnboundedSender<Command>,
    tick_rate: u32,
    tick_tx: mpsc::Sender<()>,
    ticker: Option<JoinHandle<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn the worker and run the module's `on_start` on it. Resolves the
    /// returned future once `on_start` has completed, so the caller can
    /// sequence startup (modules before listeners).
    pub(crate) async fn spawn(mut module: Box<dyn Module>, router: Router) -> Self {
        let name = module.name();
        let tick_rate = module.tick_rate();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Capacity 1: a pending tick plus a running one is the most that can
        // ever exist; further ticks are dropped at the sender.
        let (tick_tx, mut tick_rx) = mpsc::channel::<()>(1);
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            module.on_start(&router);
            let _ = started_tx.send(());
            info!(module = name, "module started");

            loop {
                tokio::select! {
                    // Commands win over a simultaneously-due tick.
                    biased;
                    cmd = cmd_rx.recv() => match cmd {
                        Some(Command::Message(msg)) => module.on_message(msg),
                        Some(Command::Request { payload, reply }) => {
                            let response = module.on_request(payload);
                            // A timed-out caller dropped the receiver; the
                            // result is simply discarded.
                            let _ = reply.send(response);
                        }
                        Some(Command::Stop) | None => break,
                    },
                    tick = tick_rx.recv() => match tick {
                        Some(()) => module.on_tick(),
                        None => break,
                    },
                }
            }

            module.on_destroy();
            info!(module = name, "module destroyed");
        });

        if started_rx.await.is_err() {
            // on_start panicked; the worker is gone. Routing to it will
            // surface as failures, shutdown will report it.
            warn!(module = name, "module worker died during on_start");
        }

        Self {
            name,
            cmd_tx,
            tick_rate,
            tick_tx,
            ticker: None,
            join: Some(join),
        }
    }

    /// Begin periodic tick delivery, if this module wants ticks at all.
    pub(crate) fn start_ticker(&mut self) {
        if self.tick_rate == 0 || self.ticker.is_some() {
            return;
        }
        let interval = Duration::from_millis((1000 / u64::from(self.tick_rate)).max(1));
        let tick_tx = self.tick_tx.clone();
        let name = self.name;
        self.ticker = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First interval tick fires immediately; consume it so delivery
            // starts one period in.
            timer.tick().await;
            loop {
                timer.tick().await;
                if tick_tx.try_send(()).is_err() {
                    // Worker still busy with the previous tick (or gone):
                    // skip, never queue.
                    debug!(module = name, "tick skipped");
                }
            }
        }));
    }

    /// Cancel periodic ticks. Safe to call before `start_ticker`.
    pub(crate) fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Ask the worker to stop after the commands already queued.
    pub(crate) fn request_stop(&self) {
        let _ = self.cmd_tx.send(Command::Stop);
    }

    /// Take the worker's join handle for the shutdown wait.
    pub(crate) fn take_join(&mut self) -> Option<JoinHandle<()>> {
        self.join.take()
    }
}
