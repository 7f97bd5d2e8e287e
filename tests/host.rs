//! Integration tests for the module host: lifecycle ordering, independent
//! tick schedules, and name-based routing between workers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchboard::config::HostConfig;
use switchboard::error::SwitchboardError;
use switchboard::host::{Host, HostState, Module, Router};
use switchboard::registry::AnyPayload;

fn fast_config() -> HostConfig {
    HostConfig {
        poll_interval: Duration::from_millis(20),
        teardown_linger: Duration::from_millis(10),
        ..HostConfig::default()
    }
}

/// Counts lifecycle callbacks; `started` must precede everything else.
struct Probe {
    name: &'static str,
    rate: u32,
    started: Arc<AtomicBool>,
    ticks: Arc<AtomicUsize>,
    messages: Arc<AtomicUsize>,
    destroyed: Arc<AtomicBool>,
    tick_before_start: Arc<AtomicBool>,
}

impl Probe {
    fn new(name: &'static str, rate: u32) -> Self {
        Self {
            name,
            rate,
            started: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicUsize::new(0)),
            messages: Arc::new(AtomicUsize::new(0)),
            destroyed: Arc::new(AtomicBool::new(false)),
            tick_before_start: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Module for Probe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn tick_rate(&self) -> u32 {
        self.rate
    }

    fn on_start(&mut self, _router: &Router) {
        self.started.store(true, Ordering::Release);
    }

    fn on_tick(&mut self) {
        if !self.started.load(Ordering::Acquire) {
            self.tick_before_start.store(true, Ordering::Release);
        }
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }

    fn on_message(&mut self, _msg: AnyPayload) {
        self.messages.fetch_add(1, Ordering::AcqRel);
    }

    fn on_destroy(&mut self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

/// Answers requests by echoing the number it was sent, incremented.
struct Incrementer;

impl Module for Incrementer {
    fn name(&self) -> &'static str {
        "incrementer"
    }

    fn on_request(&mut self, msg: AnyPayload) -> AnyPayload {
        match msg.downcast::<u64>() {
            Ok(n) => Box::new(*n + 1),
            Err(_) => Box::new(()),
        }
    }
}

/// Stalls on every request, for timeout tests.
struct Sleeper {
    delay: Duration,
}

impl Module for Sleeper {
    fn name(&self) -> &'static str {
        "sleeper"
    }

    fn on_request(&mut self, _msg: AnyPayload) -> AnyPayload {
        std::thread::sleep(self.delay);
        Box::new(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tick_rates_are_independent() {
    let never = Probe::new("never", 0);
    let steady = Probe::new("steady", 10);
    let never_ticks = never.ticks.clone();
    let steady_ticks = steady.ticks.clone();

    let mut host = Host::new(fast_config());
    host.register(Box::new(never)).unwrap();
    host.register(Box::new(steady)).unwrap();
    host.start().await.unwrap();

    let stop = host.stop_handle();
    let running = tokio::spawn(async move {
        host.run().await.unwrap();
        host
    });

    tokio::time::sleep(Duration::from_millis(1050)).await;
    stop.stop();
    let host = running.await.unwrap();

    assert_eq!(host.state(), HostState::Stopped);
    assert_eq!(never_ticks.load(Ordering::Acquire), 0);

    // 10 Hz over ~1.05s; wide tolerance for scheduler jitter.
    let observed = steady_ticks.load(Ordering::Acquire);
    assert!((5..=15).contains(&observed), "observed {observed} ticks");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_on_start_precedes_ticks_and_messages() {
    let probe = Probe::new("probe", 100);
    let started = probe.started.clone();
    let bad_order = probe.tick_before_start.clone();

    let mut host = Host::new(fast_config());
    host.register(Box::new(probe)).unwrap();
    host.start().await.unwrap();

    // start() does not return until every on_start has completed.
    assert!(started.load(Ordering::Acquire));

    let stop = host.stop_handle();
    let running = tokio::spawn(async move {
        host.run().await.unwrap();
        host
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    stop.stop();
    running.await.unwrap();

    assert!(!bad_order.load(Ordering::Acquire));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_send_delivers_and_destroy_runs_after_last_message() {
    let probe = Probe::new("sink", 0);
    let messages = probe.messages.clone();
    let destroyed = probe.destroyed.clone();

    let mut host = Host::new(fast_config());
    host.register(Box::new(probe)).unwrap();
    host.start().await.unwrap();

    let router = host.router();
    for i in 0..3u32 {
        router.send("sink", Box::new(i)).unwrap();
    }

    host.shutdown().await.unwrap();

    // Mailbox drains in order before the stop command is honored.
    assert_eq!(messages.load(Ordering::Acquire), 3);
    assert!(destroyed.load(Ordering::Acquire));
    assert_eq!(host.state(), HostState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_response_round_trip() {
    let mut host = Host::new(fast_config());
    host.register(Box::new(Incrementer)).unwrap();
    host.start().await.unwrap();

    let router = host.router();
    let reply = router
        .request("incrementer", Box::new(41u64), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(reply.downcast_ref::<u64>(), Some(&42));

    host.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_timeout_is_bounded() {
    let mut host = Host::new(fast_config());
    host.register(Box::new(Sleeper {
        delay: Duration::from_millis(400),
    }))
    .unwrap();
    host.start().await.unwrap();

    let router = host.router();
    let begin = Instant::now();
    let err = router
        .request("sleeper", Box::new(()), Duration::from_millis(100))
        .await
        .unwrap_err();
    let elapsed = begin.elapsed();

    assert!(matches!(err, SwitchboardError::RequestTimeout));
    assert!(
        elapsed < Duration::from_millis(350),
        "timeout took {elapsed:?}"
    );

    host.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_configured_request_timeout_applies() {
    let mut host = Host::new(HostConfig {
        request_timeout: Duration::from_millis(50),
        teardown_linger: Duration::from_millis(10),
        ..HostConfig::default()
    });
    host.register(Box::new(Sleeper {
        delay: Duration::from_millis(400),
    }))
    .unwrap();
    host.start().await.unwrap();

    // No per-call timeout: the host's configured deadline must apply.
    let router = host.router();
    let begin = Instant::now();
    let err = router
        .request_default("sleeper", Box::new(()))
        .await
        .unwrap_err();
    let elapsed = begin.elapsed();

    assert!(matches!(err, SwitchboardError::RequestTimeout));
    assert!(
        elapsed < Duration::from_millis(300),
        "configured timeout ignored, took {elapsed:?}"
    );

    host.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_routing_miss_fails_fast() {
    let mut host = Host::new(fast_config());
    host.start().await.unwrap();
    let router = host.router();

    let err = router.send("nobody", Box::new(1u8)).unwrap_err();
    assert!(matches!(err, SwitchboardError::UnknownModule(name) if name == "nobody"));

    let begin = Instant::now();
    let err = router
        .request("nobody", Box::new(1u8), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::UnknownModule(_)));

    // A miss never waits out the request deadline.
    assert!(begin.elapsed() < Duration::from_millis(100));

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_module_name_rejected() {
    let mut host = Host::new(fast_config());
    host.register(Box::new(Probe::new("twin", 0))).unwrap();
    let err = host.register(Box::new(Probe::new("twin", 5))).unwrap_err();
    assert!(matches!(err, SwitchboardError::DuplicateModule(name) if name == "twin"));
}

#[tokio::test]
async fn test_register_after_start_rejected() {
    let mut host = Host::new(fast_config());
    host.start().await.unwrap();
    let err = host.register(Box::new(Probe::new("late", 0))).unwrap_err();
    assert!(matches!(err, SwitchboardError::InvalidState(_)));
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_pre_start_hook_aborts_startup() {
    let probe = Probe::new("probe", 0);
    let started = probe.started.clone();

    let mut host = Host::new(fast_config());
    host.register(Box::new(probe)).unwrap();

    let err = host
        .start_with(|| Err(SwitchboardError::ConfigError("warm-up failed".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::ConfigError(_)));
    assert!(!started.load(Ordering::Acquire));
}
