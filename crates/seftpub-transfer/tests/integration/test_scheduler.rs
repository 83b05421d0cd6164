//! Scheduler timing under paused tokio time

use std::sync::Arc;
use std::time::Duration;

use seftpub_transfer::TransferScheduler;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::Harness;

fn start(
    h: &Harness,
    interval: Duration,
    initial_delay: Duration,
) -> (Arc<TransferScheduler>, CancellationToken, JoinHandle<()>) {
    let scheduler = Arc::new(TransferScheduler::new(
        h.engine.clone(),
        interval,
        initial_delay,
    ));
    let shutdown = CancellationToken::new();
    let task = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };
    (scheduler, shutdown, task)
}

#[tokio::test(start_paused = true)]
async fn test_initial_kick_then_fixed_interval() {
    let h = Harness::new();
    h.store.put("a.xls", b"alpha");
    let (_scheduler, shutdown, task) = start(&h, Duration::from_secs(60), Duration::from_secs(6));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.log.count("list"), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.log.count("list"), 1);
    assert_eq!(h.delivery.published_count(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.log.count("list"), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.log.count("list"), 3);

    shutdown.cancel();
    task.await.unwrap();
    assert_eq!(h.delivery.published_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_cycle_runs_out_of_schedule() {
    let h = Harness::new();
    let (scheduler, shutdown, task) = start(&h, Duration::from_secs(600), Duration::from_secs(6));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.log.count("list"), 1);

    scheduler.request_cycle();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.log.count("list"), 2);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycle_causes_overlap_skip_not_queueing() {
    let h = Harness::new();
    h.store.put("a.xls", b"alpha");
    let gate = h.store.install_gate();
    let (_scheduler, shutdown, task) = start(&h, Duration::from_secs(10), Duration::from_secs(1));

    gate.entered.notified().await;
    assert!(h.engine.is_busy());

    // Two interval ticks pass while the first cycle is stuck in a fetch
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(h.log.count("open"), 1);

    gate.release.notify_one();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!h.engine.is_busy());
    assert_eq!(h.delivery.published_count(), 1);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_cycle() {
    let h = Harness::new();
    let (_scheduler, shutdown, task) = start(&h, Duration::from_secs(60), Duration::from_secs(6));

    shutdown.cancel();
    task.await.unwrap();
    assert!(h.log.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_running_cycle() {
    let h = Harness::new();
    h.store.put("a.xls", b"alpha");
    let gate = h.store.install_gate();
    let (_scheduler, shutdown, task) = start(&h, Duration::from_secs(60), Duration::from_secs(1));

    gate.entered.notified().await;
    shutdown.cancel();
    tokio::task::yield_now().await;
    assert!(!task.is_finished());

    gate.release.notify_one();
    task.await.unwrap();
    assert_eq!(h.delivery.published_count(), 1);
    assert!(h.log.contains("close"));
}
