//! Endpoint queue behavior under contention

use network::{BoxError, EndpointConfig, EndpointQueue, EndpointState, QueueError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn limits(max_concurrent: usize, max_per_window: u32, window_ms: u64, timeout_ms: u64) -> EndpointConfig {
    EndpointConfig::new(
        max_concurrent,
        max_per_window,
        Duration::from_millis(window_ms),
        Duration::from_millis(timeout_ms),
    )
}

async fn noop(queue: &EndpointQueue, endpoint: &str) -> Result<(), QueueError> {
    queue.submit(endpoint, || async { Ok::<_, BoxError>(()) }).await
}

#[tokio::test]
async fn test_rate_ceiling_times_out_extra_call() {
    let queue = EndpointQueue::with_endpoints([
        ("rpc", limits(10, 3, 500, 100)),
        ("relay", limits(10, 3, 500, 100)),
    ])
    .unwrap();

    for _ in 0..3 {
        noop(&queue, "rpc").await.unwrap();
    }
    let err = noop(&queue, "rpc").await.unwrap_err();
    assert!(matches!(err, QueueError::Timeout { .. }));
    assert!(err.is_retryable());

    // Saturation on one endpoint leaves the other untouched
    let started = Instant::now();
    noop(&queue, "relay").await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(50));

    let metrics = queue.metrics("rpc").unwrap();
    assert_eq!(metrics.total, 4);
    assert_eq!(metrics.success, 3);
    assert_eq!(metrics.timeout, 1);
}

#[tokio::test]
async fn test_rate_ceiling_waits_for_window_to_roll() {
    let queue = EndpointQueue::with_endpoints([("rpc", limits(10, 2, 200, 2000))]).unwrap();

    let started = Instant::now();
    for _ in 0..3 {
        noop(&queue, "rpc").await.unwrap();
    }
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(queue.metrics("rpc").unwrap().success, 3);
}

#[tokio::test]
async fn test_concurrency_ceiling_is_never_exceeded() {
    let queue = Arc::new(EndpointQueue::with_endpoints([("rpc", limits(2, 100, 1000, 2000))]).unwrap());
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                queue
                    .submit("rpc", move || async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, BoxError>(())
                    })
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(queue.budget("rpc").unwrap().in_flight, 0);
}

#[tokio::test]
async fn test_pause_holds_work_until_resume() {
    let queue = Arc::new(EndpointQueue::with_endpoints([("rpc", limits(4, 100, 1000, 1000))]).unwrap());
    queue.pause("rpc").unwrap();
    assert_eq!(queue.state("rpc").unwrap(), EndpointState::Paused);

    let ran = Arc::new(AtomicBool::new(false));
    let waiter = {
        let queue = Arc::clone(&queue);
        let ran = Arc::clone(&ran);
        tokio::spawn(async move {
            queue
                .submit("rpc", move || async move {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!ran.load(Ordering::SeqCst));

    queue.resume("rpc").unwrap();
    waiter.await.unwrap().unwrap();
    assert!(ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_paused_endpoint_times_out() {
    let queue = EndpointQueue::with_endpoints([("rpc", limits(4, 100, 1000, 50))]).unwrap();
    queue.pause("rpc").unwrap();
    assert!(matches!(
        noop(&queue, "rpc").await,
        Err(QueueError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_drain_rejects_new_work_and_waits_for_in_flight() {
    let queue = Arc::new(EndpointQueue::with_endpoints([("rpc", limits(4, 100, 1000, 1000))]).unwrap());
    let finished = Arc::new(AtomicBool::new(false));

    let in_flight = {
        let queue = Arc::clone(&queue);
        let finished = Arc::clone(&finished);
        tokio::spawn(async move {
            queue
                .submit("rpc", move || async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let drain = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.drain("rpc", Duration::from_secs(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(matches!(
        noop(&queue, "rpc").await,
        Err(QueueError::Draining { .. })
    ));

    drain.await.unwrap().unwrap();
    assert!(finished.load(Ordering::SeqCst));
    in_flight.await.unwrap().unwrap();
    assert_eq!(queue.state("rpc").unwrap(), EndpointState::Draining);
}

#[tokio::test]
async fn test_cancelled_caller_removes_queued_work() {
    let queue = Arc::new(EndpointQueue::with_endpoints([("rpc", limits(1, 100, 1000, 1000))]).unwrap());

    let holder = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .submit("rpc", || async {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok::<_, BoxError>(())
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let queued = queue.submit("rpc", move || async move {
        flag.store(true, Ordering::SeqCst);
        Ok::<_, BoxError>(())
    });
    assert!(tokio::time::timeout(Duration::from_millis(30), queued)
        .await
        .is_err());

    holder.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(queue.metrics("rpc").unwrap().total, 1);
}

#[tokio::test]
async fn test_admitted_work_survives_caller_drop() {
    let queue = EndpointQueue::with_endpoints([("relay", limits(1, 100, 1000, 1000))]).unwrap();
    let finished = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&finished);
    let call = queue.submit("relay", move || async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<_, BoxError>(())
    });
    assert!(tokio::time::timeout(Duration::from_millis(10), call)
        .await
        .is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(finished.load(Ordering::SeqCst));

    let metrics = queue.metrics("relay").unwrap();
    assert_eq!(metrics.success, 1);
    assert_eq!(queue.budget("relay").unwrap().in_flight, 0);
}

#[tokio::test]
async fn test_snapshot_covers_every_endpoint() {
    let queue = EndpointQueue::with_endpoints([
        ("a", EndpointConfig::default()),
        ("b", EndpointConfig::default()),
    ])
    .unwrap();
    noop(&queue, "a").await.unwrap();

    let snapshot = queue.metrics_snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["a"].success, 1);
    assert_eq!(snapshot["b"].total, 0);
    assert_eq!(queue.endpoints(), vec!["a".to_string(), "b".to_string()]);
}

async fn timed_op(
    queue: Arc<EndpointQueue>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    hold_ms: u64,
) -> Result<(), QueueError> {
    queue
        .submit("rpc", move || async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(hold_ms)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, BoxError>(())
        })
        .await
}

#[tokio::test]
async fn test_lowered_ceiling_counts_in_flight_work() {
    let queue = Arc::new(EndpointQueue::with_endpoints([("rpc", limits(2, 100, 1000, 3000))]).unwrap());
    let running = Arc::new(AtomicUsize::new(0));
    let before = Arc::new(AtomicUsize::new(0));

    let long: Vec<_> = (0..2)
        .map(|_| tokio::spawn(timed_op(queue.clone(), running.clone(), before.clone(), 200)))
        .collect();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(running.load(Ordering::SeqCst), 2);

    queue.configure("rpc", limits(1, 100, 1000, 3000)).unwrap();

    let after = Arc::new(AtomicUsize::new(0));
    let short: Vec<_> = (0..3)
        .map(|_| tokio::spawn(timed_op(queue.clone(), running.clone(), after.clone(), 20)))
        .collect();

    for result in futures::future::join_all(long.into_iter().chain(short)).await {
        result.unwrap().unwrap();
    }
    assert_eq!(before.load(Ordering::SeqCst), 2);
    // Work admitted after the shrink waited for the old holders to drain
    assert_eq!(after.load(Ordering::SeqCst), 1);

    // Raising the ceiling again restores parallelism
    queue.configure("rpc", limits(3, 100, 1000, 3000)).unwrap();
    let raised = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..6)
        .map(|_| tokio::spawn(timed_op(queue.clone(), running.clone(), raised.clone(), 30)))
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }
    assert_eq!(raised.load(Ordering::SeqCst), 3);
    assert_eq!(queue.budget("rpc").unwrap().in_flight, 0);
}
