use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use fleet_bridge::store::Store;
use fleet_bridge::{handler_fn, Bridge, BridgeConfig, Keyspace, MemoryStore};

const RECV_WAIT: Duration = Duration::from_secs(5);
const SILENCE_WAIT: Duration = Duration::from_millis(300);

fn test_bridge(store: &MemoryStore) -> Bridge<MemoryStore> {
    Bridge::with_config(
        store.clone(),
        BridgeConfig::default().with_pop_timeout(Duration::from_millis(100)),
    )
}

/// Handler that forwards every payload into a channel
fn forwarding_handler(
    tx: mpsc::UnboundedSender<Value>,
) -> impl fleet_bridge::JobHandler {
    handler_fn(move |payload| {
        let tx = tx.clone();
        async move {
            tx.send(payload).ok();
            Ok(())
        }
    })
}

async fn recv_one(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(RECV_WAIT, rx.recv())
        .await
        .expect("timed out waiting for a payload")
        .expect("channel closed")
}

async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Value>) {
    assert!(
        timeout(SILENCE_WAIT, rx.recv()).await.is_err(),
        "expected no payload to arrive"
    );
}

/// Two payloads enqueued on one queue arrive in enqueue order
#[tokio::test]
async fn test_echo_jobs_arrive_in_fifo_order() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);

    bridge.enqueue("Echo", json!({"queue": "echo", "n": 1})).await.unwrap();
    bridge.enqueue("Echo", json!({"queue": "echo", "n": 2})).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listen("Echo", forwarding_handler(tx)).await.unwrap();

    assert_eq!(recv_one(&mut rx).await["n"], 1);
    assert_eq!(recv_one(&mut rx).await["n"], 2);

    bridge.shutdown().await;
}

/// FIFO holds across any number of producers on one queue key
#[tokio::test]
async fn test_fifo_across_multiple_producers() {
    let store = MemoryStore::new();
    let producer_a = test_bridge(&store);
    let producer_b = test_bridge(&store);
    let consumer = test_bridge(&store);

    for n in 1..=6 {
        let producer = if n % 2 == 0 { &producer_b } else { &producer_a };
        producer
            .enqueue("Blocks", json!({"queue": "blocks", "n": n}))
            .await
            .unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    consumer.listen("Blocks", forwarding_handler(tx)).await.unwrap();

    for n in 1..=6 {
        assert_eq!(recv_one(&mut rx).await["n"], n);
    }

    consumer.shutdown().await;
}

/// A handler failure is terminal for that message only
#[test_log::test(tokio::test)]
async fn test_handler_failure_does_not_stop_the_loop() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);

    for n in 1..=3 {
        bridge.enqueue("Echo", json!({"queue": "echo", "n": n})).await.unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = handler_fn(move |payload: Value| {
        let tx = tx.clone();
        async move {
            if payload["n"] == 2 {
                return Err("boom".into());
            }
            tx.send(payload).ok();
            Ok(())
        }
    });
    bridge.listen("Echo", handler).await.unwrap();

    assert_eq!(recv_one(&mut rx).await["n"], 1);
    assert_eq!(recv_one(&mut rx).await["n"], 3);

    bridge.shutdown().await;
}

/// `payload.at` routes through the schedule, never a live queue
#[tokio::test]
async fn test_scheduled_job_is_deferred_not_queued() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);

    let at = Utc::now().timestamp_millis() + 60_000;
    bridge
        .enqueue("Echo", json!({"queue": "echo", "at": at, "n": 1}))
        .await
        .unwrap();

    let entries = store.sorted_entries("schedule");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, at);
    assert_eq!(store.queue_len("queue:echo"), 0);
    assert!(bridge.known_queues().await.unwrap().is_empty());

    // A listener sees nothing; promotion is the backend's job
    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listen("Echo", forwarding_handler(tx)).await.unwrap();
    assert_silent(&mut rx).await;

    bridge.shutdown().await;
}

/// An envelope for another worker type on the key is dropped, and the
/// loop keeps consuming
#[test_log::test(tokio::test)]
async fn test_mismatched_worker_envelope_is_dropped() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);
    let key = Keyspace::default().queue_key("echo");

    // Another producer put a foreign envelope on our key
    let foreign = json!({
        "class": "Other",
        "jid": "ffffffffffffffffffffffff",
        "queue": "echo",
        "args": [{"n": 99}],
    });
    store.push(&key, foreign.to_string()).await.unwrap();
    bridge.enqueue("Echo", json!({"queue": "echo", "n": 1})).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listen("Echo", forwarding_handler(tx)).await.unwrap();

    // Only the matching envelope reaches the handler; the foreign one is
    // gone from the store either way
    assert_eq!(recv_one(&mut rx).await["n"], 1);
    assert_silent(&mut rx).await;
    assert_eq!(store.queue_len("queue:echo"), 0);

    bridge.shutdown().await;
}

/// Undecodable store contents are skipped without killing the loop
#[test_log::test(tokio::test)]
async fn test_malformed_envelope_is_skipped() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);
    let key = Keyspace::default().queue_key("echo");

    store.push(&key, "{definitely not an envelope".to_string()).await.unwrap();
    bridge.enqueue("Echo", json!({"queue": "echo", "n": 1})).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listen("Echo", forwarding_handler(tx)).await.unwrap();

    assert_eq!(recv_one(&mut rx).await["n"], 1);
    bridge.shutdown().await;
}

/// After unsubscribe the loop stops popping; later enqueues stay put
#[tokio::test]
async fn test_unsubscribe_stops_consumption() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listen("Echo", forwarding_handler(tx)).await.unwrap();

    bridge.enqueue("Echo", json!({"queue": "echo", "n": 1})).await.unwrap();
    assert_eq!(recv_one(&mut rx).await["n"], 1);

    assert!(bridge.unsubscribe("Echo"));
    assert!(bridge.subscriptions().is_empty());

    // Give the loop its bounded wait to observe the flag and wind down
    tokio::time::sleep(Duration::from_millis(300)).await;

    bridge.enqueue("Echo", json!({"queue": "echo", "n": 2})).await.unwrap();
    assert_silent(&mut rx).await;
    assert_eq!(store.queue_len("queue:echo"), 1);
}

/// Unsubscribing a worker that never subscribed is a quiet no-op
#[tokio::test]
async fn test_unsubscribe_without_subscription_is_a_noop() {
    let bridge = test_bridge(&MemoryStore::new());
    assert!(!bridge.unsubscribe("Echo"));
    assert!(!bridge.unsubscribe("Echo"));
}

/// Competing consumers on one key partition the stream without
/// duplication
#[tokio::test]
async fn test_competing_consumers_split_the_queue() {
    let store = MemoryStore::new();
    let producer = test_bridge(&store);
    let consumer_a = test_bridge(&store);
    let consumer_b = test_bridge(&store);

    let (tx, mut rx) = mpsc::unbounded_channel();
    consumer_a.listen("Blocks", forwarding_handler(tx.clone())).await.unwrap();
    consumer_b.listen("Blocks", forwarding_handler(tx)).await.unwrap();

    for n in 0..10 {
        producer
            .enqueue("Blocks", json!({"queue": "blocks", "n": n}))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..10 {
        seen.push(recv_one(&mut rx).await["n"].as_i64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
    assert_silent(&mut rx).await;

    consumer_a.shutdown().await;
    consumer_b.shutdown().await;
}

/// Envelopes survive the store round trip bit-for-bit where it matters
#[tokio::test]
async fn test_payload_round_trip_is_lossless() {
    let store = MemoryStore::new();
    let bridge = test_bridge(&store);

    let payload = json!({
        "queue": "epoch_stats",
        "epoch": 771,
        "totals": {"attestations": 31_204, "proposals": 32},
        "sources": ["beacon", "archive"],
        "incomplete": false,
    });
    bridge.enqueue("EpochStats", payload.clone()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.listen("EpochStats", forwarding_handler(tx)).await.unwrap();

    assert_eq!(recv_one(&mut rx).await, payload);
    bridge.shutdown().await;
}
