// tests/window_alerts.rs
//
// Drop-rate alerts end to end through the sharded window workers.

use std::sync::Arc;

use cell_drop_monitor::notify::ChannelAlertSink;
use cell_drop_monitor::{AlertRecord, CallEvent, KeyedWindowEngine, WindowShards, WINDOW_SIZE};

fn call(cell: &str, dropped: bool) -> CallEvent {
    CallEvent {
        cell_id: cell.into(),
        lat: 30.2672,
        lng: -97.7431,
        signal_strength: -80,
        is_dropped: dropped,
        timestamp: "2025-09-06T09:00:00.000Z".into(),
    }
}

/// 30 ATX calls with three drops in the middle of the window.
fn atx_first_window() -> Vec<CallEvent> {
    (0..WINDOW_SIZE)
        .map(|i| call("ATX", (10..13).contains(&i)))
        .collect()
}

#[test]
fn thirty_calls_with_three_drops_alert_at_ten_percent() {
    let mut engine = KeyedWindowEngine::new();
    let alerts: Vec<AlertRecord> = atx_first_window()
        .iter()
        .filter_map(|e| engine.ingest(e))
        .collect();

    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts[0].to_json_line(),
        r#"{"cell_id":"ATX","dropRate":0.10,"windowSize":30}"#
    );
}

#[test]
fn thirty_first_dropped_call_slides_window() {
    let mut engine = KeyedWindowEngine::new();
    for e in atx_first_window() {
        engine.ingest(&e);
    }

    // evicts the oldest (clean) call: 4 drops in the trailing 30
    let next = engine.ingest(&call("ATX", true)).expect("31st call emits");
    assert_eq!(next.window_size, 30);
    assert_eq!(next.rounded_drop_rate(), 0.13);
    assert_eq!(
        next.to_json_line(),
        r#"{"cell_id":"ATX","dropRate":0.13,"windowSize":30}"#
    );
}

#[test]
fn sliding_out_a_drop_keeps_rate_steady() {
    let mut engine = KeyedWindowEngine::new();
    for i in 0..WINDOW_SIZE {
        engine.ingest(&call("ATX", i < 3));
    }
    let same = engine.ingest(&call("ATX", true)).unwrap();
    assert_eq!(same.rounded_drop_rate(), 0.10);
}

#[test]
fn every_alert_has_full_window_and_bounded_rate() {
    let mut engine = KeyedWindowEngine::new();
    let cells = ["ATX", "CHI", "NYC"];
    let mut per_cell = [0usize; 3];

    for i in 0..500usize {
        let idx = (i * 7) % 3;
        per_cell[idx] += 1;
        let out = engine.ingest(&call(cells[idx], i % 5 == 0 || i % 11 == 0));
        match out {
            Some(a) => {
                assert!(per_cell[idx] >= WINDOW_SIZE, "alert before 30th event");
                assert_eq!(a.cell_id, cells[idx]);
                assert_eq!(a.window_size, 30);
                assert!((0.0..=1.0).contains(&a.drop_rate));
            }
            None => assert!(per_cell[idx] < WINDOW_SIZE),
        }
    }
}

#[tokio::test]
async fn shards_preserve_per_cell_order() {
    let (sink, mut rx) = ChannelAlertSink::new();
    let shards = WindowShards::spawn(3, WINDOW_SIZE, Arc::new(sink));

    // ATX gets a clean window and then one drop per call; NYC is all drops.
    for i in 0..40 {
        shards.dispatch(call("ATX", i >= WINDOW_SIZE)).unwrap();
        shards.dispatch(call("NYC", true)).unwrap();
    }
    shards.shutdown().await;

    let mut atx = Vec::new();
    let mut nyc = Vec::new();
    while let Ok(a) = rx.try_recv() {
        match a.cell_id.as_str() {
            "ATX" => atx.push(a.drop_rate),
            "NYC" => nyc.push(a.drop_rate),
            other => panic!("unexpected cell {other}"),
        }
    }

    assert_eq!(atx.len(), 11);
    assert_eq!(nyc.len(), 11);
    assert!(nyc.iter().all(|r| *r == 1.0));
    // FIFO per cell: the rate climbs by exactly one drop per alert
    for (i, r) in atx.iter().enumerate() {
        assert_eq!(*r, i as f64 / 30.0);
    }
}

#[tokio::test]
async fn shared_shards_shut_down_once() {
    let (sink, mut rx) = ChannelAlertSink::new();
    let shards = Arc::new(WindowShards::spawn(2, WINDOW_SIZE, Arc::new(sink)));

    for ev in atx_first_window() {
        shards.dispatch(ev).unwrap();
    }
    shards.shutdown().await;

    // queued events were processed before shutdown returned
    let alert = rx.try_recv().expect("30th call alerted");
    assert_eq!(alert.drop_rate, 0.1);

    assert!(shards.dispatch(call("ATX", true)).is_err());
    // idempotent
    shards.shutdown().await;
    assert!(rx.try_recv().is_err());
}
