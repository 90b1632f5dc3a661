//! Stream Integration Tests
//!
//! The write path end to end over JSONL files:
//! - append, store and outbox persistence
//! - reopening a stream from snapshots plus the event tail
//! - optimistic concurrency between two writers
//! - time travel over what was written

mod common;

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{init_tracing, ledger, Ledger, Points, SumReducer, Tally, TallyReducer};
use eventline::{
    JsonlConfig, JsonlSnapshotAdapter, JsonlStreamAdapter, OutboxMessage, ReplayOptions,
    SnapshotAdapter, SnapshotPolicy, StepperOptions, Stream, StreamAdapter, TimeTraveler, View,
    ViewAddress,
};

struct Storage {
    streams: Arc<JsonlStreamAdapter<Points>>,
    sums: Arc<JsonlSnapshotAdapter<Ledger>>,
    tallies: Arc<JsonlSnapshotAdapter<Tally>>,
    config: JsonlConfig,
    _temp_dir: TempDir,
}

fn create_test_storage() -> Storage {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = JsonlConfig::new(temp_dir.path());
    Storage {
        streams: Arc::new(JsonlStreamAdapter::new(config.clone())),
        sums: Arc::new(JsonlSnapshotAdapter::new(config.clone())),
        tallies: Arc::new(JsonlSnapshotAdapter::new(config.clone())),
        config,
        _temp_dir: temp_dir,
    }
}

fn open_stream(storage: &Storage) -> Stream<Points> {
    Stream::new(ledger(), storage.streams.clone())
        .with_view(View::new(Arc::new(SumReducer), ledger(), storage.sums.clone()))
        .with_view(
            View::new(Arc::new(TallyReducer), ledger(), storage.tallies.clone())
                .with_policy(SnapshotPolicy::EveryEvents(3)),
        )
        .with_message_producer(|event, states| {
            let sum = states.get::<Ledger>("sum").map(|l| l.sum).unwrap_or_default();
            let mut messages = vec![OutboxMessage::new(
                "balance",
                json!({ "type": event.event_type, "sum": sum }),
            )];
            if sum > 200 {
                messages.push(OutboxMessage::new("alerts", json!({ "sum": sum })));
            }
            messages
        })
}

#[tokio::test]
async fn test_write_reopen_and_continue() {
    let storage = create_test_storage();
    let cancel = CancellationToken::new();

    let mut stream = open_stream(&storage).open(&cancel).await.unwrap();
    stream.append_event(Points::Added { amount: 100 }, Some("alice"));
    stream.append_event(Points::Subtracted { amount: 30 }, None);
    let result = stream.store().await.unwrap();
    assert_eq!(result.num_events, 2);
    assert_eq!(result.num_messages_by_channel.get("balance"), Some(&2));
    assert_eq!(result.num_messages_by_channel.get("alerts"), None);

    // sum snapshots on every store; tally waits for three new events
    let sum_view = ViewAddress::new("sum", ledger());
    let tally_view = ViewAddress::new("tally", ledger());
    assert_eq!(storage.sums.get_snapshot(&sum_view).await.unwrap().offset, 2);
    assert!(storage.tallies.get_snapshot(&tally_view).await.unwrap().is_empty());

    let mut reopened = open_stream(&storage).open(&cancel).await.unwrap();
    assert_eq!(reopened.stored_offset(), 2);
    assert_eq!(reopened.view_states().get::<Ledger>("sum").unwrap().sum, 70);
    assert_eq!(reopened.view_states().get::<Tally>("tally").unwrap().added, 1);

    let meta = reopened.append_event(Points::Added { amount: 50 }, None);
    assert_eq!(meta.cursor.offset, 3);
    reopened.append_event(Points::Multiplied { factor: 2 }, None);
    let result = reopened.store().await.unwrap();
    assert_eq!(result.num_messages_by_channel.get("alerts"), Some(&1));

    assert_eq!(storage.streams.get_last_offset(&ledger()).await.unwrap(), 4);
    let tally = storage.tallies.get_snapshot(&tally_view).await.unwrap();
    assert_eq!(tally.offset, 4);
    assert_eq!(
        tally.state,
        Some(Tally {
            added: 2,
            subtracted: 1,
            multiplied: 1
        })
    );

    let alerts = std::fs::read_to_string(storage.config.outbox_path("alerts")).unwrap();
    let alert: OutboxMessage = serde_json::from_str(alerts.lines().next().unwrap()).unwrap();
    assert_eq!(alert.payload["sum"], 240);
    assert_eq!(alert.cursor.map(|c| c.offset), Some(4));
}

#[tokio::test]
async fn test_second_writer_conflicts() {
    let storage = create_test_storage();
    let cancel = CancellationToken::new();

    let mut first = open_stream(&storage).open(&cancel).await.unwrap();
    let mut second = open_stream(&storage).open(&cancel).await.unwrap();

    first.append_event(Points::Added { amount: 1 }, None);
    second.append_event(Points::Added { amount: 2 }, None);

    first.store().await.unwrap();
    let err = second.store().await.unwrap_err();
    assert!(err.is_conflict());

    // the winner's event is the only one on disk
    assert_eq!(storage.streams.get_last_offset(&ledger()).await.unwrap(), 1);
    let balance = std::fs::read_to_string(storage.config.outbox_path("balance")).unwrap();
    assert_eq!(balance.lines().count(), 1);
}

#[tokio::test]
async fn test_time_travel_over_written_stream() {
    let storage = create_test_storage();
    let cancel = CancellationToken::new();

    let mut stream = open_stream(&storage).open(&cancel).await.unwrap();
    for payload in [
        Points::Added { amount: 100 },
        Points::Subtracted { amount: 30 },
        Points::Added { amount: 50 },
        Points::Multiplied { factor: 2 },
        Points::Subtracted { amount: 40 },
    ] {
        stream.append_event(payload, None);
    }
    stream.store().await.unwrap();

    let traveler = TimeTraveler::new(
        Arc::new(SumReducer),
        ledger(),
        storage.streams.clone(),
        storage.sums.clone(),
    );

    // snapshot at offset 5 is newer than the target and gets discarded
    let at_three = traveler.replay_to_offset(3, ReplayOptions::default()).await.unwrap();
    assert_eq!(at_three.sum, 120);
    let latest = traveler.get_latest_state(ReplayOptions::default()).await.unwrap();
    assert_eq!(latest.sum, 200);

    let options = StepperOptions {
        use_snapshot: false,
        window_size: 2,
        sparse_index_interval: 2,
        ..StepperOptions::default()
    };
    let mut stepper = traveler.create_stepper(options);
    let end = stepper.next(10, &cancel).await.unwrap();
    assert!(end.is_at_end);
    assert_eq!(end.state.sum, 200);
    let back = stepper.next(0, &cancel).await.unwrap();
    assert_eq!(back.offset, 5);
}
