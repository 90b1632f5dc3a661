//! Points-ledger fixture shared by unit tests

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::{MemorySnapshotAdapter, MemoryStreamAdapter};
use crate::types::{Event, EventPayload, StreamAddress};
use crate::view::Reducer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Points {
    #[serde(rename = "PointsAdded")]
    Added { amount: i64 },
    #[serde(rename = "PointsSubtracted")]
    Subtracted { amount: i64 },
    #[serde(rename = "PointsMultiplied")]
    Multiplied { factor: i64 },
    #[serde(other)]
    Unknown,
}

impl EventPayload for Points {
    fn event_type(&self) -> &str {
        match self {
            Points::Added { .. } => "PointsAdded",
            Points::Subtracted { .. } => "PointsSubtracted",
            Points::Multiplied { .. } => "PointsMultiplied",
            Points::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub sum: i64,
}

pub struct SumReducer;

impl Reducer for SumReducer {
    type State = Ledger;
    type Event = Points;

    fn view_name(&self) -> &str {
        "sum"
    }

    fn initial_state(&self) -> Ledger {
        Ledger::default()
    }

    fn reduce(&self, state: &mut Ledger, event: &Event<Points>) {
        match event.payload {
            Points::Added { amount } => state.sum += amount,
            Points::Subtracted { amount } => state.sum -= amount,
            Points::Multiplied { factor } => state.sum *= factor,
            Points::Unknown => {}
        }
    }
}

pub fn ledger() -> StreamAddress {
    StreamAddress::new("ledger", "1")
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Event at `offset` captured `secs` seconds after `base_time()`
pub fn points_at(offset: i64, payload: Points, secs: i64) -> Event<Points> {
    Event::with_timestamp(ledger().at(offset), payload, base_time() + Duration::seconds(secs))
}

/// 100, -30, +50, x2, -40 captured ten seconds apart
pub fn scenario_events() -> Vec<Event<Points>> {
    vec![
        points_at(1, Points::Added { amount: 100 }, 10),
        points_at(2, Points::Subtracted { amount: 30 }, 20),
        points_at(3, Points::Added { amount: 50 }, 30),
        points_at(4, Points::Multiplied { factor: 2 }, 40),
        points_at(5, Points::Subtracted { amount: 40 }, 50),
    ]
}

/// `count` events each adding its own offset
pub fn counting_events(count: i64) -> Vec<Event<Points>> {
    (1..=count)
        .map(|offset| points_at(offset, Points::Added { amount: offset }, offset))
        .collect()
}

pub fn memory_adapters(
    events: Vec<Event<Points>>,
) -> (Arc<MemoryStreamAdapter<Points>>, Arc<MemorySnapshotAdapter<Ledger>>) {
    (
        Arc::new(MemoryStreamAdapter::with_events(events)),
        Arc::new(MemorySnapshotAdapter::new()),
    )
}
