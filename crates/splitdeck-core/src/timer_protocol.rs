//! Wire protocol for the timing instrument's dashboard stream.
//!
//! Every message is a JSON array whose first element is the frame kind
//! and whose remaining elements are the payload; the five dashboard
//! kinds carry exactly one payload object. Unknown kinds are not an
//! error: the server is free to grow new kinds ahead of the client.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::frame_count::FrameCount;

pub const EVENT_KIND_NEW_ROOM_TIME: &str = "new_room_time";
pub const EVENT_KIND_NEW_SEGMENT: &str = "new_segment";
pub const EVENT_KIND_SEGMENT_STATS: &str = "segment_stats";
pub const EVENT_KIND_ROOM_HISTORY: &str = "room_history";
pub const EVENT_KIND_SEGMENT_HISTORY: &str = "segment_history";
pub const EVENT_KIND_LOG: &str = "log";
pub const EVENT_KIND_LOG_VERBOSE: &str = "log_verbose";
pub const EVENT_KIND_STATE_CHANGED: &str = "state_changed";

pub const TIMER_EVENT_KINDS: &[&str] = &[
    EVENT_KIND_NEW_ROOM_TIME,
    EVENT_KIND_NEW_SEGMENT,
    EVENT_KIND_SEGMENT_STATS,
    EVENT_KIND_ROOM_HISTORY,
    EVENT_KIND_SEGMENT_HISTORY,
    EVENT_KIND_LOG,
    EVENT_KIND_LOG_VERBOSE,
    EVENT_KIND_STATE_CHANGED,
];

pub const TIMER_REQUEST_KINDS: &[&str] = &[EVENT_KIND_ROOM_HISTORY, EVENT_KIND_SEGMENT_HISTORY];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to parse timer frame JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("timer frame must be a [kind, payload] array with a string kind")]
    MalformedFrame,
    #[error("timer frame kind '{kind}' is missing its payload")]
    MissingPayload { kind: &'static str },
    #[error("invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Parallel duration measurements for one traversal, split by clock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockTimes {
    pub game: FrameCount,
    pub real: FrameCount,
    pub lag: FrameCount,
}

impl ClockTimes {
    pub fn clock(&self, clock: ClockKind) -> FrameCount {
        match clock {
            ClockKind::Game => self.game,
            ClockKind::Real => self.real,
            ClockKind::Lag => self.lag,
        }
    }
}

/// One completed room attempt: in-room and door-transition measurements.
/// History samples additionally carry the attempt's wall-clock timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSample {
    pub room: ClockTimes,
    pub door: ClockTimes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TimeSample {
    pub fn travel(&self, travel: TravelKind) -> &ClockTimes {
        match travel {
            TravelKind::Room => &self.room,
            TravelKind::Door => &self.door,
        }
    }
}

/// The in-room vs. door-transition halves of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TravelKind {
    Room,
    Door,
}

impl TravelKind {
    pub const ALL: [TravelKind; 2] = [TravelKind::Room, TravelKind::Door];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Door => "door",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockKind {
    Real,
    Game,
    Lag,
}

impl ClockKind {
    pub const ALL: [ClockKind; 3] = [ClockKind::Real, ClockKind::Game, ClockKind::Lag];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Game => "game",
            Self::Lag => "lag",
        }
    }
}

/// Aggregated view of one room's attempt history. The server recomputes
/// and resends the whole snapshot after every attempt; the client never
/// derives these. Identity fields beyond the display name (room ids,
/// door ids, item/beam state) are carried opaquely and echoed back in
/// history requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStat {
    #[serde(default)]
    pub room_name: String,
    pub attempts: u64,
    pub time: TimeSample,
    pub best_time: TimeSample,
    pub mean_time: TimeSample,
    pub median_time: TimeSample,
    pub p25_time: TimeSample,
    pub p75_time: TimeSample,
    #[serde(flatten)]
    pub identity: Map<String, Value>,
}

/// Running totals for the segment the just-completed room belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    #[serde(default)]
    pub attempts: Option<u64>,
    pub time: TimeSample,
    pub median_time: FrameCount,
    pub best_time: FrameCount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SegmentSnapshot {
    /// Real-clock total for the running segment, room and door time
    /// combined. This is what the segment panel displays as "Time".
    pub fn realtime_total(&self) -> FrameCount {
        self.time.room.real + self.time.door.real
    }
}

/// The just-completed room's contribution to the active segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomInSegment {
    #[serde(default)]
    pub attempts: u64,
    pub time: FrameCount,
    pub median_time: FrameCount,
    pub best_time: FrameCount,
}

/// Payload of a `new_room_time` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoomTime {
    pub room: RoomStat,
    pub segment: SegmentSnapshot,
    pub room_in_segment: RoomInSegment,
}

/// Stable segment identity. The server may emit it as a string or a
/// number; both normalize to the string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId(pub String);

impl SegmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SegmentId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl Serialize for SegmentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SegmentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(number) => Self(number.to_string()),
        })
    }
}

/// Aggregated view of one named segment across attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStat {
    pub id: SegmentId,
    #[serde(default)]
    pub brief_name: String,
    pub success_count: u64,
    pub success_rate: f64,
    pub median_time: FrameCount,
    pub best_time: FrameCount,
    pub sum_of_best_times: FrameCount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `segment_stats` event: full snapshots for the segments
/// whose aggregates changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStatsBatch {
    pub segments: Vec<SegmentStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomRef {
    #[serde(default)]
    pub room_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentRef {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `room_history` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomHistory {
    pub room: RoomRef,
    pub times: Vec<TimeSample>,
}

/// Payload of a `segment_history` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentHistory {
    pub segment: SegmentRef,
    pub times: Vec<TimeSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerLogKind {
    Log,
    LogVerbose,
    StateChanged,
}

impl ServerLogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => EVENT_KIND_LOG,
            Self::LogVerbose => EVENT_KIND_LOG_VERBOSE,
            Self::StateChanged => EVENT_KIND_STATE_CHANGED,
        }
    }
}

/// Operational log frame from the server. These kinds carry a variable
/// number of payload elements rather than a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerLog {
    pub kind: ServerLogKind,
    pub entries: Vec<Value>,
}

impl ServerLog {
    /// Space-joined rendition for the operational log.
    pub fn message(&self) -> String {
        self.entries
            .iter()
            .map(|entry| match entry {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A typed inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    NewRoomTime(Box<NewRoomTime>),
    NewSegment(Value),
    SegmentStats(SegmentStatsBatch),
    RoomHistory(RoomHistory),
    SegmentHistory(SegmentHistory),
    ServerLog(ServerLog),
}

impl TimerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewRoomTime(_) => EVENT_KIND_NEW_ROOM_TIME,
            Self::NewSegment(_) => EVENT_KIND_NEW_SEGMENT,
            Self::SegmentStats(_) => EVENT_KIND_SEGMENT_STATS,
            Self::RoomHistory(_) => EVENT_KIND_ROOM_HISTORY,
            Self::SegmentHistory(_) => EVENT_KIND_SEGMENT_HISTORY,
            Self::ServerLog(log) => log.kind.as_str(),
        }
    }
}

/// Parses one inbound frame. `Ok(None)` means the kind is unknown and
/// the frame should be dropped silently.
pub fn parse_event(raw: &str) -> Result<Option<TimerEvent>, ProtocolError> {
    let value = serde_json::from_str::<Value>(raw)
        .map_err(|source| ProtocolError::InvalidJson { source })?;
    let Value::Array(mut elements) = value else {
        return Err(ProtocolError::MalformedFrame);
    };
    if elements.is_empty() {
        return Err(ProtocolError::MalformedFrame);
    }
    let Value::String(kind) = elements.remove(0) else {
        return Err(ProtocolError::MalformedFrame);
    };

    let event = match kind.as_str() {
        EVENT_KIND_NEW_ROOM_TIME => TimerEvent::NewRoomTime(Box::new(parse_payload(
            EVENT_KIND_NEW_ROOM_TIME,
            &mut elements,
        )?)),
        EVENT_KIND_NEW_SEGMENT => {
            // The boundary marker payload is opaque; an absent payload is
            // an equally valid boundary.
            TimerEvent::NewSegment(if elements.is_empty() {
                Value::Null
            } else {
                elements.remove(0)
            })
        }
        EVENT_KIND_SEGMENT_STATS => {
            TimerEvent::SegmentStats(parse_payload(EVENT_KIND_SEGMENT_STATS, &mut elements)?)
        }
        EVENT_KIND_ROOM_HISTORY => {
            TimerEvent::RoomHistory(parse_payload(EVENT_KIND_ROOM_HISTORY, &mut elements)?)
        }
        EVENT_KIND_SEGMENT_HISTORY => {
            TimerEvent::SegmentHistory(parse_payload(EVENT_KIND_SEGMENT_HISTORY, &mut elements)?)
        }
        EVENT_KIND_LOG => TimerEvent::ServerLog(ServerLog {
            kind: ServerLogKind::Log,
            entries: elements,
        }),
        EVENT_KIND_LOG_VERBOSE => TimerEvent::ServerLog(ServerLog {
            kind: ServerLogKind::LogVerbose,
            entries: elements,
        }),
        EVENT_KIND_STATE_CHANGED => TimerEvent::ServerLog(ServerLog {
            kind: ServerLogKind::StateChanged,
            entries: elements,
        }),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    elements: &mut Vec<Value>,
) -> Result<T, ProtocolError> {
    if elements.is_empty() {
        return Err(ProtocolError::MissingPayload { kind });
    }
    serde_json::from_value(elements.remove(0))
        .map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

/// An outbound drill-down request.
///
/// Requests carry no correlation id: a response is matched to its
/// request by kind alone, so two in-flight requests of the same kind
/// race and the last response wins. The dashboard only ever keeps one
/// drill-down open, which keeps a single request outstanding in
/// practice.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerRequest {
    RoomHistory { room: Value },
    SegmentHistory { segment: SegmentId },
}

impl TimerRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomHistory { .. } => EVENT_KIND_ROOM_HISTORY,
            Self::SegmentHistory { .. } => EVENT_KIND_SEGMENT_HISTORY,
        }
    }

    /// Serializes the request into its wire frame.
    pub fn to_frame(&self) -> String {
        match self {
            Self::RoomHistory { room } => json!([EVENT_KIND_ROOM_HISTORY, { "room": room }]),
            Self::SegmentHistory { segment } => {
                json!([EVENT_KIND_SEGMENT_HISTORY, { "segment": segment }])
            }
        }
        .to_string()
    }
}
