//! Core data model for the splitdeck timing dashboard: frame-accurate
//! duration formatting, percentile/trend classification, and the wire
//! protocol spoken with the timing instrument.

pub mod frame_count;
pub mod tier;
pub mod timer_protocol;

pub use frame_count::{
    format, format_delta, format_percent, FrameCount, FrameCountParseError, FRAMES_PER_SECOND,
};
pub use tier::{time_tier, trend, Tier, Trend};
pub use timer_protocol::{
    parse_event, ClockKind, ClockTimes, NewRoomTime, ProtocolError, RoomHistory, RoomInSegment,
    RoomRef, RoomStat, SegmentHistory, SegmentId, SegmentRef, SegmentSnapshot, SegmentStat,
    SegmentStatsBatch, ServerLog, ServerLogKind, TimeSample, TimerEvent, TimerRequest, TravelKind,
    EVENT_KIND_LOG, EVENT_KIND_LOG_VERBOSE, EVENT_KIND_NEW_ROOM_TIME, EVENT_KIND_NEW_SEGMENT,
    EVENT_KIND_ROOM_HISTORY, EVENT_KIND_SEGMENT_HISTORY, EVENT_KIND_SEGMENT_STATS,
    EVENT_KIND_STATE_CHANGED, TIMER_EVENT_KINDS, TIMER_REQUEST_KINDS,
};
