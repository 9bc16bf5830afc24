//! Connection and controller layer of the splitdeck dashboard: the
//! reconnecting transport that delivers the typed event stream, and the
//! session object that turns those events into table and chart updates.

pub mod dashboard;
pub mod timer_client;

pub use dashboard::{DashboardSession, HISTOGRAM_BINS, MOST_RECENT_SEGMENT_CLASS};
pub use timer_client::{
    dispatch_event, dispatch_frame, run_timer_client, TimerClientConfig, TimerEventHandler,
    DEFAULT_RECONNECT_DELAY,
};
