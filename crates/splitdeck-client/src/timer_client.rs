//! Reconnecting transport for the timing instrument's event stream.
//!
//! One logical connection, reconnected with a fixed delay on every
//! close (clean closes included) for as long as the process runs.
//! Inbound frames dispatch synchronously, one at a time, in arrival
//! order; outbound drill-down requests are fire-and-forget. Dropping
//! the previous stream before reconnecting is what detaches the old
//! delivery path, so no frame is ever delivered twice across
//! reconnects.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use splitdeck_core::{
    parse_event, NewRoomTime, RoomHistory, SegmentHistory, SegmentStatsBatch, ServerLog,
    TimerEvent, TimerRequest,
};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TimerClientConfig {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl TimerClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Receives the typed event stream. Invoked synchronously from the
/// session loop, so implementations need no interior locking.
pub trait TimerEventHandler {
    fn on_new_room_time(&mut self, event: NewRoomTime);
    fn on_new_segment(&mut self, marker: Value);
    fn on_segment_stats(&mut self, batch: SegmentStatsBatch);
    fn on_room_history(&mut self, history: RoomHistory);
    fn on_segment_history(&mut self, history: SegmentHistory);
    fn on_server_log(&mut self, log: ServerLog);
}

/// Routes a parsed event to its handler method.
pub fn dispatch_event<H: TimerEventHandler>(handler: &mut H, event: TimerEvent) {
    match event {
        TimerEvent::NewRoomTime(event) => handler.on_new_room_time(*event),
        TimerEvent::NewSegment(marker) => handler.on_new_segment(marker),
        TimerEvent::SegmentStats(batch) => handler.on_segment_stats(batch),
        TimerEvent::RoomHistory(history) => handler.on_room_history(history),
        TimerEvent::SegmentHistory(history) => handler.on_segment_history(history),
        TimerEvent::ServerLog(log) => handler.on_server_log(log),
    }
}

/// Parses one inbound frame and dispatches it. Unknown kinds and
/// malformed frames are dropped here; neither is fatal to the session.
pub fn dispatch_frame<H: TimerEventHandler>(handler: &mut H, raw: &str) {
    match parse_event(raw) {
        Ok(Some(event)) => {
            debug!(kind = event.kind(), "timer event");
            dispatch_event(handler, event);
        }
        Ok(None) => debug!("dropping timer frame of unknown kind"),
        Err(error) => warn!("dropping malformed timer frame: {error}"),
    }
}

enum SessionEnd {
    ConnectionClosed,
    Shutdown,
}

/// Runs the connection loop until ctrl-c or until every request sender
/// is dropped. Connection loss is never fatal: every close schedules a
/// reconnect after the configured delay, with no retry cap.
pub async fn run_timer_client<H: TimerEventHandler>(
    config: TimerClientConfig,
    mut requests: UnboundedReceiver<TimerRequest>,
    handler: &mut H,
) -> Result<()> {
    loop {
        let stream = match connect_async(config.url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(error) => {
                warn!("failed to connect to timer at {}: {error}", config.url);
                if wait_for_reconnect(config.reconnect_delay).await {
                    return Ok(());
                }
                continue;
            }
        };
        info!("connected to timer at {}", config.url);

        match run_session(stream, &mut requests, handler).await {
            Ok(SessionEnd::Shutdown) => {
                info!("timer client shutdown requested");
                return Ok(());
            }
            Ok(SessionEnd::ConnectionClosed) => {
                info!("timer connection closed; reconnecting");
            }
            Err(error) => {
                warn!("timer session error: {error:#}");
            }
        }

        if wait_for_reconnect(config.reconnect_delay).await {
            return Ok(());
        }
    }
}

/// Sleeps out the reconnect delay; true means ctrl-c arrived instead.
async fn wait_for_reconnect(delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

async fn run_session<S, H>(
    stream: S,
    requests: &mut UnboundedReceiver<TimerRequest>,
    handler: &mut H,
) -> Result<SessionEnd>
where
    S: futures_util::Stream<Item = tokio_tungstenite::tungstenite::Result<WsMessage>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
    H: TimerEventHandler,
{
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                return Ok(SessionEnd::Shutdown);
            }
            maybe_request = requests.recv() => {
                let Some(request) = maybe_request else {
                    // Every request sender is gone; the dashboard went away.
                    return Ok(SessionEnd::Shutdown);
                };
                debug!(kind = request.kind(), "sending drill-down request");
                sink.send(WsMessage::Text(request.to_frame().into()))
                    .await
                    .context("failed to send drill-down request")?;
            }
            maybe_message = source.next() => {
                let Some(message) = maybe_message else {
                    return Ok(SessionEnd::ConnectionClosed);
                };
                let message = message.context("failed reading timer websocket message")?;
                match message {
                    WsMessage::Text(text) => dispatch_frame(handler, text.as_str()),
                    WsMessage::Binary(bytes) => {
                        match std::str::from_utf8(&bytes) {
                            Ok(text) => dispatch_frame(handler, text),
                            Err(_) => warn!("dropping non-utf8 binary timer frame"),
                        }
                    }
                    WsMessage::Close(_) => return Ok(SessionEnd::ConnectionClosed),
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                }
            }
        }
    }
}
