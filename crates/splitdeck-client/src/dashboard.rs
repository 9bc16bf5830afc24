//! Dashboard controller: wires the typed event stream into table and
//! chart updates.
//!
//! All mutable presentation state lives on one `DashboardSession`
//! context object: the live tables, the drill-down views, the per-id
//! segment bookkeeping, and the provisional-row pointer. Everything is
//! driven synchronously from the transport's dispatch loop, so there is
//! exactly one writer by construction.

use std::collections::HashMap;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use splitdeck_core::{
    format, format_delta, format_percent, trend, ClockKind, FrameCount, NewRoomTime, RoomHistory,
    SegmentHistory, SegmentId, SegmentStat, SegmentStatsBatch, ServerLog, ServerLogKind,
    TimeSample, TimerRequest, TravelKind, Trend,
};
use splitdeck_view::{
    histogram_plot, line_plot, render_plot, Column, Limits, NodeId, Renderer, RowId, Table,
};

use crate::timer_client::TimerEventHandler;

pub const MOST_RECENT_SEGMENT_CLASS: &str = "most-recent-segment";
pub const HISTOGRAM_BINS: usize = 27;

/// The five rows appended to the room panel per attempt, in their
/// structural order. Downstream consumers rely on this grouping, so it
/// is a contract, not a style choice.
const ROOM_TIME_ROWS: [(&str, TravelKind, ClockKind); 5] = [
    ("Game", TravelKind::Room, ClockKind::Game),
    ("Real", TravelKind::Room, ClockKind::Real),
    ("Lag", TravelKind::Room, ClockKind::Lag),
    ("Door Lag", TravelKind::Door, ClockKind::Lag),
    ("Door Real", TravelKind::Door, ClockKind::Real),
];

pub struct DashboardSession<R: Renderer> {
    renderer: R,
    root: NodeId,

    room_panel: NodeId,
    segment_panel: NodeId,
    segment_stats_panel: NodeId,
    history_panel: NodeId,
    history_title: NodeId,
    history_chart: NodeId,
    history_histogram: NodeId,
    help_panel: NodeId,
    gutter: NodeId,

    room_times: Table,
    segment_times: Table,
    segment_stats: Table,
    stats_footer_columns: Vec<Column>,
    attempt_history: Table,

    num_segments: u64,
    current_segment_row: Option<RowId>,
    segment_stats_by_id: HashMap<String, Value>,
    segment_row_by_id: HashMap<String, RowId>,
    last_updated_segment: Option<String>,
    old_segment_totals: Value,

    history_plots: HashMap<(TravelKind, ClockKind), NodeId>,
    histogram_plots: HashMap<(TravelKind, ClockKind), NodeId>,
    active_plot: (TravelKind, ClockKind),
}

impl<R: Renderer> DashboardSession<R> {
    pub fn new(mut renderer: R, requests: UnboundedSender<TimerRequest>) -> Self {
        let root = renderer.create_container();

        let help_panel = named_panel(&mut renderer, root, "help");
        renderer.hide(help_panel);
        let gutter = named_panel(&mut renderer, root, "gutter");
        renderer.hide(gutter);

        let room_panel = named_panel(&mut renderer, root, "room-times");
        let room_times = Table::new(&mut renderer, room_times_columns(&requests));
        renderer.append_child(room_panel, room_times.root());

        let segment_panel = named_panel(&mut renderer, root, "segment-times");
        let segment_times = Table::new(&mut renderer, segment_times_columns(&requests));
        renderer.append_child(segment_panel, segment_times.root());

        let segment_stats_panel = named_panel(&mut renderer, root, "segment-stats");
        renderer.hide(segment_stats_panel);
        let segment_stats = Table::new(&mut renderer, segment_stats_columns(&requests));
        renderer.append_child(segment_stats_panel, segment_stats.root());

        let history_panel = named_panel(&mut renderer, root, "attempt-history");
        renderer.hide(history_panel);
        let history_title = renderer.create_container();
        renderer.add_class(history_title, "attempt-history-name");
        renderer.append_child(history_panel, history_title);
        let attempt_history = Table::new(&mut renderer, attempt_history_columns());
        renderer.append_child(history_panel, attempt_history.root());
        let history_chart = renderer.create_container();
        renderer.add_class(history_chart, "chart");
        renderer.add_class(history_chart, "line-chart");
        renderer.append_child(history_panel, history_chart);
        let history_histogram = renderer.create_container();
        renderer.add_class(history_histogram, "chart");
        renderer.add_class(history_histogram, "histogram");
        renderer.append_child(history_panel, history_histogram);

        Self {
            renderer,
            root,
            room_panel,
            segment_panel,
            segment_stats_panel,
            history_panel,
            history_title,
            history_chart,
            history_histogram,
            help_panel,
            gutter,
            room_times,
            segment_times,
            segment_stats,
            stats_footer_columns: segment_stats_footer_columns(),
            attempt_history,
            num_segments: 0,
            current_segment_row: None,
            segment_stats_by_id: HashMap::new(),
            segment_row_by_id: HashMap::new(),
            last_updated_segment: None,
            old_segment_totals: json!({}),
            history_plots: HashMap::new(),
            histogram_plots: HashMap::new(),
            active_plot: (TravelKind::Room, ClockKind::Real),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn room_panel(&self) -> NodeId {
        self.room_panel
    }

    pub fn segment_panel(&self) -> NodeId {
        self.segment_panel
    }

    pub fn segment_stats_panel(&self) -> NodeId {
        self.segment_stats_panel
    }

    pub fn history_panel(&self) -> NodeId {
        self.history_panel
    }

    pub fn help_panel(&self) -> NodeId {
        self.help_panel
    }

    pub fn gutter(&self) -> NodeId {
        self.gutter
    }

    pub fn room_times(&self) -> &Table {
        &self.room_times
    }

    pub fn segment_times(&self) -> &Table {
        &self.segment_times
    }

    pub fn segment_stats(&self) -> &Table {
        &self.segment_stats
    }

    pub fn attempt_history(&self) -> &Table {
        &self.attempt_history
    }

    pub fn history_plot(&self, travel: TravelKind, clock: ClockKind) -> Option<NodeId> {
        self.history_plots.get(&(travel, clock)).copied()
    }

    pub fn histogram_plot_node(&self, travel: TravelKind, clock: ClockKind) -> Option<NodeId> {
        self.histogram_plots.get(&(travel, clock)).copied()
    }

    /// Fires the drill-down affordance of a room-panel row.
    pub fn activate_room_row(&self, row: RowId) {
        self.room_times.activate(row, 0);
    }

    /// Fires the drill-down affordance of a segment-panel row.
    pub fn activate_segment_row(&self, row: RowId) {
        self.segment_times.activate(row, 0);
    }

    /// Fires the drill-down affordance of a segment-stats row.
    pub fn activate_segment_stats_row(&self, row: RowId) {
        self.segment_stats.activate(row, 0);
    }

    /// Switches which of the six drill-down plot pairs is visible.
    pub fn select_history_plot(&mut self, travel: TravelKind, clock: ClockKind) {
        self.active_plot = (travel, clock);
        self.reveal_active_plots();
    }

    pub fn hide_history(&mut self) {
        self.renderer.hide(self.history_panel);
    }

    fn reveal_active_plots(&mut self) {
        for (key, node) in &self.history_plots {
            if *key == self.active_plot {
                self.renderer.show(*node);
            } else {
                self.renderer.hide(*node);
            }
        }
        for (key, node) in &self.histogram_plots {
            if *key == self.active_plot {
                self.renderer.show(*node);
            } else {
                self.renderer.hide(*node);
            }
        }
    }

    fn clear_most_recent_highlight(&mut self) {
        let Some(previous_id) = self.last_updated_segment.take() else {
            return;
        };
        let Some(&previous_row) = self.segment_row_by_id.get(&previous_id) else {
            return;
        };
        if let Some(node) = self.segment_stats.row_node(previous_row) {
            self.renderer.remove_class(node, MOST_RECENT_SEGMENT_CLASS);
        }
        // Re-render the row from its own snapshot with the trend
        // baseline cleared, so the previous highlight's colors go away.
        if let Some(snapshot) = self.segment_stats_by_id.get(&previous_id) {
            let mut patch = snapshot.clone();
            insert_field(&mut patch, "old", Value::Null);
            self.segment_stats
                .update_row(&mut self.renderer, previous_row, patch);
        }
    }

    fn upsert_segment(&mut self, segment: SegmentStat) {
        let key = segment.id.as_str().to_string();
        let snapshot = to_row(&segment);
        if let Some(&row) = self.segment_row_by_id.get(&key) {
            self.clear_most_recent_highlight();

            let previous = self
                .segment_stats_by_id
                .get(&key)
                .cloned()
                .unwrap_or(Value::Null);
            let mut patch = snapshot.clone();
            insert_field(&mut patch, "old", previous);
            self.segment_stats.update_row(&mut self.renderer, row, patch);
            if let Some(node) = self.segment_stats.row_node(row) {
                self.renderer.add_class(node, MOST_RECENT_SEGMENT_CLASS);
                self.renderer.scroll_into_view(node);
            }

            self.segment_stats_by_id.insert(key.clone(), snapshot);
            self.last_updated_segment = Some(key);
        } else {
            let row = self
                .segment_stats
                .append_row(&mut self.renderer, snapshot.clone());
            self.segment_row_by_id.insert(key.clone(), row);
            self.segment_stats_by_id.insert(key, snapshot);
        }
    }

    /// The totals row is derived, never received: the element-wise sum
    /// over every known segment's snapshot, rebuilt after each batch.
    fn rebuild_totals_footer(&mut self) {
        let mut median_total = FrameCount::ZERO;
        let mut best_total = FrameCount::ZERO;
        let mut sob_total = FrameCount::ZERO;
        for snapshot in self.segment_stats_by_id.values() {
            if let Some(value) = frame_field(snapshot, "median_time") {
                median_total = median_total + value;
            }
            if let Some(value) = frame_field(snapshot, "best_time") {
                best_total = best_total + value;
            }
            if let Some(value) = frame_field(snapshot, "sum_of_best_times") {
                sob_total = sob_total + value;
            }
        }

        let totals = json!({
            "brief_name": "Total",
            "median_time": median_total,
            "best_time": best_total,
            "sum_of_best_times": sob_total,
        });

        self.segment_stats.clear_footer(&mut self.renderer);
        let mut data = totals.clone();
        insert_field(&mut data, "old", self.old_segment_totals.clone());
        self.segment_stats.append_footer_row(
            &mut self.renderer,
            data,
            Some(&self.stats_footer_columns),
        );
        self.old_segment_totals = totals;
    }

    fn show_attempt_history(&mut self, name: &str, times: &[TimeSample]) {
        self.renderer.set_text(self.history_title, name);
        self.attempt_history.clear_body(&mut self.renderer);
        for (_, node) in self.history_plots.drain() {
            self.renderer.remove(node);
        }
        for (_, node) in self.histogram_plots.drain() {
            self.renderer.remove(node);
        }

        for travel in TravelKind::ALL {
            for clock in ClockKind::ALL {
                let series: Vec<f64> = times
                    .iter()
                    .map(|sample| sample.travel(travel).clock(clock).frames() as f64)
                    .collect();
                let points: Vec<(f64, f64)> = series
                    .iter()
                    .enumerate()
                    .map(|(index, value)| (index as f64, *value))
                    .collect();

                let xlim = Limits::new(0.0, points.len() as f64);
                let ylim = series_limits(&series);
                let label = |_: f64, y: f64| format(Some(FrameCount::new(y.round() as i64)));
                let groups = line_plot(&points, xlim, ylim, &label);
                let plot = render_plot(&mut self.renderer, self.history_chart, &groups);
                self.renderer.hide(plot);
                self.history_plots.insert((travel, clock), plot);

                let bin_label = |value: f64| format(Some(FrameCount::new(value.round() as i64)));
                let groups = histogram_plot(&series, HISTOGRAM_BINS, &bin_label);
                let plot = render_plot(&mut self.renderer, self.history_histogram, &groups);
                self.renderer.hide(plot);
                self.histogram_plots.insert((travel, clock), plot);
            }
        }
        self.reveal_active_plots();

        for sample in times {
            self.attempt_history
                .append_row(&mut self.renderer, to_row(sample));
        }

        self.renderer.show(self.history_panel);
    }
}

impl<R: Renderer> TimerEventHandler for DashboardSession<R> {
    fn on_new_room_time(&mut self, event: NewRoomTime) {
        self.renderer.hide(self.help_panel);

        let stat = &event.room;
        let room_value = to_row(stat);
        for (index, (label, travel, clock)) in ROOM_TIME_ROWS.iter().enumerate() {
            let first = index == 0;
            let pick = |sample: &TimeSample| sample.travel(*travel).clock(*clock);
            let mut row = json!({
                "room_name": if first { stat.room_name.clone() } else { String::new() },
                "attempts": if first { json!(stat.attempts) } else { json!("") },
                "type": label,
                "time": pick(&stat.time),
                "avg_time": pick(&stat.mean_time),
                "median_time": pick(&stat.median_time),
                "best_time": pick(&stat.best_time),
                "p25_time": pick(&stat.p25_time),
                "p75_time": pick(&stat.p75_time),
            });
            if first {
                insert_field(&mut row, "room", room_value.clone());
            }
            self.room_times.append_row(&mut self.renderer, row);
        }
        self.room_times.append_blank_row(&mut self.renderer);

        if let Some(provisional) = self.current_segment_row.take() {
            self.segment_times.remove_row(&mut self.renderer, provisional);
        }
        let in_segment = &event.room_in_segment;
        self.segment_times.append_row(
            &mut self.renderer,
            json!({
                "room": room_value,
                "room_name": stat.room_name,
                "attempts": in_segment.attempts,
                "time": in_segment.time,
                "median_time": in_segment.median_time,
                "best_time": in_segment.best_time,
            }),
        );
        let segment = &event.segment;
        let provisional = self.segment_times.append_row(
            &mut self.renderer,
            json!({
                "room_name": "Segment",
                "attempts": segment.attempts,
                "time": segment.realtime_total(),
                "median_time": segment.median_time,
                "best_time": segment.best_time,
            }),
        );
        self.current_segment_row = Some(provisional);
    }

    fn on_new_segment(&mut self, _marker: Value) {
        // No separator ahead of the very first segment.
        if self.num_segments > 0 {
            self.segment_times.append_blank_row(&mut self.renderer);
        }
        self.num_segments += 1;
        self.current_segment_row = None;
    }

    fn on_segment_stats(&mut self, batch: SegmentStatsBatch) {
        for segment in batch.segments {
            self.upsert_segment(segment);
        }
        self.rebuild_totals_footer();
        self.renderer.show(self.segment_stats_panel);
        self.renderer.show(self.gutter);
    }

    fn on_room_history(&mut self, history: RoomHistory) {
        let name = history.room.room_name.clone();
        self.show_attempt_history(&name, &history.times);
    }

    fn on_segment_history(&mut self, history: SegmentHistory) {
        let name = history.segment.name.clone();
        self.show_attempt_history(&name, &history.times);
    }

    fn on_server_log(&mut self, log: ServerLog) {
        match log.kind {
            ServerLogKind::Log => info!(target: "timer", "{}", log.message()),
            ServerLogKind::LogVerbose | ServerLogKind::StateChanged => {
                debug!(target: "timer", kind = log.kind.as_str(), "{}", log.message())
            }
        }
    }
}

fn named_panel<R: Renderer>(renderer: &mut R, root: NodeId, name: &str) -> NodeId {
    let panel = renderer.create_container();
    renderer.add_class(panel, name);
    renderer.append_child(root, panel);
    panel
}

fn to_row(value: &impl serde::Serialize) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn insert_field(row: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = row {
        map.insert(key.to_string(), value);
    }
}

fn text(value: String) -> Option<Value> {
    Some(Value::String(value))
}

fn value_to_frames(value: &Value) -> Option<FrameCount> {
    value.as_f64().map(|raw| FrameCount::new(raw.round() as i64))
}

fn frame_field(row: &Value, key: &str) -> Option<FrameCount> {
    row.get(key).and_then(value_to_frames)
}

fn old_frame_field(row: &Value, key: &str) -> Option<FrameCount> {
    row.get("old").and_then(|old| old.get(key)).and_then(value_to_frames)
}

fn pointer_frames(row: &Value, pointer: &str) -> Option<FrameCount> {
    row.pointer(pointer).and_then(value_to_frames)
}

fn link_class(row: &Value, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(name)) if !name.is_empty() => Some("link".to_string()),
        _ => None,
    }
}

fn time_tier_class(row: &Value) -> Option<String> {
    splitdeck_core::time_tier(
        frame_field(row, "time"),
        frame_field(row, "best_time"),
        frame_field(row, "p25_time"),
        frame_field(row, "median_time"),
        frame_field(row, "p75_time"),
    )
    .map(|tier| tier.as_str().to_string())
}

fn median_trend_class(row: &Value) -> Option<String> {
    let current = frame_field(row, "median_time")?;
    match trend(current, old_frame_field(row, "median_time"))? {
        Trend::Improved => Some("median-time-went-down".to_string()),
        Trend::Worsened => Some("median-time-went-up".to_string()),
    }
}

fn best_trend_class(row: &Value) -> Option<String> {
    let current = frame_field(row, "best_time")?;
    match trend(current, old_frame_field(row, "best_time"))? {
        Trend::Improved => Some("best-time-went-down".to_string()),
        Trend::Worsened => None,
    }
}

fn sob_trend_class(row: &Value) -> Option<String> {
    let current = frame_field(row, "sum_of_best_times")?;
    match trend(current, old_frame_field(row, "sum_of_best_times"))? {
        Trend::Improved => Some("sum-of-best-times-went-down".to_string()),
        Trend::Worsened => None,
    }
}

fn format_timestamp(row: &Value) -> Option<String> {
    let raw = row.get("timestamp")?.as_str()?;
    let parsed = chrono::DateTime::parse_from_rfc3339(raw).ok()?;
    Some(parsed.format("%Y-%m-%d %H:%M").to_string())
}

fn request_room_history(requests: &UnboundedSender<TimerRequest>, row: &Value) {
    // Rows without a room identity (the provisional Segment row,
    // secondary clock rows) have no history to fetch.
    let Some(room) = row.get("room") else {
        return;
    };
    if room.is_null() {
        return;
    }
    let _ = requests.send(TimerRequest::RoomHistory { room: room.clone() });
}

fn request_segment_history(requests: &UnboundedSender<TimerRequest>, row: &Value) {
    let Some(id) = row.get("id").and_then(Value::as_str) else {
        return;
    };
    if id.is_empty() {
        return;
    }
    let _ = requests.send(TimerRequest::SegmentHistory {
        segment: SegmentId::from(id),
    });
}

fn room_times_columns(requests: &UnboundedSender<TimerRequest>) -> Vec<Column> {
    let sender = requests.clone();
    vec![
        Column::new("Room", |row| row.get("room_name").cloned())
            .class_fn(|row| link_class(row, "room_name"))
            .on_activate(move |row| request_room_history(&sender, row)),
        Column::new("#", |row| row.get("attempts").cloned()).class("numeric"),
        Column::new("Type", |row| row.get("type").cloned()).class("time-type"),
        Column::new("Time", |row| text(format(frame_field(row, "time"))))
            .class("time")
            .class_fn(time_tier_class),
        Column::new("Avg", |row| text(format(frame_field(row, "avg_time")))).class("time"),
        Column::new("Median", |row| text(format(frame_field(row, "median_time")))).class("time"),
        Column::new("Best", |row| text(format(frame_field(row, "best_time")))).class("time"),
    ]
}

fn segment_times_columns(requests: &UnboundedSender<TimerRequest>) -> Vec<Column> {
    let sender = requests.clone();
    vec![
        Column::new("Room", |row| row.get("room_name").cloned())
            .class_fn(|row| link_class(row, "room_name"))
            .on_activate(move |row| request_room_history(&sender, row)),
        Column::new("#", |row| row.get("attempts").cloned()).class("numeric"),
        Column::new("Time", |row| text(format(frame_field(row, "time"))))
            .class("time")
            .class_fn(time_tier_class),
        Column::new("±Median", |row| {
            text(format_delta(
                frame_field(row, "time"),
                frame_field(row, "median_time"),
            ))
        })
        .class("time"),
        Column::new("±Best", |row| {
            text(format_delta(
                frame_field(row, "time"),
                frame_field(row, "best_time"),
            ))
        })
        .class("time"),
    ]
}

fn segment_stats_columns(requests: &UnboundedSender<TimerRequest>) -> Vec<Column> {
    let sender = requests.clone();
    vec![
        Column::new("Segment", |row| row.get("brief_name").cloned())
            .class_fn(|row| link_class(row, "brief_name"))
            .on_activate(move |row| request_segment_history(&sender, row)),
        Column::new("#", |row| row.get("success_count").cloned()).class("numeric"),
        Column::new("%", |row| {
            format_percent(row.get("success_rate").and_then(Value::as_f64)).map(Value::String)
        })
        .class("numeric"),
        Column::new("Median", |row| text(format(frame_field(row, "median_time"))))
            .class("time")
            .class_fn(median_trend_class),
        Column::new("±Best", |row| {
            text(format_delta(
                frame_field(row, "median_time"),
                frame_field(row, "best_time"),
            ))
        })
        .class("time")
        .class_fn(best_trend_class),
        Column::new("±SOB", |row| {
            text(format_delta(
                frame_field(row, "median_time"),
                frame_field(row, "sum_of_best_times"),
            ))
        })
        .class("time")
        .class_fn(sob_trend_class),
    ]
}

/// Totals footer variant: the delta columns render the delta on one
/// line and the absolute total on the next.
fn segment_stats_footer_columns() -> Vec<Column> {
    vec![
        Column::new("Segment", |row| row.get("brief_name").cloned()),
        Column::new("#", |_| None),
        Column::new("%", |_| None),
        Column::new("Median", |row| text(format(frame_field(row, "median_time"))))
            .class("time")
            .class_fn(median_trend_class),
        Column::new("±Best", |row| {
            let delta = format_delta(
                frame_field(row, "median_time"),
                frame_field(row, "best_time"),
            );
            let absolute = format(frame_field(row, "best_time"));
            text(format!("{delta}\n{absolute}"))
        })
        .class("time")
        .class_fn(best_trend_class),
        Column::new("±SOB", |row| {
            let delta = format_delta(
                frame_field(row, "median_time"),
                frame_field(row, "sum_of_best_times"),
            );
            let absolute = format(frame_field(row, "sum_of_best_times"));
            text(format!("{delta}\n{absolute}"))
        })
        .class("time")
        .class_fn(sob_trend_class),
    ]
}

fn attempt_history_columns() -> Vec<Column> {
    vec![
        Column::new("Timestamp", |row| format_timestamp(row).map(Value::String)),
        Column::new("Game", |row| text(format(pointer_frames(row, "/room/game"))))
            .group("Room")
            .class("time"),
        Column::new("Real", |row| text(format(pointer_frames(row, "/room/real"))))
            .group("Room")
            .class("time"),
        Column::new("Lag", |row| text(format(pointer_frames(row, "/room/lag"))))
            .group("Room")
            .class("time"),
        Column::new("Game", |row| text(format(pointer_frames(row, "/door/game"))))
            .group("Door")
            .class("time"),
        Column::new("Real", |row| text(format(pointer_frames(row, "/door/real"))))
            .group("Door")
            .class("time"),
        Column::new("Lag", |row| text(format(pointer_frames(row, "/door/lag"))))
            .group("Door")
            .class("time"),
    ]
}

fn series_limits(series: &[f64]) -> Limits {
    if series.is_empty() {
        return Limits::new(0.0, 0.0);
    }
    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Limits::new(min, max)
}
