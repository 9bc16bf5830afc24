//! splitdeck binary: connects to the timing instrument, keeps an
//! in-memory dashboard session synchronized with its event stream, and
//! logs the interesting lines as they land.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use splitdeck_client::{run_timer_client, DashboardSession, TimerClientConfig, TimerEventHandler};
use splitdeck_core::{NewRoomTime, RoomHistory, SegmentHistory, SegmentStatsBatch, ServerLog};
use splitdeck_view::TreeRenderer;

#[derive(Debug, Parser)]
#[command(
    name = "splitdeck",
    about = "Live dashboard client for a room/segment timing instrument",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "SPLITDECK_HOST",
        default_value = "localhost",
        help = "Host the timing instrument's websocket server listens on"
    )]
    host: String,

    #[arg(
        long,
        env = "SPLITDECK_PORT",
        default_value_t = 15000,
        help = "Port of the timing instrument's websocket server"
    )]
    port: u16,

    #[arg(
        long = "reconnect-delay-ms",
        default_value_t = 10_000,
        help = "Fixed delay between reconnect attempts, in milliseconds"
    )]
    reconnect_delay_ms: u64,
}

/// Delegates every event to the dashboard session, then echoes the
/// freshly rendered lines to the log so the terminal shows the same
/// thing a visual surface would.
struct LoggingDashboard {
    session: DashboardSession<TreeRenderer>,
}

impl LoggingDashboard {
    fn new(session: DashboardSession<TreeRenderer>) -> Self {
        Self { session }
    }

    fn log_latest_room_row(&self) {
        let table = self.session.room_times();
        let ids = table.row_ids();
        if ids.is_empty() {
            return;
        }
        // The five clock rows of an attempt share one leading row that
        // names the room; log from there.
        let first_of_attempt = ids[ids.len().saturating_sub(5)];
        if let Some(node) = table.row_node(first_of_attempt) {
            info!("{}", self.session.renderer().text_content(node));
        }
    }

    fn log_segment_totals(&self) {
        if let Some(footer) = self.session.segment_stats().footer_node() {
            info!("{}", self.session.renderer().text_content(footer));
        }
    }
}

impl TimerEventHandler for LoggingDashboard {
    fn on_new_room_time(&mut self, event: NewRoomTime) {
        self.session.on_new_room_time(event);
        self.log_latest_room_row();
    }

    fn on_new_segment(&mut self, marker: Value) {
        self.session.on_new_segment(marker);
    }

    fn on_segment_stats(&mut self, batch: SegmentStatsBatch) {
        self.session.on_segment_stats(batch);
        self.log_segment_totals();
    }

    fn on_room_history(&mut self, history: RoomHistory) {
        self.session.on_room_history(history);
        info!(
            "{}",
            self.session
                .renderer()
                .text_content(self.session.history_panel())
        );
    }

    fn on_segment_history(&mut self, history: SegmentHistory) {
        self.session.on_segment_history(history);
        info!(
            "{}",
            self.session
                .renderer()
                .text_content(self.session.history_panel())
        );
    }

    fn on_server_log(&mut self, log: ServerLog) {
        self.session.on_server_log(log);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = TimerClientConfig {
        url: format!("ws://{}:{}", cli.host, cli.port),
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms),
    };

    let (requests, inbox) = mpsc::unbounded_channel();
    let mut dashboard =
        LoggingDashboard::new(DashboardSession::new(TreeRenderer::new(), requests));
    run_timer_client(config, inbox, &mut dashboard).await
}
