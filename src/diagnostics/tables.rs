//! Table rendering for the diagnostics console

use crate::audio::api::{GapStats, PlaybackState};
use crate::core::styles::StyleRole;
use crate::queue::api::{HealthStatus, ManagerStatus};
use prettytable::{format, Cell, Row, Table};

fn styled(text: impl Into<String>, role: StyleRole, color: bool) -> Cell {
    let cell = Cell::new(&text.into());
    match role.to_prettytable_spec() {
        Some(spec) if color => cell.style_spec(&spec),
        _ => cell,
    }
}

fn header(titles: &[&str], color: bool) -> Row {
    Row::new(
        titles
            .iter()
            .map(|title| styled(*title, StyleRole::Header, color))
            .collect(),
    )
}

fn key_value_table(title: &str, rows: Vec<(&str, String)>, color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(header(&[title, ""], color));
    for (key, value) in rows {
        table.add_row(Row::new(vec![
            styled(key, StyleRole::Key, color),
            Cell::new(&value),
        ]));
    }
    table
}

fn health_cell(health: HealthStatus, color: bool) -> Cell {
    styled(health.to_string(), StyleRole::for_health(health), color)
}

/// Sent/received counters and offline-buffer activity
pub fn transmission_table(status: &ManagerStatus, color: bool) -> Table {
    let stats = &status.transmission;
    key_value_table(
        "Transmission",
        vec![
            ("messages sent", stats.sent_messages.to_string()),
            ("batches sent", stats.sent_batches.to_string()),
            ("direct sends", stats.direct_sends.to_string()),
            ("send errors", stats.send_errors.to_string()),
            ("received", stats.received.to_string()),
            ("rejected", stats.rejected.to_string()),
            (
                "offline buffered",
                format!(
                    "{} ({} now, {} evicted)",
                    stats.offline_buffered, status.offline_buffered, status.offline_evicted
                ),
            ),
            ("offline replayed", stats.offline_replayed.to_string()),
            (
                "connection",
                format!(
                    "{} / {}",
                    if status.connection.connected { "online" } else { "offline" },
                    status.connection.quality
                ),
            ),
        ],
        color,
    )
}

/// One row per queue with depth, counters and health
pub fn queue_health_table(status: &ManagerStatus, color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(header(
        &[
            "Queue", "Depth", "Peak", "Queued", "Processed", "Dropped", "Timed out", "Drop %",
            "Latency ms", "Health",
        ],
        color,
    ));

    let outbound = status.outbound.iter().map(|q| (format!("{}/{}", q.depth, q.max_size), &q.metrics));
    let inbound = status.inbound.iter().map(|q| (q.buffered.to_string(), &q.metrics));
    for (depth, metrics) in outbound.chain(inbound) {
        table.add_row(Row::new(vec![
            styled(metrics.name.as_str(), StyleRole::Key, color),
            Cell::new(&depth),
            Cell::new(&metrics.peak_depth.to_string()),
            Cell::new(&metrics.queued.to_string()),
            Cell::new(&metrics.processed.to_string()),
            Cell::new(&metrics.dropped.to_string()),
            Cell::new(&metrics.timed_out.to_string()),
            Cell::new(&format!("{:.1}", metrics.drop_rate * 100.0)),
            Cell::new(&format!("{:.1}", metrics.average_latency_ms)),
            health_cell(metrics.health, color),
        ]));
    }

    table.add_row(Row::new(vec![
        styled("overall", StyleRole::Header, color),
        Cell::new(""),
        Cell::new(""),
        Cell::new(&status.metrics.total_queued.to_string()),
        Cell::new(&status.metrics.total_processed.to_string()),
        Cell::new(&status.metrics.total_dropped.to_string()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        health_cell(status.health, color),
    ]));
    table
}

/// Arrival gaps, underruns and the adaptive threshold
pub fn audio_gap_table(stats: &GapStats, state: PlaybackState, volume: f32, color: bool) -> Table {
    key_value_table(
        "Audio",
        vec![
            ("playback", state.to_string()),
            ("frames", stats.frames.to_string()),
            ("gaps over floor", stats.gap_count.to_string()),
            ("max gap", format!("{:.1} ms", stats.max_gap_ms)),
            ("average gap", format!("{:.1} ms", stats.average_gap_ms)),
            ("underruns", stats.underruns.to_string()),
            ("ring overflows", stats.overflows.to_string()),
            ("threshold", format!("{:.0} ms", stats.threshold_ms)),
            ("volume", format!("{:.0}%", volume * 100.0)),
        ],
        color,
    )
}
