use std::io::IsTerminal;

use bulkstream_pipeline::SessionSummary;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    capture: &'a str,
    #[serde(flatten)]
    summary: &'a SessionSummary,
}

pub fn print_summary(summary: &SessionSummary, capture: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput { capture, summary };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["capture".to_string(), capture.to_string()]);
            for (field, value) in summary_rows(summary) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("capture={capture}");
            for (field, value) in summary_rows(summary) {
                println!("{field}={value}");
            }
        }
    }
}

fn summary_rows(s: &SessionSummary) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("stop_reason", s.stop_reason.as_str().to_string()),
        ("elapsed", format!("{:.3}s", s.elapsed_secs)),
        (
            "queue",
            format!("{} x {} bytes", s.queue_depth, s.transfer_size),
        ),
        ("retired_slots", s.retired_slots.to_string()),
        (
            "transfers",
            format!(
                "{} ({} bytes, avg {:.1}, min {}, max {}, len_mismatch {})",
                s.transfers.count,
                s.transfers.bytes,
                s.transfers.average_len(),
                s.transfers.min_len.unwrap_or(0),
                s.transfers.max_len,
                s.transfers.length_mismatch
            ),
        ),
        (
            "frames",
            format!("{} ({} test)", s.frames, s.test_frames),
        ),
        ("pairs", s.pairs.to_string()),
        ("payload_bytes", s.payload_bytes.to_string()),
        ("status_records", s.status_records.to_string()),
        (
            "rejections",
            format!(
                "too_short {} bad_magic {} overflow {} crc {}",
                s.rejections.too_short,
                s.rejections.bad_magic,
                s.rejections.payload_overflow,
                s.rejections.crc_mismatch
            ),
        ),
        (
            "sequence",
            format!(
                "missing {} in {} gaps, dup_seq {}, dup_channel {}, back {}",
                s.sequence.missing,
                s.sequence.gap_events,
                s.sequence.sequence_duplicates,
                s.sequence.channel_duplicates,
                s.sequence.backward_jumps
            ),
        ),
        (
            "baseline",
            match (s.baseline.frame_len, s.baseline.sample_count) {
                (Some(len), Some(samples)) => format!(
                    "{len} bytes, {samples} samples, drift {}",
                    s.baseline.drift
                ),
                _ => "none".to_string(),
            },
        ),
        ("histogram", histogram_text(s)),
    ];

    if let Some(report) = &s.self_test {
        let mut value = report.verdict.to_string();
        if let Some(reason) = report.reason {
            value.push_str(&format!(" ({reason})"));
        }
        if let Some(pair) = report.captured {
            value.push_str(&format!(" seq {} samples {}", pair.sequence, pair.samples));
        }
        rows.push(("self_test", value));
    }

    if let Some(status) = &s.last_status {
        rows.push((
            "last_status",
            format!(
                "{} v{} seq {} samples {} sent {}/{}{}",
                status.signature,
                status.version,
                status.produced_sequence,
                status.current_samples,
                status.sent[0],
                status.sent[1],
                if status.truncated { " (truncated)" } else { "" }
            ),
        ));
    }

    rows.push((
        "drain",
        format!(
            "cancelled {}/{} completed {} failed {} leaked {}",
            s.drain.cancelled, s.drain.requested, s.drain.completed, s.drain.failed, s.drain.leaked
        ),
    ));
    for ring in &s.rings {
        rows.push((
            ring.channel,
            format!(
                "{} buffered ({} bytes), {} dropped",
                ring.count, ring.buffered_bytes, ring.drops
            ),
        ));
    }
    rows
}

fn histogram_text(s: &SessionSummary) -> String {
    if s.histogram.is_empty() {
        return "empty".to_string();
    }
    let mut text = s
        .histogram
        .iter()
        .map(|entry| format!("{}:{}", entry.samples, entry.frames))
        .collect::<Vec<_>>()
        .join(" ");
    if s.histogram_overflow > 0 {
        text.push_str(&format!(" overflow:{}", s.histogram_overflow));
    }
    text
}
