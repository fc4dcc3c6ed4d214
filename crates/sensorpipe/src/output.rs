use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sensorpipe_decode::{Axes, DecoderStats, StructuredRecord};
use sensorpipe_pipeline::PipelineStatus;
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
struct RecordOutput<'a> {
    source: &'a str,
    #[serde(flatten)]
    record: &'a StructuredRecord,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    source: &'a str,
    decoder: &'a str,
    stats: &'a DecoderStats,
}

#[derive(Serialize)]
struct StageOutput<'a> {
    stage: &'static str,
    handler: Option<&'a str>,
    items_in: u64,
    items_out: u64,
    recoverable_errors: u64,
    last_error: Option<&'a str>,
    fatal: Option<&'a str>,
}

#[derive(Serialize)]
struct QueueOutput {
    from: &'static str,
    to: &'static str,
    depth: usize,
    capacity: usize,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    pipeline: &'a str,
    state: &'static str,
    paused: bool,
    stages: Vec<StageOutput<'a>>,
    queues: Vec<QueueOutput>,
    decoder: &'a DecoderStats,
}

pub fn print_records(records: &[StructuredRecord], source: &str, format: OutputFormat) {
    if records.is_empty() {
        return;
    }
    match format {
        OutputFormat::Json => {
            let mut out = std::io::stdout().lock();
            for record in records {
                let line = serde_json::to_string(&RecordOutput { source, record })
                    .unwrap_or_else(|_| "{}".to_string());
                let _ = writeln!(out, "{line}");
            }
            let _ = out.flush();
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "SOURCE",
                    "TIMESTAMP",
                    "ROLL/PITCH/YAW",
                    "ACCEL",
                    "GYRO",
                    "MAG",
                    "EXTRA",
                ]);
            for record in records {
                table.add_row(vec![
                    source.to_string(),
                    opt(record.timestamp),
                    triple(
                        record.orientation.roll,
                        record.orientation.pitch,
                        record.orientation.yaw,
                    ),
                    axes(&record.acceleration),
                    axes(&record.angular_velocity),
                    axes(&record.magnetometer),
                    extras(record),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut out = std::io::stdout().lock();
            for record in records {
                let _ = writeln!(
                    out,
                    "source={} ts={} rpy={} acc={} gyro={} mag={} extra={}",
                    source,
                    opt(record.timestamp),
                    triple(
                        record.orientation.roll,
                        record.orientation.pitch,
                        record.orientation.yaw,
                    ),
                    axes(&record.acceleration),
                    axes(&record.angular_velocity),
                    axes(&record.magnetometer),
                    extras(record),
                );
            }
            let _ = out.flush();
        }
    }
}

pub fn print_stats(stats: &DecoderStats, source: &str, decoder: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                source,
                decoder,
                stats,
            };
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
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in counters(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
            for err in &stats.recent_errors {
                println!("  error: {err}");
            }
        }
        OutputFormat::Pretty => {
            let line = counters(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("source={source} decoder={decoder} {line}");
        }
    }
}

pub fn print_statuses(statuses: &[PipelineStatus], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for status in statuses {
                println!(
                    "{}",
                    serde_json::to_string(&status_output(status))
                        .unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "PIPELINE", "STATE", "STAGE", "IN", "OUT", "ERRORS", "LAST ERROR",
                ]);
            for status in statuses {
                for stage in &status.stages {
                    let last = stage
                        .fatal
                        .as_deref()
                        .map(|msg| format!("fatal: {msg}"))
                        .or_else(|| stage.last_error.clone())
                        .unwrap_or_default();
                    table.add_row(vec![
                        status.id.clone(),
                        status.state.to_string(),
                        stage.stage.to_string(),
                        stage.items_in.to_string(),
                        stage.items_out.to_string(),
                        stage.recoverable_errors.to_string(),
                        last,
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for status in statuses {
                println!(
                    "pipeline={} state={} records={} decode_errors={} stage_errors={}",
                    status.id,
                    status.state,
                    status.decoder.records_decoded,
                    status.decoder.decode_errors,
                    status.total_recoverable_errors()
                );
                if let Some((stage, msg)) = status.fatal() {
                    println!("  fatal in {stage}: {msg}");
                }
            }
        }
    }
}

fn status_output(status: &PipelineStatus) -> StatusOutput<'_> {
    StatusOutput {
        pipeline: &status.id,
        state: status.state.name(),
        paused: status.paused,
        stages: status
            .stages
            .iter()
            .map(|s| StageOutput {
                stage: s.stage.name(),
                handler: s.handler.as_deref(),
                items_in: s.items_in,
                items_out: s.items_out,
                recoverable_errors: s.recoverable_errors,
                last_error: s.last_error.as_deref(),
                fatal: s.fatal.as_deref(),
            })
            .collect(),
        queues: status
            .queues
            .iter()
            .map(|q| QueueOutput {
                from: q.from.name(),
                to: q.to.name(),
                depth: q.depth,
                capacity: q.capacity,
            })
            .collect(),
        decoder: &status.decoder,
    }
}

fn counters(stats: &DecoderStats) -> [(&'static str, u64); 8] {
    [
        ("chunks_received", stats.chunks_received),
        ("bytes_received", stats.bytes_received),
        ("records_decoded", stats.records_decoded),
        ("decode_errors", stats.decode_errors),
        ("resync_events", stats.resync_events),
        ("checksum_failures", stats.checksum_failures),
        ("bytes_discarded", stats.bytes_discarded),
        ("buffer_overflows", stats.buffer_overflows),
    ]
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn triple(a: Option<f64>, b: Option<f64>, c: Option<f64>) -> String {
    if a.is_none() && b.is_none() && c.is_none() {
        return "-".to_string();
    }
    format!("{},{},{}", opt(a), opt(b), opt(c))
}

fn axes(axes: &Axes) -> String {
    triple(axes.x, axes.y, axes.z)
}

fn extras(record: &StructuredRecord) -> String {
    if record.additional_values.is_empty() {
        return "-".to_string();
    }
    record
        .additional_values
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}
