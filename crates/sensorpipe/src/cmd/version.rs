use sensorpipe_decode::{BinaryProtocolConfig, MultiFormatConfig};
use sensorpipe_frame::{FRAME_LEN, SYNC_BYTE};
use sensorpipe_pipeline::{DEFAULT_JOIN_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_STAGE_TIMEOUT};
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct BuildReport {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    git_hash: &'static str,
    features: Vec<&'static str>,
    decoders: [&'static str; 2],
    formats: [&'static str; 3],
    frame_len: usize,
    sync_byte: String,
    acc_range: f64,
    gyro_range: f64,
    angle_range: f64,
    max_buffer_size: usize,
    max_error_log: usize,
    binary_record_size: usize,
    queue_capacity: usize,
    stage_timeout_ms: u64,
    join_timeout_ms: u64,
}

impl BuildReport {
    fn collect() -> Self {
        let binary = BinaryProtocolConfig::default();
        let multi = MultiFormatConfig::default();

        let mut features = vec!["cli"];
        if cfg!(feature = "pipeline") {
            features.push("pipeline");
        }

        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("SENSORPIPE_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("SENSORPIPE_BUILD_PROFILE").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            features,
            decoders: ["binary_protocol", "multi_format"],
            formats: ["csv", "json", "binary"],
            frame_len: FRAME_LEN,
            sync_byte: format!("0x{SYNC_BYTE:02X}"),
            acc_range: binary.acc_range,
            gyro_range: binary.gyro_range,
            angle_range: binary.angle_range,
            max_buffer_size: binary.limits.max_buffer_size,
            max_error_log: binary.limits.max_error_log,
            binary_record_size: multi.binary_record_size,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stage_timeout_ms: DEFAULT_STAGE_TIMEOUT.as_millis() as u64,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT.as_millis() as u64,
        }
    }

    fn lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.to_string()),
            ("version", self.version.to_string()),
            ("target", self.target.to_string()),
            ("profile", self.profile.to_string()),
            ("git_hash", self.git_hash.to_string()),
            ("features", self.features.join(", ")),
            ("decoders", self.decoders.join(", ")),
            ("formats", self.formats.join(", ")),
            ("frame", format!("{} bytes, sync {}", self.frame_len, self.sync_byte)),
            (
                "ranges",
                format!(
                    "acc=±{}g gyro=±{}°/s angle=±{}°",
                    self.acc_range, self.gyro_range, self.angle_range
                ),
            ),
            (
                "limits",
                format!(
                    "max_buffer_size={} max_error_log={}",
                    self.max_buffer_size, self.max_error_log
                ),
            ),
            (
                "pipeline",
                format!(
                    "queue_capacity={} stage_timeout={}ms join_timeout={}ms",
                    self.queue_capacity, self.stage_timeout_ms, self.join_timeout_ms
                ),
            ),
        ]
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("sensorpipe {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let report = BuildReport::collect();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            for (key, value) in report.lines() {
                println!("{key}: {value}");
            }
        }
    }
    Ok(SUCCESS)
}
