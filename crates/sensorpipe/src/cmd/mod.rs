use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sensorpipe_decode::{BinaryProtocolConfig, DecoderConfig, Format, MultiFormatConfig};
use sensorpipe_frame::{FrameType, DEFAULT_CHUNK_SIZE};
use sensorpipe_pipeline::DEFAULT_QUEUE_CAPACITY;

use crate::exit::{config_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod run;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a file (or stdin) and print the records.
    Decode(DecodeArgs),
    /// Run one pipeline per input file until every source ends or Ctrl-C.
    Run(RunArgs),
    /// Write synthetic binary-protocol frames to stdout.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file, or `-` for stdin.
    pub file: PathBuf,
    #[command(flatten)]
    pub decoder: DecoderArgs,
    /// Bytes per read.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Print decoder statistics after the records.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input files; each one feeds its own pipeline.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Decoder selection, shared by every pipeline.
    #[command(flatten)]
    pub decoder: DecoderArgs,
    /// Bytes per read.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Capacity of each inter-stage queue.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Idle wait before a stage re-checks for stop (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub stage_timeout: String,
    /// Bound on waiting for stage workers at shutdown (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub join_timeout: String,
}

/// How input bytes are decoded.
#[derive(Args, Debug)]
pub struct DecoderArgs {
    /// Decoder config (JSON). Default: multi-format with auto-detection.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Decode the 11-byte binary frame protocol with default ranges.
    #[arg(long, conflicts_with = "config")]
    pub binary_protocol: bool,
    /// Multi-format input format with default settings. Auto-detection
    /// treats raw file bytes as binary records.
    #[arg(long, value_enum, conflicts_with_all = ["config", "binary_protocol"])]
    pub input_format: Option<InputFormat>,
}

impl DecoderArgs {
    pub fn load(&self) -> CliResult<DecoderConfig> {
        if self.binary_protocol {
            return Ok(DecoderConfig::BinaryProtocol(BinaryProtocolConfig::default()));
        }
        if let Some(format) = self.input_format {
            return Ok(DecoderConfig::MultiFormat(MultiFormatConfig {
                format: format.into(),
                ..Default::default()
            }));
        }
        let Some(path) = self.config.as_deref() else {
            return Ok(DecoderConfig::default());
        };
        load_decoder_config(path)
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum InputFormat {
    Auto,
    Csv,
    Json,
    Binary,
}

impl From<InputFormat> for Format {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Auto => Format::Auto,
            InputFormat::Csv => Format::Csv,
            InputFormat::Json => Format::Json,
            InputFormat::Binary => Format::Binary,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SimulatedType {
    Acceleration,
    AngularVelocity,
    Orientation,
    Magnetometer,
    /// Cycle through every frame type.
    All,
}

impl SimulatedType {
    pub fn frame_type(self, index: usize) -> FrameType {
        match self {
            SimulatedType::Acceleration => FrameType::Acceleration,
            SimulatedType::AngularVelocity => FrameType::AngularVelocity,
            SimulatedType::Orientation => FrameType::Orientation,
            SimulatedType::Magnetometer => FrameType::Magnetometer,
            SimulatedType::All => FrameType::ALL[index % FrameType::ALL.len()],
        }
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of frames to write.
    #[arg(long, default_value_t = 10)]
    pub count: usize,
    /// Frame type to generate.
    #[arg(long = "type", value_enum, default_value = "all")]
    pub frame_type: SimulatedType,
    /// Break the checksum of every Nth frame.
    #[arg(long, value_name = "N")]
    pub corrupt_every: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn load_decoder_config(path: &Path) -> CliResult<DecoderConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("read config {}", path.display()), err))?;
    DecoderConfig::from_json(&text)
        .map_err(|err| config_error(&format!("invalid config {}", path.display()), err))
}

pub(crate) fn check_chunk_size(chunk_size: usize) -> CliResult<usize> {
    if chunk_size == 0 {
        return Err(CliError::new(USAGE, "chunk size must be greater than zero"));
    }
    Ok(chunk_size)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
