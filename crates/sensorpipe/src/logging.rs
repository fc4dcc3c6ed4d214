use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives that replace `--log-level`.
pub const LOG_ENV: &str = "SENSORPIPE_LOG";

/// Workspace crates whose events follow `--log-level`.
const WORKSPACE_TARGETS: [&str; 4] = [
    "sensorpipe",
    "sensorpipe_frame",
    "sensorpipe_decode",
    "sensorpipe_pipeline",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives for `level`: workspace crates log at `level`,
/// dependencies at `warn` at most.
pub fn directives(level: LogLevel) -> String {
    let dependencies = match level {
        LogLevel::Error => "error",
        _ => "warn",
    };
    let mut out = dependencies.to_string();
    for target in WORKSPACE_TARGETS {
        out.push(',');
        out.push_str(target);
        out.push('=');
        out.push_str(level.as_str());
    }
    out
}

/// Logs go to stderr so stdout stays clean for records.
///
/// A valid `SENSORPIPE_LOG` wins over `level`, e.g.
/// `SENSORPIPE_LOG=sensorpipe_decode=trace,sensorpipe_pipeline=debug`.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(directives(level)));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
