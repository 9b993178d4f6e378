use serde::Deserialize;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Logging output settings.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enable: bool,
    /// `EnvFilter` directives, e.g. `info,service_ingest=debug`. `RUST_LOG`
    /// takes precedence when set.
    pub filter: String,
    /// Adds file, line and target to every line.
    pub verbose: bool,
    pub console: bool,
    /// Rolling log file, none when absent.
    pub file: Option<LogFileConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable: true,
            filter: "info".to_string(),
            verbose: false,
            console: true,
            file: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct LogFileConfig {
    pub directory: String,
    #[serde(default = "LogFileConfig::default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl LogFileConfig {
    fn default_prefix() -> String {
        "file-ingest.log".to_string()
    }
}

#[derive(Default, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

pub fn initialize_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    if !config.enable {
        return Ok(());
    }
    let verbose = config.verbose;
    let console = config.console.then(|| {
        fmt::layer()
            .with_file(verbose)
            .with_line_number(verbose)
            .with_target(verbose)
            .with_filter(env_filter(config))
    });
    let file = config.file.as_ref().map(|file| {
        let appender = RollingFileAppender::new(file.rotation.into(), &file.directory, &file.prefix);
        fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
            .with_file(verbose)
            .with_line_number(verbose)
            .with_target(verbose)
            .with_filter(env_filter(config))
    });
    Registry::default().with(console).with(file).try_init()?;
    Ok(())
}
