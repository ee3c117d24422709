//! Console and file logging.
//!
//! | Log File          | Component                   | Target Prefixes        |
//! |-------------------|-----------------------------|------------------------|
//! | sqlcluster.log    | Root logger (all events)    | (all)                  |
//! | protocol-raft.log | Replicated log and executor | sqlcluster_consistency |
//!
//! `RUST_LOG` overrides the configured level for the console and root file.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const ROOT_LOG_FILE: &str = "sqlcluster.log";

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[ComponentLogDef {
    file_name: "protocol-raft.log",
    targets: &["sqlcluster_consistency", "openraft"],
}];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub file_logging: bool,
    pub level: Level,
    pub rotation: Rotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./data/logs"),
            console_output: true,
            file_logging: false,
            level: Level::INFO,
            rotation: Rotation::DAILY,
        }
    }
}

impl LoggingConfig {
    pub fn from_config(
        log_dir: PathBuf,
        console_output: bool,
        file_logging: bool,
        level: String,
    ) -> Self {
        Self {
            log_dir,
            console_output,
            file_logging,
            level: level.parse().unwrap_or(Level::INFO),
            rotation: Rotation::DAILY,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }
}

/// Keeps the non-blocking file writers alive; buffered output is flushed on drop.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(config.env_filter());
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;

        let root_appender =
            RollingFileAppender::new(config.rotation.clone(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);
        layers.push(Box::new(
            fmt::layer()
                .with_writer(root_nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(config.env_filter()),
        ));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.clone(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let level: LevelFilter = config.level.into();
            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, level);
            }

            layers.push(Box::new(
                fmt::layer()
                    .with_writer(nb)
                    .with_target(true)
                    .with_ansi(false)
                    .with_filter(targets),
            ));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            "File logging initialized: {} + {} component log files",
            ROOT_LOG_FILE,
            COMPONENT_LOGS.len()
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
