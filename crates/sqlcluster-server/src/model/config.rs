//! Configuration management for the sqlcluster server
//!
//! Sources, lowest precedence first: built-in defaults, `conf/application.yml`
//! (or the file given with `-c`), `SQLCLUSTER_*` environment variables, then
//! command line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use sqlcluster_consistency::{EngineKind, RaftConfig};

use super::constants::*;
use crate::service::dispatch::DispatchSettings;
use crate::service::membership::MembershipSettings;
use crate::startup::logging::LoggingConfig;

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(name = "sqlcluster", version, about = "Replicated SQL service")]
pub struct Cli {
    /// Data directory holding the node name, the raft log and the SQL database
    #[arg(short = 'd', long = "directory")]
    pub directory: Option<String>,
    /// Address the HTTP endpoint listens on
    #[arg(short = 'l', long = "listen")]
    pub listen: Option<String>,
    /// Address of an existing member to join through
    #[arg(short = 'j', long = "join")]
    pub join: Option<String>,
    /// Configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
    /// SQL engine: embedded or process
    #[arg(long = "engine")]
    pub engine: Option<String>,
}

/// Application configuration loaded from config files, environment and flags
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder()
            .set_default(NODE_DIRECTORY, DEFAULT_DATA_DIR)?
            .set_default(NODE_LISTEN, DEFAULT_LISTEN)?
            .set_default(SQL_ENGINE, EngineKind::default().as_str())?
            .set_default(FORWARD_ATTEMPTS, DEFAULT_FORWARD_ATTEMPTS as i64)?
            .set_default(FORWARD_TIMEOUT_MS, DEFAULT_FORWARD_TIMEOUT_MS as i64)?
            .set_default(SUBMIT_TIMEOUT_MS, DEFAULT_SUBMIT_TIMEOUT_MS as i64)?
            .set_default(CLUSTER_RETRY_MS, DEFAULT_JOIN_RETRY_MS as i64)?
            .set_default(CLUSTER_ATTEMPTS, DEFAULT_MAX_JOIN_ATTEMPTS as i64)?
            .set_default(CLUSTER_TIMEOUT_MS, DEFAULT_JOIN_TIMEOUT_MS as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .keep_prefix(true)
                    .separator("_")
                    .try_parsing(true),
            );

        if let Some(v) = args.directory {
            builder = builder.set_override(NODE_DIRECTORY, v)?;
        }
        if let Some(v) = args.listen {
            builder = builder.set_override(NODE_LISTEN, v)?;
        }
        if let Some(v) = args.join {
            builder = builder.set_override(CLUSTER_JOIN, v)?;
        }
        if let Some(v) = args.engine {
            builder = builder.set_override(SQL_ENGINE, v)?;
        }

        Ok(Configuration {
            config: builder.build()?,
        })
    }

    fn number(&self, key: &str, default: u64) -> u64 {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    fn millis(&self, key: &str, default: u64) -> Duration {
        Duration::from_millis(self.number(key, default))
    }

    // ========================================================================
    // Node
    // ========================================================================

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .get_string(NODE_DIRECTORY)
                .unwrap_or(DEFAULT_DATA_DIR.to_string()),
        )
    }

    pub fn listen_address(&self) -> String {
        self.config
            .get_string(NODE_LISTEN)
            .unwrap_or(DEFAULT_LISTEN.to_string())
    }

    /// Address other members use to reach this node. Defaults to the listen address.
    pub fn advertise_address(&self) -> String {
        self.config
            .get_string(NODE_ADVERTISE)
            .unwrap_or_else(|_| self.listen_address())
    }

    pub fn sql_path(&self) -> PathBuf {
        self.data_dir().join(SQL_FILE)
    }

    pub fn sql_engine(&self) -> Result<EngineKind, ConfigError> {
        let value = self
            .config
            .get_string(SQL_ENGINE)
            .unwrap_or(EngineKind::default().as_str().to_string());
        value.parse().map_err(ConfigError::Message)
    }

    // ========================================================================
    // Cluster
    // ========================================================================

    /// Member to join through; `None` bootstraps or recovers.
    pub fn join_target(&self) -> Option<String> {
        self.config
            .get_string(CLUSTER_JOIN)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn membership_settings(&self) -> MembershipSettings {
        MembershipSettings {
            retry_interval: self.millis(CLUSTER_RETRY_MS, DEFAULT_JOIN_RETRY_MS),
            max_attempts: u32::try_from(
                self.number(CLUSTER_ATTEMPTS, DEFAULT_MAX_JOIN_ATTEMPTS.into()),
            )
            .unwrap_or(u32::MAX),
            join_timeout: self.millis(CLUSTER_TIMEOUT_MS, DEFAULT_JOIN_TIMEOUT_MS),
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            forward_attempts: self.number(FORWARD_ATTEMPTS, DEFAULT_FORWARD_ATTEMPTS) as usize,
            forward_timeout: self.millis(FORWARD_TIMEOUT_MS, DEFAULT_FORWARD_TIMEOUT_MS),
            submit_timeout: self.millis(SUBMIT_TIMEOUT_MS, DEFAULT_SUBMIT_TIMEOUT_MS),
            join_timeout: self.millis(CLUSTER_TIMEOUT_MS, DEFAULT_JOIN_TIMEOUT_MS),
        }
    }

    // ========================================================================
    // Raft
    // ========================================================================

    pub fn raft_config(&self) -> RaftConfig {
        let defaults = RaftConfig::default();
        RaftConfig {
            election_timeout_ms: self.number(RAFT_ELECTION_MS, defaults.election_timeout_ms),
            heartbeat_interval_ms: self.number(RAFT_HEARTBEAT_MS, defaults.heartbeat_interval_ms),
            rpc_request_timeout_ms: self.number(RAFT_RPC_MS, defaults.rpc_request_timeout_ms),
            data_dir: self.data_dir().join(RAFT_DIR),
            ..defaults
        }
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        let log_dir = self
            .config
            .get_string(LOG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.data_dir().join(LOG_SUBDIR));

        LoggingConfig::from_config(
            log_dir,
            self.config.get_bool(LOG_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOG_FILE).unwrap_or(false),
            self.config
                .get_string(LOG_LEVEL)
                .unwrap_or("info".to_string()),
        )
    }
}
