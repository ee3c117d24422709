// Raft configuration
// Provides configuration settings for the Raft consensus implementation

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Raft consensus protocol
#[derive(Clone, Debug)]
pub struct RaftConfig {
    /// Minimum election timeout in milliseconds; the maximum is twice this
    pub election_timeout_ms: u64,

    /// Leader heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,

    /// Timeout for a single raft RPC to a peer
    pub rpc_request_timeout_ms: u64,

    /// Maximum entries per append request
    pub max_payload_entries: u64,

    /// Data directory for Raft storage
    pub data_dir: PathBuf,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: 1500,
            heartbeat_interval_ms: 500,
            rpc_request_timeout_ms: 2000,
            max_payload_entries: 300,
            data_dir: PathBuf::from("./data/raft"),
        }
    }
}

impl RaftConfig {
    /// Config rooted under a node's data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_request_timeout_ms)
    }

    /// Get the log store directory
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// Convert to openraft Config.
    ///
    /// Snapshots stay off: the applied state lives in the SQL database, which is
    /// rebuilt from the full log on every start.
    pub fn to_openraft_config(&self) -> Result<openraft::Config, openraft::ConfigError> {
        let config = openraft::Config {
            cluster_name: "sqlcluster".to_string(),
            election_timeout_min: self.election_timeout_ms,
            election_timeout_max: self.election_timeout_ms * 2,
            heartbeat_interval: self.heartbeat_interval_ms,
            snapshot_policy: openraft::SnapshotPolicy::Never,
            max_payload_entries: self.max_payload_entries,
            ..Default::default()
        };
        config.validate()
    }
}
