// Configuration keys and defaults
// Keys avoid underscores so SQLCLUSTER_* environment variables map onto them one to one

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const ENV_PREFIX: &str = "SQLCLUSTER";

pub const NODE_DIRECTORY: &str = "sqlcluster.node.directory";
pub const NODE_LISTEN: &str = "sqlcluster.node.listen";
pub const NODE_ADVERTISE: &str = "sqlcluster.node.advertise";

pub const SQL_ENGINE: &str = "sqlcluster.sql.engine";

pub const CLUSTER_JOIN: &str = "sqlcluster.cluster.join";
pub const CLUSTER_RETRY_MS: &str = "sqlcluster.cluster.retry";
pub const CLUSTER_ATTEMPTS: &str = "sqlcluster.cluster.attempts";
pub const CLUSTER_TIMEOUT_MS: &str = "sqlcluster.cluster.timeout";

pub const FORWARD_ATTEMPTS: &str = "sqlcluster.forward.attempts";
pub const FORWARD_TIMEOUT_MS: &str = "sqlcluster.forward.timeout";
pub const SUBMIT_TIMEOUT_MS: &str = "sqlcluster.submit.timeout";

pub const RAFT_ELECTION_MS: &str = "sqlcluster.raft.election";
pub const RAFT_HEARTBEAT_MS: &str = "sqlcluster.raft.heartbeat";
pub const RAFT_RPC_MS: &str = "sqlcluster.raft.rpc";

pub const LOG_DIR: &str = "sqlcluster.log.dir";
pub const LOG_LEVEL: &str = "sqlcluster.log.level";
pub const LOG_CONSOLE: &str = "sqlcluster.log.console";
pub const LOG_FILE: &str = "sqlcluster.log.file";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:4001";

pub const DEFAULT_FORWARD_ATTEMPTS: u64 = 5;
pub const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_JOIN_RETRY_MS: u64 = 1_000;
/// Zero retries forever.
pub const DEFAULT_MAX_JOIN_ATTEMPTS: u32 = 0;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 30_000;

pub const SQL_FILE: &str = "storage.sql";
pub const RAFT_DIR: &str = "raft";
pub const LOG_SUBDIR: &str = "logs";
