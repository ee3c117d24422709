// Deterministic SQL execution
// One executor per node serializes every committed query into the local engine

pub mod embedded;
pub mod engine;
pub mod executor;
pub mod process;

pub use embedded::EmbeddedEngine;
pub use engine::{EngineKind, EngineOutput, ExitStatus, SqlEngine, ensure_absent, open_engine};
pub use executor::{ExecutionResult, ExecutorError, SqlExecutor};
pub use process::ProcessEngine;
