pub mod http;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use shutdown::ShutdownSignal;
