pub mod client;
pub mod dispatch;
pub mod membership;
