pub mod common;
pub mod config;
pub mod constants;
