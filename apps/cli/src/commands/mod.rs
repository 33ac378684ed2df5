//! 子命令实现

pub mod config;
pub mod connection;
pub mod monitor;
pub mod risk;
pub mod send;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
pub use risk::RiskCommand;
pub use send::SendCommand;
