//! # SafeRide Driver
//!
//! 链路状态机、后台读线程和命令分发。
//!
//! ## 线程模型
//!
//! ```text
//! saferide-rx (每个连接一个)       saferide-dispatch (Link 生命周期)
//!   ChannelReader::read              Receiver<String>
//!   → LineDecoder::decode    ──►     → Dispatcher::dispatch
//!   → Sender<String>                 → TelemetryState / RiskOutput (ArcSwap)
//! ```
//!
//! 手动接管期间另有一个 `saferide-keepalive` 线程定时重发接管码。
//!
//! ## 模块
//!
//! - `link`: 对外 API（[`Link`]）
//! - `builder`: [`LinkBuilder`]
//! - `config`: [`LinkConfig`]（TOML）
//! - `state`: 链路状态、遥测状态和共享上下文
//! - `dispatcher`: 消息分类后的处理
//! - `pipeline`: 后台循环
//! - `collaborators`: 位置、告警、时钟等宿主能力的 trait

mod builder;
pub mod collaborators;
pub mod config;
pub mod debounce;
pub mod dispatcher;
mod error;
mod link;
pub mod metrics;
pub mod pipeline;
pub mod state;
mod worker;

pub use builder::LinkBuilder;
pub use collaborators::{
    AlertStatus, Clock, CrashAlertSink, FixedClock, FixedLocation, LocationProvider, LogAlertSink,
    NoLocation, SystemClock,
};
pub use config::{DEFAULT_DEVICE_NAME, DEFAULT_LOCATION, LinkConfig};
pub use debounce::DebounceWindow;
pub use dispatcher::{CrashOutcome, DispatchOutcome, Dispatcher};
pub use error::DriverError;
pub use link::Link;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use state::{LinkContext, LinkState, SafetyFlags, TelemetryState};
