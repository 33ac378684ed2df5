//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use saferide_sdk::prelude::*;
//! ```

// 驱动层
pub use crate::driver::{
    AlertStatus, CrashAlertSink, CrashOutcome, DispatchOutcome, Link, LinkBuilder, LinkConfig,
    LinkState, LocationProvider, TelemetryState,
};

// 链路层
pub use crate::link::{Channel, ChannelProvider, ChannelReader, DeviceInfo};
#[cfg(feature = "tcp")]
pub use crate::link::TcpChannelProvider;

// 风险层
pub use crate::risk::{GeoPoint, RiskContext, RiskLevel, RiskOutput, RoadType, Weather};

// 错误类型
pub use crate::driver::DriverError;
pub use crate::link::LinkError;
pub use crate::protocol::ProtocolError;
