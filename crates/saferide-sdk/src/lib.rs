//! SafeRide SDK
//!
//! 车载传感器遥测链路 + 事故风险评分。
//!
//! # 架构设计
//!
//! 分层结构，从底层到高层：
//!
//! - **链路层** (`link`): 点对点字节通道抽象，TCP 桥接和 Mock 后端
//! - **协议层** (`protocol`): 按行分帧、命令分类、下行控制帧
//! - **风险层** (`risk`): 确定性的风险评分（纯函数）
//! - **驱动层** (`driver`): 连接状态机、读线程、命令分发、共享状态
//!
//! # 快速开始
//!
//! ```rust
//! use saferide_sdk::prelude::*;
//! ```
//!
//! 只需要离线评分时可以直接使用风险层：
//!
//! ```rust
//! use saferide_sdk::risk::{GeoPoint, RiskInput, RoadType, Weather, predict_risk};
//!
//! let risk = predict_risk(&RiskInput {
//!     speed_kmh: 60,
//!     speed_limit_kmh: Some(50),
//!     location: GeoPoint::new(12.9716, 77.5946),
//!     weather: Weather::Clear,
//!     road_type: RoadType::Highway,
//!     hour: 8,
//! });
//! assert!(risk.percentage > 80.0);
//! ```

pub mod logging;
pub mod prelude;

/// 链路层
pub mod link {
    pub use saferide_link::*;
}

/// 协议层
pub mod protocol {
    pub use saferide_protocol::*;
}

/// 风险层
pub mod risk {
    pub use saferide_risk::*;
}

/// 驱动层
pub mod driver {
    pub use saferide_driver::*;
}

// --- 用户以此为界 ---

pub use driver::{DriverError, Link, LinkBuilder, LinkConfig, LinkState, TelemetryState};
pub use link::LinkError;
pub use logging::{LoggingError, init_logging, try_init_logging};
pub use protocol::ProtocolError;
pub use risk::{RiskOutput, predict_risk};
