//! # SafeRide Protocol
//!
//! 车载传感器串口链路的文本协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（分隔符、前缀、控制码）
//! - `decoder`: 字节流分帧（按换行切分为文本消息）
//! - `command`: 消息分类（崩溃触发、速度上报、旧版数字速度、未识别）
//! - `control`: 发往设备的控制帧编码
//!
//! ## 线路格式
//!
//! 链路上只有纯文本，每条消息以 `\n` 或 `\r` 结尾。
//! 没有长度前缀，也没有二进制字段。

pub mod command;
pub mod constants;
pub mod control;
pub mod decoder;

pub use command::{Command, CommandKind, classify};
pub use constants::*;
pub use control::ControlFrame;
pub use decoder::{LineDecoder, MessageBatch};

use thiserror::Error;

/// 协议解析错误类型
///
/// 分类器本身是全函数（见 [`classify`]），不会返回错误；
/// 这些错误只在调用方需要知道“为什么没识别”时使用。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed command {text:?}: {reason}")]
    MalformedCommand { text: String, reason: String },

    #[error("Speed value {value} out of range (max {max})")]
    SpeedOutOfRange { value: u64, max: u32 },
}
