//! 下行控制帧编码
//!
//! 设备固件按原样读取这些文本，不追加分隔符。

use crate::constants::{OVERRIDE_START_CODE, OVERRIDE_STOP_CODE};

/// 发往设备的控制帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// 道路限速（km/h），设备据此限制车速
    SpeedLimit(u32),
    /// 手动接管开始（`"2"`）
    OverrideStart,
    /// 手动接管结束（`"3"`）
    OverrideStop,
    /// 任意文本
    Text(String),
}

impl ControlFrame {
    /// 编码为线路字节
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            ControlFrame::SpeedLimit(limit) => limit.to_string().into_bytes(),
            ControlFrame::OverrideStart => OVERRIDE_START_CODE.as_bytes().to_vec(),
            ControlFrame::OverrideStop => OVERRIDE_STOP_CODE.as_bytes().to_vec(),
            ControlFrame::Text(text) => text.as_bytes().to_vec(),
        }
    }
}
