//! # SafeRide Link Layer
//!
//! 点对点字节通道的硬件抽象层。上层（驱动层）只依赖这里的 trait，
//! 不关心底层是蓝牙 RFCOMM、串口桥接还是测试用的内存通道。
//!
//! # 在架构中的位置
//!
//! ```text
//! Driver Layer (saferide-driver)
//!     ↓ ChannelProvider::discover / open
//! Channel (此 crate 的 trait)
//!     ↓ TcpChannelProvider / MockChannelProvider
//! Device
//! ```

use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tcp")]
pub use tcp::{TcpChannel, TcpChannelProvider, TcpReader};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{
    MockChannel, MockChannelProvider, MockDevice, MockEvent, MockFailure, MockReader,
};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Channel closed")]
    Closed,
}

impl LinkError {
    /// 按 `io::ErrorKind` 把权限类错误单独归类
    pub fn from_io(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => LinkError::PermissionDenied(e.to_string()),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => LinkError::Timeout,
            _ => LinkError::Io(e),
        }
    }
}

/// 已配对设备的描述
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// 设备广播名（如 `"ESP32_BT"`）
    pub name: String,
    /// 后端相关的地址（MAC、`host:port` 等）
    pub address: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// 通道提供者：负责设备发现和打开通道
pub trait ChannelProvider: Send {
    type Channel: Channel + Send + 'static;

    /// 列出已配对（bonded）的设备
    fn bonded_devices(&mut self) -> Result<Vec<DeviceInfo>, LinkError>;

    /// 按名称在已配对设备中查找（精确匹配）
    ///
    /// 找不到返回 `Ok(None)`；枚举本身失败（如权限不足）返回 `Err`。
    fn discover(&mut self, name_filter: &str) -> Result<Option<DeviceInfo>, LinkError> {
        Ok(self
            .bonded_devices()?
            .into_iter()
            .find(|device| device.name == name_filter))
    }

    /// 打开到设备的通道
    fn open(&mut self, device: &DeviceInfo) -> Result<Self::Channel, LinkError>;
}

/// 已打开的通道（写端 + 生命周期）
///
/// 读端通过 [`Channel::reader`] 分离出来交给后台读线程，
/// 写端和 `close()` 留在调用方，两者可以并发使用。
pub trait Channel {
    type Reader: ChannelReader + Send + 'static;

    /// 分离出读端
    ///
    /// # 参数
    /// - `read_timeout`: 单次 `read()` 的最长阻塞时间，决定读线程响应停止信号的粒度
    fn reader(&mut self, read_timeout: Duration) -> Result<Self::Reader, LinkError>;

    /// 写入字节（阻塞直到底层写完成）
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// 关闭通道，重复调用是安全的
    fn close(&mut self) -> Result<(), LinkError>;
}

/// 通道读端
pub trait ChannelReader {
    /// 读取数据到 `buf`
    ///
    /// # 返回
    /// - `Ok(n)`, `n > 0`: 读到 n 字节
    /// - `Ok(0)`: 对端关闭
    /// - `Err(LinkError::Timeout)`: 超时内没有数据（正常情况）
    /// - 其他 `Err`: IO 故障
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;
}
