//! 驱动层错误类型定义

use saferide_link::LinkError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路层错误（设备未找到、权限、IO）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 链路未处于 `Connected` 状态
    #[error("Not connected")]
    NotConnected,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 配置无效或无法加载
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 后台线程无法启动
    #[error("Worker thread error: {0}")]
    Worker(String),
}
