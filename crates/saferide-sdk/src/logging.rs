//! 日志初始化
//!
//! 安装 `tracing_subscriber::fmt` 订阅者（过滤规则来自 `RUST_LOG`，
//! 再追加一条默认指令），并用 `tracing-log` 把 `log` crate 的记录转发进来。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// SDK 各 crate 的默认日志级别
pub const DEFAULT_DIRECTIVE: &str = "saferide=info";

/// 日志初始化错误
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive: {0}")]
    Directive(#[from] tracing_subscriber::filter::ParseError),

    #[error("Global subscriber already set: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("log bridge already set: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
}

/// 按给定默认指令初始化日志
///
/// # 参数
/// - `directive`: 追加在 `RUST_LOG` 之后的指令，例如 `"saferide=debug"`
///
/// # 错误
/// - 指令格式错误
/// - 进程内已经安装过全局订阅者或 `log` 记录器
pub fn try_init_logging(directive: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// 以 [`DEFAULT_DIRECTIVE`] 初始化日志；重复调用时静默忽略
pub fn init_logging() {
    if let Err(e) = try_init_logging(DEFAULT_DIRECTIVE) {
        tracing::debug!("Logging already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_is_rejected() {
        let err = try_init_logging("saferide=notalevel").unwrap_err();
        assert!(matches!(err, LoggingError::Directive(_)));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        assert!(try_init_logging(DEFAULT_DIRECTIVE).is_err());
    }
}
