//! Builder 模式实现
//!
//! 提供链式构造 `Link` 实例的便捷方式。

use crate::collaborators::{
    Clock, CrashAlertSink, LocationProvider, LogAlertSink, NoLocation, SystemClock,
};
use crate::config::LinkConfig;
use crate::error::DriverError;
use crate::link::Link;
use saferide_link::ChannelProvider;
use saferide_risk::RiskContext;
use std::sync::Arc;

/// Link Builder（链式构造）
///
/// 未设置的协作者使用默认实现：
/// - 位置：[`NoLocation`]（回退到默认坐标）
/// - 告警：[`LogAlertSink`]（只写日志）
/// - 时钟：[`SystemClock`]（按配置的 UTC 偏移）
///
/// # Example
///
/// ```
/// use saferide_driver::{FixedLocation, LinkBuilder};
/// use saferide_link::MockChannelProvider;
/// use saferide_risk::GeoPoint;
///
/// let (provider, _device) = MockChannelProvider::with_device("ESP32_BT");
/// let link = LinkBuilder::new()
///     .crash_cooldown_ms(3000)
///     .emergency_contact_configured(true)
///     .location_provider(FixedLocation(GeoPoint::new(12.97, 77.59)))
///     .build(provider)
///     .unwrap();
/// assert_eq!(link.config().crash_cooldown_ms, 3000);
/// ```
pub struct LinkBuilder {
    config: LinkConfig,
    location: Option<Arc<dyn LocationProvider>>,
    alerts: Option<Arc<dyn CrashAlertSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl LinkBuilder {
    pub fn new() -> Self {
        Self {
            config: LinkConfig::default(),
            location: None,
            alerts: None,
            clock: None,
        }
    }

    /// 整体替换配置
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    pub fn crash_cooldown_ms(mut self, ms: u64) -> Self {
        self.config.crash_cooldown_ms = ms;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    pub fn emergency_contact_configured(mut self, configured: bool) -> Self {
        self.config.emergency_contact_configured = configured;
        self
    }

    pub fn risk_context(mut self, context: RiskContext) -> Self {
        self.config.risk_context = context;
        self
    }

    pub fn location_provider(mut self, provider: impl LocationProvider + 'static) -> Self {
        self.location = Some(Arc::new(provider));
        self
    }

    pub fn alert_sink(mut self, sink: impl CrashAlertSink + 'static) -> Self {
        self.alerts = Some(Arc::new(sink));
        self
    }

    /// 共享的告警出口（调用方保留句柄，例如测试中检查已发送的告警）
    pub fn shared_alert_sink(mut self, sink: Arc<dyn CrashAlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// 构建 `Link`（初始为 `Disconnected`，不会自动连接）
    ///
    /// # 错误
    /// - `DriverError::Config`: 配置校验失败
    /// - `DriverError::Worker`: 分发线程无法启动
    pub fn build<P: ChannelProvider>(self, provider: P) -> Result<Link<P>, DriverError> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new(self.config.utc_offset_minutes)));
        Link::new(
            provider,
            self.config,
            self.location.unwrap_or_else(|| Arc::new(NoLocation)),
            self.alerts.unwrap_or_else(|| Arc::new(LogAlertSink)),
            clock,
        )
    }
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saferide_link::MockChannelProvider;

    #[test]
    fn test_builder_applies_overrides() {
        let (provider, _device) = MockChannelProvider::with_device("BRIDGE");
        let link = LinkBuilder::new()
            .device_name("BRIDGE")
            .read_timeout_ms(10)
            .build(provider)
            .unwrap();
        assert_eq!(link.config().device_name, "BRIDGE");
        assert_eq!(link.config().read_timeout_ms, 10);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let (provider, _device) = MockChannelProvider::with_device("ESP32_BT");
        let result = LinkBuilder::new().read_timeout_ms(0).build(provider);
        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_builder_connects_to_named_device() {
        let (provider, _device) = MockChannelProvider::with_device("BRIDGE");
        let mut link = LinkBuilder::new()
            .device_name("BRIDGE")
            .read_timeout_ms(5)
            .build(provider)
            .unwrap();
        link.connect().unwrap();
        assert!(link.observe_link_state().is_connected());
    }
}
