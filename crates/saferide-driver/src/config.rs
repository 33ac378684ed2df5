//! 链路配置
//!
//! 所有字段都有默认值（`#[serde(default)]`），TOML 文件只需写出要覆盖的项。

use crate::error::DriverError;
use saferide_risk::{GeoPoint, RiskContext};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 车载设备的默认广播名
pub const DEFAULT_DEVICE_NAME: &str = "ESP32_BT";

/// 位置不可用时使用的默认坐标（班加罗尔市中心）
pub const DEFAULT_LOCATION: GeoPoint = GeoPoint::new(12.9716, 77.5946);

/// 链路配置
///
/// # Example
///
/// ```
/// use saferide_driver::LinkConfig;
///
/// let config = LinkConfig::from_toml_str(r#"
///     device_name = "ESP32_TEST"
///     crash_cooldown_ms = 3000
///
///     [risk_context]
///     weather = "rainy"
///     road_type = "market_road"
/// "#).unwrap();
/// assert_eq!(config.device_name, "ESP32_TEST");
/// assert_eq!(config.read_buffer_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// 要连接的已配对设备名（精确匹配）
    pub device_name: String,
    /// 单次读取的缓冲区大小（字节）
    pub read_buffer_size: usize,
    /// 单次阻塞读的超时（毫秒），决定读线程响应停止信号的粒度
    pub read_timeout_ms: u64,
    /// 未终结消息的最大缓存（字节）
    pub max_pending_bytes: usize,
    /// 断开时等待读线程退出的最长时间（毫秒）
    pub join_timeout_ms: u64,
    /// 撞车告警冷却时间（毫秒）
    pub crash_cooldown_ms: u64,
    /// 可接受的最大车速（km/h），超出的上报值被截断
    pub max_speed_kmh: u32,
    /// 位置不可用时的默认坐标
    pub default_location: GeoPoint,
    /// 手动接管期间重发接管码的间隔（毫秒）
    pub override_keepalive_ms: u64,
    /// 是否已配置紧急联系人
    pub emergency_contact_configured: bool,
    /// 本地时间相对 UTC 的偏移（分钟），用于推算风险模型的小时
    pub utc_offset_minutes: i32,
    /// 初始道路环境
    pub risk_context: RiskContext,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            read_buffer_size: 1024,
            read_timeout_ms: 50,
            max_pending_bytes: saferide_protocol::constants::DEFAULT_MAX_PENDING_BYTES,
            join_timeout_ms: 2000,
            crash_cooldown_ms: 5000,
            max_speed_kmh: 300,
            default_location: DEFAULT_LOCATION,
            override_keepalive_ms: 2000,
            emergency_contact_configured: false,
            utc_offset_minutes: 0,
            risk_context: RiskContext::default(),
        }
    }
}

impl LinkConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, DriverError> {
        let config: LinkConfig =
            toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验
    ///
    /// # 错误
    /// - 文件不可读、格式错误或取值非法时返回 `DriverError::Config`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded link config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 校验取值
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.device_name.trim().is_empty() {
            return Err(DriverError::Config("device_name must not be empty".into()));
        }
        if self.read_buffer_size == 0 {
            return Err(DriverError::Config("read_buffer_size must be > 0".into()));
        }
        if self.max_pending_bytes == 0 {
            return Err(DriverError::Config("max_pending_bytes must be > 0".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(DriverError::Config("read_timeout_ms must be > 0".into()));
        }
        if self.override_keepalive_ms == 0 {
            return Err(DriverError::Config("override_keepalive_ms must be > 0".into()));
        }
        if self.max_speed_kmh == 0 {
            return Err(DriverError::Config("max_speed_kmh must be > 0".into()));
        }
        if !(-24 * 60..=24 * 60).contains(&self.utc_offset_minutes) {
            return Err(DriverError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        let GeoPoint {
            latitude,
            longitude,
        } = self.default_location;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DriverError::Config(format!(
                "default_location out of range: {}",
                self.default_location
            )));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn crash_cooldown(&self) -> Duration {
        Duration::from_millis(self.crash_cooldown_ms)
    }

    pub fn override_keepalive(&self) -> Duration {
        Duration::from_millis(self.override_keepalive_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saferide_risk::{RoadType, Weather};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.device_name, "ESP32_BT");
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.crash_cooldown(), Duration::from_secs(5));
        assert_eq!(config.override_keepalive(), Duration::from_secs(2));
        assert_eq!(config.default_location, GeoPoint::new(12.9716, 77.5946));
        assert!(!config.emergency_contact_configured);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LinkConfig::from_toml_str(
            r#"
            max_speed_kmh = 180
            emergency_contact_configured = true
            default_location = { latitude = 13.0, longitude = 77.6 }

            [risk_context]
            weather = "foggy"
            road_type = "residential"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_speed_kmh, 180);
        assert!(config.emergency_contact_configured);
        assert_eq!(config.default_location, GeoPoint::new(13.0, 77.6));
        assert_eq!(config.risk_context.weather, Weather::Foggy);
        assert_eq!(config.risk_context.road_type, RoadType::Residential);
        assert_eq!(config.device_name, DEFAULT_DEVICE_NAME);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = LinkConfig::from_toml_str("read_buffer_size = 0").unwrap_err();
        assert!(matches!(err, DriverError::Config(msg) if msg.contains("read_buffer_size")));

        let err = LinkConfig::from_toml_str("device_name = \"  \"").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));

        let err = LinkConfig::from_toml_str(
            "default_location = { latitude = 91.0, longitude = 0.0 }",
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Config(msg) if msg.contains("default_location")));

        let err = LinkConfig::from_toml_str("[risk_context]\nweather = \"snowy\"").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip_and_load() {
        let mut config = LinkConfig::default();
        config.device_name = "BRIDGE".into();
        config.utc_offset_minutes = 330;
        let text = config.to_toml_string().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let loaded = LinkConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LinkConfig::load("/nonexistent/saferide.toml").unwrap_err();
        assert!(matches!(err, DriverError::Config(msg) if msg.contains("saferide.toml")));
    }
}
