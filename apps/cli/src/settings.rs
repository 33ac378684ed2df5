//! CLI 配置文件
//!
//! ```toml
//! [link]
//! device_name = "ESP32_BT"
//! emergency_contact_configured = true
//! utc_offset_minutes = 330
//!
//! [[devices]]
//! name = "ESP32_BT"
//! address = "192.168.4.1:3333"
//! ```

use anyhow::{Context, Result};
use saferide_sdk::LinkConfig;
use saferide_sdk::link::DeviceInfo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 链路配置
    pub link: LinkConfig,
    /// 已知设备（设备名 → 桥接地址）
    pub devices: Vec<DeviceInfo>,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text).context("解析配置文件失败")?;
        settings.link.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置失败")
    }
}

/// 默认配置文件路径
pub fn default_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("saferide");
    path.push("config.toml");
    Ok(path)
}

/// 解析实际使用的配置文件路径
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_path(),
    }
}

/// 加载配置
///
/// 显式给出的路径必须存在；默认路径不存在时使用默认配置。
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let path = resolve_path(explicit)?;
    if explicit.is_none() && !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    Settings::from_toml_str(&text).with_context(|| format!("配置文件无效: {}", path.display()))
}

/// 写入配置（自动创建父目录）
pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("创建配置目录失败")?;
    }
    fs::write(path, settings.to_toml_string()?).context("写入配置文件失败")?;
    Ok(())
}
