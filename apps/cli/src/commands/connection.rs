//! 从配置和命令行参数建立链路

use crate::settings::Settings;
use anyhow::{Context, Result};
use clap::Args;
use saferide_sdk::link::{DeviceInfo, TcpChannelProvider};
use saferide_sdk::{Link, LinkBuilder, LinkConfig};
use std::time::Duration;

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 设备名（默认取配置中的 link.device_name）
    #[arg(short, long)]
    pub device: Option<String>,

    /// 桥接地址 host:port（覆盖配置中同名设备的地址）
    #[arg(short, long)]
    pub address: Option<String>,

    /// 连接超时（毫秒）
    #[arg(long, default_value_t = 5000)]
    pub connect_timeout_ms: u64,
}

impl ConnectionArgs {
    /// 合并后的链路配置和设备列表
    pub fn resolve(&self, settings: &Settings) -> (LinkConfig, Vec<DeviceInfo>) {
        let mut config = settings.link.clone();
        if let Some(device) = &self.device {
            config.device_name = device.clone();
        }

        let mut devices = settings.devices.clone();
        if let Some(address) = &self.address {
            devices.retain(|d| d.name != config.device_name);
            devices.push(DeviceInfo::new(config.device_name.clone(), address.clone()));
        }
        (config, devices)
    }

    /// 建立并连接链路
    pub fn connect(&self, settings: &Settings) -> Result<Link<TcpChannelProvider>> {
        let (config, devices) = self.resolve(settings);
        let name = config.device_name.clone();
        let provider = TcpChannelProvider::new(devices)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms));

        let mut link = LinkBuilder::new().config(config).build(provider)?;
        link.connect()
            .with_context(|| format!("连接设备 {} 失败", name))?;
        Ok(link)
    }
}
