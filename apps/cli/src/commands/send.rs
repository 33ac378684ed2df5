//! 下发命令

use super::connection::ConnectionArgs;
use crate::settings::Settings;
use anyhow::Result;
use clap::{ArgGroup, Args};

/// 下发参数（文本、限速、接管三选一）
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["text", "speed_limit", "override_mode"])))]
pub struct SendCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 原样发送的文本（不追加换行）
    pub text: Option<String>,

    /// 下发道路限速（km/h）
    #[arg(long)]
    pub speed_limit: Option<u32>,

    /// 手动接管开始/结束
    #[arg(long = "override", value_enum)]
    pub override_mode: Option<OverrideMode>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideMode {
    Start,
    Stop,
}

impl SendCommand {
    pub fn execute(&self, settings: &Settings) -> Result<()> {
        let mut link = self.connection.connect(settings)?;

        if let Some(text) = &self.text {
            link.send_text(text)?;
            println!("Sent {:?}", text);
        }
        if let Some(limit) = self.speed_limit {
            link.send_speed_limit(limit)?;
            println!("Sent speed limit {} km/h", limit);
        }
        match self.override_mode {
            // 单次命令不保持连接，只下发接管码
            Some(OverrideMode::Start) => {
                link.start_manual_override()?;
                println!("Manual override started");
            },
            Some(OverrideMode::Stop) => {
                link.stop_manual_override()?;
                println!("Manual override stopped");
            },
            None => {},
        }

        link.disconnect();
        Ok(())
    }
}
