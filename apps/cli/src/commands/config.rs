//! 配置管理命令

use crate::settings::{self, Settings};
use anyhow::{Result, bail};
use clap::Subcommand;
use std::path::Path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 以 JSON 显示生效的配置
    Show,

    /// 显示配置文件路径
    Path,

    /// 写出一份默认配置
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, explicit: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let settings = settings::load(explicit)?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
                Ok(())
            },

            ConfigCommand::Path => {
                let path = settings::resolve_path(explicit)?;
                let status = if path.exists() { "" } else { " (not found, using defaults)" };
                println!("{}{}", path.display(), status);
                Ok(())
            },

            ConfigCommand::Init { force } => {
                let path = settings::resolve_path(explicit)?;
                if path.exists() && !force {
                    bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
                }
                settings::save(&path, &Settings::default())?;
                println!("✅ 已写入默认配置: {}", path.display());
                Ok(())
            },
        }
    }
}
