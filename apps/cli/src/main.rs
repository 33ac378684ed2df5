//! # SafeRide CLI
//!
//! 车载传感器链路的命令行工具。
//!
//! ```bash
//! # 离线评分（不需要设备）
//! saferide-cli risk --speed 60 --limit 50 --weather clear --road highway --hour 8
//!
//! # 连接桥接地址并持续显示遥测
//! saferide-cli monitor --address 192.168.4.1:3333
//!
//! # 下发一条文本或限速
//! saferide-cli send --speed-limit 60
//!
//! # 查看生效配置
//! saferide-cli config show
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod settings;

use commands::{ConfigCommand, MonitorCommand, RiskCommand, SendCommand};

/// SafeRide CLI - 车载传感器链路工具
#[derive(Parser, Debug)]
#[command(name = "saferide-cli")]
#[command(about = "Command-line interface for the SafeRide vehicle sensor link", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认为用户配置目录下的 saferide/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 离线计算事故风险
    Risk {
        #[command(flatten)]
        args: RiskCommand,
    },

    /// 连接设备并持续显示遥测和风险
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 连接设备并下发一条消息
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
                .add_directive("saferide_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Risk { args } => args.execute(&settings::load(config_path)?),
        Commands::Monitor { args } => args.execute(&settings::load(config_path)?),
        Commands::Send { args } => args.execute(&settings::load(config_path)?),
        Commands::Config(cmd) => cmd.execute(config_path),
    }
}
