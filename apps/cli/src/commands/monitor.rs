//! 实时监控命令

use super::connection::ConnectionArgs;
use crate::settings::Settings;
use anyhow::{Context, Result, bail};
use clap::Args;
use saferide_sdk::LinkState;
use saferide_sdk::risk::{RiskContext, RoadType, Weather};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;

/// 监控参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 刷新间隔（毫秒）
    #[arg(short, long, default_value_t = 200)]
    pub interval_ms: u64,

    /// 连接后下发的道路限速（km/h）
    #[arg(long)]
    pub speed_limit: Option<u32>,

    /// 覆盖天气
    #[arg(short, long)]
    pub weather: Option<Weather>,

    /// 覆盖道路类型
    #[arg(short, long)]
    pub road: Option<RoadType>,
}

impl MonitorCommand {
    pub fn execute(&self, settings: &Settings) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        {
            let running = running.clone();
            ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
                .context("安装 Ctrl-C 处理器失败")?;
        }

        let mut link = self.connection.connect(settings)?;
        info!("Connected to {}, press Ctrl-C to stop", link.config().device_name);

        let base = link.config().risk_context;
        if self.weather.is_some() || self.road.is_some() {
            link.set_risk_context(RiskContext {
                weather: self.weather.unwrap_or(base.weather),
                road_type: self.road.unwrap_or(base.road_type),
            });
        }
        if let Some(limit) = self.speed_limit {
            link.send_speed_limit(limit)?;
        }

        let mut last_printed = None;
        let mut failure = None;
        while running.load(Ordering::SeqCst) {
            let state = link.observe_link_state();
            if let LinkState::Error(reason) = state {
                failure = Some(reason);
                break;
            }

            let telemetry = link.observe_telemetry();
            let risk = link.observe_risk();
            let line = format!(
                "speed {:>3} km/h | limit {:>3} | risk {:>6.2}% ({:?}) | crash {} | msgs {}",
                telemetry.current_speed_kmh,
                telemetry
                    .speed_limit_kmh
                    .map_or_else(|| "-".to_string(), |l| l.to_string()),
                risk.percentage,
                risk.level(),
                if telemetry.crash_detected { "YES" } else { "no" },
                telemetry.message_count,
            );
            if last_printed.as_ref() != Some(&line) {
                println!("{}", line);
                last_printed = Some(line);
            }
            thread::sleep(Duration::from_millis(self.interval_ms));
        }

        let metrics = link.metrics();
        link.disconnect();
        println!(
            "Received {} bytes, {} messages ({} unrecognized)",
            metrics.bytes_read, metrics.messages_dispatched, metrics.unrecognized
        );

        if let Some(reason) = failure {
            bail!("链路异常断开: {}", reason);
        }
        Ok(())
    }
}
