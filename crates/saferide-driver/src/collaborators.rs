//! 宿主应用提供的协作者
//!
//! 链路本身不做定位、不发短信、不读系统时区；这些能力通过下面的 trait 注入。

use saferide_risk::GeoPoint;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// 位置来源
pub trait LocationProvider: Send + Sync {
    /// 当前最佳可用位置，不可用时返回 `None`
    fn best_available_location(&self) -> Option<GeoPoint>;
}

/// 撞车告警的投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStatus {
    Sent,
    Failed(String),
}

/// 撞车告警出口（例如给紧急联系人发短信）
pub trait CrashAlertSink: Send + Sync {
    fn notify_crash(&self, location: GeoPoint) -> AlertStatus;
}

/// 本地时钟（只需要小时）
pub trait Clock: Send + Sync {
    /// 本地时间的小时（0–23）
    fn local_hour(&self) -> u8;
}

/// 不提供位置（总是回退到默认坐标或最近已知位置）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn best_available_location(&self) -> Option<GeoPoint> {
        None
    }
}

/// 固定位置
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub GeoPoint);

impl LocationProvider for FixedLocation {
    fn best_available_location(&self) -> Option<GeoPoint> {
        Some(self.0)
    }
}

/// 只写日志的告警出口
///
/// 没有接入真实通知渠道时使用，告警内容以 `warn!` 输出并视为已发送。
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl CrashAlertSink for LogAlertSink {
    fn notify_crash(&self, location: GeoPoint) -> AlertStatus {
        warn!(
            "EMERGENCY: crash detected at https://maps.google.com/?q={}",
            location
        );
        AlertStatus::Sent
    }
}

/// 系统时钟 + 固定 UTC 偏移
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    pub utc_offset_minutes: i32,
}

impl SystemClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self { utc_offset_minutes }
    }

    /// 给定 Unix 秒数对应的本地小时
    pub fn hour_at(&self, unix_secs: i64) -> u8 {
        let local = unix_secs + i64::from(self.utc_offset_minutes) * 60;
        (local.rem_euclid(86_400) / 3_600) as u8
    }
}

impl Clock for SystemClock {
    fn local_hour(&self) -> u8 {
        let secs = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };
        self.hour_at(secs)
    }
}

/// 固定小时（测试和离线评估用）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u8);

impl Clock for FixedClock {
    fn local_hour(&self) -> u8 {
        self.0
    }
}
