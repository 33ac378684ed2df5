//! 命令分发
//!
//! 把每条解码后的消息分类并落实到状态：速度更新遥测并刷新风险，
//! 撞车触发经冷却窗口后交给告警出口，其余丢弃。

use crate::collaborators::{AlertStatus, Clock, CrashAlertSink, LocationProvider};
use crate::config::LinkConfig;
use crate::debounce::DebounceWindow;
use crate::metrics::LinkMetrics;
use crate::state::LinkContext;
use parking_lot::Mutex;
use saferide_protocol::{Command, classify};
use saferide_risk::{GeoPoint, RiskContext, RiskInput, RiskOutput, predict_risk};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// 撞车触发的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum CrashOutcome {
    /// 冷却期内，忽略
    Debounced,
    /// 未配置紧急联系人，没有发送
    NoEmergencyContact,
    /// 已发送，携带告警使用的位置
    Sent(GeoPoint),
    /// 告警出口返回失败
    Failed(String),
}

/// 单条消息的分发结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// 速度已更新，并重新计算了风险
    SpeedUpdated { speed_kmh: u32, risk: RiskOutput },
    Crash(CrashOutcome),
    /// 未识别的消息，已丢弃
    Ignored(String),
}

/// 命令分发器
pub struct Dispatcher {
    ctx: Arc<LinkContext>,
    crash_window: DebounceWindow,
    location: Arc<dyn LocationProvider>,
    alerts: Arc<dyn CrashAlertSink>,
    clock: Arc<dyn Clock>,
    default_location: GeoPoint,
    max_speed_kmh: u32,
    /// 串行化“读遥测 → 计算 → 发布”，避免旧结果覆盖新结果
    risk_guard: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<LinkContext>,
        config: &LinkConfig,
        location: Arc<dyn LocationProvider>,
        alerts: Arc<dyn CrashAlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ctx,
            crash_window: DebounceWindow::new("crash alert", config.crash_cooldown()),
            location,
            alerts,
            clock,
            default_location: config.default_location,
            max_speed_kmh: config.max_speed_kmh,
            risk_guard: Mutex::new(()),
        }
    }

    /// 分发一条消息（以当前时刻作为冷却判断时间）
    pub fn dispatch(&self, text: &str) -> DispatchOutcome {
        self.dispatch_at(text, Instant::now())
    }

    /// 分发一条消息
    ///
    /// 消息的全部副作用（遥测、风险、告警）完成后才计入 `messages_dispatched`。
    ///
    /// # 参数
    /// - `text`: 已去除首尾空白的消息
    /// - `now`: 消息到达时刻，用于撞车冷却判断
    pub fn dispatch_at(&self, text: &str, now: Instant) -> DispatchOutcome {
        let metrics = &self.ctx.metrics;
        self.ctx.update_telemetry(|t| {
            t.message_count += 1;
            t.last_message = Some(text.to_string());
        });

        let command = classify(text);
        trace!("Dispatching {}", command);
        let outcome = match command {
            Command::CrashTrigger => DispatchOutcome::Crash(self.handle_crash(now)),
            Command::SpeedReport(speed) | Command::LegacySpeed(speed) => self.handle_speed(speed),
            Command::Unrecognized(text) => {
                LinkMetrics::incr(&metrics.unrecognized);
                debug!("Ignoring unrecognized message: {:?}", text);
                DispatchOutcome::Ignored(text)
            },
        };
        metrics.mark_dispatched();
        outcome
    }

    fn handle_speed(&self, reported: u32) -> DispatchOutcome {
        let speed_kmh = reported.min(self.max_speed_kmh);
        if speed_kmh != reported {
            warn!(
                "Reported speed {} km/h exceeds {} km/h, clamped",
                reported, self.max_speed_kmh
            );
        }
        LinkMetrics::incr(&self.ctx.metrics.speed_updates);
        self.ctx.update_telemetry(|t| t.current_speed_kmh = speed_kmh);

        let risk = self.refresh_risk();
        debug!("Speed {} km/h, risk {:.2}%", speed_kmh, risk.percentage);
        DispatchOutcome::SpeedUpdated { speed_kmh, risk }
    }

    fn handle_crash(&self, now: Instant) -> CrashOutcome {
        let metrics = &self.ctx.metrics;
        LinkMetrics::incr(&metrics.crash_triggers);

        if !self.crash_window.try_fire(now) {
            LinkMetrics::incr(&metrics.crash_debounced);
            return CrashOutcome::Debounced;
        }

        self.ctx.update_telemetry(|t| t.crash_detected = true);
        warn!("Crash trigger received from vehicle sensor");

        if !self.ctx.flags.emergency_contact_configured() {
            LinkMetrics::incr(&metrics.crash_alerts_suppressed);
            warn!("Crash detected but no emergency contact is configured");
            return CrashOutcome::NoEmergencyContact;
        }

        let location = self.best_location();
        match self.alerts.notify_crash(location) {
            AlertStatus::Sent => {
                LinkMetrics::incr(&metrics.crash_alerts_sent);
                info!("Crash alert sent with location {}", location);
                CrashOutcome::Sent(location)
            },
            AlertStatus::Failed(reason) => {
                LinkMetrics::incr(&metrics.crash_alerts_suppressed);
                error!("Failed to send crash alert: {}", reason);
                CrashOutcome::Failed(reason)
            },
        }
    }

    /// 最佳可用位置
    ///
    /// 依次尝试：位置来源 → 最近已知位置 → 默认坐标。
    /// 位置来源给出的新位置会写回遥测状态。
    pub fn best_location(&self) -> GeoPoint {
        if let Some(location) = self.location.best_available_location() {
            self.ctx.update_telemetry(|t| t.last_location = Some(location));
            return location;
        }
        self.ctx.telemetry.load().last_location.unwrap_or(self.default_location)
    }

    /// 用当前遥测和道路环境重新计算并发布风险
    ///
    /// 读取、计算和发布在同一把锁内完成：任何遥测更新之后的刷新
    /// 都排在进行中的刷新之后，发布的风险总是基于最新遥测。
    pub fn refresh_risk(&self) -> RiskOutput {
        let _guard = self.risk_guard.lock();
        let context = **self.ctx.risk_context.load();
        let risk = self.assess_risk(None, context);
        self.ctx.risk.store(Arc::new(risk));
        risk
    }

    /// 按给定位置和道路环境计算风险（不发布）
    ///
    /// # 参数
    /// - `location`: 为 `None` 时使用 [`Dispatcher::best_location`]
    /// - `context`: 天气和道路类型
    pub fn assess_risk(&self, location: Option<GeoPoint>, context: RiskContext) -> RiskOutput {
        let location = location.unwrap_or_else(|| self.best_location());
        let telemetry = self.ctx.telemetry.load();
        let input = RiskInput {
            speed_kmh: telemetry.current_speed_kmh,
            speed_limit_kmh: telemetry.speed_limit_kmh,
            location,
            weather: context.weather,
            road_type: context.road_type,
            hour: self.clock.local_hour(),
        };
        predict_risk(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FixedClock, FixedLocation, NoLocation};
    use parking_lot::Mutex;
    use saferide_risk::{RoadType, Weather};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<GeoPoint>>,
        fail: bool,
    }

    impl CrashAlertSink for RecordingSink {
        fn notify_crash(&self, location: GeoPoint) -> AlertStatus {
            if self.fail {
                return AlertStatus::Failed("sms gateway unreachable".into());
            }
            self.sent.lock().push(location);
            AlertStatus::Sent
        }
    }

    fn dispatcher_with(
        location: Arc<dyn LocationProvider>,
        sink: Arc<RecordingSink>,
        emergency_contact: bool,
    ) -> (Dispatcher, Arc<LinkContext>) {
        let config = LinkConfig::default();
        let ctx = Arc::new(LinkContext::new(RiskContext::default(), emergency_contact));
        let dispatcher =
            Dispatcher::new(ctx.clone(), &config, location, sink, Arc::new(FixedClock(8)));
        (dispatcher, ctx)
    }

    #[test]
    fn test_speed_report_updates_telemetry_and_risk() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, false);
        ctx.update_telemetry(|t| t.speed_limit_kmh = Some(50));

        let outcome = dispatcher.dispatch("SPEED:60");
        let DispatchOutcome::SpeedUpdated { speed_kmh, risk } = &outcome else {
            panic!("expected speed update, got {:?}", outcome);
        };
        assert_eq!(*speed_kmh, 60);
        assert!((risk.percentage - 84.96).abs() < 1e-9);
        assert_eq!(**ctx.risk.load(), *risk);

        let telemetry = ctx.telemetry();
        assert_eq!(telemetry.current_speed_kmh, 60);
        assert_eq!(telemetry.message_count, 1);
        assert_eq!(telemetry.last_message.as_deref(), Some("SPEED:60"));
    }

    #[test]
    fn test_legacy_speed_and_clamp() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, false);

        assert!(matches!(
            dispatcher.dispatch("42"),
            DispatchOutcome::SpeedUpdated { speed_kmh: 42, .. }
        ));
        assert!(matches!(
            dispatcher.dispatch("SPEED:999"),
            DispatchOutcome::SpeedUpdated { speed_kmh: 300, .. }
        ));
        assert_eq!(ctx.telemetry().current_speed_kmh, 300);
    }

    #[test]
    fn test_zero_speed_publishes_zero_risk() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, false);
        dispatcher.dispatch("SPEED:60");
        assert!(ctx.risk.load().percentage > 0.0);

        dispatcher.dispatch("SPEED:0");
        assert_eq!(ctx.risk.load().percentage, 0.0);
    }

    #[test]
    fn test_unrecognized_is_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, true);

        assert_eq!(
            dispatcher.dispatch("hello"),
            DispatchOutcome::Ignored("hello".into())
        );
        assert_eq!(
            dispatcher.dispatch("SPEED:abc"),
            DispatchOutcome::Ignored("SPEED:abc".into())
        );
        let telemetry = ctx.telemetry();
        assert_eq!(telemetry.current_speed_kmh, 0);
        assert!(!telemetry.crash_detected);
        assert_eq!(ctx.metrics.snapshot().unrecognized, 2);
    }

    #[test]
    fn test_crash_debounce_window() {
        let sink = Arc::new(RecordingSink::default());
        let p = GeoPoint::new(13.0, 77.6);
        let (dispatcher, ctx) = dispatcher_with(Arc::new(FixedLocation(p)), sink.clone(), true);
        let t0 = Instant::now();

        assert_eq!(
            dispatcher.dispatch_at("1", t0),
            DispatchOutcome::Crash(CrashOutcome::Sent(p))
        );
        assert_eq!(
            dispatcher.dispatch_at("crash", t0 + Duration::from_secs(1)),
            DispatchOutcome::Crash(CrashOutcome::Debounced)
        );
        assert_eq!(sink.sent.lock().len(), 1);

        assert_eq!(
            dispatcher.dispatch_at("Trigger sent to app", t0 + Duration::from_secs(7)),
            DispatchOutcome::Crash(CrashOutcome::Sent(p))
        );
        assert_eq!(sink.sent.lock().len(), 2);

        let snap = ctx.metrics.snapshot();
        assert_eq!(snap.crash_triggers, 3);
        assert_eq!(snap.crash_debounced, 1);
        assert_eq!(snap.crash_alerts_sent, 2);
        assert!(ctx.telemetry().crash_detected);
    }

    #[test]
    fn test_crash_without_emergency_contact_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink.clone(), false);

        assert_eq!(
            dispatcher.dispatch("1"),
            DispatchOutcome::Crash(CrashOutcome::NoEmergencyContact)
        );
        assert!(sink.sent.lock().is_empty());
        assert!(ctx.telemetry().crash_detected);
    }

    #[test]
    fn test_crash_falls_back_to_default_location() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _ctx) = dispatcher_with(Arc::new(NoLocation), sink.clone(), true);

        dispatcher.dispatch("1");
        assert_eq!(*sink.sent.lock(), vec![GeoPoint::new(12.9716, 77.5946)]);
    }

    #[test]
    fn test_crash_alert_failure_is_reported() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, true);

        assert_eq!(
            dispatcher.dispatch("1"),
            DispatchOutcome::Crash(CrashOutcome::Failed("sms gateway unreachable".into()))
        );
        assert_eq!(ctx.metrics.snapshot().crash_alerts_suppressed, 1);
    }

    #[test]
    fn test_last_known_location_preferred_over_default() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, false);
        let known = GeoPoint::new(10.0, 76.0);
        ctx.update_telemetry(|t| t.last_location = Some(known));
        assert_eq!(dispatcher.best_location(), known);
    }

    #[test]
    fn test_assess_risk_with_supplied_context() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, false);
        dispatcher.dispatch("SPEED:40");

        let rural = GeoPoint::new(10.0, 76.0);
        let rainy_market = RiskContext {
            weather: Weather::Rainy,
            road_type: RoadType::MarketRoad,
        };
        let published = **ctx.risk.load();
        let risk = dispatcher.assess_risk(Some(rural), rainy_market);
        assert_eq!(risk.traffic_density, 0.4);
        // 按需计算不覆盖已发布的风险
        assert_eq!(**ctx.risk.load(), published);
        assert_ne!(risk, published);
    }

    /// 第一次调用时阻塞，直到测试放行
    struct GatedClock {
        entered: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
        first: std::sync::atomic::AtomicBool,
    }

    impl Clock for GatedClock {
        fn local_hour(&self) -> u8 {
            if self.first.swap(false, std::sync::atomic::Ordering::SeqCst) {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            8
        }
    }

    #[test]
    fn test_slow_refresh_does_not_overwrite_newer_speed() {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let clock = Arc::new(GatedClock {
            entered: entered_tx,
            release: release_rx,
            first: std::sync::atomic::AtomicBool::new(true),
        });
        let ctx = Arc::new(LinkContext::new(RiskContext::default(), false));
        let dispatcher = Arc::new(Dispatcher::new(
            ctx.clone(),
            &LinkConfig::default(),
            Arc::new(NoLocation),
            Arc::new(RecordingSink::default()),
            clock,
        ));

        // 调用方刷新读到车速 0 后卡在时钟里
        let caller = {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || dispatcher.refresh_risk())
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let speed_update = {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || dispatcher.dispatch("SPEED:60"))
        };
        // 等速度写入遥测后再放行
        while ctx.telemetry().current_speed_kmh != 60 {
            std::thread::sleep(Duration::from_millis(1));
        }
        release_tx.send(()).unwrap();

        assert_eq!(caller.join().unwrap().percentage, 0.0);
        speed_update.join().unwrap();

        assert_eq!(ctx.telemetry().current_speed_kmh, 60);
        assert!((ctx.risk.load().percentage - 84.96).abs() < 1e-9);
    }

    #[test]
    fn test_dispatched_counter_follows_effects() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, ctx) = dispatcher_with(Arc::new(NoLocation), sink, false);
        dispatcher.dispatch("SPEED:60");
        assert_eq!(ctx.metrics.dispatched(), 1);
        assert!(ctx.risk.load().percentage > 0.0);
    }
}
