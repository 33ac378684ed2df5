//! Link API 模块
//!
//! 对外的 [`Link`] 封装连接状态机、读线程、分发线程和接管保活线程。

use crate::collaborators::{Clock, CrashAlertSink, LocationProvider};
use crate::config::LinkConfig;
use crate::dispatcher::Dispatcher;
use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{ReadLoopConfig, dispatch_loop, keepalive_loop, read_loop, write_frame};
use crate::state::{LinkContext, LinkState, TelemetryState};
use crate::worker::{JoinTimeout, Worker};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use saferide_link::{Channel, ChannelProvider, LinkError};
use saferide_protocol::ControlFrame;
use saferide_risk::{GeoPoint, RiskContext, RiskOutput};
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 接管保活线程
struct Keepalive {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// 车载传感器链路（对外 API）
///
/// `connect()` / `disconnect()` 会阻塞到状态迁移完成（最长约
/// `read_timeout + join_timeout`）；其余方法都很快。
/// 状态通过 `observe_*` 读取，任何线程都能拿到一致的快照。
///
/// # Example
///
/// ```
/// use saferide_driver::{LinkBuilder, LinkState};
/// use saferide_link::MockChannelProvider;
///
/// let (provider, device) = MockChannelProvider::with_device("ESP32_BT");
/// let mut link = LinkBuilder::new().build(provider).unwrap();
///
/// link.connect().unwrap();
/// assert_eq!(link.observe_link_state(), LinkState::Connected);
///
/// device.push("SPEED:60\n");
/// link.wait_for_messages(1, std::time::Duration::from_secs(1)).unwrap();
/// assert_eq!(link.observe_telemetry().current_speed_kmh, 60);
///
/// link.disconnect();
/// assert_eq!(link.observe_link_state(), LinkState::Disconnected);
/// ```
pub struct Link<P: ChannelProvider> {
    provider: P,
    config: LinkConfig,
    ctx: Arc<LinkContext>,
    dispatcher: Arc<Dispatcher>,
    /// 当前打开的通道（写端），与保活线程共享
    channel: Arc<Mutex<Option<P::Channel>>>,
    /// 当前连接的读线程
    reader: Option<Worker>,
    /// 分发队列发送端
    ///
    /// 需要在 Drop 时 **提前关闭**（在 join 分发线程之前），
    /// 否则 `dispatch_loop` 收不到 `Disconnected` 而无法退出。
    msg_tx: ManuallyDrop<Sender<String>>,
    dispatch_thread: Option<JoinHandle<()>>,
    keepalive: Option<Keepalive>,
}

impl<P: ChannelProvider> Link<P> {
    /// 创建链路（初始为 `Disconnected`），并启动分发线程
    ///
    /// 一般通过 [`LinkBuilder`](crate::LinkBuilder) 调用。
    ///
    /// # 错误
    /// - `DriverError::Config`: 配置校验失败
    /// - `DriverError::Worker`: 分发线程无法启动
    pub fn new(
        provider: P,
        config: LinkConfig,
        location: Arc<dyn LocationProvider>,
        alerts: Arc<dyn CrashAlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DriverError> {
        config.validate()?;

        let ctx = Arc::new(LinkContext::new(
            config.risk_context,
            config.emergency_contact_configured,
        ));
        let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), &config, location, alerts, clock));

        let (msg_tx, msg_rx) = crossbeam_channel::unbounded();
        let dispatch_thread = {
            let dispatcher = dispatcher.clone();
            std::thread::Builder::new()
                .name("saferide-dispatch".to_string())
                .spawn(move || dispatch_loop(msg_rx, dispatcher))
                .map_err(|e| DriverError::Worker(e.to_string()))?
        };

        Ok(Self {
            provider,
            config,
            ctx,
            dispatcher,
            channel: Arc::new(Mutex::new(None)),
            reader: None,
            msg_tx: ManuallyDrop::new(msg_tx),
            dispatch_thread: Some(dispatch_thread),
            keepalive: None,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// 共享状态上下文
    pub fn context(&self) -> &Arc<LinkContext> {
        &self.ctx
    }

    /// 通道提供者（例如查询已配对设备）
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// 当前链路状态
    pub fn observe_link_state(&self) -> LinkState {
        self.ctx.link_state()
    }

    /// 当前遥测状态
    pub fn observe_telemetry(&self) -> TelemetryState {
        self.ctx.telemetry()
    }

    /// 最近一次发布的风险值
    pub fn observe_risk(&self) -> RiskOutput {
        **self.ctx.risk.load()
    }

    /// 指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 连接设备
    ///
    /// 先拆除已有连接（旧通道恰好关闭一次），再按配置的设备名发现、打开、启动读线程。
    /// 失败时链路停在 `Error`，不会自动重试。
    ///
    /// # 错误
    /// - `DriverError::Link(LinkError::DeviceNotFound)`: 已配对设备中没有该名称
    /// - `DriverError::Link(LinkError::PermissionDenied)`: 权限不足
    /// - `DriverError::Link(LinkError::Io)`: 打开失败
    pub fn connect(&mut self) -> Result<(), DriverError> {
        self.disconnect();
        self.ctx.transition(LinkState::Connecting);

        let name = self.config.device_name.clone();
        info!("Connecting to {}", name);
        let device = match self.provider.discover(&name) {
            Ok(Some(device)) => device,
            Ok(None) => return Err(self.fail_connect(LinkError::DeviceNotFound(name))),
            Err(e) => return Err(self.fail_connect(e)),
        };

        let mut channel = match self.provider.open(&device) {
            Ok(channel) => channel,
            Err(e) => return Err(self.fail_connect(e)),
        };

        let reader = match channel.reader(self.config.read_timeout()) {
            Ok(reader) => reader,
            Err(e) => {
                close_channel(&mut channel);
                return Err(self.fail_connect(e));
            },
        };

        *self.channel.lock() = Some(channel);
        self.ctx.transition(LinkState::Connected);

        let ctx = self.ctx.clone();
        let msg_tx = Sender::clone(&self.msg_tx);
        let read_config = ReadLoopConfig {
            buffer_size: self.config.read_buffer_size,
            max_pending_bytes: self.config.max_pending_bytes,
        };
        match Worker::spawn("saferide-rx", move |is_running| {
            read_loop(reader, ctx, msg_tx, is_running, read_config)
        }) {
            Ok(worker) => self.reader = Some(worker),
            Err(e) => {
                if let Some(mut channel) = self.channel.lock().take() {
                    close_channel(&mut channel);
                }
                let reason = format!("Connection failed: {}", e);
                error!("{}", reason);
                self.ctx.transition(LinkState::Error(reason));
                return Err(DriverError::Worker(e.to_string()));
            },
        }

        info!("Connected to {} ({})", device.name, device.address);
        Ok(())
    }

    fn fail_connect(&self, e: LinkError) -> DriverError {
        let reason = match &e {
            LinkError::DeviceNotFound(name) => format!(
                "{} device not found. Please make sure it's paired and turned on.",
                name
            ),
            LinkError::PermissionDenied(detail) => format!("Permission denied: {}", detail),
            other => format!("Connection failed: {}", other),
        };
        warn!("{}", reason);
        self.ctx.transition(LinkState::Error(reason));
        DriverError::Link(e)
    }

    /// 断开连接
    ///
    /// 顺序：通知读线程停止并等待退出 → 关闭通道 → `Disconnected`。
    /// 关闭失败只记录日志。遥测状态保留。
    pub fn disconnect(&mut self) {
        if let Some(worker) = self.reader.take() {
            worker.stop(self.config.join_timeout());
        }

        if let Some(mut channel) = self.channel.lock().take() {
            close_channel(&mut channel);
            info!("Channel closed");
        }

        if self.ctx.link_state() != LinkState::Disconnected {
            self.ctx.transition(LinkState::Disconnected);
        }
    }

    /// 读线程是否仍在运行
    pub fn is_reading(&self) -> bool {
        self.reader.as_ref().is_some_and(Worker::is_running)
    }

    /// 写入原始字节
    ///
    /// 不排队、不重试；失败直接返回给调用方，链路状态不变。
    ///
    /// # 错误
    /// - `DriverError::NotConnected`: 链路不在 `Connected` 状态
    /// - `DriverError::Link`: 底层写失败
    pub fn transmit(&self, bytes: &[u8]) -> Result<(), DriverError> {
        write_frame(&self.channel, &self.ctx, bytes).inspect_err(|e| {
            if !matches!(e, DriverError::NotConnected) {
                warn!("Failed to send data: {}", e);
            }
        })
    }

    /// 发送文本（不追加分隔符）
    pub fn send_text(&self, text: &str) -> Result<(), DriverError> {
        self.transmit(text.as_bytes())
    }

    /// 设置道路限速，并在未接管时转发给设备
    ///
    /// 限速总会写入遥测并刷新风险；手动接管期间不下发。
    ///
    /// # 返回
    /// - `Ok(true)`: 已下发
    /// - `Ok(false)`: 手动接管中，未下发
    pub fn send_speed_limit(&self, limit_kmh: u32) -> Result<bool, DriverError> {
        self.ctx.update_telemetry(|t| t.speed_limit_kmh = Some(limit_kmh));
        self.dispatcher.refresh_risk();

        if self.ctx.flags.manual_override_active() {
            debug!("Manual override active, speed limit {} not forwarded", limit_kmh);
            return Ok(false);
        }
        self.transmit(&ControlFrame::SpeedLimit(limit_kmh).to_wire())?;
        debug!("Speed limit {} km/h sent", limit_kmh);
        Ok(true)
    }

    /// 开始手动接管
    ///
    /// 发送接管开始码，并在接管期间每隔 `override_keepalive_ms` 重发一次。
    /// 已在接管中时直接返回。
    pub fn start_manual_override(&mut self) -> Result<(), DriverError> {
        if self.keepalive.is_some() {
            debug!("Manual override already active");
            return Ok(());
        }

        self.transmit(&ControlFrame::OverrideStart.to_wire())?;
        self.set_override_flag(true);

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let slot = self.channel.clone();
        let ctx = self.ctx.clone();
        let interval = self.config.override_keepalive();
        let spawned = std::thread::Builder::new()
            .name("saferide-keepalive".to_string())
            .spawn(move || keepalive_loop(slot, ctx, stop_rx, interval));
        match spawned {
            Ok(handle) => {
                self.keepalive = Some(Keepalive { stop_tx, handle });
                info!("Manual override started");
                Ok(())
            },
            Err(e) => {
                self.set_override_flag(false);
                Err(DriverError::Worker(e.to_string()))
            },
        }
    }

    /// 结束手动接管
    ///
    /// 先停止保活并清除接管标志，再发送接管结束码；发送失败时标志仍然清除。
    pub fn stop_manual_override(&mut self) -> Result<(), DriverError> {
        self.stop_keepalive();
        self.set_override_flag(false);
        self.transmit(&ControlFrame::OverrideStop.to_wire())?;
        info!("Manual override stopped");
        Ok(())
    }

    pub fn is_manual_override_active(&self) -> bool {
        self.ctx.flags.manual_override_active()
    }

    fn set_override_flag(&self, active: bool) {
        self.ctx.flags.set_manual_override_active(active);
        self.ctx.update_telemetry(|t| t.manual_override = active);
    }

    fn stop_keepalive(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            let _ = keepalive.stop_tx.send(());
            if let Err(e) = keepalive.handle.join_timeout(self.config.join_timeout()) {
                error!("Failed to join keepalive thread: {:?}", e);
            }
        }
    }

    /// 宿主应用是否已配置紧急联系人
    pub fn set_emergency_contact_configured(&self, configured: bool) {
        self.ctx.flags.set_emergency_contact_configured(configured);
    }

    /// 更新道路环境并刷新风险
    pub fn set_risk_context(&self, context: RiskContext) -> RiskOutput {
        self.ctx.risk_context.store(Arc::new(context));
        self.dispatcher.refresh_risk()
    }

    /// 按需计算风险（使用当前车速和限速）
    ///
    /// 结果只返回给调用方，不改变 [`Link::observe_risk`] 发布的值，
    /// 也不改变已保存的道路环境。
    ///
    /// # 参数
    /// - `location`: 为 `None` 时使用最佳可用位置
    /// - `context`: 外部提供的天气和道路类型
    pub fn current_risk(&self, location: Option<GeoPoint>, context: RiskContext) -> RiskOutput {
        self.dispatcher.assess_risk(location, context)
    }

    /// 等待已处理完成的消息数达到 `count`
    ///
    /// 返回时前 `count` 条消息的遥测、风险和告警副作用都已可见。
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时
    pub fn wait_for_messages(&self, count: u64, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            if self.ctx.metrics.dispatched() >= count {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn close_channel<C: Channel>(channel: &mut C) {
    if let Err(e) = channel.close() {
        error!("Failed to close channel cleanly: {}", e);
    }
}

impl<P: ChannelProvider> Drop for Link<P> {
    fn drop(&mut self) {
        self.stop_keepalive();
        self.disconnect();

        // 关键：必须在 join 分发线程之前 drop 掉 Sender，否则接收端不会 Disconnected。
        unsafe {
            ManuallyDrop::drop(&mut self.msg_tx);
        }

        let join_timeout = self.config.join_timeout();
        if let Some(handle) = self.dispatch_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Dispatch thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}
