//! 状态结构定义
//!
//! 链路状态、遥测状态和最新风险值都放在 `ArcSwap` 槽位里：
//! 读取方（UI、CLI）随时 `load()` 拿到一致的快照，不会看到写了一半的结构。

use crate::metrics::LinkMetrics;
use arc_swap::ArcSwap;
use saferide_risk::{GeoPoint, RiskContext, RiskOutput};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// 链路状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// 失败，携带可展示的原因
    Error(String),
}

impl LinkState {
    /// 状态机是否允许从 `self` 迁移到 `to`
    ///
    /// ```text
    /// Disconnected → Connecting
    /// Connecting   → Connected | Error
    /// Connected    → Disconnected | Error
    /// Error        → Disconnected | Connecting
    /// ```
    ///
    /// 同一状态之间的“迁移”不算合法迁移（例如 `Disconnected → Disconnected`）。
    pub fn can_transition_to(&self, to: &LinkState) -> bool {
        use LinkState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error(_))
                | (Connected, Disconnected)
                | (Connected, Error(_))
                | (Error(_), Disconnected)
                | (Error(_), Connecting)
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LinkState::Error(_))
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "Disconnected"),
            LinkState::Connecting => write!(f, "Connecting"),
            LinkState::Connected => write!(f, "Connected"),
            LinkState::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// 遥测状态
///
/// 跨重连保留，断开链路不会清空。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryState {
    /// 当前车速（km/h），已截断到配置的上限
    pub current_speed_kmh: u32,
    /// 最近一次设置的道路限速（km/h）
    pub speed_limit_kmh: Option<u32>,
    /// 最近一次可用的位置
    pub last_location: Option<GeoPoint>,
    /// 手动接管是否激活
    pub manual_override: bool,
    /// 是否检测到过撞车
    pub crash_detected: bool,
    /// 已分发的消息总数
    pub message_count: u64,
    /// 最近一条消息原文
    pub last_message: Option<String>,
}

/// 安全相关标志（宿主应用设置，链路读取）
#[derive(Debug, Default)]
pub struct SafetyFlags {
    emergency_contact_configured: AtomicBool,
    manual_override_active: AtomicBool,
}

impl SafetyFlags {
    pub fn new(emergency_contact_configured: bool) -> Self {
        Self {
            emergency_contact_configured: AtomicBool::new(emergency_contact_configured),
            manual_override_active: AtomicBool::new(false),
        }
    }

    pub fn emergency_contact_configured(&self) -> bool {
        self.emergency_contact_configured.load(Ordering::Acquire)
    }

    pub fn set_emergency_contact_configured(&self, value: bool) {
        self.emergency_contact_configured.store(value, Ordering::Release);
    }

    pub fn manual_override_active(&self) -> bool {
        self.manual_override_active.load(Ordering::Acquire)
    }

    /// 设置接管标志，返回旧值
    pub fn set_manual_override_active(&self, value: bool) -> bool {
        self.manual_override_active.swap(value, Ordering::AcqRel)
    }
}

/// 共享状态上下文
///
/// 由 `Link`、读线程、分发线程和接管保活线程共同持有（`Arc<LinkContext>`）。
pub struct LinkContext {
    /// 链路状态（只能通过 [`LinkContext::transition`] 修改）
    link_state: ArcSwap<LinkState>,
    /// 遥测状态
    pub telemetry: ArcSwap<TelemetryState>,
    /// 最近一次发布的风险值
    pub risk: ArcSwap<RiskOutput>,
    /// 当前道路环境（外部提供）
    pub risk_context: ArcSwap<RiskContext>,
    /// 安全标志
    pub flags: SafetyFlags,
    /// 运行指标
    pub metrics: LinkMetrics,
}

impl LinkContext {
    pub fn new(risk_context: RiskContext, emergency_contact_configured: bool) -> Self {
        Self {
            link_state: ArcSwap::from_pointee(LinkState::Disconnected),
            telemetry: ArcSwap::from_pointee(TelemetryState::default()),
            risk: ArcSwap::from_pointee(RiskOutput::default()),
            risk_context: ArcSwap::from_pointee(risk_context),
            flags: SafetyFlags::new(emergency_contact_configured),
            metrics: LinkMetrics::new(),
        }
    }

    /// 当前链路状态快照
    pub fn link_state(&self) -> LinkState {
        LinkState::clone(&self.link_state.load())
    }

    /// 按状态机迁移链路状态
    ///
    /// 检查与写入是一次原子的 RCU 操作：读线程和调用方线程同时迁移时，
    /// 不合法的一方会被拒绝，而不是覆盖对方的结果。
    ///
    /// # 返回
    /// 迁移是否生效
    pub fn transition(&self, to: LinkState) -> bool {
        let mut applied = false;
        let previous = self.link_state.rcu(|current| {
            if current.can_transition_to(&to) {
                applied = true;
                Arc::new(to.clone())
            } else {
                applied = false;
                Arc::clone(current)
            }
        });
        if applied {
            info!("Link state: {} -> {}", previous, to);
        } else {
            debug!("Rejected link state transition {} -> {}", previous, to);
        }
        applied
    }

    /// 读取遥测快照
    pub fn telemetry(&self) -> TelemetryState {
        TelemetryState::clone(&self.telemetry.load())
    }

    /// 原子地修改遥测状态
    ///
    /// `f` 可能被调用多次（并发写冲突时重试），不能有副作用。
    pub fn update_telemetry(&self, f: impl Fn(&mut TelemetryState)) {
        self.telemetry.rcu(|current| {
            let mut next = TelemetryState::clone(current);
            f(&mut next);
            next
        });
    }
}
