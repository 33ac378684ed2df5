//! 运行指标（原子计数器）

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路运行指标
///
/// 计数器只用于观测，除 `messages_dispatched` 外都是 `Relaxed` 原子操作。
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 读到的字节数
    pub bytes_read: AtomicU64,
    /// 解码出的消息数
    pub messages_decoded: AtomicU64,
    /// 已处理完成（副作用已落实）的消息数
    pub messages_dispatched: AtomicU64,
    /// 未识别的消息数
    pub unrecognized: AtomicU64,
    /// 速度更新次数
    pub speed_updates: AtomicU64,
    /// 收到的撞车触发次数（含冷却期内被忽略的）
    pub crash_triggers: AtomicU64,
    /// 冷却期内被忽略的撞车触发次数
    pub crash_debounced: AtomicU64,
    /// 成功发出的撞车告警
    pub crash_alerts_sent: AtomicU64,
    /// 因未配置紧急联系人或发送失败而没有发出的告警
    pub crash_alerts_suppressed: AtomicU64,
    /// 读故障次数
    pub read_errors: AtomicU64,
    /// 因超长被丢弃的未终结消息数
    pub decoder_overflows: AtomicU64,
    /// 写出的字节数
    pub bytes_written: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// 记录一条消息处理完成
    ///
    /// `Release` 语义：观察到新计数的线程也能看到这条消息的全部副作用。
    pub(crate) fn mark_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Release);
    }

    /// 已处理完成的消息数（`Acquire`，与 [`LinkMetrics::mark_dispatched`] 配对）
    pub fn dispatched(&self) -> u64 {
        self.messages_dispatched.load(Ordering::Acquire)
    }

    /// 获取快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            speed_updates: self.speed_updates.load(Ordering::Relaxed),
            crash_triggers: self.crash_triggers.load(Ordering::Relaxed),
            crash_debounced: self.crash_debounced.load(Ordering::Relaxed),
            crash_alerts_sent: self.crash_alerts_sent.load(Ordering::Relaxed),
            crash_alerts_suppressed: self.crash_alerts_suppressed.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            decoder_overflows: self.decoder_overflows.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.bytes_read,
            &self.messages_decoded,
            &self.messages_dispatched,
            &self.unrecognized,
            &self.speed_updates,
            &self.crash_triggers,
            &self.crash_debounced,
            &self.crash_alerts_sent,
            &self.crash_alerts_suppressed,
            &self.read_errors,
            &self.decoder_overflows,
            &self.bytes_written,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub messages_decoded: u64,
    pub messages_dispatched: u64,
    pub unrecognized: u64,
    pub speed_updates: u64,
    pub crash_triggers: u64,
    pub crash_debounced: u64,
    pub crash_alerts_sent: u64,
    pub crash_alerts_suppressed: u64,
    pub read_errors: u64,
    pub decoder_overflows: u64,
    pub bytes_written: u64,
}
