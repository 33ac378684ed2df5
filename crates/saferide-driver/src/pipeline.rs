//! 后台循环
//!
//! - `read_loop`: 每个连接一个，读字节 → 分帧 → 把消息按序送入分发队列
//! - `dispatch_loop`: 整个 `Link` 生命周期一个，按 FIFO 顺序逐条分发
//! - `keepalive_loop`: 手动接管期间定时重发接管码

use crate::dispatcher::Dispatcher;
use crate::metrics::LinkMetrics;
use crate::state::{LinkContext, LinkState};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use saferide_link::{Channel, ChannelReader, LinkError};
use saferide_protocol::{ControlFrame, LineDecoder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// 读循环配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLoopConfig {
    /// 单次读取缓冲区大小（字节）
    pub buffer_size: usize,
    /// 未终结消息的最大缓存（字节）
    pub max_pending_bytes: usize,
}

/// 读循环
///
/// 运行到以下任一情况为止：
/// - `is_running` 被清除（正常断开）
/// - 对端关闭或读故障：若仍在运行，链路迁移到 `Error`
/// - 分发队列已关闭
///
/// 分帧缓冲区属于本循环，循环结束即丢弃，所以断开后不会残留半条消息。
pub fn read_loop<R: ChannelReader>(
    mut reader: R,
    ctx: Arc<LinkContext>,
    msg_tx: Sender<String>,
    is_running: Arc<AtomicBool>,
    config: ReadLoopConfig,
) {
    let mut decoder = LineDecoder::with_max_pending(config.max_pending_bytes);
    let mut buf = vec![0u8; config.buffer_size];
    let metrics = &ctx.metrics;

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Read loop: stop requested");
            break;
        }

        let n = match reader.read(&mut buf) {
            Ok(0) => {
                report_lost(&ctx, &is_running, "Connection lost: closed by device".to_string());
                break;
            },
            Ok(n) => n,
            Err(LinkError::Timeout) => continue,
            Err(e) => {
                LinkMetrics::incr(&metrics.read_errors);
                report_lost(&ctx, &is_running, format!("Connection lost: {}", e));
                break;
            },
        };

        LinkMetrics::add(&metrics.bytes_read, n as u64);
        let overflows_before = decoder.overflows();
        let messages = decoder.decode(&buf[..n]);
        let overflowed = decoder.overflows() - overflows_before;
        if overflowed > 0 {
            LinkMetrics::add(&metrics.decoder_overflows, overflowed);
        }

        for message in messages {
            trace!("Received: {:?}", message);
            LinkMetrics::incr(&metrics.messages_decoded);
            if msg_tx.send(message).is_err() {
                debug!("Dispatch queue closed, read loop exiting");
                return;
            }
        }
    }
}

/// 读线程发现链路断开
///
/// 只有在没人要求停止时才算故障；正在断开时读到 EOF 是正常的。
fn report_lost(ctx: &LinkContext, is_running: &AtomicBool, reason: String) {
    if is_running.swap(false, Ordering::AcqRel) {
        error!("{}", reason);
        ctx.transition(LinkState::Error(reason));
    } else {
        trace!("Read loop ended during shutdown: {}", reason);
    }
}

/// 分发循环
///
/// 所有发送端（`Link` 和各读线程）都释放后退出。
pub fn dispatch_loop(msg_rx: Receiver<String>, dispatcher: Arc<Dispatcher>) {
    for message in msg_rx.iter() {
        let outcome = dispatcher.dispatch(&message);
        debug!("Dispatched {:?}: {:?}", message, outcome);
    }
    trace!("Dispatch loop: queue closed");
}

/// 在共享通道上写一帧
///
/// 仅在 `Connected` 状态下写入。
pub(crate) fn write_frame<C: Channel>(
    slot: &Mutex<Option<C>>,
    ctx: &LinkContext,
    bytes: &[u8],
) -> Result<(), crate::DriverError> {
    if !ctx.link_state().is_connected() {
        return Err(crate::DriverError::NotConnected);
    }
    let mut guard = slot.lock();
    let channel = guard.as_mut().ok_or(crate::DriverError::NotConnected)?;
    channel.write(bytes)?;
    LinkMetrics::add(&ctx.metrics.bytes_written, bytes.len() as u64);
    Ok(())
}

/// 接管保活循环
///
/// 每隔 `interval` 重发一次接管开始码，`stop_rx` 收到消息或发送端被释放时立即退出。
/// 未连接时跳过本轮，不排队、不重试。
pub fn keepalive_loop<C: Channel>(
    slot: Arc<Mutex<Option<C>>>,
    ctx: Arc<LinkContext>,
    stop_rx: Receiver<()>,
    interval: Duration,
) {
    let frame = ControlFrame::OverrideStart.to_wire();
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        match write_frame(&slot, &ctx, &frame) {
            Ok(()) => trace!("Override keepalive sent"),
            Err(crate::DriverError::NotConnected) => trace!("Override keepalive skipped: not connected"),
            Err(e) => warn!("Override keepalive failed: {}", e),
        }
    }
    trace!("Override keepalive stopped");
}
