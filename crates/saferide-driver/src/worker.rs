//! 后台线程句柄
//!
//! 停止流程固定为：清除运行标志 → 带超时 join。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, trace};

/// 带超时的 join
///
/// 读线程可能卡在后端的阻塞 `read()` 里（蓝牙栈断开时不一定及时返回），
/// 保活线程可能正在写一个已半关闭的通道。断开和 `Drop` 不能因此挂住，
/// 所以由一个看门狗线程代为 join，调用方最多等 `timeout`；
/// 超时后线程被放弃，进程退出时回收。
pub(crate) trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        let name = self.thread().name().unwrap_or("unnamed").to_string();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let watchdog = thread::Builder::new()
            .name(format!("{}-join", name))
            .spawn(move || {
                let _ = tx.send(self.join().map(|_| ()));
            });
        if let Err(e) = watchdog {
            return Err(Box::new(e));
        }

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{} did not exit within {:?}", name, timeout),
                )))
            },
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    format!("{} join watchdog exited without a result", name),
                )))
            },
        }
    }
}

/// 带运行标志的后台线程
pub(crate) struct Worker {
    name: &'static str,
    is_running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// 启动线程，`body` 拿到运行标志，应在标志为 `false` 时尽快返回
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let is_running = Arc::new(AtomicBool::new(true));
        let flag = is_running.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))?;
        Ok(Self {
            name,
            is_running,
            handle,
        })
    }

    /// 线程是否仍在运行（标志未清除且线程未结束）
    pub(crate) fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire) && !self.handle.is_finished()
    }

    /// 发出停止信号并等待线程退出
    ///
    /// 超时或线程 panic 只记录日志。
    pub(crate) fn stop(self, timeout: Duration) {
        self.is_running.store(false, Ordering::Release);
        match self.handle.join_timeout(timeout) {
            Ok(()) => trace!("{} thread stopped", self.name),
            Err(e) => error!("Failed to join {} thread: {:?}", self.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_stop_joins_cooperative_thread() {
        let worker = Worker::spawn("test-worker", |running| {
            while running.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        assert!(worker.is_running());

        let start = Instant::now();
        worker.stop(Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_join_timeout_expires_on_stuck_thread() {
        let handle = thread::Builder::new()
            .name("saferide-rx".to_string())
            .spawn(|| thread::sleep(Duration::from_millis(500)))
            .unwrap();
        let err = handle.join_timeout(Duration::from_millis(20)).unwrap_err();
        let err = err.downcast::<std::io::Error>().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
        assert!(err.to_string().contains("saferide-rx"));
    }

    #[test]
    fn test_join_timeout_reports_panic() {
        let handle = thread::spawn(|| panic!("reader crashed"));
        assert!(handle.join_timeout(Duration::from_secs(2)).is_err());
    }
}
