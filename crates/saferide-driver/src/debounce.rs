//! 安全动作冷却窗口

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// 冷却窗口
///
/// 同一类动作在上次触发后的 `cooldown` 时长内（含边界）再次请求会被忽略。
/// 检查和更新在同一把锁内完成，并发请求中只有一个能触发。
#[derive(Debug)]
pub struct DebounceWindow {
    name: &'static str,
    cooldown: Duration,
    last_fired: Mutex<Option<Instant>>,
}

impl DebounceWindow {
    pub fn new(name: &'static str, cooldown: Duration) -> Self {
        Self {
            name,
            cooldown,
            last_fired: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 尝试在 `now` 时刻触发
    ///
    /// # 返回
    /// - `true`: 允许触发，`now` 记为最近触发时刻
    /// - `false`: 仍在冷却期内
    ///
    /// `now` 早于最近触发时刻时（调用方拿时间戳和拿锁之间被抢占）按冷却期内处理。
    pub fn try_fire(&self, now: Instant) -> bool {
        let mut last = self.last_fired.lock();
        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed <= self.cooldown {
                debug!(
                    "{} suppressed: {:?} since last, cooldown {:?}",
                    self.name, elapsed, self.cooldown
                );
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// 最近一次触发的时刻
    pub fn last_fired(&self) -> Option<Instant> {
        *self.last_fired.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_second_trigger_within_cooldown_is_ignored() {
        let window = DebounceWindow::new("crash alert", Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(window.try_fire(t0));
        assert!(!window.try_fire(t0 + Duration::from_secs(1)));
        assert_eq!(window.last_fired(), Some(t0));
    }

    #[test]
    fn test_trigger_after_cooldown_fires() {
        let window = DebounceWindow::new("crash alert", Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(window.try_fire(t0));
        assert!(window.try_fire(t0 + Duration::from_secs(6)));
        assert_eq!(window.last_fired(), Some(t0 + Duration::from_secs(6)));
    }

    #[test]
    fn test_boundary_is_inside_cooldown() {
        let window = DebounceWindow::new("crash alert", Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(window.try_fire(t0));
        assert!(!window.try_fire(t0 + Duration::from_secs(5)));
        assert!(window.try_fire(t0 + Duration::from_millis(5001)));
    }

    #[test]
    fn test_out_of_order_timestamp_is_suppressed() {
        let window = DebounceWindow::new("crash alert", Duration::from_secs(5));
        let t0 = Instant::now() + Duration::from_secs(10);
        assert!(window.try_fire(t0));
        assert!(!window.try_fire(t0 - Duration::from_secs(8)));
    }

    #[test]
    fn test_concurrent_requests_fire_once() {
        let window = Arc::new(DebounceWindow::new("crash alert", Duration::from_secs(5)));
        let fired = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let window = window.clone();
                let fired = fired.clone();
                thread::spawn(move || {
                    if window.try_fire(now) {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
