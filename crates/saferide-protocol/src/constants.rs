//! 协议常量定义

/// 消息分隔符（LF 和 CR 都视为消息结束）
pub const DELIMITERS: [u8; 2] = [b'\n', b'\r'];

/// 结构化速度上报前缀（大小写敏感）
pub const SPEED_PREFIX: &str = "SPEED:";

/// 旧版固件使用的崩溃触发码（整条消息恰好为 `"1"`）
pub const CRASH_LEGACY_CODE: &str = "1";

/// 崩溃触发关键字（大小写不敏感的子串匹配，按顺序检查）
pub const CRASH_KEYWORDS: [&str; 3] = ["trigger sent to app", "crash", "trigger"];

/// 旧版纯数字速度消息的上限（km/h，含）
///
/// 超出此范围的纯数字消息被静默忽略，不视为错误。
pub const LEGACY_SPEED_MAX_KMH: u32 = 200;

/// 手动接管开始控制码
pub const OVERRIDE_START_CODE: &str = "2";

/// 手动接管结束控制码
pub const OVERRIDE_STOP_CODE: &str = "3";

/// 未完成消息缓冲区的默认上限（字节）
pub const DEFAULT_MAX_PENDING_BYTES: usize = 4096;
