//! 消息分类模块
//!
//! 把解码后的文本消息映射到固定的命令集合。分类是全函数：
//! 每条输入都恰好对应一个 [`Command`] 变体。

use crate::ProtocolError;
use crate::constants::*;
use std::fmt;
use tracing::trace;

/// 设备上行命令
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// 碰撞/崩溃触发
    CrashTrigger,
    /// 结构化速度上报（`SPEED:<n>`，km/h）
    SpeedReport(u32),
    /// 旧版纯数字速度（0..=200 km/h）
    LegacySpeed(u32),
    /// 无法识别的消息（原文保留，便于日志）
    Unrecognized(String),
}

/// 命令种类（不携带负载，用于指标和日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CrashTrigger,
    SpeedReport,
    LegacySpeed,
    Unrecognized,
}

impl Command {
    /// 命令种类
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CrashTrigger => CommandKind::CrashTrigger,
            Command::SpeedReport(_) => CommandKind::SpeedReport,
            Command::LegacySpeed(_) => CommandKind::LegacySpeed,
            Command::Unrecognized(_) => CommandKind::Unrecognized,
        }
    }

    /// 如果是速度类命令，返回速度值（km/h）
    pub fn speed_kmh(&self) -> Option<u32> {
        match self {
            Command::SpeedReport(v) | Command::LegacySpeed(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CrashTrigger => write!(f, "CrashTrigger"),
            Command::SpeedReport(v) => write!(f, "SpeedReport({} km/h)", v),
            Command::LegacySpeed(v) => write!(f, "LegacySpeed({} km/h)", v),
            Command::Unrecognized(text) => write!(f, "Unrecognized({:?})", text),
        }
    }
}

/// 对一条已解码消息进行分类
///
/// 检查顺序（先匹配者胜出）：
/// 1. 恰好为 `"1"`，或大小写不敏感地包含 `"trigger sent to app"` / `"crash"` / `"trigger"` → `CrashTrigger`
/// 2. 以 `"SPEED:"` 开头且后缀为非负整数 → `SpeedReport`；后缀格式错误 → `Unrecognized`
/// 3. 纯十进制数字且数值在 `[0, 200]` → `LegacySpeed`
/// 4. 其余 → `Unrecognized`
///
/// # 示例
///
/// ```rust
/// use saferide_protocol::{Command, classify};
///
/// assert_eq!(classify("SPEED:42"), Command::SpeedReport(42));
/// assert_eq!(classify("7"), Command::LegacySpeed(7));
/// assert_eq!(classify("Trigger"), Command::CrashTrigger);
/// assert_eq!(classify("250"), Command::Unrecognized("250".to_string()));
/// ```
pub fn classify(text: &str) -> Command {
    if is_crash_trigger(text) {
        return Command::CrashTrigger;
    }

    if text.starts_with(SPEED_PREFIX) {
        return match parse_speed_report(text) {
            Ok(value) => Command::SpeedReport(value),
            Err(e) => {
                trace!("Classifier fallback: {}", e);
                Command::Unrecognized(text.to_owned())
            },
        };
    }

    match parse_legacy_speed(text) {
        Ok(value) => Command::LegacySpeed(value),
        Err(e) => {
            trace!("Classifier fallback: {}", e);
            Command::Unrecognized(text.to_owned())
        },
    }
}

fn is_crash_trigger(text: &str) -> bool {
    if text == CRASH_LEGACY_CODE {
        return true;
    }
    let lower = text.to_lowercase();
    CRASH_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn is_decimal(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// 解析 `SPEED:<n>` 格式的速度上报
///
/// 后缀是可带一个前导 `+` 的十进制数字（不允许负号、空格），且不超过 `u32` 范围。
pub fn parse_speed_report(text: &str) -> Result<u32, ProtocolError> {
    let suffix = text
        .strip_prefix(SPEED_PREFIX)
        .ok_or_else(|| ProtocolError::MalformedCommand {
            text: text.to_owned(),
            reason: format!("missing {} prefix", SPEED_PREFIX),
        })?;

    let digits = suffix.strip_prefix('+').unwrap_or(suffix);
    if !is_decimal(digits) {
        return Err(ProtocolError::MalformedCommand {
            text: text.to_owned(),
            reason: "speed is not a non-negative integer".to_string(),
        });
    }

    digits.parse::<u32>().map_err(|e| ProtocolError::MalformedCommand {
        text: text.to_owned(),
        reason: e.to_string(),
    })
}

/// 解析旧版纯数字速度消息
///
/// 超出 `[0, 200]` 的数值返回 `SpeedOutOfRange`，调用方应静默忽略。
pub fn parse_legacy_speed(text: &str) -> Result<u32, ProtocolError> {
    if !is_decimal(text) {
        return Err(ProtocolError::MalformedCommand {
            text: text.to_owned(),
            reason: "not a bare decimal number".to_string(),
        });
    }

    // 超长数字串在 u64 中也可能溢出，统一视为超范围
    let value = text.parse::<u64>().unwrap_or(u64::MAX);
    if value > LEGACY_SPEED_MAX_KMH as u64 {
        return Err(ProtocolError::SpeedOutOfRange {
            value,
            max: LEGACY_SPEED_MAX_KMH,
        });
    }

    Ok(value as u32)
}
