//! 字节流分帧模块
//!
//! 把串口上读到的任意字节块切分为以换行结尾的文本消息。

use crate::constants::{DEFAULT_MAX_PENDING_BYTES, DELIMITERS};
use bytes::{Buf, BytesMut};
use smallvec::SmallVec;
use tracing::warn;

/// 单次解码产生的消息批次
///
/// 设备通常一次只发一两行（`SPEED:xx\n`），栈上预留 4 个位置即可覆盖绝大多数读取，
/// 避免每次 `read()` 都做堆分配。
pub type MessageBatch = SmallVec<[String; 4]>;

/// 行分帧解码器
///
/// 内部缓冲区只保存尚未遇到分隔符的尾部片段，永远不会包含一条完整消息。
///
/// # 分块无关性
///
/// 同一字节序列无论按什么方式切分成多次 `decode()` 调用，
/// 产出的消息序列和最终残留缓冲区都完全一致：
///
/// ```rust
/// use saferide_protocol::LineDecoder;
///
/// let mut whole = LineDecoder::new();
/// let a = whole.decode(b"AB\nCD");
///
/// let mut split = LineDecoder::new();
/// let mut b = split.decode(b"A");
/// b.extend(split.decode(b"B\n"));
/// b.extend(split.decode(b"CD"));
///
/// assert_eq!(a.as_slice(), ["AB"]);
/// assert_eq!(a, b);
/// assert_eq!(whole.pending(), split.pending());
/// ```
///
/// # 限制
///
/// 未完成片段超过 `max_pending` 字节时整段丢弃，直到下一个分隔符为止
/// （防止设备一直不发换行导致内存无限增长）。只有超限时分块无关性才不成立。
#[derive(Debug)]
pub struct LineDecoder {
    buffer: BytesMut,
    max_pending: usize,
    /// 正在丢弃一条超长消息的剩余部分
    discarding: bool,
    overflows: u64,
}

impl LineDecoder {
    /// 使用默认缓冲上限创建解码器
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING_BYTES)
    }

    /// 指定未完成片段的最大字节数
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_pending.min(1024)),
            max_pending: max_pending.max(1),
            discarding: false,
            overflows: 0,
        }
    }

    /// 追加一块数据并取出所有已完成的消息
    ///
    /// 每条消息去除首尾空白，空消息被丢弃。非 UTF-8 字节按有损方式转换。
    pub fn decode(&mut self, chunk: &[u8]) -> MessageBatch {
        let mut messages = MessageBatch::new();
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| DELIMITERS.contains(b)) {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                messages.push(trimmed.to_owned());
            }
        }

        if self.buffer.len() > self.max_pending {
            warn!(
                "Inbound segment exceeded {} bytes without a delimiter, discarding",
                self.max_pending
            );
            self.buffer.clear();
            self.discarding = true;
            self.overflows += 1;
        }

        messages
    }

    /// 当前未完成的尾部片段
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// 清空缓冲区（断开连接时调用）
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// 因超长被丢弃的片段数量
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(chunks: &[&[u8]]) -> (Vec<String>, Vec<u8>) {
        let mut decoder = LineDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.decode(chunk));
        }
        (out, decoder.pending().to_vec())
    }

    #[test]
    fn test_mixed_delimiters() {
        let (messages, pending) = decode_all(&["A\nB\r\nC".as_bytes()]);
        assert_eq!(messages, vec!["A", "B"]);
        assert_eq!(pending, b"C");
    }

    #[test]
    fn test_split_across_reads() {
        let whole = decode_all(&["AB\nCD".as_bytes()]);
        let split = decode_all(&["A".as_bytes(), "B\n".as_bytes(), "CD".as_bytes()]);
        assert_eq!(whole.0, vec!["AB"]);
        assert_eq!(whole.1, b"CD");
        assert_eq!(whole, split);
    }

    #[test]
    fn test_chunk_ending_on_delimiter_leaves_empty_buffer() {
        let (messages, pending) = decode_all(&["SPEED:40\n".as_bytes()]);
        assert_eq!(messages, vec!["SPEED:40"]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_trims_and_drops_empty_lines() {
        let (messages, pending) = decode_all(&["  crash  \n\n\r\n \t \nSPEED:5\r".as_bytes()]);
        assert_eq!(messages, vec!["crash", "SPEED:5"]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_no_delimiter_yields_nothing() {
        let (messages, pending) = decode_all(&["SPE".as_bytes(), "ED:".as_bytes()]);
        assert!(messages.is_empty());
        assert_eq!(pending, b"SPEED:");
    }

    #[test]
    fn test_multibyte_utf8_split_between_reads() {
        let text = "速度\n".as_bytes();
        let (messages, _) = decode_all(&[&text[..2], &text[2..]]);
        assert_eq!(messages, vec!["速度"]);
    }

    #[test]
    fn test_clear_drops_partial_segment() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.decode(b"SPEED:1").is_empty());
        decoder.clear();
        let messages = decoder.decode(b"23\n");
        assert_eq!(messages.as_slice(), ["23"]);
    }

    #[test]
    fn test_overlong_segment_is_discarded_until_next_delimiter() {
        let mut decoder = LineDecoder::with_max_pending(8);
        assert!(decoder.decode(b"0123456789").is_empty());
        assert_eq!(decoder.overflows(), 1);
        assert!(decoder.pending().is_empty());

        // 超长消息的剩余部分连同分隔符一起丢弃，下一条消息正常产出
        let messages = decoder.decode(b"tail\nSPEED:9\n");
        assert_eq!(messages.as_slice(), ["SPEED:9"]);
    }

    proptest! {
        #[test]
        fn prop_partition_does_not_change_output(
            data in proptest::collection::vec(
                prop_oneof![Just(b'\n'), Just(b'\r'), Just(b' '), b'0'..=b'z'],
                0..256,
            ),
            cuts in proptest::collection::vec(0usize..256, 0..16),
        ) {
            let mut whole = LineDecoder::new();
            let expected: Vec<String> = whole.decode(&data).into_iter().collect();

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c.min(data.len())).collect();
            points.push(0);
            points.push(data.len());
            points.sort_unstable();

            let mut split = LineDecoder::new();
            let mut actual = Vec::new();
            for pair in points.windows(2) {
                actual.extend(split.decode(&data[pair[0]..pair[1]]));
            }

            prop_assert_eq!(actual, expected);
            prop_assert_eq!(split.pending(), whole.pending());
        }

        #[test]
        fn prop_pending_never_holds_a_delimiter(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut decoder = LineDecoder::new();
            let _ = decoder.decode(&data);
            prop_assert!(!decoder.pending().iter().any(|b| DELIMITERS.contains(b)));
        }
    }
}
