//! Mock 后端（无硬件依赖）
//!
//! 用内存通道模拟一个已配对设备，测试可以通过 [`MockDevice`] 句柄
//! 注入入站数据、模拟断线和故障，并检查写出的数据和开/关次数。

use crate::{Channel, ChannelProvider, ChannelReader, DeviceInfo, LinkError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// 可注入的打开失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 枚举/打开时权限被拒绝
    PermissionDenied,
    /// 打开时 IO 故障
    Io,
}

impl MockFailure {
    fn to_error(self) -> LinkError {
        match self {
            MockFailure::PermissionDenied => {
                LinkError::PermissionDenied("mock permission denied".to_string())
            },
            MockFailure::Io => LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock connection refused",
            )),
        }
    }
}

/// 通道生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    Open,
    Close,
}

enum Inbound {
    Data(Vec<u8>),
    HangUp,
    Error(String),
}

#[derive(Default)]
struct MockShared {
    bonded: Vec<DeviceInfo>,
    discover_failure: Option<MockFailure>,
    open_failure: Option<MockFailure>,
    reader_failure: bool,
    write_failure: bool,
    opens: usize,
    closes: usize,
    written: Vec<Vec<u8>>,
    /// 按发生顺序记录的生命周期事件
    events: Vec<MockEvent>,
    /// 当前连接的入站发送端，关闭通道时置空
    inbound: Option<Sender<Inbound>>,
}

/// 测试侧的设备句柄（可克隆）
#[derive(Clone)]
pub struct MockDevice {
    shared: Arc<Mutex<MockShared>>,
}

impl MockDevice {
    /// 向当前连接推送一块入站数据
    ///
    /// 没有打开的连接时返回 `false`。
    pub fn push(&self, bytes: impl AsRef<[u8]>) -> bool {
        self.send_event(Inbound::Data(bytes.as_ref().to_vec()))
    }

    /// 模拟对端关闭（读端返回 `Ok(0)`）
    pub fn hang_up(&self) -> bool {
        self.send_event(Inbound::HangUp)
    }

    /// 模拟读故障
    pub fn fail_read(&self, message: impl Into<String>) -> bool {
        self.send_event(Inbound::Error(message.into()))
    }

    fn send_event(&self, event: Inbound) -> bool {
        let shared = self.shared.lock();
        match &shared.inbound {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// 设置设备枚举失败
    pub fn set_discover_failure(&self, failure: Option<MockFailure>) {
        self.shared.lock().discover_failure = failure;
    }

    /// 设置打开失败
    pub fn set_open_failure(&self, failure: Option<MockFailure>) {
        self.shared.lock().open_failure = failure;
    }

    /// 设置分离读端失败（通道已打开，随后需要被关闭）
    pub fn set_reader_failure(&self, fail: bool) {
        self.shared.lock().reader_failure = fail;
    }

    /// 设置写失败
    pub fn set_write_failure(&self, fail: bool) {
        self.shared.lock().write_failure = fail;
    }

    /// 通道被打开的次数
    pub fn opens(&self) -> usize {
        self.shared.lock().opens
    }

    /// 通道被关闭的次数（重复关闭同一通道只计一次）
    pub fn closes(&self) -> usize {
        self.shared.lock().closes
    }

    /// 开/关事件序列（按发生顺序）
    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.lock().events.clone()
    }

    /// 是否存在打开的连接
    pub fn is_open(&self) -> bool {
        self.shared.lock().inbound.is_some()
    }

    /// 写出的所有数据（按写入顺序）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.lock().written.clone()
    }

    /// 写出的数据（按 UTF-8 有损转换）
    pub fn written_text(&self) -> Vec<String> {
        self.shared
            .lock()
            .written
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }
}

/// Mock 通道提供者
pub struct MockChannelProvider {
    shared: Arc<Mutex<MockShared>>,
}

impl MockChannelProvider {
    /// 创建带有一个已配对设备的提供者
    pub fn with_device(name: impl Into<String>) -> (Self, MockDevice) {
        Self::with_devices(vec![DeviceInfo::new(name, "mock:0")])
    }

    /// 创建带有给定已配对设备列表的提供者
    pub fn with_devices(bonded: Vec<DeviceInfo>) -> (Self, MockDevice) {
        let shared = Arc::new(Mutex::new(MockShared {
            bonded,
            ..Default::default()
        }));
        (
            Self {
                shared: shared.clone(),
            },
            MockDevice { shared },
        )
    }
}

impl ChannelProvider for MockChannelProvider {
    type Channel = MockChannel;

    fn bonded_devices(&mut self) -> Result<Vec<DeviceInfo>, LinkError> {
        let shared = self.shared.lock();
        if let Some(failure) = shared.discover_failure {
            return Err(failure.to_error());
        }
        Ok(shared.bonded.clone())
    }

    fn open(&mut self, _device: &DeviceInfo) -> Result<Self::Channel, LinkError> {
        let mut shared = self.shared.lock();
        if let Some(failure) = shared.open_failure {
            return Err(failure.to_error());
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        shared.inbound = Some(tx);
        shared.opens += 1;
        shared.events.push(MockEvent::Open);
        Ok(MockChannel {
            shared: self.shared.clone(),
            rx: Some(rx),
            open: true,
        })
    }
}

/// Mock 通道（写端）
pub struct MockChannel {
    shared: Arc<Mutex<MockShared>>,
    rx: Option<Receiver<Inbound>>,
    open: bool,
}

impl Channel for MockChannel {
    type Reader = MockReader;

    fn reader(&mut self, read_timeout: Duration) -> Result<Self::Reader, LinkError> {
        if self.shared.lock().reader_failure {
            return Err(LinkError::Io(std::io::Error::other("mock reader failure")));
        }
        let rx = self.rx.take().ok_or(LinkError::Closed)?;
        Ok(MockReader {
            rx,
            pending: Vec::new(),
            read_timeout,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if !self.open {
            return Err(LinkError::Closed);
        }
        let mut shared = self.shared.lock();
        if shared.write_failure {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        shared.written.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut shared = self.shared.lock();
        shared.inbound = None;
        shared.closes += 1;
        shared.events.push(MockEvent::Close);
        Ok(())
    }
}

/// Mock 通道（读端）
pub struct MockReader {
    rx: Receiver<Inbound>,
    /// 上一块数据中没能放进 `buf` 的剩余部分
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl ChannelReader for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(Inbound::Data(data)) => self.pending = data,
                Ok(Inbound::HangUp) => return Ok(0),
                Ok(Inbound::Error(message)) => {
                    return Err(LinkError::Io(std::io::Error::other(message)));
                },
                Err(RecvTimeoutError::Timeout) => return Err(LinkError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}
