//! TCP 桥接后端
//!
//! 把串口/RFCOMM 设备桥接到 `host:port`（例如 `ser2net` 或设备自带的 WiFi 透传）。
//! “已配对设备”列表由配置给出，每项把设备名映射到一个桥接地址。

use crate::{Channel, ChannelProvider, ChannelReader, DeviceInfo, LinkError};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// TCP 桥接通道提供者
pub struct TcpChannelProvider {
    endpoints: Vec<DeviceInfo>,
    connect_timeout: Duration,
}

impl TcpChannelProvider {
    /// 默认连接超时
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// 创建提供者
    ///
    /// # 参数
    /// - `endpoints`: 设备名到 `host:port` 的映射，`address` 字段为桥接地址
    pub fn new(endpoints: Vec<DeviceInfo>) -> Self {
        Self {
            endpoints,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// 设置连接超时
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl ChannelProvider for TcpChannelProvider {
    type Channel = TcpChannel;

    fn bonded_devices(&mut self) -> Result<Vec<DeviceInfo>, LinkError> {
        Ok(self.endpoints.clone())
    }

    fn open(&mut self, device: &DeviceInfo) -> Result<Self::Channel, LinkError> {
        let addr = device
            .address
            .to_socket_addrs()
            .map_err(LinkError::from_io)?
            .next()
            .ok_or_else(|| {
                LinkError::Io(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("address {} did not resolve", device.address),
                ))
            })?;

        debug!("Connecting to {} at {}", device.name, addr);
        let stream =
            TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(LinkError::from_io)?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY on {}: {}", addr, e);
        }
        info!("Opened TCP bridge channel to {} ({})", device.name, addr);

        Ok(TcpChannel {
            stream,
            closed: false,
        })
    }
}

/// TCP 桥接通道（写端）
pub struct TcpChannel {
    stream: TcpStream,
    closed: bool,
}

impl Channel for TcpChannel {
    type Reader = TcpReader;

    fn reader(&mut self, read_timeout: Duration) -> Result<Self::Reader, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        let stream = self.stream.try_clone().map_err(LinkError::from_io)?;
        // 零超时在 std 中是非法值
        let timeout = read_timeout.max(Duration::from_millis(1));
        stream.set_read_timeout(Some(timeout)).map_err(LinkError::from_io)?;
        Ok(TcpReader { stream })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        self.stream.write_all(bytes).map_err(LinkError::from_io)?;
        self.stream.flush().map_err(LinkError::from_io)
    }

    fn close(&mut self) -> Result<(), LinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // 对端已经断开
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(LinkError::Io(e)),
        }
    }
}

/// TCP 桥接通道（读端）
pub struct TcpReader {
    stream: TcpStream,
}

impl ChannelReader for TcpReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        loop {
            match self.stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::from_io(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_roundtrip_through_bridge() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"SPEED:42\n").unwrap();
            let mut buf = [0u8; 2];
            socket.read_exact(&mut buf).unwrap();
            buf
        });

        let mut provider =
            TcpChannelProvider::new(vec![DeviceInfo::new("ESP32_BT", addr.to_string())]);
        let device = provider.discover("ESP32_BT").unwrap().unwrap();
        let mut channel = provider.open(&device).unwrap();
        let mut reader = channel.reader(Duration::from_millis(500)).unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while !received.ends_with(b"\n") {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(LinkError::Timeout) => continue,
                Err(e) => panic!("unexpected read error: {}", e),
            }
        }
        assert_eq!(received, b"SPEED:42\n");

        channel.write(b"60").unwrap();
        assert_eq!(&server.join().unwrap(), b"60");

        channel.close().unwrap();
        // 重复关闭无副作用
        channel.close().unwrap();
        assert!(matches!(channel.write(b"x"), Err(LinkError::Closed)));
    }

    #[test]
    fn test_read_times_out_without_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || listener.accept().map(|(s, _)| s));

        let mut provider = TcpChannelProvider::new(vec![DeviceInfo::new("dev", addr.to_string())]);
        let device = provider.discover("dev").unwrap().unwrap();
        let mut channel = provider.open(&device).unwrap();
        let mut reader = channel.reader(Duration::from_millis(20)).unwrap();

        let _socket = server.join().unwrap().unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(reader.read(&mut buf), Err(LinkError::Timeout)));
    }

    #[test]
    fn test_open_refused_is_io_error() {
        // 绑定后立即释放，得到一个大概率无人监听的端口
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let mut provider = TcpChannelProvider::new(vec![DeviceInfo::new("dev", addr.to_string())])
            .with_connect_timeout(Duration::from_millis(200));
        let device = provider.discover("dev").unwrap().unwrap();
        assert!(provider.open(&device).is_err());
    }
}
