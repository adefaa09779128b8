//! # UART Agent Serial Layer
//!
//! 串口硬件抽象层，提供统一的字节流接口。
//!
//! - `SerialTransport`: 完整的收发接口，可分离为独立的 RX / TX 半部
//! - `serialport` feature: 基于 `serialport` crate 的真实设备后端
//! - `mock` feature: 内存中的模拟串口，用于测试

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "serialport")]
pub mod port;

#[cfg(feature = "serialport")]
pub use port::{SerialPortRx, SerialPortTransport, SerialPortTx};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockRx, MockTransport, MockTx};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serialport")]
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Device disconnected")]
    Disconnected,
}

impl SerialError {
    /// 是否为致命错误（设备断开、权限错误等），收到后 IO 线程应退出
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::Disconnected => true,
            SerialError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
            ),
            #[cfg(feature = "serialport")]
            SerialError::Port(e) => matches!(e.kind(), serialport::ErrorKind::NoDevice),
            SerialError::Timeout => false,
        }
    }
}

/// 串口配置
///
/// 设备路径和波特率由进程配置传入，不在代码中写死。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// 设备路径（如 `/dev/serial0`、`/dev/ttyUSB0`）
    pub device: String,
    /// 波特率
    pub baud_rate: u32,
    /// 单次阻塞读取超时（毫秒）
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/serial0".to_string(),
            baud_rate: 1_000_000,
            read_timeout_ms: 10,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// 接收半部
pub trait RxTransport {
    /// 是否有可读字节（非阻塞）
    fn bytes_available(&mut self) -> Result<bool, SerialError>;

    /// 读取一个字节
    ///
    /// 只应在 `bytes_available()` 返回 `true` 后调用；
    /// 否则实现可以阻塞到读取超时并返回 `SerialError::Timeout`。
    fn read_byte(&mut self) -> Result<u8, SerialError>;
}

/// 发送半部
pub trait TxTransport {
    /// 写出全部字节
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

/// 完整串口传输
///
/// 可分离为独立的 RX / TX 半部：RX 交给读线程独占，
/// TX 留在调用方上下文用于发送指令。
pub trait SerialTransport: RxTransport + TxTransport {
    type Rx: RxTransport + Send + 'static;
    type Tx: TxTransport + Send + 'static;

    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.device, "/dev/serial0");
        assert_eq!(config.baud_rate, 1_000_000);
        assert_eq!(config.read_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn test_serial_config_partial_toml() {
        let config: SerialConfig = toml::from_str(r#"device = "/dev/ttyUSB0""#).unwrap();
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 1_000_000);
    }

    #[test]
    fn test_is_fatal() {
        assert!(SerialError::Disconnected.is_fatal());
        assert!(!SerialError::Timeout.is_fatal());
        assert!(
            SerialError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_fatal()
        );
        assert!(
            !SerialError::Io(std::io::Error::from(std::io::ErrorKind::Interrupted)).is_fatal()
        );
    }

    #[test]
    fn test_serial_error_display() {
        assert_eq!(SerialError::Timeout.to_string(), "Read timeout");
        assert_eq!(SerialError::Disconnected.to_string(), "Device disconnected");
    }
}
