//! `serialport` 后端
//!
//! RX 半部内部带一个小缓冲区：每次系统调用读取所有已到达的字节，
//! 再逐字节交给读线程，避免一字节一次 `read()`。

use crate::{RxTransport, SerialConfig, SerialError, SerialTransport, TxTransport};
use serialport::SerialPort;
use std::io::ErrorKind;
use tracing::{debug, info};

const RX_CHUNK: usize = 256;

/// 基于 `serialport` 的串口设备
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    rx: RxBuffer,
}

impl SerialPortTransport {
    /// 按配置打开设备
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        let port = serialport::new(&config.device, config.baud_rate)
            .timeout(config.read_timeout())
            .open()?;
        info!(
            "Opened serial device {} at {} baud",
            config.device, config.baud_rate
        );
        Ok(Self {
            port,
            rx: RxBuffer::new(),
        })
    }
}

struct RxBuffer {
    buf: [u8; RX_CHUNK],
    pos: usize,
    len: usize,
}

impl RxBuffer {
    fn new() -> Self {
        Self {
            buf: [0; RX_CHUNK],
            pos: 0,
            len: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.len
    }

    fn bytes_available(&mut self, port: &mut dyn SerialPort) -> Result<bool, SerialError> {
        if !self.is_empty() {
            return Ok(true);
        }
        Ok(port.bytes_to_read()? > 0)
    }

    fn read_byte(&mut self, port: &mut dyn SerialPort) -> Result<u8, SerialError> {
        if self.is_empty() {
            let wanted = (port.bytes_to_read()? as usize).clamp(1, RX_CHUNK);
            let n = match port.read(&mut self.buf[..wanted]) {
                Ok(0) => return Err(SerialError::Disconnected),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::TimedOut => return Err(SerialError::Timeout),
                Err(e) => return Err(e.into()),
            };
            self.pos = 0;
            self.len = n;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }
}

fn write_all(port: &mut dyn SerialPort, bytes: &[u8]) -> Result<(), SerialError> {
    port.write_all(bytes)?;
    port.flush()?;
    Ok(())
}

impl RxTransport for SerialPortTransport {
    fn bytes_available(&mut self) -> Result<bool, SerialError> {
        self.rx.bytes_available(self.port.as_mut())
    }

    fn read_byte(&mut self) -> Result<u8, SerialError> {
        self.rx.read_byte(self.port.as_mut())
    }
}

impl TxTransport for SerialPortTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write_all(self.port.as_mut(), bytes)
    }
}

impl SerialTransport for SerialPortTransport {
    type Rx = SerialPortRx;
    type Tx = SerialPortTx;

    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError> {
        let tx_port = self.port.try_clone()?;
        debug!("Serial port split into RX/TX halves");
        Ok((
            SerialPortRx {
                port: self.port,
                rx: self.rx,
            },
            SerialPortTx { port: tx_port },
        ))
    }
}

/// 串口接收半部
pub struct SerialPortRx {
    port: Box<dyn SerialPort>,
    rx: RxBuffer,
}

impl RxTransport for SerialPortRx {
    fn bytes_available(&mut self) -> Result<bool, SerialError> {
        self.rx.bytes_available(self.port.as_mut())
    }

    fn read_byte(&mut self) -> Result<u8, SerialError> {
        self.rx.read_byte(self.port.as_mut())
    }
}

/// 串口发送半部
pub struct SerialPortTx {
    port: Box<dyn SerialPort>,
}

impl TxTransport for SerialPortTx {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write_all(self.port.as_mut(), bytes)
    }
}
