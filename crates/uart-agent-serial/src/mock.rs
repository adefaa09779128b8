//! Mock 串口（无硬件依赖）
//!
//! `MockTransport` 与 `MockHandle` 共享同一块内存：测试通过 handle 注入
//! 下位机发来的字节、读取上位机写出的字节，或模拟设备断开。

use crate::{RxTransport, SerialError, SerialTransport, TxTransport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct MockState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    disconnected: bool,
}

/// 测试侧句柄
#[derive(Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// 注入待读取的字节
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().incoming.extend(bytes.iter().copied());
    }

    /// 尚未被读取的字节数
    pub fn pending(&self) -> usize {
        self.state.lock().incoming.len()
    }

    /// 已写出的全部字节
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// 取出并清空已写出的字节
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().written)
    }

    /// 模拟设备断开：之后所有读写都返回 `SerialError::Disconnected`
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }
}

/// 模拟串口
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                state: handle.state.clone(),
            },
            handle,
        )
    }
}

fn bytes_available(state: &Mutex<MockState>) -> Result<bool, SerialError> {
    let state = state.lock();
    if state.disconnected {
        return Err(SerialError::Disconnected);
    }
    Ok(!state.incoming.is_empty())
}

fn read_byte(state: &Mutex<MockState>) -> Result<u8, SerialError> {
    let mut state = state.lock();
    if state.disconnected {
        return Err(SerialError::Disconnected);
    }
    state.incoming.pop_front().ok_or(SerialError::Timeout)
}

fn write(state: &Mutex<MockState>, bytes: &[u8]) -> Result<(), SerialError> {
    let mut state = state.lock();
    if state.disconnected {
        return Err(SerialError::Disconnected);
    }
    state.written.extend_from_slice(bytes);
    Ok(())
}

impl RxTransport for MockTransport {
    fn bytes_available(&mut self) -> Result<bool, SerialError> {
        bytes_available(&self.state)
    }

    fn read_byte(&mut self) -> Result<u8, SerialError> {
        read_byte(&self.state)
    }
}

impl TxTransport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write(&self.state, bytes)
    }
}

impl SerialTransport for MockTransport {
    type Rx = MockRx;
    type Tx = MockTx;

    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError> {
        Ok((
            MockRx {
                state: self.state.clone(),
            },
            MockTx { state: self.state },
        ))
    }
}

/// 模拟串口接收半部
pub struct MockRx {
    state: Arc<Mutex<MockState>>,
}

impl RxTransport for MockRx {
    fn bytes_available(&mut self) -> Result<bool, SerialError> {
        bytes_available(&self.state)
    }

    fn read_byte(&mut self) -> Result<u8, SerialError> {
        read_byte(&self.state)
    }
}

/// 模拟串口发送半部
pub struct MockTx {
    state: Arc<Mutex<MockState>>,
}

impl TxTransport for MockTx {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write(&self.state, bytes)
    }
}
