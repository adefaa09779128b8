//! # UART Agent Protocol
//!
//! 机械臂 UART 串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 控制字符与帧格式常量
//! - `crc`: CRC32 校验（查表法，懒加载）
//! - `frame`: 帧编码/解码
//! - `payload`: 负载格式（关节遥测 ADC 采样、关节目标指令）
//!
//! ## 帧格式
//!
//! ```text
//! 0x01 <sec:7位> '\t' <nsec:9位> 0x02 <payload> <0x1A 填充>* 0x03 <crc:8位大写十六进制> 0x04
//! ```
//!
//! 协议为固定用途（仅关节遥测/指令），不做版本化，也不保证送达。

pub mod constants;
pub mod crc;
pub mod frame;
pub mod payload;

// 重新导出常用类型
pub use constants::*;
pub use crc::{Crc32Digest, crc32};
pub use frame::{
    DecodedSample, decode_frame, encode_frame, encode_frame_to_vec, frame_len, max_frame_len,
};
pub use payload::{AdcSample, encode_goals};

use thiserror::Error;

/// 帧时间戳（秒 + 纳秒）
///
/// 与上游消息总线的 `stamp` 字段一一对应，`sec` 为有符号数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    /// 秒
    pub sec: i32,
    /// 纳秒
    pub nsec: u32,
}

impl Timestamp {
    pub const fn new(sec: i32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// 相对 `earlier` 经过的纳秒数（可能为负）
    pub fn nanos_since(&self, earlier: &Timestamp) -> i64 {
        (self.sec as i64 - earlier.sec as i64) * 1_000_000_000
            + (self.nsec as i64 - earlier.nsec as i64)
    }
}

/// 协议编解码错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 目标缓冲区容量不足（调用方错误，不做截断）
    #[error("Buffer too small: required {required} bytes, available {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// 控制字符缺失/乱序，或帧头字段无法解析
    #[error("Malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// CRC 校验失败
    #[error("Checksum mismatch: expected {expected:08X}, received {received:?}")]
    ChecksumMismatch { expected: u32, received: String },

    /// 负载中包含控制字符
    #[error("Invalid payload: control byte 0x{byte:02X} at offset {offset}")]
    InvalidPayload { byte: u8, offset: usize },

    /// 遥测负载不符合固定宽度关节格式
    #[error("Invalid sample format: {0}")]
    InvalidSampleFormat(&'static str),

    /// 关节指令无法编码
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_since() {
        let a = Timestamp::new(10, 900_000_000);
        let b = Timestamp::new(11, 100_000_000);
        assert_eq!(b.nanos_since(&a), 200_000_000);
        assert_eq!(a.nanos_since(&b), -200_000_000);
        assert_eq!(a.nanos_since(&a), 0);
    }

    #[test]
    fn test_nanos_since_extremes() {
        let a = Timestamp::new(i32::MIN, 0);
        let b = Timestamp::new(i32::MAX, u32::MAX);
        // 不应溢出 i64
        assert!(b.nanos_since(&a) > 0);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::BufferTooSmall {
            required: 48,
            available: 16,
        };
        assert_eq!(
            err.to_string(),
            "Buffer too small: required 48 bytes, available 16"
        );

        let err = ProtocolError::ChecksumMismatch {
            expected: 0xCBF43926,
            received: "00000000".to_string(),
        };
        assert!(err.to_string().contains("CBF43926"));
    }
}
