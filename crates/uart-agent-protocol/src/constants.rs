//! 协议常量定义
//!
//! 集中定义控制字符和帧格式相关常量，避免在代码中散落"魔法数"。

/// Start of Header
pub const SOH: u8 = 0x01;
/// Start of Text（负载开始）
pub const STX: u8 = 0x02;
/// End of Text（负载结束，CRC 开始）
pub const ETX: u8 = 0x03;
/// End of Transmission（帧结束）
pub const EOT: u8 = 0x04;
/// 填充字节（Substitute）
pub const SUB: u8 = 0x1A;

/// 所有控制字符（负载中不允许出现）
pub const CONTROL_BYTES: [u8; 5] = [SOH, STX, ETX, EOT, SUB];

/// 帧头中分隔 `sec` 和 `nsec` 的字节
pub const HEADER_SEPARATOR: u8 = b'\t';

/// 填充后的负载长度必须是该值的整数倍
pub const PAYLOAD_ALIGNMENT: usize = 4;

/// CRC 字段长度（8 位大写十六进制）
pub const CRC_FIELD_LEN: usize = 8;

/// `sec` 字段最小宽度（零填充）
pub const SEC_FIELD_WIDTH: usize = 7;

/// `nsec` 字段最小宽度（零填充）
pub const NSEC_FIELD_WIDTH: usize = 9;

/// 帧头最大长度：`-2147483648\t4294967295`
pub const MAX_HEADER_LEN: usize = 11 + 1 + 10;

/// 判断是否为控制字符
#[inline]
pub const fn is_control_byte(byte: u8) -> bool {
    matches!(byte, SOH | STX | ETX | EOT | SUB)
}
