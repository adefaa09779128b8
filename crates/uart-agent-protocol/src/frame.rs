//! 帧编码/解码
//!
//! ```text
//! SOH <sec>\t<nsec> STX <payload><SUB>* ETX <CRC32 hex> EOT
//! ```
//!
//! - 负载填充 `SUB` 至 4 字节对齐，CRC32 覆盖填充后的负载（含填充字节）
//! - CRC 字段固定 8 位大写十六进制
//! - 编码器不做截断：容量不足时返回 `BufferTooSmall`

use crate::constants::*;
use crate::crc::{Crc32Digest, crc32};
use crate::{ProtocolError, Timestamp};

/// 除帧头和负载外的固定开销：SOH + STX + ETX + CRC + EOT
const FRAMING_OVERHEAD: usize = 1 + 1 + 1 + CRC_FIELD_LEN + 1;

/// 解码成功的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSample {
    /// 负载（已去除尾部填充字节）
    pub payload: Vec<u8>,
    /// 帧头时间戳
    pub stamp: Timestamp,
}

/// 负载填充后的长度
#[inline]
pub const fn padded_len(payload_len: usize) -> usize {
    payload_len.div_ceil(PAYLOAD_ALIGNMENT) * PAYLOAD_ALIGNMENT
}

/// 任意时间戳下，给定负载长度的帧最大字节数
///
/// 调用方可以据此预分配缓冲区：`max_frame_len(n)` 对所有
/// `Timestamp` 都足够，`encode_frame` 永远不会因此返回 `BufferTooSmall`。
///
/// ```
/// use uart_agent_protocol::max_frame_len;
///
/// // 15 字节遥测负载 -> 填充到 16 字节
/// assert_eq!(max_frame_len(15), 16 + 22 + 12);
/// ```
#[inline]
pub const fn max_frame_len(payload_len: usize) -> usize {
    padded_len(payload_len) + MAX_HEADER_LEN + FRAMING_OVERHEAD
}

/// 给定负载长度和时间戳时帧的精确字节数
pub fn frame_len(payload_len: usize, stamp: Timestamp) -> usize {
    padded_len(payload_len) + header(stamp).len() + FRAMING_OVERHEAD
}

fn header(stamp: Timestamp) -> String {
    format!(
        "{:0sec_w$}\t{:0nsec_w$}",
        stamp.sec,
        stamp.nsec,
        sec_w = SEC_FIELD_WIDTH,
        nsec_w = NSEC_FIELD_WIDTH
    )
}

/// CRC 值格式化为 8 位大写十六进制
pub fn crc_hex(crc: u32) -> [u8; CRC_FIELD_LEN] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = [0u8; CRC_FIELD_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = (CRC_FIELD_LEN - 1 - i) * 4;
        *slot = DIGITS[((crc >> shift) & 0xF) as usize];
    }
    out
}

fn check_payload(payload: &[u8]) -> Result<(), ProtocolError> {
    match payload.iter().position(|&b| is_control_byte(b)) {
        Some(offset) => Err(ProtocolError::InvalidPayload {
            byte: payload[offset],
            offset,
        }),
        None => Ok(()),
    }
}

/// 编码一帧到 `buf`，返回写入的字节数
///
/// # 错误
/// - `InvalidPayload`: 负载包含控制字符
/// - `BufferTooSmall`: `buf` 容量不足（不写入任何字节）
///
/// # Example
///
/// ```
/// use uart_agent_protocol::{Timestamp, encode_frame, max_frame_len};
///
/// let payload = b"1955\t0890\t3020\n";
/// let mut buf = [0u8; max_frame_len(15)];
/// let len = encode_frame(payload, Timestamp::new(12, 345), &mut buf).unwrap();
/// assert_eq!(&buf[..19], b"\x010000012\t000000345\x02");
/// assert_eq!(buf[len - 1], 0x04);
/// ```
pub fn encode_frame(
    payload: &[u8],
    stamp: Timestamp,
    buf: &mut [u8],
) -> Result<usize, ProtocolError> {
    check_payload(payload)?;

    let header = header(stamp);
    let padded = padded_len(payload.len());
    let required = padded + header.len() + FRAMING_OVERHEAD;
    if buf.len() < required {
        return Err(ProtocolError::BufferTooSmall {
            required,
            available: buf.len(),
        });
    }

    let padding = [SUB; PAYLOAD_ALIGNMENT];
    let pad = &padding[..padded - payload.len()];

    let mut digest = Crc32Digest::new();
    digest.update(payload);
    digest.update(pad);
    let crc = crc_hex(digest.finalize());

    let parts: [&[u8]; 8] = [
        &[SOH],
        header.as_bytes(),
        &[STX],
        payload,
        pad,
        &[ETX],
        &crc,
        &[EOT],
    ];
    let mut pos = 0;
    for part in parts {
        buf[pos..pos + part.len()].copy_from_slice(part);
        pos += part.len();
    }
    debug_assert_eq!(pos, required);

    Ok(required)
}

/// 编码一帧到新分配的 `Vec`（精确容量）
pub fn encode_frame_to_vec(payload: &[u8], stamp: Timestamp) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; frame_len(payload.len(), stamp)];
    let len = encode_frame(payload, stamp, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

fn find_from(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == needle).map(|i| i + from)
}

/// 时间戳字段只允许十进制数字和可选的前导 `-`
fn parse_field<T: std::str::FromStr>(field: &[u8]) -> Option<T> {
    if field.first() == Some(&b'+') {
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}

/// 解码一帧
///
/// 输入可以是任意字节序列：依次定位 SOH、STX、ETX、EOT（均需存在且有序），
/// 解析帧头时间戳，并校验填充后负载的 CRC32。
///
/// # 错误
/// - `MalformedFrame`: 控制字符缺失/乱序，或时间戳字段无法解析为整数
/// - `ChecksumMismatch`: CRC 字段与重新计算的值不一致
pub fn decode_frame(bytes: &[u8]) -> Result<DecodedSample, ProtocolError> {
    let soh = find_from(bytes, 0, SOH).ok_or(ProtocolError::MalformedFrame("missing SOH"))?;
    let stx =
        find_from(bytes, soh + 1, STX).ok_or(ProtocolError::MalformedFrame("missing STX"))?;
    let etx =
        find_from(bytes, stx + 1, ETX).ok_or(ProtocolError::MalformedFrame("missing ETX"))?;
    let eot =
        find_from(bytes, etx + 1, EOT).ok_or(ProtocolError::MalformedFrame("missing EOT"))?;

    let header = &bytes[soh + 1..stx];
    let tab = header
        .iter()
        .position(|&b| b == HEADER_SEPARATOR)
        .ok_or(ProtocolError::MalformedFrame("missing header separator"))?;
    let sec: i32 = parse_field(&header[..tab])
        .ok_or(ProtocolError::MalformedFrame("invalid sec field"))?;
    let nsec: u32 = parse_field(&header[tab + 1..])
        .ok_or(ProtocolError::MalformedFrame("invalid nsec field"))?;

    let padded = &bytes[stx + 1..etx];
    let received = &bytes[etx + 1..eot];
    let expected = crc32(padded);
    if received != crc_hex(expected) {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            received: String::from_utf8_lossy(received).into_owned(),
        });
    }

    let payload_len = padded
        .iter()
        .rposition(|&b| b != SUB)
        .map_or(0, |i| i + 1);

    Ok(DecodedSample {
        payload: padded[..payload_len].to_vec(),
        stamp: Timestamp::new(sec, nsec),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TELEMETRY: &[u8] = b"1955\t0890\t3020\n";

    fn encode(payload: &[u8], sec: i32, nsec: u32) -> Vec<u8> {
        encode_frame_to_vec(payload, Timestamp::new(sec, nsec)).unwrap()
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(4), 4);
        assert_eq!(padded_len(15), 16);
        assert_eq!(padded_len(121), 124);
    }

    #[test]
    fn test_crc_hex() {
        assert_eq!(&crc_hex(0xCBF43926), b"CBF43926");
        assert_eq!(&crc_hex(0x1A), b"0000001A");
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode(TELEMETRY, 1_574_812, 5);

        let mut expected = vec![SOH];
        expected.extend_from_slice(b"1574812\t000000005");
        expected.push(STX);
        expected.extend_from_slice(TELEMETRY);
        expected.push(SUB);
        expected.push(ETX);
        let mut padded = TELEMETRY.to_vec();
        padded.push(SUB);
        expected.extend_from_slice(format!("{:08X}", crc32(&padded)).as_bytes());
        expected.push(EOT);

        assert_eq!(frame, expected);
        assert_eq!(frame.len(), frame_len(TELEMETRY.len(), Timestamp::new(1_574_812, 5)));
    }

    #[test]
    fn test_encode_empty_payload() {
        let frame = encode(b"", 0, 0);
        assert_eq!(frame, b"\x010000000\t000000000\x02\x0300000000\x04");
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 16];
        let err = encode_frame(TELEMETRY, Timestamp::new(1, 2), &mut buf).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::BufferTooSmall {
                required: frame_len(TELEMETRY.len(), Timestamp::new(1, 2)),
                available: 16,
            }
        );
        // 不写入任何字节
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn test_encode_exact_capacity() {
        let stamp = Timestamp::new(7, 8);
        let mut buf = vec![0u8; frame_len(3, stamp)];
        assert_eq!(encode_frame(b"abc", stamp, &mut buf), Ok(buf.len()));
    }

    #[test]
    fn test_max_frame_len_covers_extremes() {
        for stamp in [
            Timestamp::new(i32::MIN, u32::MAX),
            Timestamp::new(i32::MAX, u32::MAX),
            Timestamp::new(0, 0),
        ] {
            assert!(frame_len(121, stamp) <= max_frame_len(121));
        }
        assert_eq!(
            frame_len(121, Timestamp::new(i32::MIN, u32::MAX)),
            max_frame_len(121)
        );
    }

    #[test]
    fn test_encode_rejects_control_bytes() {
        let err = encode_frame_to_vec(b"12\x0334", Timestamp::default()).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidPayload { byte: ETX, offset: 2 });

        let err = encode_frame_to_vec(b"\x1a", Timestamp::default()).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidPayload { byte: SUB, offset: 0 });
    }

    #[test]
    fn test_decode_roundtrip() {
        let frame = encode(TELEMETRY, 42, 999_999_999);
        let sample = decode_frame(&frame).unwrap();
        assert_eq!(sample.payload, TELEMETRY);
        assert_eq!(sample.stamp, Timestamp::new(42, 999_999_999));
    }

    #[test]
    fn test_decode_negative_sec() {
        let frame = encode(b"x", -5, 1);
        assert!(frame.starts_with(b"\x01-000005\t000000001"));
        let sample = decode_frame(&frame).unwrap();
        assert_eq!(sample.stamp, Timestamp::new(-5, 1));
    }

    #[test]
    fn test_decode_ignores_leading_garbage() {
        let mut bytes = b"noise\x04\x03".to_vec();
        bytes.extend(encode(TELEMETRY, 1, 2));
        let sample = decode_frame(&bytes).unwrap();
        assert_eq!(sample.payload, TELEMETRY);
    }

    #[test]
    fn test_decode_missing_control_bytes() {
        let frame = encode(TELEMETRY, 1, 2);
        for control in [SOH, STX, ETX, EOT] {
            let stripped: Vec<u8> = frame.iter().copied().filter(|&b| b != control).collect();
            assert!(
                matches!(decode_frame(&stripped), Err(ProtocolError::MalformedFrame(_))),
                "control byte 0x{control:02X} removed"
            );
        }
        assert!(matches!(
            decode_frame(&[]),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_out_of_order() {
        // EOT 在 ETX 之前
        let bytes = b"\x011\t2\x02abcd\x04\x03CRC";
        assert!(matches!(
            decode_frame(bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
        // STX 在 SOH 之前
        let bytes = b"\x02abcd\x011\t2\x0300000000\x04";
        assert!(matches!(
            decode_frame(bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_bad_header() {
        let payload = b"abcd";
        let crc = format!("{:08X}", crc32(payload));
        for header in [&b"12"[..], b"x\t1", b"1\ty", b"1.5\t2", b"\t", b"1\t-2"] {
            let mut bytes = vec![SOH];
            bytes.extend_from_slice(header);
            bytes.push(STX);
            bytes.extend_from_slice(payload);
            bytes.push(ETX);
            bytes.extend_from_slice(crc.as_bytes());
            bytes.push(EOT);
            assert!(
                matches!(decode_frame(&bytes), Err(ProtocolError::MalformedFrame(_))),
                "header {:?}",
                String::from_utf8_lossy(header)
            );
        }
    }

    #[test]
    fn test_decode_rejects_plus_sign() {
        let payload = b"abcd";
        let crc = format!("{:08X}", crc32(payload));
        for header in [&b"+000005\t000000000"[..], b"5\t+00000000"] {
            let mut bytes = vec![SOH];
            bytes.extend_from_slice(header);
            bytes.push(STX);
            bytes.extend_from_slice(payload);
            bytes.push(ETX);
            bytes.extend_from_slice(crc.as_bytes());
            bytes.push(EOT);
            assert!(matches!(
                decode_frame(&bytes),
                Err(ProtocolError::MalformedFrame("invalid sec field" | "invalid nsec field"))
            ));
        }
    }

    #[test]
    fn test_decode_lowercase_crc_rejected() {
        let payload = b"abcd";
        let crc = format!("{:08x}", crc32(payload));
        assert!(crc.chars().any(|c| c.is_ascii_lowercase()));
        let mut bytes = b"\x011\t2\x02abcd\x03".to_vec();
        bytes.extend_from_slice(crc.as_bytes());
        bytes.push(EOT);
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut frame = encode(TELEMETRY, 1, 2);
        let stx = frame.iter().position(|&b| b == STX).unwrap();
        frame[stx + 1] = b'9';
        match decode_frame(&frame) {
            Err(ProtocolError::ChecksumMismatch { received, .. }) => assert_eq!(received.len(), 8),
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }
}
