//! 负载格式
//!
//! - 遥测（下位机 -> 上位机）：`<adc1:4>\t<adc2:4>\t<adc3:4>\n`，共 15 字节
//! - 指令（上位机 -> 下位机）：每个关节目标值按 C `"% 08f"` 格式化，
//!   以 `\t` 分隔、`\n` 结尾

use crate::ProtocolError;

/// 关节数量
pub const JOINT_COUNT: usize = 3;

/// 单个遥测字段宽度（4 位数字 + 1 位分隔符）
pub const SAMPLE_FIELD_WIDTH: usize = 5;

/// 遥测负载长度
pub const SAMPLE_PAYLOAD_LEN: usize = SAMPLE_FIELD_WIDTH * JOINT_COUNT;

/// 一次遥测的原始 ADC 读数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSample {
    /// 各关节 ADC 读数（按关节顺序）
    pub raw: [u16; JOINT_COUNT],
}

impl AdcSample {
    /// 解析固定宽度遥测负载
    ///
    /// 偏移 4、9 必须是 `\t`，偏移 14 必须是 `\n`；
    /// 数字字段允许用 ASCII 空格补齐。
    ///
    /// # Example
    ///
    /// ```
    /// use uart_agent_protocol::AdcSample;
    ///
    /// let sample = AdcSample::parse(b"0890\t1955\t3020\n").unwrap();
    /// assert_eq!(sample.raw, [890, 1955, 3020]);
    /// ```
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != SAMPLE_PAYLOAD_LEN {
            return Err(ProtocolError::InvalidSampleFormat("expected 15 bytes"));
        }

        let mut raw = [0u16; JOINT_COUNT];
        for (i, field) in payload.chunks_exact(SAMPLE_FIELD_WIDTH).enumerate() {
            let (digits, separator) = field.split_at(SAMPLE_FIELD_WIDTH - 1);
            let expected = if i == JOINT_COUNT - 1 { b'\n' } else { b'\t' };
            if separator[0] != expected {
                return Err(ProtocolError::InvalidSampleFormat(if expected == b'\n' {
                    "missing newline at offset 14"
                } else {
                    "missing tab separator"
                }));
            }
            raw[i] = parse_adc(digits)?;
        }

        Ok(Self { raw })
    }

    /// 编码为遥测负载（下位机侧格式，用于测试和回放）
    pub fn to_payload(&self) -> [u8; SAMPLE_PAYLOAD_LEN] {
        let mut out = [0u8; SAMPLE_PAYLOAD_LEN];
        for (i, value) in self.raw.iter().enumerate() {
            let field = format!("{:04}", (*value).min(9999));
            let start = i * SAMPLE_FIELD_WIDTH;
            out[start..start + 4].copy_from_slice(field.as_bytes());
            out[start + 4] = if i == JOINT_COUNT - 1 { b'\n' } else { b'\t' };
        }
        out
    }
}

fn parse_adc(digits: &[u8]) -> Result<u16, ProtocolError> {
    let trimmed = digits.trim_ascii();
    if trimmed.is_empty() || !trimmed.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::InvalidSampleFormat("non-decimal ADC field"));
    }
    trimmed.iter().try_fold(0u16, |acc, &d| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add((d - b'0') as u16))
            .ok_or(ProtocolError::InvalidSampleFormat("ADC field overflow"))
    })
}

/// 格式化单个关节目标值（等价于 C `"% 08f"`）
///
/// 符号位为空格或 `-`，总宽度至少 8，6 位小数。
pub fn format_goal(goal: f64) -> String {
    let sign = if goal.is_sign_negative() { '-' } else { ' ' };
    format!("{sign}{:07.6}", goal.abs())
}

/// 编码关节目标指令负载
///
/// # 错误
/// - `InvalidCommand`: 目标值不是有限数
///
/// # Example
///
/// ```
/// use uart_agent_protocol::encode_goals;
///
/// let payload = encode_goals(&[1.5, -0.25, 0.0]).unwrap();
/// assert_eq!(payload, b" 1.500000\t-0.250000\t 0.000000\n");
/// ```
pub fn encode_goals(goals: &[f64]) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = Vec::with_capacity(goals.len() * 10);
    for (i, goal) in goals.iter().enumerate() {
        if !goal.is_finite() {
            return Err(ProtocolError::InvalidCommand(format!(
                "goal {i} is not finite: {goal}"
            )));
        }
        payload.extend_from_slice(format_goal(*goal).as_bytes());
        payload.push(if i + 1 == goals.len() { b'\n' } else { b'\t' });
    }
    Ok(payload)
}
