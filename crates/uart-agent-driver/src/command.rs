//! 关节目标指令
//!
//! 总线上的指令消息在这里编码为负载，再交给帧编码器写到串口。

use uart_agent_protocol::{ProtocolError, Timestamp, encode_frame, encode_goals};

/// 指令帧缓冲区大小（字节）
///
/// 超出此大小的指令会以 `BufferTooSmall` 拒绝，不做截断。
pub const COMMAND_FRAME_CAPACITY: usize = 256;

/// 关节目标指令
#[derive(Debug, Clone, PartialEq)]
pub struct JointCommand {
    pub joint_names: Vec<String>,
    /// 目标值（与 `joint_names` 一一对应）
    pub goals: Vec<f64>,
    pub stamp: Timestamp,
}

impl JointCommand {
    pub fn new(joint_names: Vec<String>, goals: Vec<f64>, stamp: Timestamp) -> Self {
        Self {
            joint_names,
            goals,
            stamp,
        }
    }

    /// 编码为指令负载（每个目标 `"% 08f"`，`\t` 分隔，`\n` 结尾）
    pub fn to_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.goals.is_empty() {
            return Err(ProtocolError::InvalidCommand("no goals".to_string()));
        }
        if self.joint_names.len() != self.goals.len() {
            return Err(ProtocolError::InvalidCommand(format!(
                "{} joint names but {} goals",
                self.joint_names.len(),
                self.goals.len()
            )));
        }
        encode_goals(&self.goals)
    }

    /// 编码为完整帧
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let payload = self.to_payload()?;
        let mut buf = [0u8; COMMAND_FRAME_CAPACITY];
        let written = encode_frame(&payload, self.stamp, &mut buf)?;
        Ok(buf[..written].to_vec())
    }
}
