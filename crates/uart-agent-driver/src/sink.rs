//! 遥测下游接口
//!
//! 处理线程每估计出一帧关节状态，就调用一次 [`TelemetrySink::publish`]。
//! 消息总线本身不在本 crate 内，调用方可以：
//! - 实现 `TelemetrySink` 接入自己的总线
//! - 直接传入闭包
//! - 使用 [`ChannelSink`] 转发到 crossbeam 通道，在其他线程消费

use crate::estimator::JointState;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::trace;
use uart_agent_protocol::Timestamp;
use uart_agent_protocol::payload::JOINT_COUNT;

/// 发布到总线的关节状态消息
#[derive(Debug, Clone, PartialEq)]
pub struct JointStateMessage {
    pub stamp: Timestamp,
    pub names: [String; JOINT_COUNT],
    /// 关节角度（rad）
    pub position: [f64; JOINT_COUNT],
    /// 关节角速度（rad/s）
    pub velocity: [f64; JOINT_COUNT],
}

impl JointStateMessage {
    pub fn new(names: [String; JOINT_COUNT], state: &JointState) -> Self {
        Self {
            stamp: state.stamp,
            names,
            position: state.position,
            velocity: state.velocity,
        }
    }
}

/// 关节状态下游
///
/// 在处理线程中同步调用，实现应尽快返回；耗时操作请转发到其他线程。
pub trait TelemetrySink: Send + 'static {
    fn publish(&mut self, message: JointStateMessage);
}

impl<F> TelemetrySink for F
where
    F: FnMut(JointStateMessage) + Send + 'static,
{
    fn publish(&mut self, message: JointStateMessage) {
        self(message)
    }
}

/// 基于有界通道的下游
///
/// 通道满时丢弃新消息（不阻塞处理线程）。
pub struct ChannelSink {
    tx: Sender<JointStateMessage>,
}

impl ChannelSink {
    /// 创建容量为 `capacity` 的通道，返回下游和接收端
    pub fn bounded(capacity: usize) -> (Self, Receiver<JointStateMessage>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&mut self, message: JointStateMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => trace!("Telemetry channel full, dropping joint state"),
            Err(TrySendError::Disconnected(_)) => {
                trace!("Telemetry channel disconnected, dropping joint state")
            },
        }
    }
}
