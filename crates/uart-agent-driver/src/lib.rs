//! 驱动层模块
//!
//! 本模块提供 UART 机械臂 Agent 的运行时功能，包括：
//! - 读线程 / 处理线程管理（单槽邮箱交接，新帧覆盖旧帧）
//! - 关节状态估计（ADC 标定 + 滑动窗口速度）
//! - 关节目标指令编码与发送
//! - 链路指标（原子计数器）
//!
//! # 使用场景
//!
//! 串口另一端的下位机周期性上报三个关节的 ADC 读数，
//! Agent 将其换算为关节角度和角速度，通过 [`TelemetrySink`] 交给上层消息总线；
//! 上层下发的关节目标通过 [`UartAgent::send_command`] 写回串口。

mod agent;
mod builder;
pub mod command;
pub mod config;
mod error;
pub mod estimator;
pub mod mailbox;
pub mod metrics;
pub mod pipeline;
pub mod sink;

pub use agent::UartAgent;
pub use builder::UartAgentBuilder;
pub use command::{COMMAND_FRAME_CAPACITY, JointCommand};
pub use config::{AgentConfig, ConfigError};
pub use error::DriverError;
pub use estimator::{
    EstimatorConfig, EstimatorContext, EstimatorError, JointCalibration, JointEstimator,
    JointState,
};
pub use mailbox::{MailboxReceiver, MailboxSender, RawFrame, mailbox};
pub use metrics::{AgentMetrics, MetricsSnapshot};
pub use pipeline::{FrameProcessor, PipelineConfig, processor_loop, reader_loop};
pub use sink::{ChannelSink, JointStateMessage, TelemetrySink};
