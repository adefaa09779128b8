//! 驱动层错误类型定义

use crate::config::ConfigError;
use crate::estimator::EstimatorError;
use thiserror::Error;
use uart_agent_protocol::ProtocolError;
use uart_agent_serial::SerialError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 状态估计错误
    #[error("Estimator error: {0}")]
    Estimator(#[from] EstimatorError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 线程已停止（致命串口错误或已调用 `stop()`）
    #[error("Agent is not running")]
    NotRunning,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}
