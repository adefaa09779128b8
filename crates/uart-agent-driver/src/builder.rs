//! Builder 模式实现
//!
//! 提供链式构造 `UartAgent` 实例的便捷方式。

use crate::agent::UartAgent;
use crate::config::AgentConfig;
use crate::error::DriverError;
use crate::estimator::EstimatorConfig;
use crate::pipeline::PipelineConfig;
use crate::sink::TelemetrySink;
use uart_agent_serial::SerialTransport;

/// UartAgent Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use uart_agent_driver::{ChannelSink, UartAgentBuilder};
///
/// let (sink, states) = ChannelSink::bounded(64);
/// let agent = UartAgentBuilder::new()
///     .device("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .build(sink)
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct UartAgentBuilder {
    config: AgentConfig,
}

impl UartAgentBuilder {
    /// 创建新的 Builder（全部使用默认配置）
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用完整配置（覆盖之前的所有设置）
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置串口设备路径（可选，默认 `/dev/serial0`）
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.serial.device = device.into();
        self
    }

    /// 设置波特率（可选，默认 1M）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.serial.baud_rate = baud_rate;
        self
    }

    /// 设置 Pipeline 配置（可选）
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.config.pipeline = config;
        self
    }

    /// 设置估计器配置（可选）
    pub fn estimator_config(mut self, config: EstimatorConfig) -> Self {
        self.config.estimator = config;
        self
    }

    /// 当前配置
    pub fn agent_config(&self) -> &AgentConfig {
        &self.config
    }

    /// 打开配置中的串口设备并启动 Agent
    ///
    /// # Errors
    /// - `DriverError::Config`: 配置校验失败
    /// - `DriverError::Serial`: 串口打开失败
    #[cfg(feature = "serialport")]
    pub fn build<S: TelemetrySink>(self, sink: S) -> Result<UartAgent, DriverError> {
        self.config.validate()?;
        let transport = uart_agent_serial::SerialPortTransport::open(&self.config.serial)?;
        self.build_with_transport(transport, sink)
    }

    /// 使用已打开的串口传输启动 Agent
    pub fn build_with_transport<T, S>(self, transport: T, sink: S) -> Result<UartAgent, DriverError>
    where
        T: SerialTransport,
        S: TelemetrySink,
    {
        UartAgent::new(transport, sink, &self.config)
    }
}
