//! 进程配置
//!
//! 所有可调参数集中在一个 TOML 文件中，未写出的字段使用默认值：
//!
//! ```toml
//! [serial]
//! device = "/dev/serial0"
//! baud_rate = 1000000
//!
//! [pipeline]
//! poll_interval_us = 200
//!
//! [estimator]
//! window = 8
//! ```

use crate::estimator::EstimatorConfig;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uart_agent_serial::SerialConfig;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Agent 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub serial: SerialConfig,
    pub pipeline: PipelineConfig,
    pub estimator: EstimatorConfig,
}

impl AgentConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.device.is_empty() {
            return Err(ConfigError::Invalid("serial device must not be empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud rate must be non-zero".to_string()));
        }
        self.pipeline.validate()?;
        self.estimator.validate()
    }
}
