//! 命令实现

pub mod run;
pub mod send;

pub use send::SendCommand;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use uart_agent_driver::AgentConfig;

/// 连接参数（所有命令共享）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 串口设备路径，覆盖配置文件
    #[arg(long)]
    pub device: Option<String>,

    /// 波特率，覆盖配置文件
    #[arg(long)]
    pub baud_rate: Option<u32>,
}

impl ConnectionArgs {
    /// 加载配置文件（如有）并应用命令行覆盖
    pub fn load(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load_from_file(path)
                .with_context(|| format!("加载配置文件失败: {}", path.display()))?,
            None => AgentConfig::default(),
        };

        if let Some(device) = &self.device {
            config.serial.device = device.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }

        config.validate().context("配置无效")?;
        Ok(config)
    }
}
