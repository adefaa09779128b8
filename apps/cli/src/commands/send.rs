//! 发送一次关节目标指令

use anyhow::{Context, Result};
use clap::Args;
use std::time::{SystemTime, UNIX_EPOCH};
use uart_agent_driver::{AgentConfig, JointCommand, JointStateMessage, UartAgentBuilder};
use uart_agent_protocol::Timestamp;

/// 发送参数
#[derive(Args, Debug)]
pub struct SendCommand {
    /// 关节目标值（逗号分隔，如 `0.1,-0.2,0.3`）
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
    pub goals: Vec<f64>,

    /// 关节名称（逗号分隔），默认使用配置中的名称
    #[arg(long, value_delimiter = ',')]
    pub names: Option<Vec<String>>,
}

impl SendCommand {
    pub fn execute(self, config: AgentConfig) -> Result<()> {
        let command = self.to_command(&config, now()?)?;

        let agent = UartAgentBuilder::new()
            .config(config)
            .build(|_msg: JointStateMessage| {})
            .context("启动 Agent 失败")?;
        agent.send_command(&command).context("发送指令失败")?;

        println!(
            "Sent {} goals ({} frames written)",
            command.goals.len(),
            agent.metrics().tx_frames
        );
        Ok(())
    }

    fn to_command(&self, config: &AgentConfig, stamp: Timestamp) -> Result<JointCommand> {
        let names = match &self.names {
            Some(names) => names.clone(),
            None => config
                .estimator
                .joint_names()
                .into_iter()
                .chain((config.estimator.joints.len() + 1..).map(|i| format!("Joint{i}")))
                .take(self.goals.len())
                .collect(),
        };
        if names.len() != self.goals.len() {
            anyhow::bail!(
                "关节名称数量 ({}) 与目标数量 ({}) 不一致",
                names.len(),
                self.goals.len()
            );
        }
        Ok(JointCommand::new(names, self.goals.clone(), stamp))
    }
}

fn now() -> Result<Timestamp> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("系统时间早于 UNIX 纪元")?;
    let sec = i32::try_from(elapsed.as_secs()).context("时间戳秒数超出 i32 范围")?;
    Ok(Timestamp::new(sec, elapsed.subsec_nanos()))
}
