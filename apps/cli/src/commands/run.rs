//! 持续运行：接收遥测，直到 Ctrl+C 或串口断开

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use uart_agent_driver::{AgentConfig, JointStateMessage, UartAgentBuilder};

pub fn execute(config: AgentConfig) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        handler_flag.store(false, Ordering::Release);
    })
    .context("设置信号处理失败")?;

    let device = config.serial.device.clone();
    let mut agent = UartAgentBuilder::new()
        .config(config)
        .build(|msg: JointStateMessage| {
            debug!(
                "{}.{:09} position={:?} velocity={:?}",
                msg.stamp.sec, msg.stamp.nsec, msg.position, msg.velocity
            );
        })
        .with_context(|| format!("启动 Agent 失败: {}", device))?;

    info!("UART agent running on {}. Press Ctrl+C to stop.", device);

    while running.load(Ordering::Acquire) {
        if !agent.is_running() {
            warn!("Serial link lost, stopping");
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    agent.stop();
    println!("{}", agent.metrics());
    Ok(())
}
