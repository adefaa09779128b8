//! # UART Agent
//!
//! 串口机械臂 Agent 命令行入口。
//!
//! ```bash
//! # 持续接收遥测（Ctrl+C 退出，退出时打印收发计数）
//! uart-agent --device /dev/ttyUSB0 run
//!
//! # 发送一次关节目标
//! uart-agent send --goals 0.1,-0.2,0.3
//!
//! # 打印生效的配置
//! uart-agent --config agent.toml config
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConnectionArgs, SendCommand};

/// UART Agent - 串口机械臂遥测与控制
#[derive(Parser, Debug)]
#[command(name = "uart-agent")]
#[command(about = "Bridge a UART robotic arm to a telemetry bus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 持续接收遥测并打印关节状态（默认）
    Run,

    /// 发送一次关节目标指令
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 打印生效的配置（TOML）
    Config,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uart_agent=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.connection.load()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::execute(config),
        Commands::Send { args } => args.execute(config),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}
