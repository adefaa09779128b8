//! UART Agent 对外 API
//!
//! 持有读线程、处理线程和串口发送半部。
//! 遥测方向完全在后台线程中完成；指令方向在调用方线程中同步编码并写出。

use crate::command::JointCommand;
use crate::config::AgentConfig;
use crate::error::DriverError;
use crate::mailbox::mailbox;
use crate::metrics::{AgentMetrics, MetricsSnapshot};
use crate::pipeline::{FrameProcessor, processor_loop, reader_loop};
use crate::sink::TelemetrySink;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info, trace};
use uart_agent_serial::{SerialTransport, TxTransport};

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 由看门狗线程执行阻塞的 join
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            // 超时后看门狗线程继续运行，进程退出时回收
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// UART 机械臂 Agent
///
/// # Example
///
/// ```rust,no_run
/// use uart_agent_driver::{AgentConfig, ChannelSink, JointCommand, UartAgent};
/// use uart_agent_protocol::Timestamp;
/// use uart_agent_serial::SerialPortTransport;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AgentConfig::default();
/// let transport = SerialPortTransport::open(&config.serial)?;
/// let (sink, states) = ChannelSink::bounded(64);
/// let agent = UartAgent::new(transport, sink, &config)?;
///
/// agent.send_command(&JointCommand::new(
///     vec!["Joint1".into(), "Joint2".into(), "Joint3".into()],
///     vec![0.0, 0.5, -0.5],
///     Timestamp::new(0, 0),
/// ))?;
///
/// let state = states.recv()?;
/// println!("{:?}", state.position);
/// # Ok(())
/// # }
/// ```
pub struct UartAgent {
    /// 串口发送半部（调用方线程共享）
    writer: Mutex<Box<dyn TxTransport + Send>>,
    /// 读线程句柄（Drop 时 join）
    reader_thread: Option<JoinHandle<()>>,
    /// 处理线程句柄（Drop 时 join）
    processor_thread: Option<JoinHandle<()>>,
    /// 运行标志（用于线程生命周期联动）
    is_running: Arc<AtomicBool>,
    /// 链路指标（原子计数器）
    metrics: Arc<AgentMetrics>,
    join_timeout: Duration,
}

impl UartAgent {
    /// 启动 Agent
    ///
    /// 分离串口为 RX / TX 半部，RX 交给读线程，TX 留在 Agent 中用于发送指令。
    ///
    /// # 错误
    /// - `DriverError::Config`: 配置校验失败
    /// - `DriverError::Serial`: 串口分离失败
    /// - `DriverError::IoThread`: 线程创建失败
    pub fn new<T, S>(transport: T, sink: S, config: &AgentConfig) -> Result<Self, DriverError>
    where
        T: SerialTransport,
        S: TelemetrySink,
    {
        config.validate()?;

        let (rx, tx) = transport.split()?;
        let (mailbox_tx, mailbox_rx) = mailbox();

        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(AgentMetrics::new());

        let reader_thread = {
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            let pipeline = config.pipeline.clone();
            std::thread::Builder::new()
                .name("uart-reader".to_string())
                .spawn(move || reader_loop(rx, mailbox_tx, pipeline, is_running, metrics))
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };

        let processor = FrameProcessor::new(config.estimator.clone(), sink, metrics.clone());
        let processor_thread = {
            let is_running = is_running.clone();
            let pipeline = config.pipeline.clone();
            std::thread::Builder::new()
                .name("uart-processor".to_string())
                .spawn(move || processor_loop(processor, mailbox_rx, pipeline, is_running))
        };
        let processor_thread = match processor_thread {
            Ok(handle) => handle,
            Err(e) => {
                is_running.store(false, Ordering::Release);
                let _ = reader_thread.join_timeout(config.pipeline.join_timeout());
                return Err(DriverError::IoThread(e.to_string()));
            },
        };

        info!("UART agent started (reader + processor threads)");

        Ok(Self {
            writer: Mutex::new(Box::new(tx)),
            reader_thread: Some(reader_thread),
            processor_thread: Some(processor_thread),
            is_running,
            metrics,
            join_timeout: config.pipeline.join_timeout(),
        })
    }

    /// 发送关节目标指令
    ///
    /// 在调用方线程中编码并写出，写出完成后返回。
    ///
    /// # 错误
    /// - `DriverError::NotRunning`: Agent 已停止
    /// - `DriverError::Protocol`: 指令无法编码（只影响本次发送）
    /// - `DriverError::Serial`: 写出失败
    pub fn send_command(&self, command: &JointCommand) -> Result<(), DriverError> {
        if !self.is_running() {
            return Err(DriverError::NotRunning);
        }

        let frame = command.encode().inspect_err(|_| {
            self.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
        })?;

        let result = self.writer.lock().write(&frame);
        match result {
            Ok(()) => {
                self.metrics.tx_frames.fetch_add(1, Ordering::Relaxed);
                trace!("Sent command frame ({} bytes)", frame.len());
                Ok(())
            },
            Err(e) => {
                self.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                self.metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                if e.is_fatal() {
                    error!("Fatal serial error while sending: {}, setting is_running = false", e);
                    self.is_running.store(false, Ordering::Release);
                }
                Err(e.into())
            },
        }
    }

    /// 获取链路指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 运行标志
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 检查线程健康状态
    ///
    /// 返回 `(reader_alive, processor_alive)`。
    pub fn check_health(&self) -> (bool, bool) {
        let reader_alive = self.reader_thread.as_ref().is_some_and(|h| !h.is_finished());
        let processor_alive = self.processor_thread.as_ref().is_some_and(|h| !h.is_finished());
        (reader_alive, processor_alive)
    }

    /// 如果两个线程都存活，返回 `true`
    pub fn is_healthy(&self) -> bool {
        let (reader_alive, processor_alive) = self.check_health();
        reader_alive && processor_alive
    }

    /// 停止 Agent 并等待线程退出（可重复调用）
    pub fn stop(&mut self) {
        // Release: All writes before this are visible to threads that see the false value
        self.is_running.store(false, Ordering::Release);

        if let Some(handle) = self.reader_thread.take()
            && let Err(_e) = handle.join_timeout(self.join_timeout)
        {
            error!(
                "Reader thread panicked or failed to shut down within {:?}",
                self.join_timeout
            );
        }

        if let Some(handle) = self.processor_thread.take()
            && let Err(_e) = handle.join_timeout(self.join_timeout)
        {
            error!(
                "Processor thread panicked or failed to shut down within {:?}",
                self.join_timeout
            );
        }
    }
}

impl Drop for UartAgent {
    fn drop(&mut self) {
        self.stop();
    }
}
