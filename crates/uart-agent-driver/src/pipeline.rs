//! 接收流水线
//!
//! 两个常驻线程通过单槽邮箱交接原始帧：
//!
//! ```text
//! serial ──► reader_loop ──► [mailbox] ──► processor_loop ──► decode ──► estimate ──► sink
//! ```
//!
//! - 读线程只负责按 EOT 切分字节流，不做任何解析
//! - 处理线程负责解码、估计和发布；任何单帧错误只计数，不中断循环
//! - 两个线程都在每次迭代检查 `is_running`，停止请求最多在一个轮询周期内生效

use crate::config::ConfigError;
use crate::error::DriverError;
use crate::estimator::{EstimatorConfig, JointEstimator, JointState};
use crate::mailbox::{MailboxReceiver, MailboxSender};
use crate::metrics::AgentMetrics;
use crate::sink::{JointStateMessage, TelemetrySink};
use crossbeam_channel::RecvTimeoutError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use uart_agent_protocol::payload::JOINT_COUNT;
use uart_agent_protocol::{EOT, decode_frame};
use uart_agent_serial::{RxTransport, SerialError};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use uart_agent_driver::PipelineConfig;
///
/// // 默认：200µs 轮询周期，2s 线程 join 超时
/// let config = PipelineConfig::default();
///
/// let config = PipelineConfig {
///     poll_interval_us: 500,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 轮询周期（微秒）
    ///
    /// 读线程无数据时的休眠时间，也是处理线程等待邮箱的超时时间。
    pub poll_interval_us: u64,
    /// 停止时等待线程退出的超时（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 200,
            join_timeout_ms: 2000,
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_us == 0 {
            return Err(ConfigError::Invalid(
                "pipeline poll_interval_us must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// 读线程主循环
///
/// 逐字节读取串口，遇到 EOT 即把累积的字节作为一帧投递到邮箱。
/// 帧内容不做任何检查；累积缓冲区没有长度上限。
///
/// # 参数
/// - `rx`: 串口接收半部（独占）
/// - `mailbox`: 邮箱写端，线程退出时随之 drop，处理线程收到 `Disconnected`
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 链路指标
pub fn reader_loop(
    mut rx: impl RxTransport,
    mailbox: MailboxSender,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<AgentMetrics>,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Reader thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set reader thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let poll_interval = config.poll_interval();
    let mut accumulator: Vec<u8> = Vec::new();

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("Reader thread: is_running flag is false, exiting");
            break;
        }

        match rx.bytes_available() {
            Ok(true) => {},
            Ok(false) => {
                spin_sleep::sleep(poll_interval);
                continue;
            },
            Err(e) => {
                if handle_serial_error(e, &is_running, &metrics) {
                    break;
                }
                spin_sleep::sleep(poll_interval);
                continue;
            },
        }

        let byte = match rx.read_byte() {
            Ok(byte) => byte,
            Err(SerialError::Timeout) => continue,
            Err(e) => {
                if handle_serial_error(e, &is_running, &metrics) {
                    break;
                }
                continue;
            },
        };

        metrics.rx_bytes.fetch_add(1, Ordering::Relaxed);
        accumulator.push(byte);

        if byte == EOT {
            metrics.frames_received.fetch_add(1, Ordering::Relaxed);
            let frame = std::mem::take(&mut accumulator);
            if mailbox.post(frame).is_some() {
                metrics.mailbox_overwrites.fetch_add(1, Ordering::Relaxed);
                trace!("Reader thread: previous frame not drained, overwritten");
            }
        }
    }

    trace!("Reader thread: loop exited");
}

/// 处理串口错误，返回是否需要退出
fn handle_serial_error(e: SerialError, is_running: &AtomicBool, metrics: &AgentMetrics) -> bool {
    metrics.device_errors.fetch_add(1, Ordering::Relaxed);

    if e.is_fatal() {
        error!("Reader thread: fatal serial error: {}, setting is_running = false", e);
        // Release: All writes before this are visible to threads that see the false value
        is_running.store(false, Ordering::Release);
        return true;
    }

    warn!("Reader thread: serial error: {}", e);
    false
}

/// 单帧处理器：解码 → 估计 → 发布
///
/// 估计器上下文由处理器独占，只在处理线程中使用。
pub struct FrameProcessor<S: TelemetrySink> {
    estimator: JointEstimator,
    names: [String; JOINT_COUNT],
    sink: S,
    metrics: Arc<AgentMetrics>,
}

impl<S: TelemetrySink> FrameProcessor<S> {
    pub fn new(config: EstimatorConfig, sink: S, metrics: Arc<AgentMetrics>) -> Self {
        let names = config.joint_names();
        Self {
            estimator: JointEstimator::new(config),
            names,
            sink,
            metrics,
        }
    }

    pub fn estimator(&self) -> &JointEstimator {
        &self.estimator
    }

    /// 处理一帧原始字节
    ///
    /// 出错时该帧被丢弃并计入对应的指标，估计器状态不变。
    pub fn process(&mut self, raw: &[u8]) -> Result<JointState, DriverError> {
        let sample = match decode_frame(raw) {
            Ok(sample) => sample,
            Err(e) => {
                debug!("Dropping frame ({} bytes): {}", raw.len(), e);
                self.metrics.record_decode_error(&e);
                return Err(e.into());
            },
        };
        self.metrics.frames_valid.fetch_add(1, Ordering::Relaxed);

        let state = match self.estimator.update(&sample) {
            Ok(state) => state,
            Err(e) => {
                debug!("Dropping sample at {:?}: {}", sample.stamp, e);
                self.metrics.record_estimator_error(&e);
                return Err(e.into());
            },
        };

        self.sink.publish(JointStateMessage::new(self.names.clone(), &state));
        self.metrics.states_published.fetch_add(1, Ordering::Relaxed);
        Ok(state)
    }
}

/// 处理线程主循环
///
/// 在邮箱上阻塞等待（带超时），拿到帧后交给 `processor`。
/// 读线程退出后邮箱断开，剩余的待处理帧处理完毕后退出。
pub fn processor_loop<S: TelemetrySink>(
    mut processor: FrameProcessor<S>,
    mailbox: MailboxReceiver,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
) {
    let poll_interval = config.poll_interval();

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("Processor thread: is_running flag is false, exiting");
            break;
        }

        match mailbox.recv_timeout(poll_interval) {
            Ok(frame) => {
                // 单帧错误已计数，继续处理下一帧
                let _ = processor.process(&frame);
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                trace!("Processor thread: mailbox disconnected, exiting");
                break;
            },
        }
    }

    trace!("Processor thread: loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;
    use parking_lot::Mutex;
    use std::thread;
    use uart_agent_protocol::{AdcSample, Timestamp, encode_frame_to_vec};
    use uart_agent_serial::{MockTransport, SerialTransport};

    fn telemetry(raw: [u16; 3], sec: i32, nsec: u32) -> Vec<u8> {
        encode_frame_to_vec(&AdcSample { raw }.to_payload(), Timestamp::new(sec, nsec)).unwrap()
    }

    fn collecting_processor() -> (
        FrameProcessor<impl TelemetrySink>,
        Arc<Mutex<Vec<JointStateMessage>>>,
        Arc<AgentMetrics>,
    ) {
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink_published = published.clone();
        let metrics = Arc::new(AgentMetrics::new());
        let processor = FrameProcessor::new(
            EstimatorConfig::default(),
            move |msg: JointStateMessage| sink_published.lock().push(msg),
            metrics.clone(),
        );
        (processor, published, metrics)
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_micros(200));
        assert_eq!(config.join_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());

        let config = PipelineConfig {
            poll_interval_us: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_process_valid_frame_publishes() {
        let (mut processor, published, metrics) = collecting_processor();
        let state = processor.process(&telemetry([1955, 1955, 1955], 1, 0)).unwrap();
        assert_eq!(state.velocity, [0.0; 3]);

        let published = published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].names, ["Joint1", "Joint2", "Joint3"]);
        assert_eq!(published[0].stamp, Timestamp::new(1, 0));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_valid, 1);
        assert_eq!(snapshot.states_published, 1);
        assert_eq!(snapshot.frames_dropped, 0);
    }

    #[test]
    fn test_process_counts_each_drop_cause() {
        let (mut processor, published, metrics) = collecting_processor();

        // 缺少 SOH
        assert!(processor.process(b"garbage\x04").is_err());

        // CRC 错误
        let mut corrupted = telemetry([1000, 1000, 1000], 1, 0);
        let crc_pos = corrupted.len() - 2;
        corrupted[crc_pos] = if corrupted[crc_pos] == b'0' { b'1' } else { b'0' };
        assert!(processor.process(&corrupted).is_err());

        // CRC 正确但负载格式错误
        let bad_payload = encode_frame_to_vec(b"0890 1955\t3020\n", Timestamp::new(1, 0)).unwrap();
        assert!(processor.process(&bad_payload).is_err());

        // 时间戳回退
        processor.process(&telemetry([1000, 1000, 1000], 5, 0)).unwrap();
        assert!(processor.process(&telemetry([1000, 1000, 1000], 4, 0)).is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.malformed_frames, 1);
        assert_eq!(snapshot.checksum_errors, 1);
        assert_eq!(snapshot.invalid_samples, 1);
        assert_eq!(snapshot.clock_regressions, 1);
        assert_eq!(snapshot.frames_dropped, 4);
        // 负载错误和时间戳回退的帧本身通过了 CRC 校验
        assert_eq!(snapshot.frames_valid, 3);
        assert_eq!(published.lock().len(), 1);
    }

    #[test]
    fn test_reader_splits_on_eot_and_overwrites() {
        let (transport, handle) = MockTransport::new();
        let (rx, _tx) = transport.split().unwrap();
        let (mailbox_tx, mailbox_rx) = mailbox();
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(AgentMetrics::new());

        let frame_a = telemetry([1000, 1000, 1000], 1, 0);
        let frame_b = telemetry([2000, 2000, 2000], 2, 0);
        handle.push_bytes(&frame_a);
        handle.push_bytes(&frame_b);

        let running = is_running.clone();
        let reader_metrics = metrics.clone();
        let reader = thread::spawn(move || {
            reader_loop(rx, mailbox_tx, PipelineConfig::default(), running, reader_metrics)
        });

        while handle.pending() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        // 等待最后一帧被投递
        while metrics.snapshot().frames_received < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        is_running.store(false, Ordering::Release);
        reader.join().unwrap();

        // 处理线程未运行：A 被 B 覆盖
        assert_eq!(mailbox_rx.try_take(), Some(frame_b.clone()));
        assert_eq!(mailbox_rx.try_take(), None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.mailbox_overwrites, 1);
        assert_eq!(snapshot.rx_bytes, (frame_a.len() + frame_b.len()) as u64);
    }

    #[test]
    fn test_overwritten_frame_never_reaches_sink() {
        let (transport, handle) = MockTransport::new();
        let (rx, _tx) = transport.split().unwrap();
        let (mailbox_tx, mailbox_rx) = mailbox();
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(AgentMetrics::new());

        handle.push_bytes(&telemetry([1000, 1000, 1000], 1, 0));
        handle.push_bytes(&telemetry([2000, 2000, 2000], 2, 0));

        let running = is_running.clone();
        let reader_metrics = metrics.clone();
        let reader = thread::spawn(move || {
            reader_loop(rx, mailbox_tx, PipelineConfig::default(), running, reader_metrics)
        });
        while metrics.snapshot().frames_received < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        is_running.store(false, Ordering::Release);
        reader.join().unwrap();
        assert_eq!(metrics.snapshot().mailbox_overwrites, 1);

        // 读线程退出后写端已 drop，处理线程取走剩余的一帧后退出
        let (processor, published, processor_metrics) = collecting_processor();
        processor_loop(
            processor,
            mailbox_rx,
            PipelineConfig::default(),
            Arc::new(AtomicBool::new(true)),
        );

        let stamps: Vec<Timestamp> = published.lock().iter().map(|msg| msg.stamp).collect();
        assert_eq!(stamps, [Timestamp::new(2, 0)]);
        assert_eq!(processor_metrics.snapshot().frames_valid, 1);
    }

    #[test]
    fn test_reader_exits_on_disconnect() {
        let (transport, handle) = MockTransport::new();
        let (rx, _tx) = transport.split().unwrap();
        let (mailbox_tx, mailbox_rx) = mailbox();
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(AgentMetrics::new());

        handle.disconnect();
        reader_loop(
            rx,
            mailbox_tx,
            PipelineConfig::default(),
            is_running.clone(),
            metrics.clone(),
        );

        assert!(!is_running.load(Ordering::Acquire));
        assert_eq!(metrics.snapshot().device_errors, 1);
        // 写端已随读线程退出被 drop
        assert_eq!(
            mailbox_rx.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_processor_loop_drains_then_exits_on_disconnect() {
        let (processor, published, metrics) = collecting_processor();
        let (mailbox_tx, mailbox_rx) = mailbox();
        let is_running = Arc::new(AtomicBool::new(true));

        mailbox_tx.post(telemetry([1955, 1955, 1955], 1, 0));
        drop(mailbox_tx);

        processor_loop(processor, mailbox_rx, PipelineConfig::default(), is_running);

        assert_eq!(published.lock().len(), 1);
        assert_eq!(metrics.snapshot().states_published, 1);
    }

    #[test]
    fn test_processor_loop_stops_on_flag() {
        let (processor, _published, _metrics) = collecting_processor();
        let (_mailbox_tx, mailbox_rx) = mailbox();
        let is_running = Arc::new(AtomicBool::new(true));

        let running = is_running.clone();
        let worker = thread::spawn(move || {
            processor_loop(processor, mailbox_rx, PipelineConfig::default(), running)
        });
        thread::sleep(Duration::from_millis(5));
        is_running.store(false, Ordering::Release);
        worker.join().unwrap();
    }
}
