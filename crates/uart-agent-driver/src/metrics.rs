//! 链路指标模块
//!
//! 提供零开销的原子计数器，用于监控串口链路的健康状态。
//! 对外唯一可观测的行为就是这些累计计数（接收、有效、丢弃），
//! 单帧错误不会上报到消息总线。

use crate::estimator::EstimatorError;
use std::sync::atomic::{AtomicU64, Ordering};
use uart_agent_protocol::ProtocolError;

/// 串口链路实时指标
///
/// 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。
///
/// # 使用示例
///
/// ```rust
/// use uart_agent_driver::AgentMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = AgentMetrics::new();
/// metrics.frames_received.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.frames_received, 1);
/// ```
#[derive(Debug, Default)]
pub struct AgentMetrics {
    /// 读线程收到的原始字节数
    pub rx_bytes: AtomicU64,

    /// 读线程组装完成的帧数（以 EOT 结尾）
    pub frames_received: AtomicU64,

    /// 邮箱覆盖次数（处理线程来不及取走，旧帧被新帧替换）
    ///
    /// 如果这个值快速增长，说明处理线程跟不上串口帧率。
    pub mailbox_overwrites: AtomicU64,

    /// 解码成功（控制字符与 CRC 均有效）的帧数
    pub frames_valid: AtomicU64,

    /// 被处理线程丢弃的帧数（以下各分类之和）
    pub frames_dropped: AtomicU64,

    /// 控制字符缺失/乱序或帧头无法解析
    pub malformed_frames: AtomicU64,

    /// CRC 校验失败
    pub checksum_errors: AtomicU64,

    /// 遥测负载格式错误
    pub invalid_samples: AtomicU64,

    /// 时间戳回退（elapsed <= 0）
    pub clock_regressions: AtomicU64,

    /// 发布到下游的关节状态数
    pub states_published: AtomicU64,

    /// 发送的指令帧数
    pub tx_frames: AtomicU64,

    /// 指令发送失败次数（编码或写出失败）
    pub tx_errors: AtomicU64,

    /// 串口设备错误次数
    pub device_errors: AtomicU64,
}

impl AgentMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次解码失败
    pub(crate) fn record_decode_error(&self, error: &ProtocolError) {
        let counter = match error {
            ProtocolError::ChecksumMismatch { .. } => &self.checksum_errors,
            ProtocolError::InvalidSampleFormat(_) => &self.invalid_samples,
            _ => &self.malformed_frames,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次估计失败
    pub(crate) fn record_estimator_error(&self, error: &EstimatorError) {
        let counter = match error {
            EstimatorError::InvalidSample(_) => &self.invalid_samples,
            EstimatorError::ClockRegression { .. } | EstimatorError::ClockUninitialized => {
                &self.clock_regressions
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            mailbox_overwrites: self.mailbox_overwrites.load(Ordering::Relaxed),
            frames_valid: self.frames_valid.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            invalid_samples: self.invalid_samples.load(Ordering::Relaxed),
            clock_regressions: self.clock_regressions.load(Ordering::Relaxed),
            states_published: self.states_published.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_bytes: u64,
    pub frames_received: u64,
    pub mailbox_overwrites: u64,
    pub frames_valid: u64,
    pub frames_dropped: u64,
    pub malformed_frames: u64,
    pub checksum_errors: u64,
    pub invalid_samples: u64,
    pub clock_regressions: u64,
    pub states_published: u64,
    pub tx_frames: u64,
    pub tx_errors: u64,
    pub device_errors: u64,
}

impl MetricsSnapshot {
    /// 丢失的帧总数（邮箱覆盖 + 处理线程丢弃）
    pub fn frames_lost(&self) -> u64 {
        self.mailbox_overwrites + self.frames_dropped
    }

    /// 有效帧率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `frames_received` 为 0，返回 0.0。
    pub fn valid_frame_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        (self.frames_valid as f64 / self.frames_received as f64) * 100.0
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Received: {}, Valid: {}, Dropped: {}, Overwritten: {}, Published: {}",
            self.frames_received,
            self.frames_valid,
            self.frames_dropped,
            self.mailbox_overwrites,
            self.states_published
        )
    }
}
