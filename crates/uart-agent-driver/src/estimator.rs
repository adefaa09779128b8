//! 关节状态估计
//!
//! 将遥测帧中的 ADC 读数换算为关节角度（弧度），并用滑动窗口平均
//! 计算关节角速度。
//!
//! 估计器的全部历史状态都保存在 [`EstimatorContext`] 中，
//! 由处理线程独占，不存在跨线程共享。
//!
//! ## 角度换算
//!
//! ```text
//! angle = ((2·adc − (high + low)) / (high − low)) · (N · π / 360)
//! ```
//!
//! `low` / `high` 为 ADC 行程端点，`N` 为关节总行程（度）。
//! `adc == low` 对应 `-N/2` 度，`adc == high` 对应 `+N/2` 度。
//!
//! ## 速度
//!
//! 每帧的瞬时速度为 `(上一帧角度 − 当前角度) · 1e9 / Δt_ns`，
//! 推入容量为 `window` 的 FIFO，对外报告 FIFO 内的平均值。

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use uart_agent_protocol::payload::JOINT_COUNT;
use uart_agent_protocol::{AdcSample, DecodedSample, ProtocolError, Timestamp};

/// 默认速度平滑窗口
pub const DEFAULT_VELOCITY_WINDOW: usize = 8;

/// 估计器错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimatorError {
    /// 负载不是合法的 ADC 采样
    #[error("Invalid sample: {0}")]
    InvalidSample(#[from] ProtocolError),

    /// 时间戳未前进（elapsed <= 0），该帧被丢弃，状态不变
    #[error("Clock regression: elapsed {elapsed_ns} ns since previous sample")]
    ClockRegression { elapsed_ns: i64 },

    /// 上下文尚未用第一帧初始化
    #[error("Estimator context not seeded")]
    ClockUninitialized,
}

/// 单关节 ADC 标定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointCalibration {
    /// 关节名称（发布到总线时使用）
    pub name: String,
    /// ADC 下端点
    pub low: u16,
    /// ADC 上端点
    pub high: u16,
    /// 关节总行程（度）
    pub travel_deg: f64,
}

impl JointCalibration {
    pub fn new(name: impl Into<String>, low: u16, high: u16, travel_deg: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
            travel_deg,
        }
    }

    /// ADC 读数换算为角度（弧度）
    ///
    /// 超出 `[low, high]` 的读数不做截断，按线性关系外推。
    pub fn angle(&self, adc: u16) -> f64 {
        let low = f64::from(self.low);
        let high = f64::from(self.high);
        let normalized = (2.0 * f64::from(adc) - (high + low)) / (high - low);
        normalized * (self.travel_deg * std::f64::consts::PI / 360.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.high <= self.low {
            return Err(ConfigError::Invalid(format!(
                "joint {}: high ({}) must be greater than low ({})",
                self.name, self.high, self.low
            )));
        }
        if !self.travel_deg.is_finite() || self.travel_deg <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "joint {}: travel_deg must be a positive number, got {}",
                self.name, self.travel_deg
            )));
        }
        Ok(())
    }
}

/// 估计器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// 速度平滑窗口（样本数，>= 1）
    pub window: usize,
    /// 三个关节的标定（按关节顺序）
    pub joints: [JointCalibration; JOINT_COUNT],
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_VELOCITY_WINDOW,
            joints: [
                JointCalibration::new("Joint1", 890, 3020, 270.0),
                JointCalibration::new("Joint2", 890, 3020, 180.0),
                JointCalibration::new("Joint3", 890, 3020, 180.0),
            ],
        }
    }
}

impl EstimatorConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::Invalid(
                "estimator window must be at least 1".to_string(),
            ));
        }
        self.joints.iter().try_for_each(JointCalibration::validate)
    }

    /// 关节名称
    pub fn joint_names(&self) -> [String; JOINT_COUNT] {
        self.joints.clone().map(|joint| joint.name)
    }

    /// 一次采样换算出三个关节的角度
    pub fn angles(&self, sample: &AdcSample) -> [f64; JOINT_COUNT] {
        std::array::from_fn(|i| self.joints[i].angle(sample.raw[i]))
    }
}

/// 关节状态（一帧遥测的估计结果）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    /// 帧时间戳
    pub stamp: Timestamp,
    /// 关节角度（rad）
    pub position: [f64; JOINT_COUNT],
    /// 关节角速度（rad/s），窗口平均值
    pub velocity: [f64; JOINT_COUNT],
}

/// 估计器上下文
///
/// 每个关节一个瞬时速度 FIFO，加上一帧的角度和时间戳。
/// 第一帧之前 `previous` 为空。
#[derive(Debug, Clone)]
pub struct EstimatorContext {
    history: [VecDeque<f64>; JOINT_COUNT],
    previous: Option<(Timestamp, [f64; JOINT_COUNT])>,
    window: usize,
}

impl EstimatorContext {
    /// 创建空上下文，`window` 至少为 1
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: std::array::from_fn(|_| VecDeque::with_capacity(window)),
            previous: None,
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// 是否已经用第一帧初始化
    pub fn is_seeded(&self) -> bool {
        self.previous.is_some()
    }

    /// 当前 FIFO 中的样本数（三个关节相同）
    pub fn history_len(&self) -> usize {
        self.history[0].len()
    }

    /// 用第一帧初始化（不推入任何速度样本）
    pub fn seed(&mut self, stamp: Timestamp, angles: [f64; JOINT_COUNT]) {
        self.previous = Some((stamp, angles));
    }

    /// 处理后续帧，返回窗口平均速度
    ///
    /// 出错时上下文保持不变。
    pub fn step(
        &mut self,
        stamp: Timestamp,
        angles: [f64; JOINT_COUNT],
    ) -> Result<[f64; JOINT_COUNT], EstimatorError> {
        let (previous_stamp, previous_angles) =
            self.previous.ok_or(EstimatorError::ClockUninitialized)?;

        let elapsed_ns = stamp.nanos_since(&previous_stamp);
        if elapsed_ns <= 0 {
            return Err(EstimatorError::ClockRegression { elapsed_ns });
        }

        let elapsed = elapsed_ns as f64;
        for (i, history) in self.history.iter_mut().enumerate() {
            let instantaneous = (previous_angles[i] - angles[i]) * 1e9 / elapsed;
            if history.len() == self.window {
                history.pop_front();
            }
            history.push_back(instantaneous);
        }
        self.previous = Some((stamp, angles));

        Ok(std::array::from_fn(|i| {
            let history = &self.history[i];
            history.iter().sum::<f64>() / history.len() as f64
        }))
    }
}

/// 关节状态估计器
pub struct JointEstimator {
    config: EstimatorConfig,
    context: EstimatorContext,
}

impl JointEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let context = EstimatorContext::new(config.window);
        Self { config, context }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn context(&self) -> &EstimatorContext {
        &self.context
    }

    /// 处理一帧已通过 CRC 校验的遥测
    ///
    /// 第一帧只初始化上下文，报告零速度。
    pub fn update(&mut self, sample: &DecodedSample) -> Result<JointState, EstimatorError> {
        let adc = AdcSample::parse(&sample.payload)?;
        let position = self.config.angles(&adc);

        let velocity = if self.context.is_seeded() {
            self.context.step(sample.stamp, position)?
        } else {
            self.context.seed(sample.stamp, position);
            [0.0; JOINT_COUNT]
        };

        Ok(JointState {
            stamp: sample.stamp,
            position,
            velocity,
        })
    }
}
