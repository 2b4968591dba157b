//! # 扫描适配器
//!
//! 校准驱动器与外部扫描编排之间的唯一接口：
//! `run_linear_scan(detector, motor, start, stop, num_points) -> ScanTrace`，
//! 同步阻塞直至扫描完成；取消表现为 `Aborted` 错误。
//!
//! ## 实现
//! - `StepScanner`: 逐点移动 `Settable` 电机、有界等待到位、读取 `Readable` 探测器
//! - `ReplayScanner`: 对已记录的密集扫描线性插值，用于离线复算
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs` 通过 trait 调用
//! - 使用 `hardware/poll.rs`

use super::poll::{wait_until, PollConfig};
use super::{AbortHandle, Readable, Settable};
use crate::error::{EcalError, Result};
use crate::models::ScanTrace;

/// 扫描编排接口
pub trait ScanRunner {
    /// 线性扫描：在 [start, stop] 上等间距取 `num_points` 点
    fn run_linear_scan(
        &mut self,
        detector: &str,
        motor: &str,
        start: f64,
        stop: f64,
        num_points: usize,
    ) -> Result<ScanTrace>;
}

/// 等间距点列，包含端点，至少 2 点
pub fn linspace(start: f64, stop: f64, num_points: usize) -> Result<Vec<f64>> {
    if num_points < 2 {
        return Err(EcalError::InvalidArgument(format!(
            "a linear scan needs at least 2 points, got {}",
            num_points
        )));
    }
    if !start.is_finite() || !stop.is_finite() {
        return Err(EcalError::InvalidArgument(format!(
            "scan limits must be finite ({} .. {})",
            start, stop
        )));
    }
    let step = (stop - start) / (num_points - 1) as f64;
    Ok((0..num_points)
        .map(|i| {
            if i == num_points - 1 {
                stop
            } else {
                start + step * i as f64
            }
        })
        .collect())
}

/// 逐点步进扫描
pub struct StepScanner {
    motors: Vec<Box<dyn Settable>>,
    detectors: Vec<Box<dyn Readable>>,
    settle: PollConfig,
    abort: AbortHandle,
}

impl StepScanner {
    pub fn new(settle: PollConfig) -> Self {
        Self {
            motors: Vec::new(),
            detectors: Vec::new(),
            settle,
            abort: AbortHandle::new(),
        }
    }

    pub fn with_motor(mut self, motor: Box<dyn Settable>) -> Self {
        self.motors.push(motor);
        self
    }

    pub fn with_detector(mut self, detector: Box<dyn Readable>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }
}

impl ScanRunner for StepScanner {
    fn run_linear_scan(
        &mut self,
        detector: &str,
        motor: &str,
        start: f64,
        stop: f64,
        num_points: usize,
    ) -> Result<ScanTrace> {
        let positions = linspace(start, stop, num_points)?;

        let motor_dev = self
            .motors
            .iter()
            .find(|m| m.name() == motor)
            .ok_or_else(|| EcalError::UnknownChannel(motor.to_string()))?;
        let detector_dev = self
            .detectors
            .iter()
            .find(|d| d.name() == detector)
            .ok_or_else(|| EcalError::UnknownChannel(detector.to_string()))?;

        tracing::info!(motor, detector, start, stop, num_points, "linear scan");

        let mut intensities = Vec::with_capacity(num_points);
        for &position in &positions {
            self.abort.check(&format!("scan of {}", motor))?;

            motor_dev.set(position)?;
            wait_until(
                motor,
                &format!("reach {:.6}", position),
                &self.settle,
                Some(&self.abort),
                || motor_dev.is_done(),
            )?;
            intensities.push(detector_dev.read()?);
        }

        ScanTrace::new(positions, intensities)
    }
}

/// 记录数据回放
pub struct ReplayScanner {
    recorded: ScanTrace,
}

impl ReplayScanner {
    /// 使用任意顺序记录的数据（内部按角度升序）
    pub fn new(recorded: &ScanTrace) -> Result<Self> {
        if recorded.len() < 2 {
            return Err(EcalError::InvalidArgument(
                "replay needs a recorded trace with at least 2 samples".to_string(),
            ));
        }
        let recorded = ScanTrace::sorted(recorded.points())?;
        Ok(Self { recorded })
    }

    /// 在 x 处线性插值
    fn interpolate(&self, x: f64) -> Result<f64> {
        let angles = self.recorded.angles();
        let values = self.recorded.intensities();
        let (lo, hi) = (angles[0], angles[angles.len() - 1]);
        if x < lo || x > hi {
            return Err(EcalError::InvalidArgument(format!(
                "requested angle {:.6} lies outside the recorded range {:.6} .. {:.6}",
                x, lo, hi
            )));
        }

        let idx = angles.partition_point(|&a| a < x);
        if idx == 0 {
            return Ok(values[0]);
        }
        let (x0, x1) = (angles[idx - 1], angles[idx]);
        let (y0, y1) = (values[idx - 1], values[idx]);
        if x1 == x0 {
            return Ok(y1);
        }
        Ok(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

impl ScanRunner for ReplayScanner {
    fn run_linear_scan(
        &mut self,
        detector: &str,
        motor: &str,
        start: f64,
        stop: f64,
        num_points: usize,
    ) -> Result<ScanTrace> {
        tracing::info!(motor, detector, start, stop, num_points, "replaying scan");
        let positions = linspace(start, stop, num_points)?;
        let intensities = positions
            .iter()
            .map(|&x| self.interpolate(x))
            .collect::<Result<Vec<f64>>>()?;
        ScanTrace::new(positions, intensities)
    }
}
