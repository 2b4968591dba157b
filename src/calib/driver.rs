//! # 双峰对称校准驱动器
//!
//! 状态机（每次调用运行一次）：
//!
//! ```text
//! START -> GUESS_ANGLES -> [right, left 各一次]
//!            COARSE_SCAN -> COARSE_FIT -> FINE_SCAN -> FINE_FIT
//!        -> COMBINE -> DONE
//! ```
//!
//! 任一侧任一阶段失败，整个校准以 `CalibrationAborted` 结束，
//! 错误中带有失败的一侧和阶段；不会返回部分填充的结果。
//!
//! ## 依赖关系
//! - 被 `commands/calibrate.rs` 调用
//! - 使用 `hardware/scan.rs` 的 `ScanRunner` 获取数据
//! - 使用 `calib/` 的 standards, bragg, locator, fitter

use crate::calib::bragg;
use crate::calib::fitter::LineshapeFitter;
use crate::calib::lineshape::PARAMETER_COUNT;
use crate::calib::locator;
use crate::calib::standards::ReferenceTable;
use crate::error::{EcalError, Result};
use crate::hardware::ScanRunner;
use crate::models::{
    CalibrationResult, CalibrationRun, FitResult, MotorKind, ReflectionReport, ScanFit,
    ScanTrace, Side, Stage,
};

use serde::{Deserialize, Serialize};

/// 一次校准的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationPlan {
    /// 标样名称
    pub standard: String,
    /// 波长猜测（Å）
    pub wavelength_guess: f64,
    /// 角度零点猜测（电机单位，度）
    pub theta_offset: f64,
    /// 电机类型
    pub motor_type: MotorKind,
    /// 粗扫步长（度）
    pub coarse_step: f64,
    /// 粗扫点数
    pub coarse_points: usize,
    /// 粗扫拟合的 sigma 初值；`None` 时由半幅区域估计
    pub guessed_sigma: Option<f64>,
    /// 细扫范围（sigma 倍数，单侧）
    pub nsigma_range: f64,
    /// 细扫步长（sigma 倍数）
    pub nsigma_fine: f64,
    /// 细扫点数上限
    pub max_fine_points: usize,
    /// 粗扫显著性阈值；`None` 时不检验
    pub significance_sdev: Option<f64>,
    /// 探测器通道
    pub detector: String,
    /// 电机通道
    pub motor: String,
}

impl Default for CalibrationPlan {
    fn default() -> Self {
        CalibrationPlan {
            standard: "Si".to_string(),
            wavelength_guess: 0.1878,
            theta_offset: -35.26,
            motor_type: MotorKind::Theta,
            coarse_step: 0.004,
            coarse_points: 30,
            guessed_sigma: Some(0.002),
            nsigma_range: 5.0,
            nsigma_fine: 0.1,
            max_fine_points: 500,
            significance_sdev: Some(locator::DEFAULT_SDEV),
            detector: "sc_chan1".to_string(),
            motor: "th_cal".to_string(),
        }
    }
}

impl CalibrationPlan {
    /// 参数合法性检查
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("coarse_step", self.coarse_step),
            ("nsigma_range", self.nsigma_range),
            ("nsigma_fine", self.nsigma_fine),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EcalError::InvalidArgument(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !self.theta_offset.is_finite() {
            return Err(EcalError::InvalidArgument(format!(
                "theta_offset must be finite, got {}",
                self.theta_offset
            )));
        }
        if self.coarse_points < PARAMETER_COUNT {
            return Err(EcalError::InvalidArgument(format!(
                "coarse_points must be at least {}, got {}",
                PARAMETER_COUNT, self.coarse_points
            )));
        }
        if self.max_fine_points < PARAMETER_COUNT {
            return Err(EcalError::InvalidArgument(format!(
                "max_fine_points must be at least {}, got {}",
                PARAMETER_COUNT, self.max_fine_points
            )));
        }
        if let Some(sigma) = self.guessed_sigma {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(EcalError::InvalidArgument(format!(
                    "guessed_sigma must be positive, got {}",
                    sigma
                )));
            }
        }
        Ok(())
    }

    /// 细扫点数：步长约为 nsigma_fine·sigma
    pub fn fine_points(&self) -> usize {
        let n = (2.0 * self.nsigma_range / self.nsigma_fine).round() as usize + 1;
        n.clamp(PARAMETER_COUNT, self.max_fine_points)
    }
}

/// 双峰对称校准器
#[derive(Debug, Clone)]
pub struct TwoPeakCalibrator {
    table: ReferenceTable,
    fitter: LineshapeFitter,
}

impl TwoPeakCalibrator {
    pub fn new(table: ReferenceTable, fitter: LineshapeFitter) -> Self {
        Self { table, fitter }
    }

    /// 运行一次完整校准
    pub fn run<S>(&self, runner: &mut S, plan: &CalibrationPlan) -> Result<CalibrationRun>
    where
        S: ScanRunner + ?Sized,
    {
        plan.validate()?;

        // GUESS_ANGLES
        let standard = self.table.lookup(&plan.standard)?;
        let d = standard.primary();
        let (right, left) =
            bragg::symmetric_targets(plan.theta_offset, plan.wavelength_guess, d, plan.motor_type)?;
        tracing::info!(
            standard = standard.name(),
            d_spacing = d,
            right,
            left,
            motor = %plan.motor_type,
            "symmetric target angles"
        );

        let mut reflections = Vec::with_capacity(2);
        for (side, target) in [(Side::Right, right), (Side::Left, left)] {
            reflections.push(self.reflection(runner, plan, side, target)?);
        }

        // COMBINE
        let right_center = reflections[0].center();
        let left_center = reflections[1].center();
        let result = combine(left_center, right_center, d, plan.motor_type);
        tracing::info!(
            offset = result.refined_zero_offset,
            average_angle = result.average_peak_angle,
            wavelength = result.fitted_wavelength,
            energy_kev = result.energy_kev,
            "calibration complete"
        );

        Ok(CalibrationRun {
            standard: standard.name().to_string(),
            wavelength_guess: plan.wavelength_guess,
            result,
            reflections,
        })
    }

    /// 单侧反射：粗扫、粗拟合、细扫、细拟合
    fn reflection<S>(
        &self,
        runner: &mut S,
        plan: &CalibrationPlan,
        side: Side,
        target: f64,
    ) -> Result<ReflectionReport>
    where
        S: ScanRunner + ?Sized,
    {
        let abort = move |stage: Stage| move |e: EcalError| EcalError::aborted(side, stage, e);

        // COARSE_SCAN（降序）
        let half_span = plan.coarse_step * plan.coarse_points as f64;
        let coarse_trace = runner
            .run_linear_scan(
                &plan.detector,
                &plan.motor,
                target + half_span,
                target - half_span,
                plan.coarse_points,
            )
            .map_err(abort(Stage::CoarseScan))?;

        // COARSE_FIT
        let coarse_fit = self
            .coarse_fit(&coarse_trace, plan)
            .map_err(abort(Stage::CoarseFit))?;
        tracing::info!(
            %side,
            center = coarse_fit.center,
            sigma = coarse_fit.sigma,
            "coarse fit"
        );

        // FINE_SCAN
        let fine_span = plan.nsigma_range * coarse_fit.sigma;
        let fine_trace = runner
            .run_linear_scan(
                &plan.detector,
                &plan.motor,
                coarse_fit.center + fine_span,
                coarse_fit.center - fine_span,
                plan.fine_points(),
            )
            .map_err(abort(Stage::FineScan))?;

        // FINE_FIT
        let fine_fit = self
            .fit_within(&fine_trace, Some(coarse_fit.sigma))
            .map_err(abort(Stage::FineFit))?;
        tracing::info!(
            %side,
            center = fine_fit.center,
            sigma = fine_fit.sigma,
            r_squared = fine_fit.quality.r_squared,
            "fine fit"
        );

        Ok(ReflectionReport {
            side,
            target_angle: target,
            coarse: ScanFit {
                trace: coarse_trace,
                fit: coarse_fit,
            },
            fine: ScanFit {
                trace: fine_trace,
                fit: fine_fit,
            },
        })
    }

    fn coarse_fit(&self, trace: &ScanTrace, plan: &CalibrationPlan) -> Result<FitResult> {
        if let Some(sdev) = plan.significance_sdev {
            if !locator::is_peak(trace, sdev) {
                let (deviation, noise) = locator::significance(trace);
                return Err(EcalError::InsufficientSignal {
                    reason: format!(
                        "max deviation {:.4} does not exceed {} x std {:.4}",
                        deviation, sdev, noise
                    ),
                });
            }
        }
        self.fit_within(trace, plan.guessed_sigma)
    }

    /// 拟合并要求中心落在扫描范围内、sigma 为正
    fn fit_within(&self, trace: &ScanTrace, sigma: Option<f64>) -> Result<FitResult> {
        let guess = locator::locate(trace, sigma)?;
        let fit = self.fitter.fit_trace(trace, &guess)?;

        if let Some((lo, hi)) = trace.angle_range() {
            if fit.center < lo || fit.center > hi {
                return Err(EcalError::InsufficientSignal {
                    reason: format!(
                        "fitted center {:.6} lies outside the scanned range {:.6} .. {:.6}",
                        fit.center, lo, hi
                    ),
                });
            }
        }
        if !(fit.sigma.is_finite() && fit.sigma > 0.0) {
            return Err(EcalError::InsufficientSignal {
                reason: format!("fitted sigma {} is not a usable width", fit.sigma),
            });
        }
        Ok(fit)
    }
}

/// 合并两侧中心：零点、平均半间距、波长
pub fn combine(left_center: f64, right_center: f64, d: f64, motor: MotorKind) -> CalibrationResult {
    let offset = (left_center + right_center) / 2.0;
    let average = ((left_center - offset).abs() + (right_center - offset).abs()) / 2.0;
    let wavelength = bragg::wavelength_from_motor_angle(average, d, motor);
    CalibrationResult {
        refined_zero_offset: offset,
        average_peak_angle: average,
        fitted_wavelength: wavelength,
        energy_kev: bragg::energy_kev(wavelength),
        d_spacing: d,
        motor,
    }
}
