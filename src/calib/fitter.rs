//! # 峰形拟合器
//!
//! 以 Levenberg–Marquardt 非线性最小二乘拟合伪 Voigt + 线性背景模型。
//!
//! ## 算法概述
//! 1. 解析 Jacobian 构造法方程 JᵀJ δ = Jᵀr
//! 2. Marquardt 对角缩放阻尼：(JᵀJ + λ diag(JᵀJ)) δ = Jᵀr
//! 3. 代价下降则接受并减小 λ，否则增大 λ 重试
//! 4. 相对代价下降或相对步长低于容差即收敛；
//!    λ 超过上限仍无下降方向时视为已达极小
//! 5. sigma 约束为不小于 `min_sigma`
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs`, `calib/peaks.rs`, `commands/fit.rs` 调用
//! - 使用 `calib/lineshape.rs` 的模型与偏导
//! - 使用 `calib/locator.rs` 生成初值

use crate::calib::lineshape::{
    PseudoVoigtModel, AMPLITUDE, CENTER, OFFSET, PARAMETER_COUNT, SIGMA, SLOPE,
};
use crate::calib::locator;
use crate::error::{EcalError, Result};
use crate::models::{FitQuality, FitResult, PeakGuess, ScanTrace};

use serde::{Deserialize, Serialize};

type Params = [f64; PARAMETER_COUNT];
type Matrix = [[f64; PARAMETER_COUNT]; PARAMETER_COUNT];

const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// 拟合选项
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitOptions {
    /// 最大迭代次数（Jacobian 计算次数）
    pub max_iterations: usize,
    /// 相对代价下降容差
    pub ftol: f64,
    /// 相对步长容差
    pub xtol: f64,
    /// sigma 下限（度）
    pub min_sigma: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            min_sigma: 1e-9,
        }
    }
}

/// 峰形拟合器
#[derive(Debug, Clone, Default)]
pub struct LineshapeFitter {
    options: FitOptions,
}

impl LineshapeFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    /// 拟合扫描曲线
    pub fn fit_trace(&self, trace: &ScanTrace, guess: &PeakGuess) -> Result<FitResult> {
        self.fit(trace.angles(), trace.intensities(), guess)
    }

    /// 拟合 (angles, intensities)
    pub fn fit(&self, angles: &[f64], intensities: &[f64], guess: &PeakGuess) -> Result<FitResult> {
        if angles.len() != intensities.len() {
            return Err(EcalError::InvalidArgument(format!(
                "{} angles but {} intensities",
                angles.len(),
                intensities.len()
            )));
        }
        let n = angles.len();
        if n < PARAMETER_COUNT {
            return Err(EcalError::FitDegenerate {
                points: n,
                parameters: PARAMETER_COUNT,
            });
        }

        let initial = [
            guess.amplitude,
            guess.sigma,
            guess.center,
            guess.background_slope,
            guess.background_intercept,
        ];
        if initial.iter().any(|v| !v.is_finite()) {
            return Err(EcalError::InvalidArgument(format!(
                "initial guess contains a non-finite value: {:?}",
                guess
            )));
        }

        // 以角度均值为背景参考点
        let x_ref = angles.iter().sum::<f64>() / n as f64;
        let model = PseudoVoigtModel::new(x_ref);
        let mut p: Params = [
            guess.amplitude,
            guess.sigma.max(self.options.min_sigma),
            guess.center,
            guess.background_slope,
            guess.background_intercept + guess.background_slope * x_ref,
        ];

        let mut cost = sum_squares(&model, angles, intensities, &p);
        if !cost.is_finite() {
            return Err(self.not_converged(0, &p));
        }

        let mut lambda = LAMBDA_INITIAL;
        for iteration in 1..=self.options.max_iterations {
            let (jtj, jtr) = normal_equations(&model, angles, intensities, &p);

            let accepted = loop {
                if let Some(delta) = solve_damped(&jtj, &jtr, lambda) {
                    let mut trial = p;
                    for (t, d) in trial.iter_mut().zip(delta.iter()) {
                        *t += d;
                    }
                    trial[SIGMA] = trial[SIGMA].max(self.options.min_sigma);
                    let trial_cost = sum_squares(&model, angles, intensities, &trial);
                    if trial_cost.is_finite() && trial_cost < cost {
                        break Some((trial, trial_cost));
                    }
                }
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    break None;
                }
            };

            let Some((trial, trial_cost)) = accepted else {
                // 已无下降方向
                tracing::debug!(iteration, cost, "no downhill step left");
                return Ok(self.finish(&model, angles, intensities, &p, cost, iteration, guess));
            };

            let reduction = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
            let step_small = trial
                .iter()
                .zip(p.iter())
                .all(|(t, o)| (t - o).abs() <= self.options.xtol * (o.abs() + self.options.xtol));

            p = trial;
            cost = trial_cost;
            lambda = (lambda / 10.0).max(LAMBDA_MIN);

            tracing::debug!(
                iteration,
                cost,
                lambda,
                center = p[CENTER],
                sigma = p[SIGMA],
                "lm step accepted"
            );

            if reduction <= self.options.ftol || step_small || cost == 0.0 {
                return Ok(self.finish(&model, angles, intensities, &p, cost, iteration, guess));
            }
        }

        Err(self.not_converged(self.options.max_iterations, &p))
    }

    fn not_converged(&self, iterations: usize, p: &Params) -> EcalError {
        EcalError::FitDidNotConverge {
            iterations,
            center: p[CENTER],
            amplitude: p[AMPLITUDE],
            sigma: p[SIGMA],
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        model: &PseudoVoigtModel,
        angles: &[f64],
        intensities: &[f64],
        p: &Params,
        cost: f64,
        iterations: usize,
        guess: &PeakGuess,
    ) -> FitResult {
        let n = angles.len();
        let best_fit: Vec<f64> = angles.iter().map(|&x| model.value(x, p)).collect();

        let mean = intensities.iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = intensities.iter().map(|y| (y - mean) * (y - mean)).sum();
        let r_squared = if ss_tot > 0.0 {
            1.0 - cost / ss_tot
        } else if cost == 0.0 {
            1.0
        } else {
            0.0
        };
        let dof = n.saturating_sub(PARAMETER_COUNT).max(1);

        tracing::info!(
            center = p[CENTER],
            amplitude = p[AMPLITUDE],
            sigma = p[SIGMA],
            iterations,
            "fit converged"
        );

        FitResult {
            center: p[CENTER],
            amplitude: p[AMPLITUDE],
            sigma: p[SIGMA],
            background_slope: p[SLOPE],
            background_intercept: p[OFFSET] - p[SLOPE] * model.x_ref,
            quality: FitQuality {
                sum_squares: cost,
                reduced_chi_square: cost / dof as f64,
                r_squared,
                iterations,
                points: n,
            },
            initial: *guess,
            angles: angles.to_vec(),
            best_fit,
        }
    }
}

/// 定位 + 拟合
pub fn guess_and_fit(
    fitter: &LineshapeFitter,
    trace: &ScanTrace,
    sigma: Option<f64>,
) -> Result<FitResult> {
    let guess = locator::locate(trace, sigma)?;
    fitter.fit_trace(trace, &guess)
}

/// 残差平方和
fn sum_squares(model: &PseudoVoigtModel, angles: &[f64], intensities: &[f64], p: &Params) -> f64 {
    angles
        .iter()
        .zip(intensities)
        .map(|(&x, &y)| {
            let r = y - model.value(x, p);
            r * r
        })
        .sum()
}

/// 构造 JᵀJ 与 Jᵀr
fn normal_equations(
    model: &PseudoVoigtModel,
    angles: &[f64],
    intensities: &[f64],
    p: &Params,
) -> (Matrix, Params) {
    let mut jtj = [[0.0; PARAMETER_COUNT]; PARAMETER_COUNT];
    let mut jtr = [0.0; PARAMETER_COUNT];

    for (&x, &y) in angles.iter().zip(intensities) {
        let (value, grad) = model.value_and_gradient(x, p);
        let r = y - value;
        for i in 0..PARAMETER_COUNT {
            jtr[i] += grad[i] * r;
            for j in 0..=i {
                jtj[i][j] += grad[i] * grad[j];
            }
        }
    }
    for i in 0..PARAMETER_COUNT {
        for j in 0..i {
            jtj[j][i] = jtj[i][j];
        }
    }
    (jtj, jtr)
}

/// 求解 (JᵀJ + λ diag) δ = Jᵀr，矩阵奇异时返回 None
fn solve_damped(jtj: &Matrix, jtr: &Params, lambda: f64) -> Option<Params> {
    let max_diag = (0..PARAMETER_COUNT).map(|i| jtj[i][i]).fold(0.0, f64::max);
    let floor = if max_diag > 0.0 {
        max_diag * 1e-15
    } else {
        f64::MIN_POSITIVE
    };

    let mut a = *jtj;
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += lambda * jtj[i][i].max(floor);
    }
    solve_linear(a, *jtr)
}

/// 列主元 Gauss 消元
fn solve_linear(mut a: Matrix, mut b: Params) -> Option<Params> {
    const N: usize = PARAMETER_COUNT;

    for col in 0..N {
        let pivot = (col..N).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if !a[pivot][col].is_finite() || a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..N {
            let factor = a[row][col] / a[col][col];
            for k in col..N {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; N];
    for row in (0..N).rev() {
        let mut sum = b[row];
        for k in row + 1..N {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
