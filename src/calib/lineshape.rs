//! # 峰形模型
//!
//! 伪 Voigt 峰 + 线性背景：
//!
//! f(x) = A · [η L(u) + (1 - η) G(u)] + k (x - x_ref) + b,  u = (x - x0) / Γ
//!
//! - G(u) = exp(-4 ln2 u²), L(u) = 1 / (1 + 4u²)，两者在中心处高度均为 1，
//!   因此 A 是峰高（不是面积）
//! - Lorentz 半宽与 Gaussian sigma 绑定（γ = σ），
//!   Thompson–Cox–Hastings 近似下 Γ = κσ、η 均为常数
//!
//! ## 参考
//! - P. Thompson, D. E. Cox, J. B. Hastings, J. Appl. Cryst. 20, 79 (1987)
//!
//! ## 依赖关系
//! - 被 `calib/fitter.rs` 调用
//! - 被 `hardware/sim.rs` 用于生成模拟信号

use std::f64::consts::{LN_2, PI};
use std::sync::LazyLock;

/// 自由参数个数：amplitude, sigma, center, slope, intercept
pub const PARAMETER_COUNT: usize = 5;

/// 参数向量下标
pub const AMPLITUDE: usize = 0;
pub const SIGMA: usize = 1;
pub const CENTER: usize = 2;
pub const SLOPE: usize = 3;
pub const OFFSET: usize = 4;

/// TCH 常数
struct ShapeConstants {
    /// Γ / σ
    width_factor: f64,
    /// Lorentz 混合比例
    eta: f64,
}

static SHAPE: LazyLock<ShapeConstants> = LazyLock::new(|| {
    // σ = γ = 1
    let fg = 2.0 * (2.0 * LN_2).sqrt();
    let fl = 2.0;
    let f5 = fg.powi(5)
        + 2.69269 * fg.powi(4) * fl
        + 2.42843 * fg.powi(3) * fl.powi(2)
        + 4.47163 * fg.powi(2) * fl.powi(3)
        + 0.07842 * fg * fl.powi(4)
        + fl.powi(5);
    let width_factor = f5.powf(0.2);
    let q = fl / width_factor;
    let eta = 1.36603 * q - 0.47719 * q * q + 0.11116 * q * q * q;
    ShapeConstants { width_factor, eta }
});

/// 半高全宽
pub fn fwhm(sigma: f64) -> f64 {
    SHAPE.width_factor * sigma
}

/// 峰面积（不含背景）
pub fn area(amplitude: f64, sigma: f64) -> f64 {
    let half = fwhm(sigma) / 2.0;
    let eta = SHAPE.eta;
    amplitude * half * (eta * PI + (1.0 - eta) * (PI / LN_2).sqrt())
}

/// 单位峰高的伪 Voigt 形状 S(u) 及 dS/du
fn shape(u: f64) -> (f64, f64) {
    let eta = SHAPE.eta;
    let lor = 1.0 / (1.0 + 4.0 * u * u);
    let gau = (-4.0 * LN_2 * u * u).exp();
    let s = eta * lor + (1.0 - eta) * gau;
    let ds = -8.0 * u * (eta * lor * lor + (1.0 - eta) * LN_2 * gau);
    (s, ds)
}

/// 伪 Voigt + 线性背景模型
///
/// 背景以 `x_ref` 为参考点，使斜率与截距在拟合中近似解耦。
#[derive(Debug, Clone, Copy)]
pub struct PseudoVoigtModel {
    pub x_ref: f64,
}

impl PseudoVoigtModel {
    pub fn new(x_ref: f64) -> Self {
        Self { x_ref }
    }

    /// 模型值
    pub fn value(&self, x: f64, p: &[f64; PARAMETER_COUNT]) -> f64 {
        let width = fwhm(p[SIGMA].max(f64::MIN_POSITIVE));
        let (s, _) = shape((x - p[CENTER]) / width);
        p[AMPLITUDE] * s + p[SLOPE] * (x - self.x_ref) + p[OFFSET]
    }

    /// 模型值与对各参数的偏导
    pub fn value_and_gradient(
        &self,
        x: f64,
        p: &[f64; PARAMETER_COUNT],
    ) -> (f64, [f64; PARAMETER_COUNT]) {
        let sigma = p[SIGMA].max(f64::MIN_POSITIVE);
        let width = fwhm(sigma);
        let u = (x - p[CENTER]) / width;
        let (s, ds) = shape(u);
        let dx = x - self.x_ref;

        let value = p[AMPLITUDE] * s + p[SLOPE] * dx + p[OFFSET];
        let mut grad = [0.0; PARAMETER_COUNT];
        grad[AMPLITUDE] = s;
        grad[SIGMA] = -p[AMPLITUDE] * ds * u / sigma;
        grad[CENTER] = -p[AMPLITUDE] * ds / width;
        grad[SLOPE] = dx;
        grad[OFFSET] = 1.0;
        (value, grad)
    }
}

/// 绝对坐标下的峰形参数（截距以 x = 0 为参考）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lineshape {
    pub amplitude: f64,
    pub sigma: f64,
    pub center: f64,
    pub slope: f64,
    pub intercept: f64,
}

impl Lineshape {
    /// 在 x 处求值
    pub fn evaluate(&self, x: f64) -> f64 {
        let model = PseudoVoigtModel::new(0.0);
        model.value(
            x,
            &[
                self.amplitude,
                self.sigma,
                self.center,
                self.slope,
                self.intercept,
            ],
        )
    }

    /// 在一组角度上采样
    pub fn sample(&self, angles: &[f64]) -> Vec<f64> {
        angles.iter().map(|&x| self.evaluate(x)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_constants() {
        assert!((fwhm(1.0) - 3.59).abs() < 0.01);
        assert!((SHAPE.eta - 0.632).abs() < 0.005);
    }

    #[test]
    fn test_amplitude_is_height() {
        let peak = Lineshape {
            amplitude: 250.0,
            sigma: 0.01,
            center: -33.5,
            slope: 0.0,
            intercept: 10.0,
        };
        assert!((peak.evaluate(-33.5) - 260.0).abs() < 1e-9);
        // 半高处
        let half = peak.evaluate(-33.5 + fwhm(0.01) / 2.0) - 10.0;
        assert!((half - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let model = PseudoVoigtModel::new(-33.5);
        let p = [120.0, 0.004, -33.497, 3.0, 50.0];
        for &x in &[-33.51, -33.5, -33.495, -33.49] {
            let (_, grad) = model.value_and_gradient(x, &p);
            for i in 0..PARAMETER_COUNT {
                let h = 1e-7 * p[i].abs().max(1e-3);
                let mut hi = p;
                let mut lo = p;
                hi[i] += h;
                lo[i] -= h;
                let numeric = (model.value(x, &hi) - model.value(x, &lo)) / (2.0 * h);
                let scale = grad[i].abs().max(1.0);
                assert!(
                    (numeric - grad[i]).abs() / scale < 1e-5,
                    "param {i}: analytic {} vs numeric {}",
                    grad[i],
                    numeric
                );
            }
        }
    }

    #[test]
    fn test_area_positive_for_peak() {
        let a = area(1.0, 1.0);
        // 介于纯 Gaussian 与纯 Lorentz 面积之间
        let g = fwhm(1.0) / 2.0 * (PI / LN_2).sqrt();
        let l = fwhm(1.0) / 2.0 * PI;
        assert!(a > g.min(l) && a < g.max(l));
    }
}
