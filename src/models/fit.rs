//! # 峰形拟合数据模型
//!
//! - `PeakGuess`: 寻峰器给出的初值
//! - `FitResult`: Levenberg–Marquardt 拟合结果及诊断曲线
//!
//! 振幅约定：`amplitude` 为峰高（相对背景，带符号，dip 为负）。
//!
//! ## 依赖关系
//! - 被 `calib/locator.rs`, `calib/fitter.rs`, `calib/driver.rs` 使用
//! - 被 `report/` 使用

use serde::{Deserialize, Serialize};

/// 特征极性：峰或谷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Peak,
    Dip,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Peak => write!(f, "peak"),
            Polarity::Dip => write!(f, "dip"),
        }
    }
}

/// 拟合初值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakGuess {
    /// 峰高（带符号）
    pub amplitude: f64,
    /// Gaussian sigma（度）
    pub sigma: f64,
    /// 中心角度（度）
    pub center: f64,
    pub background_slope: f64,
    pub background_intercept: f64,
    pub polarity: Polarity,
}

/// 拟合质量指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// 残差平方和
    pub sum_squares: f64,
    /// 约化 χ²（残差平方和 / 自由度）
    pub reduced_chi_square: f64,
    /// 决定系数 R²
    pub r_squared: f64,
    /// 迭代次数
    pub iterations: usize,
    /// 数据点数
    pub points: usize,
}

/// 拟合结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub center: f64,
    pub amplitude: f64,
    pub sigma: f64,
    pub background_slope: f64,
    pub background_intercept: f64,
    pub quality: FitQuality,
    /// 拟合初值（诊断用）
    pub initial: PeakGuess,
    /// 输入角度
    pub angles: Vec<f64>,
    /// 在输入角度上采样的最佳拟合曲线
    pub best_fit: Vec<f64>,
}

impl FitResult {
    /// 特征极性
    pub fn polarity(&self) -> Polarity {
        if self.amplitude < 0.0 {
            Polarity::Dip
        } else {
            Polarity::Peak
        }
    }

    /// 半高全宽（度）
    pub fn fwhm(&self) -> f64 {
        crate::calib::lineshape::fwhm(self.sigma)
    }

    /// 积分面积（不含背景）
    pub fn area(&self) -> f64 {
        crate::calib::lineshape::area(self.amplitude, self.sigma)
    }

    /// 残差 (data - model)
    pub fn residuals(&self, intensities: &[f64]) -> Vec<f64> {
        intensities
            .iter()
            .zip(&self.best_fit)
            .map(|(y, m)| y - m)
            .collect()
    }
}
