//! # 能量校准数据模型
//!
//! 双峰对称校准的中间产物与最终结果。
//! 所有结构都只在一次校准调用内创建和使用，不持久化。
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs` 产生
//! - 被 `error.rs`, `commands/calibrate.rs`, `report/` 使用

use super::{FitResult, ScanTrace};
use serde::{Deserialize, Serialize};

/// 对称反射的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Right,
    Left,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Right => write!(f, "right"),
            Side::Left => write!(f, "left"),
        }
    }
}

/// 单侧反射处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CoarseScan,
    CoarseFit,
    FineScan,
    FineFit,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::CoarseScan => write!(f, "coarse scan"),
            Stage::CoarseFit => write!(f, "coarse fit"),
            Stage::FineScan => write!(f, "fine scan"),
            Stage::FineFit => write!(f, "fine fit"),
        }
    }
}

/// 电机类型：θ 或 2θ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotorKind {
    #[default]
    #[serde(rename = "th")]
    Theta,
    #[serde(rename = "tth")]
    TwoTheta,
}

impl MotorKind {
    /// 电机角度与 Bragg θ 之比
    pub fn factor(self) -> f64 {
        match self {
            MotorKind::Theta => 1.0,
            MotorKind::TwoTheta => 2.0,
        }
    }
}

impl std::fmt::Display for MotorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotorKind::Theta => write!(f, "th"),
            MotorKind::TwoTheta => write!(f, "tth"),
        }
    }
}

/// 一次扫描及其拟合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFit {
    pub trace: ScanTrace,
    pub fit: FitResult,
}

/// 单侧反射的诊断信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionReport {
    pub side: Side,
    /// 由波长猜测得到的目标电机角度
    pub target_angle: f64,
    pub coarse: ScanFit,
    pub fine: ScanFit,
}

impl ReflectionReport {
    /// 细扫拟合得到的最终中心
    pub fn center(&self) -> f64 {
        self.fine.fit.center
    }
}

/// 校准结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// 修正后的角度零点（电机单位，度）
    pub refined_zero_offset: f64,
    /// 两侧半间距的平均值（电机单位，度）
    pub average_peak_angle: f64,
    /// 拟合波长（Å）
    pub fitted_wavelength: f64,
    /// 对应光子能量（keV）
    pub energy_kev: f64,
    /// 使用的主 d 间距（Å）
    pub d_spacing: f64,
    pub motor: MotorKind,
}

/// 一次完整校准运行：结果 + 诊断
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationRun {
    pub standard: String,
    pub wavelength_guess: f64,
    pub result: CalibrationResult,
    pub reflections: Vec<ReflectionReport>,
}
