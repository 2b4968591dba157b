//! # 数据模型模块
//!
//! 定义扫描曲线、拟合结果与校准结果的数据模型。
//!
//! ## 依赖关系
//! - 被 `calib/`, `hardware/`, `parsers/`, `report/` 和 `commands/` 使用
//! - 子模块: trace, fit, calibration

pub mod calibration;
pub mod fit;
pub mod trace;

pub use calibration::{
    CalibrationResult, CalibrationRun, MotorKind, ReflectionReport, ScanFit, Side, Stage,
};
pub use fit::{FitQuality, FitResult, PeakGuess, Polarity};
pub use trace::ScanTrace;
