//! # 报告输出
//!
//! 拟合曲线 CSV、结果 JSON 与诊断图。
//!
//! ## 子模块
//! - `export`: CSV / JSON 导出
//! - `plot`: 数据 + 最佳拟合图，校准 2×2 总览图
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `models/` 的 ScanTrace, FitResult, CalibrationRun

pub mod export;
pub mod plot;

pub use export::{fit_to_csv, fits_summary_to_csv, write_json};
pub use plot::{plot_calibration, plot_fit};
