//! # 批量处理模块
//!
//! 对目录中的多个扫描文件并行执行拟合或波长计算。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs`, `commands/wavelength.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchRunner, FileOutcome};
