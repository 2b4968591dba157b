//! # fit 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fit.rs`

use clap::Args;
use std::path::PathBuf;

/// fit 子命令参数
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Input: trace file or directory containing trace files
    pub input: PathBuf,

    /// Output: fit-curve CSV (single file) or summary CSV (directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sigma guess in degrees (default: estimate from the half-amplitude region)
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Reject traces whose feature is not above this many standard deviations
    #[arg(long)]
    pub sdev: Option<f64>,

    /// Maximum optimizer iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Angle column name for CSV input
    #[arg(long, default_value = "th_cal")]
    pub angle_column: String,

    /// Intensity column name for CSV input
    #[arg(long, default_value = "sc_chan1")]
    pub intensity_column: String,

    /// Plot of data and best fit (single file mode)
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Write the plot as SVG instead of PNG
    #[arg(long, default_value_t = false)]
    pub svg: bool,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for input files (batch mode, e.g., "*.xy,*.chi")
    #[arg(long, default_value = "")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,
}
