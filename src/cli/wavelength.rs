//! # wavelength 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/wavelength.rs`

use clap::Args;
use std::path::PathBuf;

/// wavelength 子命令参数
#[derive(Args, Debug)]
pub struct WavelengthArgs {
    /// Input: symmetric 2θ scan file or directory of scans
    pub input: PathBuf,

    /// Reference standard whose d-spacings index the reflections
    #[arg(short, long, default_value = "LaB6")]
    pub standard: String,

    /// Explicit d-spacings in Å, comma separated (overrides --standard)
    #[arg(long, value_delimiter = ',')]
    pub d_spacings: Vec<f64>,

    /// Diffraction order of each reflection, comma separated (default: all 1)
    #[arg(long, value_delimiter = ',')]
    pub orders: Vec<f64>,

    /// Comparison half-width for relative maxima, in samples
    #[arg(long)]
    pub order: Option<usize>,

    /// Fit window half-width, in samples
    #[arg(long)]
    pub sides: Option<usize>,

    /// Minimum peak intensity
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Angle column name for CSV input
    #[arg(long, default_value = "tth")]
    pub angle_column: String,

    /// Intensity column name for CSV input
    #[arg(long, default_value = "intensity")]
    pub intensity_column: String,

    /// Write the results as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for input files (batch mode, e.g., "*.chi")
    #[arg(long, default_value = "")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,
}
