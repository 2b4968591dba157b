//! # calibrate 子命令 CLI 定义
//!
//! 未给出的参数取配置文件中 `[calibration]` / `[simulation]` 的值，
//! 再退回内置默认值。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/calibrate.rs`

use crate::models::MotorKind;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 扫描数据来源
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum Backend {
    /// Simulated beamline with reflections at a known wavelength
    #[default]
    Sim,
    /// Interpolate scans from a recorded dense trace file
    Replay,
}

/// 电机类型
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MotorArg {
    /// θ motor (factor 1)
    Th,
    /// 2θ motor (factor 2)
    Tth,
}

impl From<MotorArg> for MotorKind {
    fn from(arg: MotorArg) -> Self {
        match arg {
            MotorArg::Th => MotorKind::Theta,
            MotorArg::Tth => MotorKind::TwoTheta,
        }
    }
}

/// calibrate 子命令参数
#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Where scan data comes from
    #[arg(long, value_enum, default_value = "sim")]
    pub backend: Backend,

    /// Recorded trace file (.xy/.chi/.dat/.txt/.csv) for the replay backend
    #[arg(long, required_if_eq("backend", "replay"))]
    pub trace: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // 校准参数
    // ─────────────────────────────────────────────────────────────
    /// Reference standard name (e.g., Si, LaB6)
    #[arg(short, long)]
    pub standard: Option<String>,

    /// Guessed wavelength in Å
    #[arg(short, long)]
    pub wavelength: Option<f64>,

    /// Guessed photon energy in keV (alternative to --wavelength)
    #[arg(short, long, conflicts_with = "wavelength")]
    pub energy: Option<f64>,

    /// Guessed angular zero offset in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f64>,

    /// Motor type
    #[arg(long, value_enum)]
    pub motor_type: Option<MotorArg>,

    /// Coarse scan step in degrees
    #[arg(long)]
    pub coarse_step: Option<f64>,

    /// Number of points per coarse scan
    #[arg(long)]
    pub coarse_points: Option<usize>,

    /// Sigma guess for the coarse fit in degrees
    #[arg(long, conflicts_with = "estimate_sigma")]
    pub sigma: Option<f64>,

    /// Estimate the coarse sigma from the half-amplitude region instead
    #[arg(long, default_value_t = false)]
    pub estimate_sigma: bool,

    /// Half-width of the fine scan in units of the fitted sigma
    #[arg(long)]
    pub nsigma_range: Option<f64>,

    /// Fine scan step in units of the fitted sigma
    #[arg(long)]
    pub nsigma_fine: Option<f64>,

    /// Significance threshold (standard deviations) for the coarse scan
    #[arg(long, conflicts_with = "no_significance")]
    pub sdev: Option<f64>,

    /// Fit the coarse scan without the significance check
    #[arg(long, default_value_t = false)]
    pub no_significance: bool,

    /// Detector channel name
    #[arg(long)]
    pub detector: Option<String>,

    /// Motor channel name
    #[arg(long)]
    pub motor: Option<String>,

    // ─────────────────────────────────────────────────────────────
    // 模拟光束线
    // ─────────────────────────────────────────────────────────────
    /// True wavelength of the simulated beamline in Å
    #[arg(long)]
    pub true_wavelength: Option<f64>,

    /// True zero offset of the simulated beamline in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub true_offset: Option<f64>,

    /// Gaussian noise standard deviation of the simulated detector
    #[arg(long)]
    pub noise: Option<f64>,

    /// Random seed for the simulated detector noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load this sample with the robot before calibrating, unload afterwards
    #[arg(long)]
    pub sample: Option<u32>,

    // ─────────────────────────────────────────────────────────────
    // 输出
    // ─────────────────────────────────────────────────────────────
    /// Write the full calibration run (result + scans + fits) as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write a 2×2 overview plot of the coarse and fine fits
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Write the plot as SVG instead of PNG
    #[arg(long, default_value_t = false)]
    pub svg: bool,
}
