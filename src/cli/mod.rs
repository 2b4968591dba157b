//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `calibrate`: 双峰对称能量校准（模拟光束线或记录数据回放）
//! - `fit`: 对扫描文件拟合单个峰 / 谷
//! - `wavelength`: 对称 2θ 扫描的多反射波长
//! - `standards`: 列出标样
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: calibrate, fit, wavelength, standards

pub mod calibrate;
pub mod fit;
pub mod standards;
pub mod wavelength;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// ecal - 光束线能量校准工具
#[derive(Parser)]
#[command(name = "ecal")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Beamline energy calibration: peak search, lineshape fitting and Bragg wavelength refinement", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug; RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file
    #[arg(long, global = true, env = "ECAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Two-peak symmetric calibration of wavelength and angular zero offset
    Calibrate(calibrate::CalibrateArgs),

    /// Fit a pseudo-Voigt peak or dip to a trace file or a directory of them
    Fit(fit::FitArgs),

    /// Wavelength from the reflections of a symmetric 2θ scan of a standard
    Wavelength(wavelength::WavelengthArgs),

    /// List reference standards and their d-spacings
    Standards(standards::StandardsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_calibrate_with_negative_offset() {
        let cli = Cli::try_parse_from([
            "ecal", "-vv", "calibrate", "--offset", "-35.26", "--motor-type", "tth",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Calibrate(args) => {
                assert_eq!(args.offset, Some(-35.26));
                assert_eq!(args.motor_type, Some(calibrate::MotorArg::Tth));
            }
            _ => panic!("expected calibrate"),
        }
    }
}
