//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config.rs`, `calib/`, `hardware/`, `parsers/`, `report/`, `utils/`
//! - 子模块: calibrate, fit, wavelength, standards

pub mod calibrate;
pub mod fit;
pub mod standards;
pub mod wavelength;

use crate::cli::{Cli, Commands};
use crate::config::EcalConfig;
use crate::error::Result;

/// 读取配置并执行命令
pub fn run(cli: Cli) -> Result<()> {
    let config = EcalConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Calibrate(args) => calibrate::execute(args, &config),
        Commands::Fit(args) => fit::execute(args, &config),
        Commands::Wavelength(args) => wavelength::execute(args, &config),
        Commands::Standards(args) => standards::execute(args, &config),
    }
}
