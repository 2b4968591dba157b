//! # standards 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/standards.rs`

use clap::Args;

/// standards 子命令参数
#[derive(Args, Debug)]
pub struct StandardsArgs {
    /// Show only this standard
    pub name: Option<String>,

    /// Also list the Bragg angle of every reflection at this wavelength (Å)
    #[arg(short, long)]
    pub wavelength: Option<f64>,
}
