//! # ecal - 光束线能量校准工具
//!
//! 扫描标样的两个对称 Bragg 反射，拟合峰形，求出单色器波长与角度零点。
//!
//! ## 子命令
//! - `calibrate`  - 两峰校准（模拟设备或回放已记录的扫描）
//! - `fit`        - 对扫描文件拟合单峰/谷
//! - `wavelength` - 由对称 2θ 扫描的全部反射求波长
//! - `standards`  - 列出标样及其 Bragg 角
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── calib/     (寻峰、拟合、校准流程)
//!   │     ├── hardware/  (设备抽象与扫描)
//!   │     ├── parsers/   (扫描文件解析)
//!   │     ├── report/    (CSV/JSON 导出与绘图)
//!   │     ├── batch/     (并行批处理)
//!   │     └── models/    (数据模型)
//!   ├── config.rs   (TOML 配置)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod calib;
mod cli;
mod commands;
mod config;
mod error;
mod hardware;
mod models;
mod parsers;
mod report;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = commands::run(cli) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}

/// `RUST_LOG` 优先；否则按 `-v` 次数选择级别
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "ecal=warn",
        1 => "ecal=info",
        _ => "ecal=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
