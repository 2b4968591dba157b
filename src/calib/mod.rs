//! # 能量校准核心
//!
//! 标样 d 间距、峰 / 谷定位、伪 Voigt 拟合、Bragg 换算与双峰对称校准。
//! 本模块只依赖 `ScanTrace` 数据，不接触设备对象。
//!
//! ## 子模块
//! - `standards`: 标样表
//! - `locator`: 峰 / 谷定位与显著性检验
//! - `lineshape`: 伪 Voigt + 线性背景模型
//! - `fitter`: Levenberg–Marquardt 拟合
//! - `bragg`: Bragg 定律换算
//! - `driver`: 双峰对称校准状态机
//! - `peaks`: 对称 2θ 扫描的多反射波长
//!
//! ## 依赖关系
//! - 被 `commands/`, `hardware/sim.rs`, `report/` 使用
//! - 使用 `models/`, `hardware/scan.rs`

pub mod bragg;
pub mod driver;
pub mod fitter;
pub mod lineshape;
pub mod locator;
pub mod peaks;
pub mod standards;
