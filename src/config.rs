//! # 配置文件
//!
//! 可选的 TOML 配置文件，各节均有默认值，未知键报错。
//! 优先级：命令行参数 > 配置文件 > 内置默认值。
//!
//! ```toml
//! [calibration]
//! standard = "Si"
//! wavelength_guess = 0.1878
//! theta_offset = -35.26
//! motor_type = "th"
//!
//! [fit]
//! max_iterations = 200
//!
//! [standards]
//! CeO2 = [3.1244, 2.7058, 1.9132]
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `calib/`, `hardware/` 的参数结构

use crate::calib::driver::CalibrationPlan;
use crate::calib::fitter::FitOptions;
use crate::calib::peaks::PeakSearchOptions;
use crate::calib::standards::{ReferenceStandard, ReferenceTable};
use crate::error::{EcalError, Result};
use crate::hardware::{PollConfig, SimulationConfig};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcalConfig {
    pub calibration: CalibrationPlan,
    pub fit: FitOptions,
    pub peaks: PeakSearchOptions,
    pub poll: PollConfig,
    pub simulation: SimulationConfig,
    /// 额外标样：名称 -> d 间距（Å）
    pub standards: BTreeMap<String, Vec<f64>>,
}

impl EcalConfig {
    /// 读取配置文件
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EcalError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| EcalError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            EcalError::ConfigError { reason, .. } => EcalError::ConfigError {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// 未给出路径时使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: EcalConfig = toml::from_str(text).map_err(|e| EcalError::ConfigError {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        // 提前检查额外标样
        config.reference_table()?;
        Ok(config)
    }

    /// 内置标样表加上配置中的额外标样
    pub fn reference_table(&self) -> Result<ReferenceTable> {
        let mut table = ReferenceTable::builtin();
        for (name, d_spacings) in &self.standards {
            let standard = ReferenceStandard::new(name.clone(), d_spacings.clone()).map_err(|e| {
                EcalError::ConfigError {
                    path: "[standards]".to_string(),
                    reason: e.to_string(),
                }
            })?;
            table.insert(standard);
        }
        Ok(table)
    }
}
