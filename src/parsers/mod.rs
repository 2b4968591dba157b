//! # 解析器模块
//!
//! 读取扫描数据文件为 `ScanTrace`。
//!
//! ## 支持格式
//! - `.xy`, `.dat`, `.txt`, `.chi`: 两列文本（空白或逗号分隔）
//! - `.csv`: 带表头的 CSV，按列名取角度与强度
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/` 使用
//! - 使用 `models/trace.rs`
//! - 子模块: xy, table

pub mod table;
pub mod xy;

use crate::error::{EcalError, Result};
use crate::models::ScanTrace;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 可识别的扫描文件扩展名
pub const TRACE_EXTENSIONS: &[&str] = &["xy", "dat", "txt", "chi", "csv"];

/// CSV 中角度 / 强度列名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceColumns {
    pub angle: String,
    pub intensity: String,
}

impl Default for TraceColumns {
    fn default() -> Self {
        TraceColumns {
            angle: "th_cal".to_string(),
            intensity: "sc_chan1".to_string(),
        }
    }
}

/// 从文件路径推断格式并读取
pub fn read_trace(path: &Path, columns: &TraceColumns) -> Result<ScanTrace> {
    if !path.exists() {
        return Err(EcalError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => table::parse_csv_file(path, columns),
        "xy" | "dat" | "txt" | "chi" => xy::parse_xy_file(path),
        _ => Err(EcalError::ParseError {
            format: "trace".to_string(),
            path: path.display().to_string(),
            reason: format!(
                "unsupported extension '{}' (expected one of: {})",
                ext,
                TRACE_EXTENSIONS.join(", ")
            ),
        }),
    }
}

/// 保持文件中的顺序；角度不单调时按角度排序
pub(crate) fn build_trace(
    format: &str,
    path: &str,
    angles: Vec<f64>,
    intensities: Vec<f64>,
) -> Result<ScanTrace> {
    if angles.len() < 2 {
        return Err(EcalError::ParseError {
            format: format.to_string(),
            path: path.to_string(),
            reason: format!("expected at least 2 data rows, found {}", angles.len()),
        });
    }
    let points: Vec<(f64, f64)> = angles.iter().copied().zip(intensities.iter().copied()).collect();
    ScanTrace::new(angles, intensities)
        .or_else(|_| ScanTrace::sorted(points))
        .map_err(|e| EcalError::ParseError {
            format: format.to_string(),
            path: path.to_string(),
            reason: e.to_string(),
        })
}
