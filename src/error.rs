//! # 统一错误处理模块
//!
//! 定义 ecal 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 使用 `models/calibration.rs` 的 `Side`, `Stage`

use crate::models::{Side, Stage};
use std::time::Duration;
use thiserror::Error;

/// ecal 统一错误类型
#[derive(Error, Debug)]
pub enum EcalError {
    // ─────────────────────────────────────────────────────────────
    // 标样 / 几何错误
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown reference standard '{name}' (known: {known})")]
    UnknownStandard { name: String, known: String },

    #[error("Infeasible geometry: wavelength {wavelength:.6} Å must be below 2d = {two_d:.6} Å")]
    InfeasibleGeometry { wavelength: f64, two_d: f64 },

    // ─────────────────────────────────────────────────────────────
    // 寻峰 / 拟合错误
    // ─────────────────────────────────────────────────────────────
    #[error("Insufficient signal: {reason}")]
    InsufficientSignal { reason: String },

    #[error(
        "Fit did not converge after {iterations} iterations \
         (last estimate: center = {center:.6}, amplitude = {amplitude:.4}, sigma = {sigma:.6})"
    )]
    FitDidNotConverge {
        iterations: usize,
        center: f64,
        amplitude: f64,
        sigma: f64,
    },

    #[error("Degenerate fit: {points} data points for {parameters} free parameters")]
    FitDegenerate { points: usize, parameters: usize },

    #[error("Calibration aborted on the {side} reflection during {stage}: {source}")]
    CalibrationAborted {
        side: Side,
        stage: Stage,
        #[source]
        source: Box<EcalError>,
    },

    // ─────────────────────────────────────────────────────────────
    // 设备错误
    // ─────────────────────────────────────────────────────────────
    #[error("Timed out after {waited:?} waiting for {device} to {operation}")]
    Timeout {
        device: String,
        operation: String,
        waited: Duration,
    },

    #[error("Operation aborted: {0}")]
    Aborted(String),

    #[error("Device '{device}' is busy (status: {status})")]
    DeviceBusy { device: String, status: String },

    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("Device '{device}' failed: {reason}")]
    Device { device: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析 / 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigError { path: String, reason: String },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl EcalError {
    /// 为校准流程中的错误附加反射侧与阶段信息
    pub fn aborted(side: Side, stage: Stage, source: EcalError) -> Self {
        EcalError::CalibrationAborted {
            side,
            stage,
            source: Box::new(source),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, EcalError>;
