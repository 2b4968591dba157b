//! # 峰 / 谷定位器
//!
//! 根据扫描曲线判断特征极性并给出拟合初值。
//!
//! ## 算法
//! 1. average = mean(I)
//! 2. dip = min(I) - average，peak = max(I) - average；|dip| > peak 判为谷
//! 3. sigma：未外部给定时，取 |I - average| < |amp|/2 的点（不要求连续）
//!    所覆盖的角度跨度的一半
//! 4. center：|I - average| 最大处的角度
//! 5. 背景：截距 = average，斜率 = 0
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs`, `calib/peaks.rs`, `commands/fit.rs` 调用
//! - 使用 `models/` 的 ScanTrace, PeakGuess

use crate::error::{EcalError, Result};
use crate::models::{PeakGuess, Polarity, ScanTrace};

/// 默认显著性阈值（标准差倍数）
pub const DEFAULT_SDEV: f64 = 2.0;

/// 由扫描曲线生成拟合初值
///
/// `sigma` 为外部给定的宽度初值；为 `None` 时由半幅区域估计，
/// 该区域为空或跨度为零时返回 `InsufficientSignal`。
pub fn locate(trace: &ScanTrace, sigma: Option<f64>) -> Result<PeakGuess> {
    if trace.is_empty() {
        return Err(EcalError::InsufficientSignal {
            reason: "scan trace is empty".to_string(),
        });
    }

    let angles = trace.angles();
    let intensities = trace.intensities();
    let average = trace.mean();

    let min = intensities.iter().copied().fold(f64::INFINITY, f64::min);
    let max = intensities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let dip_amplitude = min - average;
    let peak_amplitude = max - average;

    let (amplitude, polarity) = if dip_amplitude.abs() > peak_amplitude {
        (dip_amplitude, Polarity::Dip)
    } else {
        (peak_amplitude, Polarity::Peak)
    };

    let sigma = match sigma {
        Some(s) => s,
        None => half_amplitude_sigma(angles, intensities, average, amplitude)?,
    };

    // |I - average| 最大处
    let mut best = 0;
    let mut best_dev = f64::NEG_INFINITY;
    for (i, y) in intensities.iter().enumerate() {
        let dev = (y - average).abs();
        if dev > best_dev {
            best_dev = dev;
            best = i;
        }
    }

    tracing::debug!(
        %polarity,
        amplitude,
        sigma,
        center = angles[best],
        "located feature"
    );

    Ok(PeakGuess {
        amplitude,
        sigma,
        center: angles[best],
        background_slope: 0.0,
        background_intercept: average,
        polarity,
    })
}

/// 半幅区域跨度的一半
fn half_amplitude_sigma(
    angles: &[f64],
    intensities: &[f64],
    average: f64,
    amplitude: f64,
) -> Result<f64> {
    let threshold = amplitude.abs() / 2.0;
    let inside: Vec<usize> = intensities
        .iter()
        .enumerate()
        .filter(|(_, y)| (*y - average).abs() < threshold)
        .map(|(i, _)| i)
        .collect();

    let (first, last) = match (inside.first(), inside.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => {
            return Err(EcalError::InsufficientSignal {
                reason: format!(
                    "no samples within half amplitude ({:.4}) of the mean {:.4}",
                    threshold, average
                ),
            })
        }
    };

    let width = (angles[last] - angles[first]).abs();
    if width <= 0.0 {
        return Err(EcalError::InsufficientSignal {
            reason: "half-amplitude region has zero angular width".to_string(),
        });
    }
    Ok(width / 2.0)
}

/// 显著性检验：max|I - mean| > sdev · std(I)
pub fn is_peak(trace: &ScanTrace, sdev: f64) -> bool {
    let (deviation, noise) = significance(trace);
    deviation > sdev * noise
}

/// (max|I - mean|, std(I))
pub fn significance(trace: &ScanTrace) -> (f64, f64) {
    let average = trace.mean();
    let deviation = trace
        .intensities()
        .iter()
        .map(|y| (y - average).abs())
        .fold(0.0, f64::max);
    (deviation, trace.std_dev())
}
