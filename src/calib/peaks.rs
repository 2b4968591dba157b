//! # 多反射波长
//!
//! 由标样的对称 2θ 扫描（负角与正角两侧都有衍射峰）求波长：
//!
//! 1. `find_peaks` 找出相对极大并给出拟合窗口
//! 2. 每个窗口以峰值处为初值拟合伪 Voigt
//! 3. 拟合中心按正 / 负分为两组，各自按 |2θ| 递增与 d 间距依次配对
//! 4. 每一对计算 λ = 2·d·sin(|2θ|/2)/n，返回平均值与总体标准差
//!
//! ## 依赖关系
//! - 被 `commands/wavelength.rs` 调用
//! - 使用 `calib/fitter.rs`, `calib/lineshape.rs`, `calib/bragg.rs`

use crate::calib::bragg;
use crate::calib::fitter::LineshapeFitter;
use crate::calib::lineshape;
use crate::error::{EcalError, Result};
use crate::models::{FitResult, PeakGuess, Polarity, ScanTrace, Side};

use serde::{Deserialize, Serialize};

/// 寻峰参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeakSearchOptions {
    /// 相对极大的比较半径（点数）
    pub order: usize,
    /// 拟合窗口半宽（点数）
    pub sides: usize,
    /// 峰值强度下限
    pub threshold: f64,
}

impl Default for PeakSearchOptions {
    fn default() -> Self {
        PeakSearchOptions {
            order: 20,
            sides: 6,
            threshold: 0.0,
        }
    }
}

/// 峰窗口 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    pub start: usize,
    pub peak: usize,
    pub end: usize,
}

/// 寻找峰位
///
/// 峰须严格大于前后 `order` 点内的所有点，距两端至少 `sides` 点，
/// 强度不低于 `threshold`，且至少为前后 `sides` 点处强度的两倍。
pub fn find_peaks(y: &[f64], options: &PeakSearchOptions) -> Vec<PeakWindow> {
    let n = y.len();
    let sides = options.sides;
    if sides == 0 || n <= 2 * sides {
        return Vec::new();
    }

    (sides..n - sides)
        .filter(|&i| is_relative_max(y, i, options.order))
        .filter(|&i| {
            y[i] >= options.threshold && y[i] >= 2.0 * y[i - sides] && y[i] >= 2.0 * y[i + sides]
        })
        .map(|i| PeakWindow {
            start: i - sides,
            peak: i,
            end: i + sides,
        })
        .collect()
}

fn is_relative_max(y: &[f64], i: usize, order: usize) -> bool {
    let lo = i.saturating_sub(order);
    let hi = (i + order).min(y.len() - 1);
    (lo..=hi).all(|j| j == i || y[i] > y[j])
}

/// 以窗口内最大点为峰给出初值，宽度取半高以上的角度跨度
pub fn window_guess(window: &ScanTrace, peak_angle: f64) -> Result<PeakGuess> {
    let intensities = window.intensities();
    let angles = window.angles();
    let Some(step) = window.mean_step() else {
        return Err(EcalError::InsufficientSignal {
            reason: "peak window has fewer than two samples".to_string(),
        });
    };

    let max = intensities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = intensities.iter().copied().fold(f64::INFINITY, f64::min);
    let amplitude = max - min;
    let half = min + amplitude / 2.0;

    let above: Vec<f64> = angles
        .iter()
        .zip(intensities)
        .filter(|(_, &y)| y >= half)
        .map(|(&x, _)| x)
        .collect();
    let lo = above.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = above.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (hi - lo).max(step.abs());

    Ok(PeakGuess {
        amplitude,
        sigma: width / lineshape::fwhm(1.0),
        center: peak_angle,
        background_slope: 0.0,
        background_intercept: min,
        polarity: Polarity::Peak,
    })
}

/// 单个反射的波长
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionWavelength {
    pub side: Side,
    pub two_theta: f64,
    pub d_spacing: f64,
    pub order: f64,
    pub wavelength: f64,
    pub fit: FitResult,
}

/// 多反射波长结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScanWavelength {
    pub mean: f64,
    /// 总体标准差
    pub std_dev: f64,
    pub energy_kev: f64,
    pub reflections: Vec<ReflectionWavelength>,
}

/// 由对称 2θ 扫描求波长
///
/// `orders` 为各 d 间距对应的衍射级数；为空时全部取 1，否则每侧最多配对 `orders.len()` 个反射。
pub fn wavelength_from_standard_scan(
    fitter: &LineshapeFitter,
    trace: &ScanTrace,
    d_spacings: &[f64],
    orders: &[f64],
    options: &PeakSearchOptions,
) -> Result<StandardScanWavelength> {
    let trace = ScanTrace::sorted(trace.points())?;
    let windows = find_peaks(trace.intensities(), options);
    if windows.is_empty() {
        return Err(EcalError::InsufficientSignal {
            reason: format!(
                "no peaks found (order {}, sides {}, threshold {})",
                options.order, options.sides, options.threshold
            ),
        });
    }
    tracing::info!(peaks = windows.len(), "found candidate reflections");

    let mut fits = Vec::with_capacity(windows.len());
    for w in &windows {
        let window = trace.window(w.start, w.end);
        let guess = window_guess(&window, trace.angles()[w.peak])?;
        let fit = fitter.fit_trace(&window, &guess)?;
        tracing::debug!(center = fit.center, sigma = fit.sigma, "fitted reflection");
        fits.push(fit);
    }

    // 两侧均按 |2θ| 递增
    let mut right: Vec<FitResult> = fits.iter().filter(|f| f.center > 0.0).cloned().collect();
    let mut left: Vec<FitResult> = fits.iter().filter(|f| f.center < 0.0).cloned().collect();
    right.sort_by(|a, b| a.center.total_cmp(&b.center));
    left.sort_by(|a, b| b.center.total_cmp(&a.center));

    // 给出级数时按三者中最短的配对
    let paired = if orders.is_empty() {
        usize::MAX
    } else {
        orders.len()
    };
    let mut reflections = Vec::new();
    for (side, set) in [(Side::Right, right), (Side::Left, left)] {
        for (i, (fit, &d)) in set.into_iter().zip(d_spacings).take(paired).enumerate() {
            let order = orders.get(i).copied().unwrap_or(1.0);
            let two_theta = fit.center.abs();
            let wavelength = bragg::wavelength_from_two_theta(two_theta, d, order);
            reflections.push(ReflectionWavelength {
                side,
                two_theta,
                d_spacing: d,
                order,
                wavelength,
                fit,
            });
        }
    }

    if reflections.is_empty() {
        return Err(EcalError::InsufficientSignal {
            reason: "no fitted reflection could be paired with a d-spacing".to_string(),
        });
    }

    let n = reflections.len() as f64;
    let mean = reflections.iter().map(|r| r.wavelength).sum::<f64>() / n;
    let variance = reflections
        .iter()
        .map(|r| (r.wavelength - mean).powi(2))
        .sum::<f64>()
        / n;

    tracing::info!(wavelength = mean, reflections = reflections.len(), "standard scan wavelength");

    Ok(StandardScanWavelength {
        mean,
        std_dev: variance.sqrt(),
        energy_kev: bragg::energy_kev(mean),
        reflections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::lineshape::Lineshape;
    use crate::calib::standards::ReferenceTable;

    /// 对称 2θ 扫描：±2θ 处各一个峰
    fn symmetric_scan(wavelength: f64, d_spacings: &[f64], shift: f64) -> ScanTrace {
        let angles: Vec<f64> = (0..=2000).map(|i| -10.0 + 0.01 * i as f64).collect();
        let mut peaks = Vec::new();
        for &d in d_spacings {
            let tth = 2.0 * bragg::bragg_angle(wavelength, d).unwrap();
            for c in [tth + shift, -tth + shift] {
                peaks.push(Lineshape {
                    amplitude: 1000.0,
                    sigma: 0.02,
                    center: c,
                    slope: 0.0,
                    intercept: 0.0,
                });
            }
        }
        let intensities = angles
            .iter()
            .map(|&x| 10.0 + peaks.iter().map(|p| p.evaluate(x)).sum::<f64>())
            .collect();
        ScanTrace::new(angles, intensities).unwrap()
    }

    #[test]
    fn test_find_peaks_windows() {
        let mut y = vec![1.0; 60];
        y[30] = 10.0;
        y[29] = 6.0;
        y[31] = 6.0;
        let options = PeakSearchOptions::default();
        let peaks = find_peaks(&y, &options);
        assert_eq!(
            peaks,
            vec![PeakWindow {
                start: 24,
                peak: 30,
                end: 36
            }]
        );

        // 过于靠近末端
        let mut edge = vec![1.0; 60];
        edge[56] = 10.0;
        assert!(find_peaks(&edge, &options).is_empty());

        // 强度门槛
        let strict = PeakSearchOptions {
            threshold: 20.0,
            ..options
        };
        assert!(find_peaks(&y, &strict).is_empty());
    }

    #[test]
    fn test_find_peaks_requires_drop_off() {
        // 宽峰：sides 点外强度仍高于一半
        let y: Vec<f64> = (0..100)
            .map(|i| 10.0 - 1e-4 * (i as f64 - 50.0).powi(2))
            .collect();
        assert!(find_peaks(&y, &PeakSearchOptions::default()).is_empty());
    }

    #[test]
    fn test_wavelength_from_lab6_scan() {
        let table = ReferenceTable::builtin();
        let lab6 = table.lookup("LaB6").unwrap();
        let trace = symmetric_scan(0.1878, lab6.d_spacings(), 0.0);

        let result = wavelength_from_standard_scan(
            &LineshapeFitter::default(),
            &trace,
            lab6.d_spacings(),
            &[],
            &PeakSearchOptions::default(),
        )
        .unwrap();

        assert_eq!(result.reflections.len(), 6);
        assert!((result.mean - 0.1878).abs() / 0.1878 < 1e-4);
        assert!(result.std_dev < 2e-5);
        let right: Vec<f64> = result
            .reflections
            .iter()
            .filter(|r| r.side == Side::Right)
            .map(|r| r.d_spacing)
            .collect();
        assert_eq!(right, lab6.d_spacings());
    }

    #[test]
    fn test_short_orders_limit_pairing() {
        let table = ReferenceTable::builtin();
        let lab6 = table.lookup("LaB6").unwrap();
        let trace = symmetric_scan(0.1878, lab6.d_spacings(), 0.0);

        let result = wavelength_from_standard_scan(
            &LineshapeFitter::default(),
            &trace,
            lab6.d_spacings(),
            &[1.0, 1.0],
            &PeakSearchOptions::default(),
        )
        .unwrap();

        assert_eq!(result.reflections.len(), 4);
        assert!(result.reflections.iter().all(|r| r.order == 1.0));
        assert!((result.mean - 0.1878).abs() / 0.1878 < 1e-4);
    }

    #[test]
    fn test_zero_shift_spreads_wavelengths() {
        let table = ReferenceTable::builtin();
        let lab6 = table.lookup("LaB6").unwrap();
        let trace = symmetric_scan(0.1878, lab6.d_spacings(), 0.05);

        let result = wavelength_from_standard_scan(
            &LineshapeFitter::default(),
            &trace,
            lab6.d_spacings(),
            &[],
            &PeakSearchOptions::default(),
        )
        .unwrap();
        // 零点偏移使两侧波长不一致
        assert!(result.std_dev > 1e-4);
    }

    #[test]
    fn test_flat_scan_has_no_peaks() {
        let angles: Vec<f64> = (0..200).map(|i| -1.0 + 0.01 * i as f64).collect();
        let trace = ScanTrace::new(angles, vec![5.0; 200]).unwrap();
        let err = wavelength_from_standard_scan(
            &LineshapeFitter::default(),
            &trace,
            &[3.0],
            &[],
            &PeakSearchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EcalError::InsufficientSignal { .. }));
    }
}
