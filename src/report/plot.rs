//! # 诊断图
//!
//! 使用 `plotters` 绘制扫描数据与最佳拟合曲线。
//!
//! ## 功能
//! - 单条扫描：数据点 + 拟合曲线 + 拟合中心竖线
//! - 校准总览：右 / 左反射的粗扫与细扫 2×2 面板
//! - 支持 PNG 和 SVG 输出
//!
//! ## 依赖关系
//! - 被 `commands/calibrate.rs`, `commands/fit.rs` 调用
//! - 使用 `models/` 的 ScanTrace, FitResult, CalibrationRun

use crate::error::{EcalError, Result};
use crate::models::{CalibrationRun, FitResult, ScanTrace};

use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// 默认图像尺寸（像素）
pub const DEFAULT_SIZE: (u32, u32) = (1200, 800);

fn plot_error<E: std::fmt::Debug>(e: E) -> EcalError {
    EcalError::Other(format!("plotting failed: {:?}", e))
}

/// 绘制单条扫描及其拟合
pub fn plot_fit(
    trace: &ScanTrace,
    fit: &FitResult,
    output_path: &Path,
    title: &str,
    size: (u32, u32),
    use_svg: bool,
) -> Result<()> {
    if use_svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        draw_fit_panel(&root, trace, fit, title)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        draw_fit_panel(&root, trace, fit, title)?;
        root.present().map_err(plot_error)?;
    }
    Ok(())
}

/// 校准总览：上行右侧、下行左侧；左列粗扫、右列细扫
pub fn plot_calibration(
    run: &CalibrationRun,
    output_path: &Path,
    size: (u32, u32),
    use_svg: bool,
) -> Result<()> {
    if use_svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_calibration(&root, run)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_calibration(&root, run)?;
        root.present().map_err(plot_error)?;
    }
    Ok(())
}

fn draw_calibration<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    run: &CalibrationRun,
) -> Result<()> {
    root.fill(&WHITE).map_err(plot_error)?;
    let r = &run.result;
    let root = root
        .titled(
            &format!(
                "{}: λ = {:.6} Å ({:.4} keV), offset = {:.5}°",
                run.standard, r.fitted_wavelength, r.energy_kev, r.refined_zero_offset
            ),
            ("sans-serif", 22),
        )
        .map_err(plot_error)?;

    let panels = root.split_evenly((2, 2));
    for (reflection, row) in run.reflections.iter().zip(panels.chunks(2)) {
        for (scan, (area, stage)) in [&reflection.coarse, &reflection.fine]
            .into_iter()
            .zip(row.iter().zip(["coarse", "fine"]))
        {
            let title = format!("{} {} ({:.5}°)", reflection.side, stage, scan.fit.center);
            draw_fit_panel(area, &scan.trace, &scan.fit, &title)?;
        }
    }
    Ok(())
}

/// 绘制一个面板
fn draw_fit_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trace: &ScanTrace,
    fit: &FitResult,
    title: &str,
) -> Result<()> {
    let (x_min, x_max) = padded_range(trace.angles().iter().copied());
    let (y_min, y_max) = padded_range(
        trace
            .intensities()
            .iter()
            .chain(fit.best_fit.iter())
            .copied(),
    );

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Angle (°)")
        .y_desc("Intensity")
        .x_label_style(("sans-serif", 12))
        .y_label_style(("sans-serif", 12))
        .axis_desc_style(("sans-serif", 14))
        .draw()
        .map_err(plot_error)?;

    let data_color = RGBColor(0, 102, 204);
    chart
        .draw_series(
            trace
                .points()
                .map(|(x, y)| Circle::new((x, y), 3, data_color.filled())),
        )
        .map_err(plot_error)?
        .label("data")
        .legend(move |(x, y)| Circle::new((x + 10, y), 3, data_color.filled()));

    let fit_color = RGBColor(204, 51, 0);
    chart
        .draw_series(LineSeries::new(
            fit.angles.iter().copied().zip(fit.best_fit.iter().copied()),
            fit_color.stroke_width(2),
        ))
        .map_err(plot_error)?
        .label("best fit")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], fit_color.stroke_width(2)));

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(fit.center, y_min), (fit.center, y_max)],
            BLACK.mix(0.4).stroke_width(1),
        )))
        .map_err(plot_error)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 12))
        .draw()
        .map_err(plot_error)?;

    Ok(())
}

/// 数据范围加 5% 边距；退化范围扩展为 ±1
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span <= 0.0 {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - 0.05 * span, hi + 0.05 * span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_range() {
        let (lo, hi) = padded_range([0.0, 10.0, 5.0].into_iter());
        assert!((lo + 0.5).abs() < 1e-12);
        assert!((hi - 10.5).abs() < 1e-12);
        assert_eq!(padded_range([3.0, 3.0].into_iter()), (2.0, 4.0));
        assert_eq!(padded_range(std::iter::empty()), (0.0, 1.0));
    }
}
