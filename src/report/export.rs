//! # 数据导出
//!
//! ## 支持格式
//! - 拟合曲线 CSV: angle, intensity, best_fit, residual
//! - 批量拟合汇总 CSV: 每个文件一行拟合参数
//! - JSON: 任意可序列化结果（校准运行、多反射波长）
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `csv`, `serde_json`

use crate::error::{EcalError, Result};
use crate::models::{FitResult, ScanTrace};

use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 导出单条拟合曲线
pub fn fit_to_csv(trace: &ScanTrace, fit: &FitResult, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["angle", "intensity", "best_fit", "residual"])?;

    let residuals = fit.residuals(trace.intensities());
    for (((angle, intensity), best), residual) in trace
        .points()
        .zip(&fit.best_fit)
        .zip(&residuals)
    {
        wtr.write_record(&[
            format!("{:.6}", angle),
            format!("{:.6}", intensity),
            format!("{:.6}", best),
            format!("{:.6}", residual),
        ])?;
    }

    wtr.flush().map_err(|e| EcalError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 导出批量拟合汇总
pub fn fits_summary_to_csv(rows: &[(String, FitResult)], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record([
        "file",
        "polarity",
        "center",
        "amplitude",
        "sigma",
        "fwhm",
        "background_slope",
        "background_intercept",
        "r_squared",
        "iterations",
    ])?;

    for (name, fit) in rows {
        wtr.write_record(&[
            name.clone(),
            fit.polarity().to_string(),
            format!("{:.6}", fit.center),
            format!("{:.4}", fit.amplitude),
            format!("{:.6}", fit.sigma),
            format!("{:.6}", fit.fwhm()),
            format!("{:.6}", fit.background_slope),
            format!("{:.4}", fit.background_intercept),
            format!("{:.6}", fit.quality.r_squared),
            fit.quality.iterations.to_string(),
        ])?;
    }

    wtr.flush().map_err(|e| EcalError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 写出 JSON（缩进格式）
pub fn write_json<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    let file = File::create(output_path).map_err(|e| EcalError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::fitter::LineshapeFitter;
    use crate::calib::lineshape::Lineshape;
    use crate::calib::locator;

    fn fitted() -> (ScanTrace, FitResult) {
        let shape = Lineshape {
            amplitude: 50.0,
            sigma: 0.01,
            center: 1.0,
            slope: 0.0,
            intercept: 10.0,
        };
        let angles: Vec<f64> = (0..41).map(|i| 0.9 + 0.005 * i as f64).collect();
        let trace = ScanTrace::new(angles.clone(), shape.sample(&angles)).unwrap();
        let guess = locator::locate(&trace, Some(0.01)).unwrap();
        let fit = LineshapeFitter::default().fit_trace(&trace, &guess).unwrap();
        (trace, fit)
    }

    #[test]
    fn test_fit_csv_columns() {
        let (trace, fit) = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.csv");
        fit_to_csv(&trace, &fit, &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["angle", "intensity", "best_fit", "residual"]
        );
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), trace.len());
        let residual: f64 = rows[20][3].parse().unwrap();
        assert!(residual.abs() < 1e-3);
    }

    #[test]
    fn test_summary_and_json() {
        let (_, fit) = fitted();
        let dir = tempfile::tempdir().unwrap();

        let summary = dir.path().join("summary.csv");
        fits_summary_to_csv(&[("a.xy".to_string(), fit.clone())], &summary).unwrap();
        let text = std::fs::read_to_string(&summary).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("a.xy,peak,"));

        let json = dir.path().join("fit.json");
        write_json(&fit, &json).unwrap();
        let back: FitResult =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(back.quality.iterations, fit.quality.iterations);
        assert!((back.center - fit.center).abs() < 1e-12);
    }
}
