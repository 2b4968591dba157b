//! # fit 子命令实现
//!
//! 对扫描文件拟合单个伪 Voigt 峰 / 谷。
//!
//! ## 功能
//! - 单文件：参数表、拟合曲线 CSV、诊断图
//! - 目录：并行拟合（rayon），汇总表与汇总 CSV
//!
//! ## 依赖关系
//! - 使用 `cli/fit.rs` 定义的 FitArgs
//! - 使用 `calib/locator.rs`, `calib/fitter.rs`
//! - 使用 `batch/` 进行批量处理

use crate::batch::{BatchRunner, FileCollector, FileOutcome};
use crate::calib::fitter::{guess_and_fit, LineshapeFitter};
use crate::calib::locator;
use crate::cli::fit::FitArgs;
use crate::config::EcalConfig;
use crate::error::{EcalError, Result};
use crate::models::{FitResult, ScanTrace};
use crate::parsers::{self, TraceColumns};
use crate::report;
use crate::utils::output;

use std::io::IsTerminal;
use std::path::Path;
use tabled::{Table, Tabled};

/// 拟合结果行
#[derive(Debug, Clone, Tabled)]
struct FitRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Type")]
    polarity: String,
    #[tabled(rename = "Center (°)")]
    center: String,
    #[tabled(rename = "Amplitude")]
    amplitude: String,
    #[tabled(rename = "Sigma (°)")]
    sigma: String,
    #[tabled(rename = "FWHM (°)")]
    fwhm: String,
    #[tabled(rename = "R²")]
    r_squared: String,
}

impl FitRow {
    fn new(file: &str, fit: &FitResult) -> Self {
        Self {
            file: file.to_string(),
            polarity: fit.polarity().to_string(),
            center: format!("{:.6}", fit.center),
            amplitude: format!("{:.3}", fit.amplitude),
            sigma: format!("{:.6}", fit.sigma),
            fwhm: format!("{:.6}", fit.fwhm()),
            r_squared: format!("{:.5}", fit.quality.r_squared),
        }
    }
}

/// 每个文件共用的拟合设置
struct FitSettings {
    fitter: LineshapeFitter,
    columns: TraceColumns,
    sigma: Option<f64>,
    sdev: Option<f64>,
}

/// 执行拟合
pub fn execute(args: FitArgs, config: &EcalConfig) -> Result<()> {
    output::print_header("Pseudo-Voigt Lineshape Fit");

    let mut options = config.fit;
    if let Some(n) = args.max_iterations {
        options.max_iterations = n;
    }
    let settings = FitSettings {
        fitter: LineshapeFitter::new(options),
        columns: TraceColumns {
            angle: args.angle_column.clone(),
            intensity: args.intensity_column.clone(),
        },
        sigma: args.sigma,
        sdev: args.sdev,
    };

    if args.input.is_file() {
        execute_single_file(&args, &settings)
    } else if args.input.is_dir() {
        execute_batch(&args, &settings)
    } else {
        Err(EcalError::FileNotFound {
            path: args.input.display().to_string(),
        })
    }
}

/// 单文件模式
fn execute_single_file(args: &FitArgs, settings: &FitSettings) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", args.input.display()));

    let (trace, fit) = match fit_file(&args.input, settings)? {
        FileOutcome::Done(v) => v,
        FileOutcome::Skipped(reason) => return Err(EcalError::InsufficientSignal { reason }),
        FileOutcome::Failed(e) => return Err(e),
    };
    let name = display_name(&args.input);
    println!("{}", Table::new([FitRow::new(&name, &fit)]));
    output::print_info(&format!(
        "Background: {:.4} + {:.4}·x, {} iterations, reduced χ² = {:.4e}",
        fit.background_intercept,
        fit.background_slope,
        fit.quality.iterations,
        fit.quality.reduced_chi_square
    ));

    if let Some(path) = &args.output {
        report::fit_to_csv(&trace, &fit, path)?;
        output::print_success(&format!("Fit curve written to '{}'", path.display()));
    }
    if let Some(path) = &args.plot {
        report::plot_fit(&trace, &fit, path, &name, report::plot::DEFAULT_SIZE, args.svg)?;
        output::print_success(&format!("Plot written to '{}'", path.display()));
    }
    Ok(())
}

/// 批量处理模式
fn execute_batch(args: &FitArgs, settings: &FitSettings) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", args.input.display()));

    let files = FileCollector::new(&args.input)
        .with_pattern(&args.pattern)
        .recursive(args.recursive)
        .collect()?;
    if files.is_empty() {
        output::print_warning("No matching trace files found");
        return Ok(());
    }
    output::print_info(&format!("Found {} trace files", files.len()));

    let runner = BatchRunner::new(args.jobs)
        .with_message("Fitting")
        .with_progress(std::io::stderr().is_terminal());
    output::print_info(&format!("Using {} parallel jobs", runner.jobs()));
    let report = runner.run(files, |path| Ok(fit_file(path, settings)?.map(|(_, fit)| fit)))?;

    let rows: Vec<FitRow> = report
        .successes()
        .map(|(path, fit)| FitRow::new(&display_name(path), fit))
        .collect();
    if !rows.is_empty() {
        println!("{}", Table::new(&rows));
    }

    output::print_separator();
    output::print_success(&format!(
        "Batch complete ({} files): {} success, {} skipped, {} failed",
        report.total(),
        report.success_count(),
        report.skipped_count(),
        report.failed_count()
    ));
    for (path, reason) in report.skipped() {
        output::print_warning(&format!("  skipped {}: {}", display_name(path), reason));
    }
    for (path, err) in report.failures().take(10) {
        output::print_error(&format!("  {}: {}", path.display(), err));
    }
    if report.failed_count() > 10 {
        output::print_warning(&format!("  ... and {} more", report.failed_count() - 10));
    }

    if let Some(path) = &args.output {
        let summary: Vec<(String, FitResult)> = report
            .successes()
            .map(|(p, fit)| (display_name(p), fit.clone()))
            .collect();
        report::fits_summary_to_csv(&summary, path)?;
        output::print_success(&format!("Summary written to '{}'", path.display()));
    }
    Ok(())
}

/// 读取、检验并拟合一个文件；未通过显著性检验的曲线跳过
fn fit_file(path: &Path, settings: &FitSettings) -> Result<FileOutcome<(ScanTrace, FitResult)>> {
    let trace = parsers::read_trace(path, &settings.columns)?;
    if let Some(sdev) = settings.sdev {
        if !locator::is_peak(&trace, sdev) {
            let (deviation, noise) = locator::significance(&trace);
            return Ok(FileOutcome::Skipped(format!(
                "max deviation {:.4} does not exceed {} x std {:.4}",
                deviation, sdev, noise
            )));
        }
    }
    let fit = guess_and_fit(&settings.fitter, &trace, settings.sigma)?;
    Ok(FileOutcome::Done((trace, fit)))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::lineshape::Lineshape;
    use std::fmt::Write as _;

    fn write_dip(path: &Path, center: f64) {
        let shape = Lineshape {
            amplitude: -300.0,
            sigma: 0.004,
            center,
            slope: 0.0,
            intercept: 2000.0,
        };
        let mut text = String::from("# th_cal sc_chan1\n");
        for i in 0..61 {
            let x = center - 0.06 + 0.002 * i as f64;
            writeln!(text, "{:.6} {:.6}", x, shape.evaluate(x)).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    fn settings(sdev: Option<f64>) -> FitSettings {
        FitSettings {
            fitter: LineshapeFitter::default(),
            columns: TraceColumns::default(),
            sigma: Some(0.003),
            sdev,
        }
    }

    #[test]
    fn test_fit_file_recovers_dip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dip.xy");
        write_dip(&path, -33.5);
        let FileOutcome::Done((_, fit)) = fit_file(&path, &settings(Some(2.0))).unwrap() else {
            panic!("expected a fit");
        };
        assert!((fit.center + 33.5).abs() < 1e-4);
        assert!((fit.amplitude + 300.0).abs() < 3.0);
    }

    #[test]
    fn test_flat_trace_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.xy");
        std::fs::write(&path, "0 1\n1 1\n2 1\n3 1\n4 1\n5 1\n").unwrap();
        let outcome = fit_file(&path, &settings(Some(2.0))).unwrap();
        assert!(matches!(outcome, FileOutcome::Skipped(ref r) if r.contains("max deviation")));
    }

    #[test]
    fn test_batch_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        write_dip(&dir.path().join("a.xy"), -33.5);
        write_dip(&dir.path().join("b.xy"), -37.0);
        std::fs::write(dir.path().join("c.xy"), "0 1\n1 1\n2 1\n3 1\n4 1\n5 1\n").unwrap();
        let summary = dir.path().join("summary.csv");

        let args = FitArgs {
            input: dir.path().to_path_buf(),
            output: Some(summary.clone()),
            sigma: Some(0.003),
            sdev: Some(2.0),
            max_iterations: None,
            angle_column: "th_cal".to_string(),
            intensity_column: "sc_chan1".to_string(),
            plot: None,
            svg: false,
            pattern: "*.xy".to_string(),
            jobs: 2,
            recursive: false,
        };
        execute(args, &EcalConfig::default()).unwrap();

        let text = std::fs::read_to_string(&summary).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("a.xy,dip,"));
        assert!(rows[1].starts_with("b.xy,dip,"));
    }
}
