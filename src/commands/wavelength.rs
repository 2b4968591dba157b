//! # wavelength 子命令实现
//!
//! 对称 2θ 扫描中的全部反射 → 平均波长 ± 标准差。
//!
//! ## 依赖关系
//! - 使用 `cli/wavelength.rs` 定义的 WavelengthArgs
//! - 使用 `calib/peaks.rs`
//! - 使用 `batch/` 进行批量处理

use crate::batch::{BatchRunner, FileCollector, FileOutcome};
use crate::calib::fitter::LineshapeFitter;
use crate::calib::peaks::{self, PeakSearchOptions, StandardScanWavelength};
use crate::cli::wavelength::WavelengthArgs;
use crate::config::EcalConfig;
use crate::error::{EcalError, Result};
use crate::parsers::{self, TraceColumns};
use crate::report;
use crate::utils::output;

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;
use tabled::{Table, Tabled};

/// 单个反射行
#[derive(Debug, Clone, Tabled)]
struct ReflectionRow {
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "2θ (°)")]
    two_theta: String,
    #[tabled(rename = "d (Å)")]
    d_spacing: String,
    #[tabled(rename = "n")]
    order: String,
    #[tabled(rename = "λ (Å)")]
    wavelength: String,
}

/// 文件汇总行
#[derive(Debug, Clone, Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "λ (Å)")]
    mean: String,
    #[tabled(rename = "σλ (Å)")]
    std_dev: String,
    #[tabled(rename = "E (keV)")]
    energy: String,
    #[tabled(rename = "Reflections")]
    count: usize,
}

struct WavelengthSettings {
    fitter: LineshapeFitter,
    columns: TraceColumns,
    d_spacings: Vec<f64>,
    orders: Vec<f64>,
    search: PeakSearchOptions,
}

/// 执行多反射波长计算
pub fn execute(args: WavelengthArgs, config: &EcalConfig) -> Result<()> {
    output::print_header("Wavelength from a Symmetric 2θ Scan");

    let d_spacings = if args.d_spacings.is_empty() {
        let table = config.reference_table()?;
        table.lookup(&args.standard)?.d_spacings().to_vec()
    } else {
        args.d_spacings.clone()
    };
    if let Some(bad) = d_spacings.iter().find(|d| !(d.is_finite() && **d > 0.0)) {
        return Err(EcalError::InvalidArgument(format!(
            "d-spacings must be positive, got {}",
            bad
        )));
    }

    let mut search = config.peaks;
    if let Some(order) = args.order {
        search.order = order;
    }
    if let Some(sides) = args.sides {
        search.sides = sides;
    }
    if let Some(threshold) = args.threshold {
        search.threshold = threshold;
    }

    let settings = WavelengthSettings {
        fitter: LineshapeFitter::new(config.fit),
        columns: TraceColumns {
            angle: args.angle_column.clone(),
            intensity: args.intensity_column.clone(),
        },
        d_spacings,
        orders: args.orders.clone(),
        search,
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

fn execute_single_file(args: &WavelengthArgs, settings: &WavelengthSettings) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", args.input.display()));

    let result = process_file(&args.input, settings)?;
    let rows: Vec<ReflectionRow> = result
        .reflections
        .iter()
        .map(|r| ReflectionRow {
            side: r.side.to_string(),
            two_theta: format!("{:.5}", r.two_theta),
            d_spacing: format!("{:.5}", r.d_spacing),
            order: format!("{}", r.order),
            wavelength: format!("{:.6}", r.wavelength),
        })
        .collect();
    println!("{}", Table::new(&rows));

    output::print_separator();
    output::print_done(&format!(
        "λ = {:.6} ± {:.6} Å  ({:.4} keV)",
        result.mean, result.std_dev, result.energy_kev
    ));

    if let Some(path) = &args.json {
        report::write_json(&result, path)?;
        output::print_success(&format!("Result written to '{}'", path.display()));
    }
    Ok(())
}

fn execute_batch(args: &WavelengthArgs, settings: &WavelengthSettings) -> Result<()> {
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
        .with_message("Indexing reflections")
        .with_progress(std::io::stderr().is_terminal());
    output::print_info(&format!("Using {} parallel jobs", runner.jobs()));
    let report = runner.run(files, |path| process_file(path, settings).map(FileOutcome::Done))?;

    let rows: Vec<FileRow> = report
        .successes()
        .map(|(path, r)| FileRow {
            file: file_name(path),
            mean: format!("{:.6}", r.mean),
            std_dev: format!("{:.6}", r.std_dev),
            energy: format!("{:.4}", r.energy_kev),
            count: r.reflections.len(),
        })
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
    for (path, err) in report.failures().take(10) {
        output::print_error(&format!("  {}: {}", path.display(), err));
    }

    if let Some(path) = &args.json {
        let all: BTreeMap<String, &StandardScanWavelength> = report
            .successes()
            .map(|(p, r)| (file_name(p), r))
            .collect();
        report::write_json(&all, path)?;
        output::print_success(&format!("Results written to '{}'", path.display()));
    }
    Ok(())
}

fn process_file(path: &Path, settings: &WavelengthSettings) -> Result<StandardScanWavelength> {
    let trace = parsers::read_trace(path, &settings.columns)?;
    peaks::wavelength_from_standard_scan(
        &settings.fitter,
        &trace,
        &settings.d_spacings,
        &settings.orders,
        &settings.search,
    )
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::bragg;
    use crate::calib::lineshape::Lineshape;
    use std::fmt::Write as _;

    #[test]
    fn test_single_file_with_explicit_d_spacings() {
        let d = [4.15772, 2.94676];
        let wavelength = 0.2;
        let mut peaks = Vec::new();
        for &d in &d {
            let tth = 2.0 * bragg::bragg_angle(wavelength, d).unwrap();
            for c in [tth, -tth] {
                peaks.push(Lineshape {
                    amplitude: 500.0,
                    sigma: 0.02,
                    center: c,
                    slope: 0.0,
                    intercept: 0.0,
                });
            }
        }
        let mut text = String::from("2-Theta Angle (Degrees)\nIntensity\n");
        for i in 0..=1400 {
            let x = -7.0 + 0.01 * i as f64;
            let y = 5.0 + peaks.iter().map(|p| p.evaluate(x)).sum::<f64>();
            writeln!(text, "{:.4} {:.6}", x, y).unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.chi");
        std::fs::write(&input, text).unwrap();
        let json = dir.path().join("out.json");

        let args = WavelengthArgs {
            input,
            standard: "LaB6".to_string(),
            d_spacings: d.to_vec(),
            orders: vec![],
            order: None,
            sides: None,
            threshold: None,
            angle_column: "tth".to_string(),
            intensity_column: "intensity".to_string(),
            json: Some(json.clone()),
            pattern: String::new(),
            jobs: 1,
            recursive: false,
        };
        execute(args, &EcalConfig::default()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        let mean = value["mean"].as_f64().unwrap();
        assert!((mean - wavelength).abs() / wavelength < 1e-4);
        assert_eq!(value["reflections"].as_array().unwrap().len(), 4);
    }
}
