//! # calibrate 子命令实现
//!
//! 运行双峰对称校准并报告零点、波长与能量。
//!
//! ## 功能
//! - `sim` 后端：模拟光束线（已知真实波长与零点）
//! - `replay` 后端：从记录的密集扫描插值
//! - 结果表格、JSON 导出、2×2 诊断图
//!
//! ## 依赖关系
//! - 使用 `cli/calibrate.rs` 定义的 CalibrateArgs
//! - 使用 `calib/driver.rs` 的 TwoPeakCalibrator
//! - 使用 `hardware/` 的扫描后端

use crate::calib::bragg;
use crate::calib::driver::{CalibrationPlan, TwoPeakCalibrator};
use crate::calib::fitter::LineshapeFitter;
use crate::cli::calibrate::{Backend, CalibrateArgs};
use crate::config::EcalConfig;
use crate::error::{EcalError, Result};
use crate::hardware::sim::{simulated_robot, simulated_scanner, simulated_shutter};
use crate::hardware::{AbortHandle, FastShutter, ReplayScanner, SampleRobot, SimulationConfig};
use crate::models::CalibrationRun;
use crate::parsers::{self, TraceColumns};
use crate::report;
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

/// 单侧反射行
#[derive(Debug, Clone, Tabled)]
struct ReflectionRow {
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Target (°)")]
    target: String,
    #[tabled(rename = "Coarse (°)")]
    coarse: String,
    #[tabled(rename = "Fine (°)")]
    fine: String,
    #[tabled(rename = "Sigma (°)")]
    sigma: String,
    #[tabled(rename = "Type")]
    polarity: String,
    #[tabled(rename = "R²")]
    r_squared: String,
}

const SHUTTER: &str = "shctl1";
const ROBOT: &str = "robot";
const ROBOT_BUSY_READS: u32 = 2;

/// 执行校准
pub fn execute(args: CalibrateArgs, config: &EcalConfig) -> Result<()> {
    output::print_header("Two-Peak Symmetric Energy Calibration");

    let plan = build_plan(&args, &config.calibration);
    let table = config.reference_table()?;
    let standard = table.lookup(&plan.standard)?.clone();
    let calibrator = TwoPeakCalibrator::new(table, LineshapeFitter::new(config.fit));

    output::print_info(&format!(
        "Standard {} (d = {:.5} Å), guess λ = {:.6} Å, offset = {:.4}°, motor {}",
        standard.name(),
        standard.primary(),
        plan.wavelength_guess,
        plan.theta_offset,
        plan.motor_type
    ));

    let spinner = progress::create_spinner("Scanning both reflections...");
    let run = match args.backend {
        Backend::Sim => {
            let sim = build_simulation(&args, &config.simulation);
            output::print_info(&format!(
                "Simulated beamline: λ = {:.6} Å, offset = {:.4}°, noise = {}",
                sim.wavelength, sim.theta_offset, sim.noise
            ));
            let abort = AbortHandle::new();
            let mut scanner = simulated_scanner(
                &sim,
                &standard,
                plan.motor_type,
                &plan.motor,
                &plan.detector,
                config.poll,
            )?
            .with_abort(abort.clone());
            let shutter = simulated_shutter(SHUTTER, config.poll).with_abort(abort.clone());
            let robot = simulated_robot(ROBOT, ROBOT_BUSY_READS, config.poll).with_abort(abort);
            let sample = args.sample.map(|n| (&robot, n));
            with_beam(&shutter, sample, || calibrator.run(&mut scanner, &plan))
        }
        Backend::Replay => {
            let path = args.trace.as_ref().ok_or_else(|| {
                EcalError::InvalidArgument("--trace is required with --backend replay".to_string())
            })?;
            let columns = TraceColumns {
                angle: plan.motor.clone(),
                intensity: plan.detector.clone(),
            };
            let recorded = parsers::read_trace(path, &columns)?;
            output::print_info(&format!(
                "Replaying {} samples from '{}'",
                recorded.len(),
                path.display()
            ));
            let mut scanner = ReplayScanner::new(&recorded)?;
            calibrator.run(&mut scanner, &plan)
        }
    };
    spinner.finish_and_clear();
    let run = run?;

    print_run(&run);

    if let Some(path) = &args.json {
        report::write_json(&run, path)?;
        output::print_success(&format!("Calibration written to '{}'", path.display()));
    }
    if let Some(path) = &args.plot {
        report::plot_calibration(&run, path, report::plot::DEFAULT_SIZE, args.svg)?;
        output::print_success(&format!("Overview plot written to '{}'", path.display()));
    }

    Ok(())
}

/// 命令行参数覆盖配置文件
pub(crate) fn build_plan(args: &CalibrateArgs, base: &CalibrationPlan) -> CalibrationPlan {
    let mut plan = base.clone();
    if let Some(s) = &args.standard {
        plan.standard = s.clone();
    }
    if let Some(w) = args.wavelength {
        plan.wavelength_guess = w;
    } else if let Some(e) = args.energy {
        plan.wavelength_guess = bragg::wavelength_from_energy(e);
    }
    if let Some(o) = args.offset {
        plan.theta_offset = o;
    }
    if let Some(m) = args.motor_type {
        plan.motor_type = m.into();
    }
    if let Some(step) = args.coarse_step {
        plan.coarse_step = step;
    }
    if let Some(n) = args.coarse_points {
        plan.coarse_points = n;
    }
    if args.estimate_sigma {
        plan.guessed_sigma = None;
    } else if let Some(s) = args.sigma {
        plan.guessed_sigma = Some(s);
    }
    if let Some(r) = args.nsigma_range {
        plan.nsigma_range = r;
    }
    if let Some(f) = args.nsigma_fine {
        plan.nsigma_fine = f;
    }
    if args.no_significance {
        plan.significance_sdev = None;
    } else if let Some(s) = args.sdev {
        plan.significance_sdev = Some(s);
    }
    if let Some(d) = &args.detector {
        plan.detector = d.clone();
    }
    if let Some(m) = &args.motor {
        plan.motor = m.clone();
    }
    plan
}

fn build_simulation(args: &CalibrateArgs, base: &SimulationConfig) -> SimulationConfig {
    SimulationConfig {
        wavelength: args.true_wavelength.unwrap_or(base.wavelength),
        theta_offset: args.true_offset.unwrap_or(base.theta_offset),
        noise: args.noise.unwrap_or(base.noise),
        seed: args.seed.unwrap_or(base.seed),
        ..base.clone()
    }
}

/// 装样、开快门后执行 `body`，结束后关快门、卸样
///
/// `body` 失败时仍会关快门和卸样，返回 `body` 的错误。
pub(crate) fn with_beam<T>(
    shutter: &FastShutter,
    sample: Option<(&SampleRobot, u32)>,
    body: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if let Some((robot, n)) = sample {
        robot.load(n)?;
        output::print_info(&format!("Sample {} loaded", n));
    }

    let result = shutter.open().and_then(|()| {
        output::print_info(&format!("Shutter '{}' open", shutter.name()));
        body()
    });
    let closed = shutter.close();
    let unloaded = match sample {
        Some((robot, _)) => robot.unload(),
        None => Ok(()),
    };

    let value = result?;
    closed?;
    unloaded?;
    Ok(value)
}

fn print_run(run: &CalibrationRun) {
    let rows: Vec<ReflectionRow> = run
        .reflections
        .iter()
        .map(|r| ReflectionRow {
            side: r.side.to_string(),
            target: format!("{:.5}", r.target_angle),
            coarse: format!("{:.5}", r.coarse.fit.center),
            fine: format!("{:.5}", r.fine.fit.center),
            sigma: format!("{:.5}", r.fine.fit.sigma),
            polarity: r.fine.fit.polarity().to_string(),
            r_squared: format!("{:.4}", r.fine.fit.quality.r_squared),
        })
        .collect();
    println!("{}", Table::new(&rows));

    let r = &run.result;
    output::print_separator();
    output::print_done(&format!("Refined zero offset:  {:.6}°", r.refined_zero_offset));
    output::print_done(&format!("Average peak angle:   {:.6}°", r.average_peak_angle));
    output::print_done(&format!(
        "Fitted wavelength:    {:.6} Å (guess {:.6} Å)",
        r.fitted_wavelength, run.wavelength_guess
    ));
    output::print_done(&format!("Photon energy:        {:.4} keV", r.energy_kev));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::hardware::sim::SimChannel;
    use crate::hardware::robot::RobotState;
    use crate::hardware::PollConfig;
    use crate::models::MotorKind;
    use clap::Parser;
    use std::time::Duration;

    fn args(extra: &[&str]) -> CalibrateArgs {
        let mut argv = vec!["ecal", "calibrate"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Calibrate(a) => a,
            _ => panic!("expected calibrate"),
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let base = CalibrationPlan {
            standard: "LaB6".to_string(),
            coarse_points: 40,
            ..CalibrationPlan::default()
        };
        let plan = build_plan(
            &args(&["--standard", "Si", "--motor-type", "tth", "--no-significance"]),
            &base,
        );
        assert_eq!(plan.standard, "Si");
        assert_eq!(plan.coarse_points, 40);
        assert_eq!(plan.motor_type, MotorKind::TwoTheta);
        assert_eq!(plan.significance_sdev, None);
        assert_eq!(plan.guessed_sigma, base.guessed_sigma);

        let estimated = build_plan(&args(&["--estimate-sigma"]), &base);
        assert_eq!(estimated.guessed_sigma, None);

        let by_energy = build_plan(&args(&["--energy", "66.0186"]), &base);
        assert!((by_energy.wavelength_guess - 0.1878).abs() < 1e-5);
    }

    #[test]
    fn test_energy_conflicts_with_wavelength() {
        let argv = ["ecal", "calibrate", "--energy", "66", "--wavelength", "0.18"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    fn fast_poll() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    #[test]
    fn test_beam_closed_after_failed_body() {
        let shutter = simulated_shutter("sh", fast_poll());
        let robot = simulated_robot("robot", 1, fast_poll());
        let result: Result<()> = with_beam(&shutter, Some((&robot, 5)), || {
            assert!(shutter.is_open().unwrap());
            Err(EcalError::Other("scan failed".to_string()))
        });
        assert!(matches!(result, Err(EcalError::Other(_))));
        assert!(!shutter.is_open().unwrap());
        assert_eq!(robot.state().unwrap(), RobotState::Idle);
    }

    #[test]
    fn test_busy_robot_keeps_shutter_closed() {
        let shutter = simulated_shutter("sh", fast_poll());
        let robot = SampleRobot::new(
            "robot",
            Box::new(SimChannel::new("sample", 0u32)),
            Box::new(SimChannel::new("load", 0.0)),
            Box::new(SimChannel::new("unload", 0.0)),
            Box::new(SimChannel::new("exec", 0.0)),
            Box::new(SimChannel::new("status", "Loading Sample".to_string())),
            fast_poll(),
        );
        let mut ran = false;
        let result = with_beam(&shutter, Some((&robot, 2)), || {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(EcalError::DeviceBusy { .. })));
        assert!(!ran);
        assert!(!shutter.is_open().unwrap());
    }

    #[test]
    fn test_replay_requires_trace() {
        let argv = ["ecal", "calibrate", "--backend", "replay"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_simulated_calibration_end_to_end() {
        let config = EcalConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("run.json");
        let mut a = args(&[
            "--true-wavelength",
            "0.1880",
            "--true-offset",
            "-35.255",
            "--coarse-step",
            "0.002",
            "--sigma",
            "0.003",
            "--sample",
            "2",
        ]);
        a.json = Some(json.clone());
        execute(a, &config).unwrap();

        let run: CalibrationRun =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert!((run.result.fitted_wavelength - 0.1880).abs() / 0.1880 < 1e-3);
    }
}
