//! # 模拟设备
//!
//! 无硬件时用于演示与测试的模拟通道、电机、探测器与光束线。
//!
//! - `SimChannel`: 共享值的软通道
//! - `SimulatedMotor`: 写入后经过若干次轮询才到位
//! - `SimulatedDetector`: 读取电机位置处的伪 Voigt 信号 + 可选 Gaussian 噪声
//! - `simulated_shutter`, `simulated_robot`: 快门与换样机器人
//! - `simulated_scanner`: 按标样与真实波长 / 零点构造完整光束线
//!
//! ## 依赖关系
//! - 被 `commands/calibrate.rs` 和各模块测试使用
//! - 使用 `calib/lineshape.rs`, `calib/bragg.rs`, `hardware/scan.rs`, `hardware/shutter.rs`, `hardware/robot.rs`
//! - 使用 `rand` 生成可复现噪声

use super::poll::PollConfig;
use super::robot::{RobotState, SampleRobot};
use super::scan::StepScanner;
use super::shutter::FastShutter;
use super::{Readable, Settable};
use crate::calib::bragg;
use crate::calib::lineshape::Lineshape;
use crate::calib::standards::ReferenceStandard;
use crate::error::{EcalError, Result};
use crate::models::MotorKind;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<'a, T>(mutex: &'a Mutex<T>, device: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| EcalError::Device {
        device: device.to_string(),
        reason: "simulated state lock poisoned".to_string(),
    })
}

// ─────────────────────────────────────────────────────────────
// 软通道
// ─────────────────────────────────────────────────────────────

/// 共享值的软通道
#[derive(Debug, Clone)]
pub struct SimChannel<T> {
    name: String,
    value: Arc<Mutex<T>>,
}

impl<T: Clone> SimChannel<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(Mutex::new(value)),
        }
    }

    /// 共享同一值的另一个通道（例如命令与回读）
    pub fn linked(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Clone> Readable<T> for SimChannel<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<T> {
        Ok(lock(&self.value, &self.name)?.clone())
    }
}

impl<T: Clone> Settable<T> for SimChannel<T> {
    fn set(&self, value: T) -> Result<()> {
        *lock(&self.value, &self.name)? = value;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 电机
// ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Motion {
    target: f64,
    remaining: u32,
}

/// 模拟电机
#[derive(Debug)]
pub struct SimulatedMotor {
    name: String,
    position: Arc<Mutex<f64>>,
    motion: Mutex<Motion>,
    polls_per_move: u32,
}

impl SimulatedMotor {
    /// `polls_per_move` 次 `is_done` 轮询后到位（0 为立即到位）
    pub fn new(name: impl Into<String>, position: f64, polls_per_move: u32) -> Self {
        Self {
            name: name.into(),
            position: Arc::new(Mutex::new(position)),
            motion: Mutex::new(Motion {
                target: position,
                remaining: 0,
            }),
            polls_per_move,
        }
    }

    /// 位置共享句柄，供探测器读取
    pub fn position_handle(&self) -> Arc<Mutex<f64>> {
        Arc::clone(&self.position)
    }
}

impl Readable for SimulatedMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<f64> {
        Ok(*lock(&self.position, &self.name)?)
    }
}

impl Settable for SimulatedMotor {
    fn set(&self, value: f64) -> Result<()> {
        let mut motion = lock(&self.motion, &self.name)?;
        motion.target = value;
        motion.remaining = self.polls_per_move;
        if motion.remaining == 0 {
            *lock(&self.position, &self.name)? = value;
        }
        Ok(())
    }

    fn is_done(&self) -> Result<bool> {
        let mut motion = lock(&self.motion, &self.name)?;
        if motion.remaining > 0 {
            motion.remaining -= 1;
            if motion.remaining == 0 {
                *lock(&self.position, &self.name)? = motion.target;
            }
        }
        Ok(motion.remaining == 0)
    }
}

// ─────────────────────────────────────────────────────────────
// 探测器
// ─────────────────────────────────────────────────────────────

/// 无噪声信号：若干伪 Voigt 特征 + 线性背景
#[derive(Debug, Clone, PartialEq)]
pub struct SignalModel {
    features: Vec<Lineshape>,
    slope: f64,
    intercept: f64,
}

impl SignalModel {
    /// 常数背景
    pub fn flat(level: f64) -> Self {
        Self {
            features: Vec::new(),
            slope: 0.0,
            intercept: level,
        }
    }

    pub fn with_slope(mut self, slope: f64) -> Self {
        self.slope = slope;
        self
    }

    /// 添加峰（amplitude > 0）或谷（amplitude < 0）
    pub fn with_feature(mut self, amplitude: f64, sigma: f64, center: f64) -> Self {
        self.features.push(Lineshape {
            amplitude,
            sigma,
            center,
            slope: 0.0,
            intercept: 0.0,
        });
        self
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x
            + self.intercept
            + self.features.iter().map(|f| f.evaluate(x)).sum::<f64>()
    }
}

/// 模拟探测器
#[derive(Debug)]
pub struct SimulatedDetector {
    name: String,
    position: Arc<Mutex<f64>>,
    signal: SignalModel,
    noise: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedDetector {
    pub fn new(name: impl Into<String>, position: Arc<Mutex<f64>>, signal: SignalModel) -> Self {
        Self {
            name: name.into(),
            position,
            signal,
            noise: 0.0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Gaussian 噪声标准差与随机种子
    pub fn with_noise(mut self, noise: f64, seed: u64) -> Self {
        self.noise = noise;
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl Readable for SimulatedDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<f64> {
        let x = *lock(&self.position, &self.name)?;
        let mut value = self.signal.evaluate(x);
        if self.noise > 0.0 {
            let mut rng = lock(&self.rng, &self.name)?;
            // Box–Muller
            let u1: f64 = rng.gen();
            let u2: f64 = rng.gen();
            let z = (-2.0 * (1.0 - u1).ln()).sqrt() * (2.0 * PI * u2).cos();
            value += self.noise * z;
        }
        Ok(value)
    }
}

// ─────────────────────────────────────────────────────────────
// 快门
// ─────────────────────────────────────────────────────────────

/// 模拟快门驱动：写 1 后把开 / 关状态通道切到目标位置
#[derive(Debug)]
pub struct SimulatedShutterDrive {
    name: String,
    open_status: SimChannel<f64>,
    close_status: SimChannel<f64>,
    opens: bool,
    last: Mutex<f64>,
}

impl Readable for SimulatedShutterDrive {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<f64> {
        Ok(*lock(&self.last, &self.name)?)
    }
}

impl Settable for SimulatedShutterDrive {
    fn set(&self, value: f64) -> Result<()> {
        *lock(&self.last, &self.name)? = value;
        if value != 1.0 {
            return Ok(());
        }
        // 状态通道低电平有效
        let (open, close) = if self.opens { (0.0, 1.0) } else { (1.0, 0.0) };
        self.open_status.set(open)?;
        self.close_status.set(close)
    }
}

/// 初始关闭的模拟快门
pub fn simulated_shutter(name: &str, poll: PollConfig) -> FastShutter {
    let open_status = SimChannel::new(format!("{}_open_sts", name), 1.0);
    let close_status = SimChannel::new(format!("{}_close_sts", name), 0.0);
    let drive = |suffix: &str, opens| SimulatedShutterDrive {
        name: format!("{}_{}", name, suffix),
        open_status: open_status.linked(format!("{}_open_sts", name)),
        close_status: close_status.linked(format!("{}_close_sts", name)),
        opens,
        last: Mutex::new(0.0),
    };
    FastShutter::new(
        name,
        Box::new(drive("open_cmd", true)),
        Box::new(open_status.clone()),
        Box::new(drive("close_cmd", false)),
        Box::new(close_status.clone()),
        poll,
    )
}

// ─────────────────────────────────────────────────────────────
// 换样机器人
// ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RobotMotion {
    requested: Option<RobotState>,
    state: RobotState,
    remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RobotCommand {
    Load,
    Unload,
    Execute,
}

/// 模拟机器人的命令通道
#[derive(Debug)]
struct RobotCommandChannel {
    name: String,
    command: RobotCommand,
    motion: Arc<Mutex<RobotMotion>>,
    busy_reads: u32,
}

impl Readable for RobotCommandChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<f64> {
        Ok(0.0)
    }
}

impl Settable for RobotCommandChannel {
    fn set(&self, value: f64) -> Result<()> {
        if value != 1.0 {
            return Ok(());
        }
        let mut motion = lock(&self.motion, &self.name)?;
        match self.command {
            RobotCommand::Load => motion.requested = Some(RobotState::Loading),
            RobotCommand::Unload => motion.requested = Some(RobotState::Unloading),
            RobotCommand::Execute => {
                if let Some(state) = motion.requested.take() {
                    motion.state = state;
                    motion.remaining = self.busy_reads;
                }
            }
        }
        Ok(())
    }
}

/// 模拟机器人的状态通道：工作状态保持 `busy_reads` 次读取后回到 Idle
#[derive(Debug)]
struct RobotStatusChannel {
    name: String,
    motion: Arc<Mutex<RobotMotion>>,
}

impl Readable<String> for RobotStatusChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<String> {
        let mut motion = lock(&self.motion, &self.name)?;
        let current = motion.state.clone();
        if current != RobotState::Idle {
            if motion.remaining == 0 {
                motion.state = RobotState::Idle;
            } else {
                motion.remaining -= 1;
            }
        }
        Ok(current.to_string())
    }
}

/// 空闲的模拟换样机器人
pub fn simulated_robot(name: &str, busy_reads: u32, poll: PollConfig) -> SampleRobot {
    let motion = Arc::new(Mutex::new(RobotMotion {
        requested: None,
        state: RobotState::Idle,
        remaining: 0,
    }));
    let command = |suffix: &str, command| RobotCommandChannel {
        name: format!("{}_{}", name, suffix),
        command,
        motion: Arc::clone(&motion),
        busy_reads,
    };
    SampleRobot::new(
        name,
        Box::new(SimChannel::new(format!("{}_sample", name), 0u32)),
        Box::new(command("load", RobotCommand::Load)),
        Box::new(command("unload", RobotCommand::Unload)),
        Box::new(command("execute", RobotCommand::Execute)),
        Box::new(RobotStatusChannel {
            name: format!("{}_status", name),
            motion: Arc::clone(&motion),
        }),
        poll,
    )
}

// ─────────────────────────────────────────────────────────────
// 光束线
// ─────────────────────────────────────────────────────────────

/// 模拟光束线参数（真实值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// 真实波长（Å）
    pub wavelength: f64,
    /// 真实角度零点（度）
    pub theta_offset: f64,
    /// 反射峰 sigma（电机单位，度）
    pub sigma: f64,
    /// 反射峰高（负值为谷）
    pub amplitude: f64,
    /// 背景水平
    pub background: f64,
    /// 背景斜率（每度）
    pub background_slope: f64,
    /// 噪声标准差
    pub noise: f64,
    /// 随机种子
    pub seed: u64,
    /// 电机到位所需轮询次数
    pub polls_per_move: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            wavelength: 0.1878,
            theta_offset: -35.26,
            sigma: 0.004,
            amplitude: -800.0,
            background: 5000.0,
            background_slope: 0.0,
            noise: 0.0,
            seed: 0,
            polls_per_move: 0,
        }
    }
}

impl SimulationConfig {
    /// 标样在此光束线上的对称反射信号
    pub fn signal(&self, standard: &ReferenceStandard, motor: MotorKind) -> Result<SignalModel> {
        let mut signal = SignalModel::flat(self.background).with_slope(self.background_slope);
        for &d in standard.d_spacings() {
            if self.wavelength >= 2.0 * d {
                continue;
            }
            let (right, left) = bragg::symmetric_targets(self.theta_offset, self.wavelength, d, motor)?;
            signal = signal
                .with_feature(self.amplitude, self.sigma, right)
                .with_feature(self.amplitude, self.sigma, left);
        }
        Ok(signal)
    }
}

/// 构造模拟光束线扫描器
pub fn simulated_scanner(
    config: &SimulationConfig,
    standard: &ReferenceStandard,
    motor_kind: MotorKind,
    motor_name: &str,
    detector_name: &str,
    settle: PollConfig,
) -> Result<StepScanner> {
    let signal = config.signal(standard, motor_kind)?;
    let motor = SimulatedMotor::new(motor_name, config.theta_offset, config.polls_per_move);
    let detector = SimulatedDetector::new(detector_name, motor.position_handle(), signal)
        .with_noise(config.noise, config.seed);

    tracing::info!(
        wavelength = config.wavelength,
        theta_offset = config.theta_offset,
        standard = standard.name(),
        "simulated beamline ready"
    );

    Ok(StepScanner::new(settle)
        .with_motor(Box::new(motor))
        .with_detector(Box::new(detector)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::standards::ReferenceTable;

    #[test]
    fn test_motor_settles_after_polls() {
        let motor = SimulatedMotor::new("m", 0.0, 3);
        motor.set(5.0).unwrap();
        assert!(!motor.is_done().unwrap());
        assert!(!motor.is_done().unwrap());
        assert_eq!(motor.read().unwrap(), 0.0);
        assert!(motor.is_done().unwrap());
        assert_eq!(motor.read().unwrap(), 5.0);
    }

    #[test]
    fn test_linked_channels_share_value() {
        let cmd = SimChannel::new("cmd", 0.0);
        let rbv = cmd.linked("rbv");
        cmd.set(3.0).unwrap();
        assert_eq!(rbv.read().unwrap(), 3.0);
        assert_eq!(rbv.name(), "rbv");
    }

    #[test]
    fn test_detector_noise_is_reproducible() {
        let position = Arc::new(Mutex::new(0.0));
        let a = SimulatedDetector::new("d", Arc::clone(&position), SignalModel::flat(100.0))
            .with_noise(2.0, 42);
        let b = SimulatedDetector::new("d", position, SignalModel::flat(100.0)).with_noise(2.0, 42);
        let ra: Vec<f64> = (0..5).map(|_| a.read().unwrap()).collect();
        let rb: Vec<f64> = (0..5).map(|_| b.read().unwrap()).collect();
        assert_eq!(ra, rb);
        assert!(ra.iter().any(|v| (v - 100.0).abs() > 1e-9));
    }

    fn fast_poll() -> PollConfig {
        PollConfig::new(std::time::Duration::from_millis(1), std::time::Duration::from_millis(50))
    }

    #[test]
    fn test_simulated_shutter_cycle() {
        let shutter = simulated_shutter("sh1", fast_poll());
        assert!(!shutter.is_open().unwrap());
        shutter.open().unwrap();
        assert!(shutter.is_open().unwrap());
        shutter.close().unwrap();
        assert!(!shutter.is_open().unwrap());
    }

    #[test]
    fn test_simulated_robot_load_and_unload() {
        let robot = simulated_robot("robot", 2, fast_poll());
        robot.load(4).unwrap();
        assert_eq!(robot.state().unwrap(), RobotState::Idle);
        robot.unload().unwrap();
        assert_eq!(robot.state().unwrap(), RobotState::Idle);
    }

    #[test]
    fn test_beamline_signal_has_symmetric_dips() {
        let table = ReferenceTable::builtin();
        let si = table.lookup("Si").unwrap();
        let config = SimulationConfig::default();
        let signal = config.signal(si, MotorKind::Theta).unwrap();
        let theta = bragg::bragg_angle(config.wavelength, si.primary()).unwrap();

        let right = signal.evaluate(config.theta_offset + theta);
        let left = signal.evaluate(config.theta_offset - theta);
        assert!((right - (config.background + config.amplitude)).abs() < 1.0);
        assert!((left - right).abs() < 1e-6);
        assert!((signal.evaluate(config.theta_offset) - config.background).abs() < 1.0);
    }
}
