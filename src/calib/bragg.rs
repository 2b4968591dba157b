//! # Bragg 定律换算
//!
//! λ = 2 d sin θ
//!
//! 电机角度与 Bragg θ 之间相差电机类型因子（θ 电机为 1，2θ 电机为 2）：
//! 目标电机角 = 零点 ± factor·θ，测得的半间距先除以 factor 再代入 Bragg 定律。
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs`, `calib/peaks.rs`, `hardware/sim.rs` 使用
//! - 使用 `models/calibration.rs` 的 MotorKind

use crate::error::{EcalError, Result};
use crate::models::MotorKind;

/// hc（keV·Å）
pub const HC_KEV_ANGSTROM: f64 = 12.398419843320026;

/// 检查几何可行性：0 < λ < 2d
pub fn check_feasible(wavelength: f64, d: f64) -> Result<()> {
    if !(wavelength.is_finite() && wavelength > 0.0) {
        return Err(EcalError::InvalidArgument(format!(
            "wavelength must be positive, got {}",
            wavelength
        )));
    }
    if wavelength >= 2.0 * d {
        return Err(EcalError::InfeasibleGeometry {
            wavelength,
            two_d: 2.0 * d,
        });
    }
    Ok(())
}

/// Bragg 角 θ（度）
pub fn bragg_angle(wavelength: f64, d: f64) -> Result<f64> {
    check_feasible(wavelength, d)?;
    Ok((wavelength / (2.0 * d)).asin().to_degrees())
}

/// 由 θ（度）计算波长
pub fn wavelength_from_theta(theta: f64, d: f64) -> f64 {
    2.0 * d * theta.to_radians().sin()
}

/// 由电机角度（θ 或 2θ）计算波长
pub fn wavelength_from_motor_angle(angle: f64, d: f64, motor: MotorKind) -> f64 {
    wavelength_from_theta(angle / motor.factor(), d)
}

/// 由 2θ（度）与衍射级数计算波长
pub fn wavelength_from_two_theta(two_theta: f64, d: f64, order: f64) -> f64 {
    wavelength_from_theta(two_theta.abs() / 2.0, d) / order
}

/// 对称反射的目标电机角度 (right, left)
pub fn symmetric_targets(
    theta_offset: f64,
    wavelength: f64,
    d: f64,
    motor: MotorKind,
) -> Result<(f64, f64)> {
    let half = motor.factor() * bragg_angle(wavelength, d)?;
    Ok((theta_offset + half, theta_offset - half))
}

/// 波长（Å）→ 光子能量（keV）
pub fn energy_kev(wavelength: f64) -> f64 {
    HC_KEV_ANGSTROM / wavelength
}

/// 光子能量（keV）→ 波长（Å）
pub fn wavelength_from_energy(energy_kev: f64) -> f64 {
    HC_KEV_ANGSTROM / energy_kev
}
