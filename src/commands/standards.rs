//! # standards 子命令实现
//!
//! 列出标样表（内置 + 配置文件中的额外标样）。
//!
//! ## 依赖关系
//! - 使用 `cli/standards.rs` 定义的 StandardsArgs
//! - 使用 `calib/standards.rs`, `calib/bragg.rs`

use crate::calib::bragg;
use crate::calib::standards::ReferenceStandard;
use crate::cli::standards::StandardsArgs;
use crate::config::EcalConfig;
use crate::error::Result;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct StandardRow {
    #[tabled(rename = "Standard")]
    name: String,
    #[tabled(rename = "Reflections")]
    count: usize,
    #[tabled(rename = "d-spacings (Å)")]
    d_spacings: String,
}

#[derive(Debug, Clone, Tabled)]
struct ReflectionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "d (Å)")]
    d_spacing: String,
    #[tabled(rename = "θ (°)")]
    theta: String,
    #[tabled(rename = "2θ (°)")]
    two_theta: String,
}

/// 列出标样
pub fn execute(args: StandardsArgs, config: &EcalConfig) -> Result<()> {
    output::print_header("Reference Standards");

    let table = config.reference_table()?;
    let selected: Vec<&ReferenceStandard> = match &args.name {
        Some(name) => vec![table.lookup(name)?],
        None => table.iter().collect(),
    };

    let rows: Vec<StandardRow> = selected
        .iter()
        .map(|s| StandardRow {
            name: s.name().to_string(),
            count: s.d_spacings().len(),
            d_spacings: s
                .d_spacings()
                .iter()
                .map(|d| format!("{:.5}", d))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    println!("{}", Table::new(&rows));

    if let Some(wavelength) = args.wavelength {
        output::print_info(&format!(
            "Bragg angles at λ = {:.6} Å ({:.4} keV)",
            wavelength,
            bragg::energy_kev(wavelength)
        ));
        for standard in selected {
            println!("\n  {}", standard.name());
            println!("{}", Table::new(reflection_rows(standard, wavelength)));
        }
    }
    Ok(())
}

/// 各反射的 Bragg 角；不可达的反射显示 "-"
fn reflection_rows(standard: &ReferenceStandard, wavelength: f64) -> Vec<ReflectionRow> {
    standard
        .d_spacings()
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let (theta, two_theta) = match bragg::bragg_angle(wavelength, d) {
                Ok(t) => (format!("{:.4}", t), format!("{:.4}", 2.0 * t)),
                Err(_) => ("-".to_string(), "-".to_string()),
            };
            ReflectionRow {
                index: i + 1,
                d_spacing: format!("{:.5}", d),
                theta,
                two_theta,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_reflection_marked() {
        let standard = ReferenceStandard::new("X", vec![3.0, 0.5]).unwrap();
        let rows = reflection_rows(&standard, 1.5);
        assert_eq!(rows[0].theta, format!("{:.4}", 14.4775_f64));
        assert_eq!(rows[1].theta, "-");
    }

    #[test]
    fn test_unknown_standard_errors() {
        let args = StandardsArgs {
            name: Some("Unobtainium".to_string()),
            wavelength: None,
        };
        assert!(execute(args, &EcalConfig::default()).is_err());
    }
}
