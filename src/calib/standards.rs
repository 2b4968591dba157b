//! # 参考标样数据库
//!
//! 标样名称 → 按使用顺序排列的特征 d 间距（Å）。
//!
//! ## 数据来源
//! - Si: 立方晶格 a = 5.43095 Å，(111), (220), (311), (333)
//! - LaB6: 校准证书给出的前三个 d 间距
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs`, `commands/` 使用
//! - 可由 `config.rs` 追加自定义标样

use crate::error::{EcalError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Si 晶格常数（Å）
pub const SI_LATTICE: f64 = 5.43095;

/// Si 使用的反射面
const SI_REFLECTIONS: [(i32, i32, i32); 4] = [(1, 1, 1), (2, 2, 0), (3, 1, 1), (3, 3, 3)];

/// LaB6 d 间距（Å）
const LAB6_D_SPACINGS: [f64; 3] = [4.15772, 2.94676, 2.40116];

/// 参考标样
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceStandard {
    name: String,
    d_spacings: Vec<f64>,
}

impl ReferenceStandard {
    /// 创建标样，d 间距必须非空且全部为正
    pub fn new(name: impl Into<String>, d_spacings: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if d_spacings.is_empty() {
            return Err(EcalError::InvalidArgument(format!(
                "standard '{}' has no d-spacings",
                name
            )));
        }
        if let Some(d) = d_spacings.iter().find(|d| !(d.is_finite() && **d > 0.0)) {
            return Err(EcalError::InvalidArgument(format!(
                "standard '{}' has a non-positive d-spacing {}",
                name, d
            )));
        }
        Ok(Self { name, d_spacings })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn d_spacings(&self) -> &[f64] {
        &self.d_spacings
    }

    /// 主 d 间距（第一个）
    pub fn primary(&self) -> f64 {
        self.d_spacings[0]
    }
}

/// 立方晶格面间距 d = a / sqrt(h² + k² + l²)
fn cubic_d_spacing(lattice: f64, h: i32, k: i32, l: i32) -> f64 {
    let n2 = (h * h + k * k + l * l) as f64;
    lattice / n2.sqrt()
}

/// 标样表
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    standards: BTreeMap<String, ReferenceStandard>,
}

impl ReferenceTable {
    /// 空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置标样表
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// 添加或替换标样
    pub fn insert(&mut self, standard: ReferenceStandard) {
        self.standards.insert(standard.name.clone(), standard);
    }

    /// 按名称精确查找标样
    pub fn lookup(&self, name: &str) -> Result<&ReferenceStandard> {
        self.standards
            .get(name)
            .ok_or_else(|| EcalError::UnknownStandard {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.standards.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceStandard> {
        self.standards.values()
    }
}

/// 进程级只读内置表
static BUILTIN: LazyLock<ReferenceTable> = LazyLock::new(|| {
    let mut table = ReferenceTable::new();

    table.insert(ReferenceStandard {
        name: "Si".to_string(),
        d_spacings: SI_REFLECTIONS
            .iter()
            .map(|&(h, k, l)| cubic_d_spacing(SI_LATTICE, h, k, l))
            .collect(),
    });

    table.insert(ReferenceStandard {
        name: "LaB6".to_string(),
        d_spacings: LAB6_D_SPACINGS.to_vec(),
    });

    table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_si_primary_d_spacing() {
        let table = ReferenceTable::builtin();
        let si = table.lookup("Si").unwrap();
        assert!((si.primary() - 5.43095 / 3f64.sqrt()).abs() < 1e-12);
        assert!((si.primary() - 3.1355).abs() < 1e-4);
        assert_eq!(si.d_spacings().len(), 4);
        assert!((si.d_spacings()[3] - 5.43095 / 27f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_lookup_is_exact() {
        let table = ReferenceTable::builtin();
        assert_eq!(table.lookup("LaB6").unwrap().name(), "LaB6");
        assert!(matches!(
            table.lookup("lab6"),
            Err(EcalError::UnknownStandard { .. })
        ));
        assert!(table.lookup("si").is_err());
    }

    #[test]
    fn test_unknown_standard() {
        let table = ReferenceTable::builtin();
        let err = table.lookup("Unobtainium").unwrap_err();
        match err {
            EcalError::UnknownStandard { name, known } => {
                assert_eq!(name, "Unobtainium");
                assert!(known.contains("Si"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_d_spacings_rejected() {
        assert!(ReferenceStandard::new("bad", vec![]).is_err());
        assert!(ReferenceStandard::new("bad", vec![1.0, -2.0]).is_err());
        assert!(ReferenceStandard::new("bad", vec![0.0]).is_err());
    }

    #[test]
    fn test_cubic_d_spacing() {
        assert!((cubic_d_spacing(5.411, 2, 0, 0) - 2.7055).abs() < 1e-4);
    }
}
