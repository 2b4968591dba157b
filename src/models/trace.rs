//! # 扫描数据模型
//!
//! 一次粗扫 / 细扫得到的 (角度, 强度) 序列。
//! 角度单调变化（可以递减），采集后只读。
//!
//! ## 依赖关系
//! - 被 `calib/`, `hardware/scan.rs`, `parsers/`, `report/` 使用
//! - 无外部模块依赖

use crate::error::{EcalError, Result};
use serde::{Deserialize, Serialize};

/// 扫描曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTrace {
    /// 电机角度（度）
    angles: Vec<f64>,
    /// 探测器强度
    intensities: Vec<f64>,
}

impl ScanTrace {
    /// 创建扫描曲线，要求长度一致、数值有限、角度单调
    pub fn new(angles: Vec<f64>, intensities: Vec<f64>) -> Result<Self> {
        if angles.len() != intensities.len() {
            return Err(EcalError::InvalidArgument(format!(
                "scan trace has {} angles but {} intensities",
                angles.len(),
                intensities.len()
            )));
        }
        if let Some(i) = angles
            .iter()
            .zip(&intensities)
            .position(|(a, y)| !a.is_finite() || !y.is_finite())
        {
            return Err(EcalError::InvalidArgument(format!(
                "scan trace contains a non-finite sample at index {}",
                i
            )));
        }

        let ascending = angles.windows(2).all(|w| w[1] >= w[0]);
        let descending = angles.windows(2).all(|w| w[1] <= w[0]);
        if !ascending && !descending {
            return Err(EcalError::InvalidArgument(
                "scan trace angles must change monotonically".to_string(),
            ));
        }

        Ok(Self {
            angles,
            intensities,
        })
    }

    /// 从任意顺序的采样点创建，按角度升序排列
    pub fn sorted(points: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut points: Vec<(f64, f64)> = points.into_iter().collect();
        if points.iter().any(|(a, _)| a.is_nan()) {
            return Err(EcalError::InvalidArgument(
                "scan trace contains a NaN angle".to_string(),
            ));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (angles, intensities) = points.into_iter().unzip();
        Self::new(angles, intensities)
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// (角度, 强度) 迭代器
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.angles
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }

    /// 强度平均值（空曲线为 0）
    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.intensities.iter().sum::<f64>() / self.len() as f64
    }

    /// 强度总体标准差
    pub fn std_dev(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .intensities
            .iter()
            .map(|y| (y - mean) * (y - mean))
            .sum::<f64>()
            / self.len() as f64;
        var.sqrt()
    }

    /// 角度范围 (min, max)
    pub fn angle_range(&self) -> Option<(f64, f64)> {
        let first = *self.angles.first()?;
        let last = *self.angles.last()?;
        Some((first.min(last), first.max(last)))
    }

    /// 平均步长（绝对值）
    pub fn mean_step(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let (lo, hi) = self.angle_range()?;
        Some((hi - lo) / (self.len() - 1) as f64)
    }

    /// 截取 [start, end) 区间
    pub fn window(&self, start: usize, end: usize) -> ScanTrace {
        let end = end.min(self.len());
        let start = start.min(end);
        ScanTrace {
            angles: self.angles[start..end].to_vec(),
            intensities: self.intensities[start..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_statistics() {
        let trace = ScanTrace::new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 3.0, 1.0, 3.0]).unwrap();
        assert_eq!(trace.len(), 4);
        assert!((trace.mean() - 2.0).abs() < 1e-12);
        assert!((trace.std_dev() - 1.0).abs() < 1e-12);
        assert_eq!(trace.angle_range(), Some((0.0, 3.0)));
        assert!((trace.mean_step().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_descending_trace_allowed() {
        let trace = ScanTrace::new(vec![3.0, 2.0, 1.0], vec![0.0, 1.0, 0.0]).unwrap();
        assert_eq!(trace.angle_range(), Some((1.0, 3.0)));
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let err = ScanTrace::new(vec![0.0, 2.0, 1.0], vec![0.0, 1.0, 0.0]).unwrap_err();
        assert!(matches!(err, EcalError::InvalidArgument(_)));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(ScanTrace::new(vec![0.0, 1.0], vec![0.0]).is_err());
        assert!(ScanTrace::new(vec![0.0, f64::NAN], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_sorted_and_window() {
        let trace = ScanTrace::sorted(vec![(2.0, 20.0), (0.0, 0.0), (1.0, 10.0)]).unwrap();
        assert_eq!(trace.angles(), &[0.0, 1.0, 2.0]);
        assert_eq!(trace.intensities(), &[0.0, 10.0, 20.0]);

        let w = trace.window(1, 10);
        assert_eq!(w.angles(), &[1.0, 2.0]);
    }
}
