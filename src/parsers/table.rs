//! # 表格 CSV 解析器
//!
//! 数据采集导出的带表头 CSV，例如：
//!
//! ```text
//! seq_num,time,th_cal,sc_chan1
//! 1,1460000000.1,-33.48,5012
//! ```
//!
//! 按列名取角度与强度列。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `csv` crate

use super::{build_trace, TraceColumns};
use crate::error::{EcalError, Result};
use crate::models::ScanTrace;
use std::io::Read;
use std::path::Path;

/// 解析 CSV 文件
pub fn parse_csv_file(path: &Path, columns: &TraceColumns) -> Result<ScanTrace> {
    let file = std::fs::File::open(path).map_err(|e| EcalError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_csv_reader(file, columns, &path.display().to_string())
}

/// 从任意 reader 解析
pub fn parse_csv_reader<R: Read>(reader: R, columns: &TraceColumns, source: &str) -> Result<ScanTrace> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EcalError::ParseError {
                format: "CSV".to_string(),
                path: source.to_string(),
                reason: format!(
                    "column '{}' not found (available: {})",
                    name,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ),
            })
    };
    let angle_col = find(&columns.angle)?;
    let intensity_col = find(&columns.intensity)?;

    let mut angles = Vec::new();
    let mut intensities = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let value = |col: usize| -> Result<f64> {
            let field = record.get(col).unwrap_or_default();
            field.parse::<f64>().map_err(|_| EcalError::ParseError {
                format: "CSV".to_string(),
                path: source.to_string(),
                reason: format!("row {}: '{}' is not a number", row + 1, field),
            })
        };
        angles.push(value(angle_col)?);
        intensities.push(value(intensity_col)?);
    }

    build_trace("CSV", source, angles, intensities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_columns() {
        let data = "seq_num, time, th_cal, sc_chan1\n1, 0.1, -33.48, 5012\n2, 0.2, -33.49, 4990\n3, 0.3, -33.50, 4200\n";
        let trace = parse_csv_reader(data.as_bytes(), &TraceColumns::default(), "mem").unwrap();
        assert_eq!(trace.angles(), &[-33.48, -33.49, -33.50]);
        assert_eq!(trace.intensities(), &[5012.0, 4990.0, 4200.0]);
    }

    #[test]
    fn test_custom_columns() {
        let data = "tth,det\n0.0,1\n1.0,2\n";
        let columns = TraceColumns {
            angle: "tth".to_string(),
            intensity: "det".to_string(),
        };
        let trace = parse_csv_reader(data.as_bytes(), &columns, "mem").unwrap();
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn test_missing_column_lists_headers() {
        let data = "a,b\n0,1\n1,2\n";
        let err = parse_csv_reader(data.as_bytes(), &TraceColumns::default(), "mem").unwrap_err();
        match err {
            EcalError::ParseError { reason, .. } => assert!(reason.contains("a, b")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_field() {
        let data = "th_cal,sc_chan1\n0.0,1\nx,2\n";
        assert!(matches!(
            parse_csv_reader(data.as_bytes(), &TraceColumns::default(), "mem"),
            Err(EcalError::ParseError { .. })
        ));
    }
}
