//! # 两列文本格式解析器
//!
//! `.xy` / `.dat` / `.txt` / `.chi`：每行 `angle intensity`，
//! 空白或逗号分隔；`#` 注释行和无法解析为数字的表头行被跳过。
//! 多于两列时只取前两列。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用

use super::build_trace;
use crate::error::{EcalError, Result};
use crate::models::ScanTrace;
use std::fs;
use std::path::Path;

/// 解析两列文本文件
pub fn parse_xy_file(path: &Path) -> Result<ScanTrace> {
    let content = fs::read_to_string(path).map_err(|e| EcalError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_xy_content(&content, &path.display().to_string())
}

/// 从字符串内容解析
pub fn parse_xy_content(content: &str, source: &str) -> Result<ScanTrace> {
    let mut angles = Vec::new();
    let mut intensities = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty());
        let (Some(a), Some(y)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Ok(a), Ok(y)) = (a.parse::<f64>(), y.parse::<f64>()) {
            angles.push(a);
            intensities.push(y);
        }
    }

    build_trace("xy", source, angles, intensities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xy_with_header_and_comments() {
        let content = "\
# LaB6 scan
2-Theta Angle (Degrees)
Intensity
       3
  -1.0   5.0
  -0.5,  7.5
   0.0   9.0   0.1
";
        let trace = parse_xy_content(content, "mem").unwrap();
        assert_eq!(trace.angles(), &[-1.0, -0.5, 0.0]);
        assert_eq!(trace.intensities(), &[5.0, 7.5, 9.0]);
    }

    #[test]
    fn test_descending_file_keeps_order() {
        let trace = parse_xy_content("1.0 1\n0.5 2\n0.0 3\n", "mem").unwrap();
        assert_eq!(trace.angles(), &[1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_too_few_rows() {
        let err = parse_xy_content("# nothing\n1.0 2.0\n", "mem").unwrap_err();
        assert!(matches!(err, EcalError::ParseError { .. }));
    }
}
