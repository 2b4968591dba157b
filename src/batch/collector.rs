//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理的扫描文件。
//!
//! ## 功能
//! - 单文件或目录输入
//! - 逗号分隔的多个 glob 模式
//! - 可选递归搜索，结果按路径排序
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs`, `commands/wavelength.rs` 调用
//! - 使用 `walkdir` 遍历目录, `glob` 匹配文件名

use crate::error::{EcalError, Result};
use crate::parsers::TRACE_EXTENSIONS;

use std::path::PathBuf;
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    input: PathBuf,
    patterns: Vec<String>,
    recursive: bool,
}

impl FileCollector {
    /// 默认匹配所有可识别的扫描文件
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            patterns: TRACE_EXTENSIONS.iter().map(|e| format!("*.{}", e)).collect(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔）；空模式保持默认
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        let patterns: Vec<String> = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !patterns.is_empty() {
            self.patterns = patterns;
        }
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }
        if !self.input.is_dir() {
            return Err(EcalError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    EcalError::InvalidArgument(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(|name| patterns.iter().any(|p| p.matches(name)))
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_class_pattern() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["scan_1.xy", "scan_7.xy", "scan_a.xy", "scan_10.xy"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = FileCollector::new(dir.path())
            .with_pattern("scan_[0-9].xy")
            .collect()
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["scan_1.xy", "scan_7.xy"]);
    }

    #[test]
    fn test_malformed_pattern_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileCollector::new(dir.path())
            .with_pattern("scan_[0-9.xy")
            .collect()
            .unwrap_err();
        assert!(matches!(err, EcalError::InvalidArgument(_)));
    }

    #[test]
    fn test_collect_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xy", "a.chi", "notes.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.xy"), "").unwrap();

        let flat = FileCollector::new(dir.path()).collect().unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.chi", "b.xy"]);

        let deep = FileCollector::new(dir.path())
            .with_pattern("*.xy")
            .recursive(true)
            .collect()
            .unwrap();
        assert_eq!(deep.len(), 2);

        assert!(FileCollector::new(dir.path().join("missing")).collect().is_err());
    }
}
