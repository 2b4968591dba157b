//! # 批量执行器
//!
//! 在 rayon 线程池中对文件列表执行处理函数，
//! 收集每个文件的结果并按文件名排序汇总。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs`, `commands/wavelength.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条

use crate::error::{EcalError, Result};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 单个文件的处理结果
#[derive(Debug)]
pub enum FileOutcome<T> {
    Done(T),
    /// 跳过（附原因）
    Skipped(String),
    Failed(EcalError),
}

impl<T> FileOutcome<T> {
    /// 转换成功结果，保留跳过与失败
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FileOutcome<U> {
        match self {
            FileOutcome::Done(v) => FileOutcome::Done(f(v)),
            FileOutcome::Skipped(reason) => FileOutcome::Skipped(reason),
            FileOutcome::Failed(e) => FileOutcome::Failed(e),
        }
    }
}

/// 批量处理汇总
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<(PathBuf, FileOutcome<T>)>,
}

impl<T> BatchReport<T> {
    /// 成功结果
    pub fn successes(&self) -> impl Iterator<Item = (&Path, &T)> {
        self.outcomes.iter().filter_map(|(p, o)| match o {
            FileOutcome::Done(v) => Some((p.as_path(), v)),
            _ => None,
        })
    }

    /// 失败文件及错误
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &EcalError)> {
        self.outcomes.iter().filter_map(|(p, o)| match o {
            FileOutcome::Failed(e) => Some((p.as_path(), e)),
            _ => None,
        })
    }

    /// 跳过文件及原因
    pub fn skipped(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|(p, o)| match o {
            FileOutcome::Skipped(reason) => Some((p.as_path(), reason.as_str())),
            _ => None,
        })
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
    show_progress: bool,
    message: String,
}

impl BatchRunner {
    /// `jobs` 为 0 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self {
            jobs,
            show_progress: true,
            message: "Processing".to_string(),
        }
    }

    /// 进度条文字
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理文件列表
    ///
    /// 处理函数返回 `Err` 记为失败。
    pub fn run<T, F>(&self, files: Vec<PathBuf>, processor: F) -> Result<BatchReport<T>>
    where
        T: Send,
        F: Fn(&Path) -> Result<FileOutcome<T>> + Sync + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| EcalError::Other(format!("failed to build thread pool: {}", e)))?;

        let pb = self
            .show_progress
            .then(|| progress::create_progress_bar(files.len() as u64, &self.message));

        let mut outcomes: Vec<(PathBuf, FileOutcome<T>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let outcome = match processor(&file) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::warn!(file = %file.display(), error = %e, "batch item failed");
                            FileOutcome::Failed(e)
                        }
                    };
                    if let Some(pb) = &pb {
                        pb.inc(1);
                    }
                    (file, outcome)
                })
                .collect()
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(BatchReport { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_sorted_and_counted() {
        let files: Vec<PathBuf> = ["c.xy", "a.xy", "b.xy", "d.xy"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let runner = BatchRunner::new(2).with_progress(false);
        let report = runner
            .run(files, |path| {
                match path.to_str().unwrap_or_default() {
                    "a.xy" => Ok(FileOutcome::Done(1)),
                    "b.xy" => Ok(FileOutcome::Skipped("flat".to_string())),
                    "c.xy" => Err(EcalError::Other("bad".to_string())),
                    _ => Ok(FileOutcome::Done(4)),
                }
            })
            .unwrap();

        assert_eq!(report.total(), 4);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped, vec![(Path::new("b.xy"), "flat")]);
        let names: Vec<_> = report.outcomes.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(names[0], PathBuf::from("a.xy"));
        let values: Vec<i32> = report.successes().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 4]);
    }
}
