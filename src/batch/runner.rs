//! # 批量执行器
//!
//! 并行处理多个轨迹文件，每个文件独立构造自己的计算器。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代
//! - 进度条显示
//! - 错误收集与汇总报告
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{NepError, Result};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;

/// 单个文件处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// 处理成功，携带结构数
    Success(usize),
    /// 计算器返回空结果（模型缺失或计算失败已记录）
    Empty(String),
    /// 处理失败
    Failed(String, String), // (文件路径, 错误信息)
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    /// 成功数量
    pub success: usize,
    /// 空结果数量
    pub empty: usize,
    /// 失败数量
    pub failed: usize,
    /// 空结果文件
    pub empty_files: Vec<String>,
    /// 成功文件中的结构总数
    pub structures: usize,
    /// 失败详情
    pub failures: Vec<(String, String)>,
}

impl BatchResult {
    /// 合并处理结果
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success(n) => {
                self.success += 1;
                self.structures += n;
            }
            ProcessResult::Empty(path) => {
                self.empty += 1;
                self.empty_files.push(path);
            }
            ProcessResult::Failed(path, err) => {
                self.failed += 1;
                self.failures.push((path, err));
            }
        }
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success + self.empty + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建新的批量执行器，`jobs == 0` 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    /// 并行处理文件列表，结果顺序与输入一致
    pub fn run<F>(&self, files: &[PathBuf], processor: F) -> Result<BatchResult>
    where
        F: Fn(&PathBuf) -> ProcessResult + Sync + Send,
    {
        let pb = progress::create_progress_bar(files.len() as u64, "Evaluating");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| NepError::InvalidArgument(format!("Cannot build thread pool: {}", e)))?;

        let results: Vec<ProcessResult> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let result = processor(file);
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut batch_result = BatchResult::default();
        for result in results {
            batch_result.merge(result);
        }

        Ok(batch_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_counts() {
        let mut result = BatchResult::default();
        result.merge(ProcessResult::Success(10));
        result.merge(ProcessResult::Success(5));
        result.merge(ProcessResult::Empty("c.xyz".to_string()));
        result.merge(ProcessResult::Failed("d.xyz".to_string(), "bad frame".to_string()));

        assert_eq!(result.total(), 4);
        assert_eq!(result.structures, 15);
        assert_eq!(result.empty_files, vec!["c.xyz".to_string()]);
        assert_eq!(result.failures, vec![("d.xyz".to_string(), "bad frame".to_string())]);
    }

    #[test]
    fn test_run_visits_every_file() {
        let files: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("{}.xyz", i))).collect();
        let runner = BatchRunner::new(2);

        let result = runner
            .run(&files, |path| {
                let name = path.display().to_string();
                if name.starts_with('3') {
                    ProcessResult::Failed(name, "boom".to_string())
                } else {
                    ProcessResult::Success(1)
                }
            })
            .unwrap();

        assert_eq!(result.success, 7);
        assert_eq!(result.failed, 1);
    }
}
