//! # calc 子命令 CLI 定义
//!
//! 读取轨迹文件，分批调用 NEP 计算器并导出 CSV。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/calc.rs`

use crate::models::CalcKind;
use clap::Args;
use std::path::PathBuf;

/// calc 子命令参数
#[derive(Args, Debug)]
pub struct CalcArgs {
    /// Trajectory file (extxyz, POSCAR) or directory containing them
    pub input: PathBuf,

    /// NEP model file
    #[arg(short, long, env = "NEP_MODEL", default_value = "nep.txt")]
    pub model: PathBuf,

    /// Quantity to evaluate
    #[arg(short, long, value_enum, default_value_t = CalcKind::Energy)]
    pub kind: CalcKind,

    /// Glob pattern(s) for input files, comma separated
    #[arg(short, long, default_value = "*.xyz")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Output directory for CSV files
    #[arg(short, long, default_value = "nep_results")]
    pub output: PathBuf,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Structures per evaluator call (0 = whole file at once)
    #[arg(short, long, default_value_t = 0)]
    pub batch_size: usize,

    /// Run every evaluation in a separate worker process
    #[arg(long, default_value_t = false)]
    pub isolate: bool,
}
