//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `calc`: 对轨迹文件批量执行 NEP 计算
//! - `worker`: 隔离执行入口（隐藏，由 `calc --isolate` 调用）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: calc, worker

pub mod calc;
pub mod worker;

use clap::{Parser, Subcommand};

/// nepkit - NEP 势函数批量计算工具
#[derive(Parser)]
#[command(name = "nepkit")]
#[command(version)]
#[command(about = "Batch evaluation of NEP machine-learned potentials", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate energies, forces, virials or descriptors of trajectory files
    Calc(calc::CalcArgs),

    /// Run a single isolated evaluation (structures on stdin, JSON on stdout)
    #[command(hide = true)]
    Worker(worker::WorkerArgs),
}
