//! # worker 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数由 `nep/isolate.rs` 在启动子进程时构造

use crate::models::CalcKind;
use clap::Args;
use std::path::PathBuf;

/// worker 子命令参数
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// NEP model file
    #[arg(long)]
    pub model: PathBuf,

    /// Quantity to evaluate
    #[arg(long, value_enum)]
    pub kind: CalcKind,
}
