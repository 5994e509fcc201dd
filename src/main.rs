//! # nepkit - NEP 势函数批量计算工具
//!
//! 把结构批次展平为原生 NEP 计算器需要的缓冲区，调用计算器后把结果
//! 拆分、聚合为每个结构的能量、力、维里和描述符。
//!
//! ## 子命令
//! - `calc`   - 对轨迹文件批量计算并导出 CSV
//! - `worker` - 隔离执行入口（隐藏）
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (文件收集与并行执行)
//!   │     ├── parsers/   (结构文件解析器)
//!   │     ├── nep/       (批次编排、计算器、导出)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod nep;
mod parsers;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
