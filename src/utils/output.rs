//! # 美化输出工具
//!
//! 提供统一的终端输出样式。错误信息写到 stderr，保证 worker 的 stdout
//! 只承载结果数据。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块和 `nep/isolate.rs` 使用
//! - 使用 `colored` crate，错误链来自 `anyhow`

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印错误及其完整原因链
///
/// 第一行为最外层上下文，之后每个底层原因缩进一行。
pub fn print_error_chain(err: &anyhow::Error) {
    let mut chain = err.chain();
    if let Some(head) = chain.next() {
        print_error(&head.to_string());
    }
    for cause in chain {
        eprintln!("      {} {}", "caused by:".dimmed(), cause);
    }
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}
