//! # 统一错误处理模块
//!
//! 定义 nepkit 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// nepkit 统一错误类型
#[derive(Error, Debug)]
pub enum NepError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File or directory not found: {path}")]
    PathNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 势函数计算器错误
    // ─────────────────────────────────────────────────────────────
    #[error("NEP evaluator is not available: {0}")]
    EvaluatorUnavailable(String),

    #[error("Failed to initialize NEP evaluator from {path}\nReason: {reason}")]
    EvaluatorInit { path: String, reason: String },

    #[error("NEP evaluator call '{call}' failed: {reason}")]
    Evaluator { call: String, reason: String },

    #[error("Element '{symbol}' is not supported by the loaded model")]
    UnknownElement { symbol: String },

    // ─────────────────────────────────────────────────────────────
    // 数组形状错误
    // ─────────────────────────────────────────────────────────────
    #[error("Shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    // ─────────────────────────────────────────────────────────────
    // 导出与序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 隔离进程错误
    // ─────────────────────────────────────────────────────────────
    #[error("Worker process failed ({status})\n{stderr}")]
    WorkerFailed { status: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, NepError>;
