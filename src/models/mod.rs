//! # 数据模型模块
//!
//! 定义原子结构和 NEP 计算结果数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `nep/` 和 `commands/` 使用
//! - 子模块: structure, results

pub mod results;
pub mod structure;

pub use results::{CalcKind, CalcOutput, Energetics};
pub use structure::Structure;
