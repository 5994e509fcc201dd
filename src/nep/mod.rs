//! # NEP 计算模块
//!
//! 结构批次与原生 NEP 势函数计算器之间的数据编排层。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: batch, evaluator, calculator, native, isolate, export

pub mod batch;
pub mod calculator;
pub mod evaluator;
pub mod export;
pub mod isolate;
pub mod native;

#[cfg(test)]
pub mod testing;

pub use native::NativeNep;
