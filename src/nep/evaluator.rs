//! # NEP 原生计算器接口
//!
//! 描述外部势函数计算器必须提供的能力。数值计算完全由实现方负责，
//! 本 crate 只负责输入输出的编排。
//!
//! ## 依赖关系
//! - 被 `nep/calculator.rs` 使用
//! - 实现: `nep/native.rs` (原生库绑定)

use crate::error::Result;
use crate::nep::batch::FlatBatch;
use std::path::Path;

/// 原生 calculate 调用的原始输出，外层按结构排列
#[derive(Debug, Clone, Default)]
pub struct RawEnergetics {
    /// 每个结构的逐原子势能 (N)
    pub potentials: Vec<Vec<f64>>,
    /// 每个结构的力，3 x N 行优先
    pub forces: Vec<Vec<f64>>,
    /// 每个结构的逐原子维里，9 x N 行优先
    pub virials: Vec<Vec<f64>>,
}

/// NEP 势函数计算器
pub trait NepEvaluator {
    /// 计算器后端是否可用（例如编译时是否链接了原生库）
    fn ensure_available() -> Result<()>
    where
        Self: Sized;

    /// 从模型文件加载
    fn load(model_path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// 模型支持的元素，顺序即类型索引
    fn element_list(&self) -> Vec<String>;

    fn calculate(&mut self, batch: &FlatBatch) -> Result<RawEnergetics>;

    /// 单结构逐原子描述符，dim x N 行优先
    fn descriptor(&mut self, types: &[i32], cell: &[f64], positions: &[f64]) -> Result<Vec<f64>>;

    fn structures_descriptor(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>>;

    fn structures_polarizability(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>>;

    fn structures_polarizability_atomic(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>>;

    fn structures_dipole(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>>;
}
