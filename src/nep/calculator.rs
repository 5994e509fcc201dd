//! # NEP 批量计算适配器
//!
//! 把结构列表组装成原生计算器需要的扁平批次，调用计算器，再把输出拆分、
//! 聚合为按结构或按原子组织的数组。
//!
//! ## 状态
//! - `Uninitialized`: 构造时模型文件不存在，所有操作返回空结果
//! - `Ready`: 模型已加载，元素映射已建立
//!
//! 状态在构造后不再变化。
//!
//! ## 依赖关系
//! - 被 `nep/isolate.rs` 和 `commands/calc.rs` 使用
//! - 使用 `nep/batch.rs` 完成数据编排
//! - 使用 `nep/evaluator.rs` 定义的计算器接口

use crate::error::Result;
use crate::models::{Energetics, Structure};
use crate::nep::batch::{self, AsStructures, ElementIndexMap, FlatBatch};
use crate::nep::evaluator::NepEvaluator;

use ndarray::Array2;
use std::path::Path;

enum State<E> {
    Uninitialized,
    Ready {
        evaluator: E,
        type_map: ElementIndexMap,
    },
}

/// NEP 计算适配器
pub struct NepCalculator<E> {
    state: State<E>,
}

impl<E: NepEvaluator> NepCalculator<E> {
    /// 加载模型
    ///
    /// 先检查计算器后端可用，否则直接报错；模型文件不存在时返回未初始化的
    /// 适配器，而不是错误。
    pub fn open(model_path: impl AsRef<Path>) -> Result<Self> {
        E::ensure_available()?;
        Self::open_with(model_path, E::load)
    }
}

impl<E: NepEvaluator> NepCalculator<E> {
    /// 使用自定义加载函数构造，模型文件不存在时不调用 `loader`
    pub fn open_with<F>(model_path: impl AsRef<Path>, loader: F) -> Result<Self>
    where
        F: FnOnce(&Path) -> Result<E>,
    {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Ok(NepCalculator {
                state: State::Uninitialized,
            });
        }

        Ok(Self::from_evaluator(loader(model_path)?))
    }

    /// 包装已加载的计算器
    pub fn from_evaluator(evaluator: E) -> Self {
        let type_map = ElementIndexMap::new(evaluator.element_list());
        NepCalculator {
            state: State::Ready {
                evaluator,
                type_map,
            },
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    /// 模型支持的元素；未初始化时为空
    pub fn element_list(&self) -> &[String] {
        match &self.state {
            State::Ready { type_map, .. } => type_map.elements(),
            State::Uninitialized => &[],
        }
    }

    /// 展平结构批次；未初始化时返回空批次
    pub fn compose<S: AsStructures + ?Sized>(&self, structures: &S) -> Result<FlatBatch> {
        match &self.state {
            State::Ready { type_map, .. } => batch::compose(structures, type_map),
            State::Uninitialized => Ok(FlatBatch::default()),
        }
    }

    /// 计算每个结构的势能、逐原子力和 Voigt 维里
    pub fn calculate<S: AsStructures + ?Sized>(&mut self, structures: &S) -> Result<Energetics> {
        let State::Ready {
            evaluator,
            type_map,
        } = &mut self.state
        else {
            return Ok(Energetics::empty());
        };

        let flat = batch::compose(structures, type_map)?;
        let raw = evaluator.calculate(&flat)?;

        let per_atom: Vec<f64> = raw.potentials.into_iter().flatten().collect();
        let potentials = batch::sum_potentials(&per_atom, &flat.group_size)?;
        let forces = batch::stack_forces(&raw.forces, &flat.group_size)?;
        let virials = batch::reduce_virials(&raw.virials, &flat.group_size)?;

        Ok(Energetics {
            potentials,
            forces,
            virials,
        })
    }

    /// 单个结构的逐原子描述符 (N x dim)
    pub fn get_descriptor(&mut self, structure: &Structure) -> Result<Array2<f32>> {
        let State::Ready {
            evaluator,
            type_map,
        } = &mut self.state
        else {
            return Ok(Array2::zeros((0, 0)));
        };

        let (types, cell, positions) = batch::flatten_structure(structure, type_map)?;
        let descriptor = evaluator.descriptor(&types, &cell, &positions)?;

        batch::atom_descriptors(descriptor, structure.len())
    }

    /// 每个结构的描述符，原生计算器已按结构聚合
    pub fn get_structures_descriptor<S: AsStructures + ?Sized>(
        &mut self,
        structures: &S,
    ) -> Result<Array2<f32>> {
        self.batched("structures_descriptor", structures, |e, b| {
            e.structures_descriptor(b)
        })
    }

    pub fn get_structures_polarizability<S: AsStructures + ?Sized>(
        &mut self,
        structures: &S,
    ) -> Result<Array2<f32>> {
        self.batched("structures_polarizability", structures, |e, b| {
            e.structures_polarizability(b)
        })
    }

    pub fn get_structures_polarizability_atomic<S: AsStructures + ?Sized>(
        &mut self,
        structures: &S,
    ) -> Result<Array2<f32>> {
        self.batched("structures_polarizability_atomic", structures, |e, b| {
            e.structures_polarizability_atomic(b)
        })
    }

    pub fn get_structures_dipole<S: AsStructures + ?Sized>(
        &mut self,
        structures: &S,
    ) -> Result<Array2<f32>> {
        self.batched("structures_dipole", structures, |e, b| e.structures_dipole(b))
    }

    fn batched<S, F>(&mut self, what: &str, structures: &S, call: F) -> Result<Array2<f32>>
    where
        S: AsStructures + ?Sized,
        F: FnOnce(&mut E, &FlatBatch) -> Result<Vec<Vec<f64>>>,
    {
        let State::Ready {
            evaluator,
            type_map,
        } = &mut self.state
        else {
            return Ok(Array2::zeros((0, 0)));
        };

        let flat = batch::compose(structures, type_map)?;
        let rows = call(evaluator, &flat)?;

        batch::rows_to_array(what, rows)
    }
}
