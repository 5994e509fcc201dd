//! # NEP 计算结果数据模型
//!
//! 每次计算调用新建、返回后不可变的结果集合。
//!
//! ## 依赖关系
//! - 被 `nep/calculator.rs`, `nep/isolate.rs`, `nep/export.rs` 使用
//! - 使用 `ndarray` 存储数值数组

use crate::error::Result;
use clap::ValueEnum;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// 计算类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum CalcKind {
    /// Per-structure energy, per-atom forces and Voigt virials
    Energy,
    /// Per-structure descriptor
    Descriptor,
    /// Per-atom descriptor of every structure
    AtomDescriptor,
    /// Per-structure polarizability
    Polarizability,
    /// Per-structure polarizability from the atomic model
    PolarizabilityAtomic,
    /// Per-structure dipole
    Dipole,
}

impl std::fmt::Display for CalcKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalcKind::Energy => write!(f, "energy"),
            CalcKind::Descriptor => write!(f, "descriptor"),
            CalcKind::AtomDescriptor => write!(f, "atom-descriptor"),
            CalcKind::Polarizability => write!(f, "polarizability"),
            CalcKind::PolarizabilityAtomic => write!(f, "polarizability-atomic"),
            CalcKind::Dipole => write!(f, "dipole"),
        }
    }
}

/// 能量、力与维里
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Energetics {
    /// 每个结构的势能 (S)
    #[serde(with = "float_bits")]
    pub potentials: Array1<f32>,
    /// 所有结构按顺序堆叠的原子力 (sum(N) x 3)
    #[serde(with = "float_bits")]
    pub forces: Array2<f32>,
    /// 每个结构按原子平均的 Voigt 维里 (S x 6)：xx, yy, zz, xy, yz, zx
    ///
    /// 零原子结构的一行为 NaN。
    #[serde(with = "float_bits")]
    pub virials: Array2<f32>,
}

impl Energetics {
    pub fn empty() -> Self {
        Energetics {
            potentials: Array1::zeros(0),
            forces: Array2::zeros((0, 3)),
            virials: Array2::zeros((0, 6)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty() && self.forces.is_empty() && self.virials.is_empty()
    }

    /// 按顺序拼接多个批次的结果
    pub fn concat(parts: &[Energetics]) -> Result<Self> {
        let parts: Vec<&Energetics> = parts.iter().filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Ok(Energetics::empty());
        }

        let potentials = parts
            .iter()
            .flat_map(|p| p.potentials.iter().copied())
            .collect::<Array1<f32>>();
        let forces = stack_rows(parts.iter().map(|p| p.forces.view()).collect())?;
        let virials = stack_rows(parts.iter().map(|p| p.virials.view()).collect())?;

        Ok(Energetics {
            potentials,
            forces,
            virials,
        })
    }
}

/// 一次计算的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CalcOutput {
    Energetics(Energetics),
    /// 每行对应一个结构
    Array(#[serde(with = "float_bits")] Array2<f32>),
    /// 每个结构一个 (N x dim) 矩阵
    AtomDescriptors(#[serde(with = "float_bits::seq")] Vec<Array2<f32>>),
}

impl CalcOutput {
    /// 给定计算类型的空结果
    pub fn empty(kind: CalcKind) -> Self {
        match kind {
            CalcKind::Energy => CalcOutput::Energetics(Energetics::empty()),
            CalcKind::AtomDescriptor => CalcOutput::AtomDescriptors(Vec::new()),
            _ => CalcOutput::Array(Array2::zeros((0, 0))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CalcOutput::Energetics(e) => e.is_empty(),
            CalcOutput::Array(a) => a.is_empty(),
            CalcOutput::AtomDescriptors(d) => d.is_empty(),
        }
    }

    /// 结果覆盖的结构数
    pub fn num_structures(&self) -> usize {
        match self {
            CalcOutput::Energetics(e) => e.potentials.len(),
            CalcOutput::Array(a) => a.nrows(),
            CalcOutput::AtomDescriptors(d) => d.len(),
        }
    }

    /// 按顺序拼接多个批次的结果，批次间类型必须一致
    pub fn concat(kind: CalcKind, parts: Vec<CalcOutput>) -> Result<Self> {
        let mut energetics = Vec::new();
        let mut arrays = Vec::new();
        let mut descriptors = Vec::new();

        for part in parts {
            match part {
                CalcOutput::Energetics(e) => energetics.push(e),
                CalcOutput::Array(a) if !a.is_empty() => arrays.push(a),
                CalcOutput::Array(_) => {}
                CalcOutput::AtomDescriptors(d) => descriptors.extend(d),
            }
        }

        let output = match kind {
            CalcKind::Energy => CalcOutput::Energetics(Energetics::concat(&energetics)?),
            CalcKind::AtomDescriptor => CalcOutput::AtomDescriptors(descriptors),
            _ if arrays.is_empty() => CalcOutput::empty(kind),
            _ => CalcOutput::Array(stack_rows(arrays.iter().map(|a| a.view()).collect())?),
        };

        Ok(output)
    }
}

fn stack_rows(views: Vec<ArrayView2<'_, f32>>) -> Result<Array2<f32>> {
    Ok(concatenate(Axis(0), &views)?)
}

/// 数组的序列化形式：形状加每个元素的 IEEE 754 位模式
///
/// JSON 没有 NaN 和无穷大，按位编码后 worker 通道可以原样传回这些值。
mod float_bits {
    use ndarray::{Array, ArrayD, Dimension, IxDyn};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Encoded {
        shape: Vec<usize>,
        bits: Vec<u32>,
    }

    impl Encoded {
        fn new<D: Dimension>(array: &Array<f32, D>) -> Self {
            Encoded {
                shape: array.shape().to_vec(),
                bits: array.iter().map(|x| x.to_bits()).collect(),
            }
        }

        fn decode<D: Dimension>(self) -> std::result::Result<Array<f32, D>, String> {
            let values = self.bits.into_iter().map(f32::from_bits).collect();
            ArrayD::from_shape_vec(IxDyn(&self.shape), values)
                .and_then(|a| a.into_dimensionality::<D>())
                .map_err(|e| format!("invalid array of shape {:?}: {}", self.shape, e))
        }
    }

    pub fn serialize<D, S>(array: &Array<f32, D>, serializer: S) -> Result<S::Ok, S::Error>
    where
        D: Dimension,
        S: Serializer,
    {
        Encoded::new(array).serialize(serializer)
    }

    pub fn deserialize<'de, D, De>(deserializer: De) -> Result<Array<f32, D>, De::Error>
    where
        D: Dimension,
        De: Deserializer<'de>,
    {
        Encoded::deserialize(deserializer)?
            .decode()
            .map_err(De::Error::custom)
    }

    pub mod seq {
        use super::Encoded;
        use ndarray::Array2;
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(arrays: &[Array2<f32>], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(arrays.iter().map(Encoded::new))
        }

        pub fn deserialize<'de, De>(deserializer: De) -> Result<Vec<Array2<f32>>, De::Error>
        where
            De: Deserializer<'de>,
        {
            Vec::<Encoded>::deserialize(deserializer)?
                .into_iter()
                .map(|e| e.decode().map_err(De::Error::custom))
                .collect()
        }
    }
}
