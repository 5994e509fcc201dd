//! # 原子结构数据模型
//!
//! 定义 NEP 计算所需的结构表示：元素符号、晶胞和笛卡尔坐标。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `nep/` 使用
//! - 无外部模块依赖

use crate::error::{NepError, Result};
use serde::{Deserialize, Serialize};

/// 原子结构
///
/// `cell` 的每一行是一个晶格向量 a, b, c；`positions` 为笛卡尔坐标 (Å)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 元素符号，与 `positions` 一一对应
    pub elements: Vec<String>,

    /// 晶胞矩阵 (3x3)
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub cell: [[f64; 3]; 3],

    /// 笛卡尔坐标 (N x 3)
    pub positions: Vec<[f64; 3]>,
}

impl Structure {
    /// 创建结构，检查元素数与坐标数一致
    pub fn new(elements: Vec<String>, cell: [[f64; 3]; 3], positions: Vec<[f64; 3]>) -> Result<Self> {
        if elements.len() != positions.len() {
            return Err(NepError::InvalidStructure(format!(
                "{} element symbols but {} positions",
                elements.len(),
                positions.len()
            )));
        }

        Ok(Structure {
            elements,
            cell,
            positions,
        })
    }

    /// 原子数
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for element in &self.elements {
            *counts.entry(element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 晶胞体积
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.cell;

        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> [[f64; 3]; 3] {
        [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let result = Structure::new(
            vec!["Si".to_string(), "Si".to_string()],
            cubic(5.43),
            vec![[0.0, 0.0, 0.0]],
        );
        assert!(matches!(result, Err(NepError::InvalidStructure(_))));
    }

    #[test]
    fn test_formula() {
        let structure = Structure::new(
            vec!["O".to_string(), "H".to_string(), "H".to_string()],
            cubic(10.0),
            vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
        )
        .unwrap();

        assert_eq!(structure.formula(), "H2O");
        assert_eq!(structure.len(), 3);
    }

    #[test]
    fn test_volume_cubic() {
        let structure = Structure::new(vec![], cubic(5.0), vec![]).unwrap();

        assert!((structure.volume() - 125.0).abs() < 1e-9);
        assert!(structure.is_empty());
    }
}
