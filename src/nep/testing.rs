//! 测试用的确定性 NEP 计算器

use crate::error::Result;
use crate::models::Structure;
use crate::nep::batch::FlatBatch;
use crate::nep::evaluator::{NepEvaluator, RawEnergetics};
use std::path::Path;

/// 元素为 H, O 的假计算器
///
/// - 逐原子势能：类型索引 + 1
/// - 力：原样返回展平的坐标（3 x N）
/// - 维里：第 k 个分量在原子 j 上为 10k + j
/// - 描述符：维度 2，原子 j 为 [j, 100 + j]
#[derive(Debug, Default)]
pub struct MockNep;

impl NepEvaluator for MockNep {
    fn ensure_available() -> Result<()> {
        Ok(())
    }

    fn load(_model_path: &Path) -> Result<Self> {
        Ok(MockNep)
    }

    fn element_list(&self) -> Vec<String> {
        vec!["H".to_string(), "O".to_string()]
    }

    fn calculate(&mut self, batch: &FlatBatch) -> Result<RawEnergetics> {
        let mut raw = RawEnergetics::default();
        for (types, positions) in batch.types.iter().zip(&batch.positions) {
            let n = types.len();
            raw.potentials
                .push(types.iter().map(|&t| t as f64 + 1.0).collect());
            raw.forces.push(positions.clone());
            raw.virials.push(
                (0..9)
                    .flat_map(|k| (0..n).map(move |j| 10.0 * k as f64 + j as f64))
                    .collect(),
            );
        }
        Ok(raw)
    }

    fn descriptor(&mut self, types: &[i32], _cell: &[f64], _positions: &[f64]) -> Result<Vec<f64>> {
        let n = types.len();
        Ok((0..2)
            .flat_map(|d| (0..n).map(move |j| 100.0 * d as f64 + j as f64))
            .collect())
    }

    fn structures_descriptor(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        Ok(batch
            .types
            .iter()
            .map(|t| vec![t.len() as f64, t.iter().sum::<i32>() as f64])
            .collect())
    }

    fn structures_polarizability(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        Ok(batch.group_size.iter().map(|&n| vec![n as f64; 6]).collect())
    }

    fn structures_polarizability_atomic(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        Ok(batch
            .group_size
            .iter()
            .map(|&n| vec![n as f64 / 2.0; 6])
            .collect())
    }

    fn structures_dipole(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        Ok(batch
            .group_size
            .iter()
            .map(|&n| vec![n as f64, 0.0, 0.0])
            .collect())
    }
}

/// 三个大小不同的 H/O 结构
pub fn fixture_structures() -> Vec<Structure> {
    let cell = [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]];
    vec![
        Structure::new(
            vec!["O".to_string(), "H".to_string(), "H".to_string()],
            cell,
            vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
        ),
        Structure::new(
            vec!["H".to_string(), "H".to_string()],
            cell,
            vec![[0.0, 0.0, 0.0], [0.74, 0.0, 0.0]],
        ),
        Structure::new(
            vec![
                "O".to_string(),
                "O".to_string(),
                "H".to_string(),
                "H".to_string(),
            ],
            [[8.0, 0.0, 0.0], [1.0, 9.0, 0.0], [0.0, 0.5, 7.0]],
            vec![
                [0.0, 0.0, 0.0],
                [1.21, 0.0, 0.0],
                [2.0, 1.0, 0.5],
                [3.0, 2.0, 1.5],
            ],
        ),
    ]
    .into_iter()
    .collect::<Result<Vec<_>>>()
    .expect("fixture structures are consistent")
}
