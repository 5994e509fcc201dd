//! # 批量数据编排
//!
//! 把结构列表展平成 NEP 原生接口要求的缓冲区布局，并把原生输出还原为
//! 按结构或按原子组织的数组。
//!
//! ## 布局约定
//! - 晶胞：先转置再展平，`box[3*j + i] = cell[i][j]`
//! - 坐标：先转置再展平，`pos[n*j + i] = positions[i][j]`，即 x..., y..., z...
//! - 力：每个结构 3 x N，转置为 N x 3
//! - 维里：每个结构 9 x N，按原子平均后取 Voigt 分量 `[0, 4, 8, 1, 5, 6]`
//!
//! ## 依赖关系
//! - 被 `nep/calculator.rs` 和原生计算器实现使用
//! - 使用 `models/structure.rs`

use crate::error::{NepError, Result};
use crate::models::Structure;

use ndarray::{concatenate, Array1, Array2, Axis};
use std::collections::HashMap;

/// 9 分量维里中 xx, yy, zz, xy, yz, zx 的位置
pub const VOIGT_INDICES: [usize; 6] = [0, 4, 8, 1, 5, 6];

/// 元素符号到类型索引的映射，构造后不变
#[derive(Debug, Clone, Default)]
pub struct ElementIndexMap {
    elements: Vec<String>,
    index: HashMap<String, i32>,
}

impl ElementIndexMap {
    /// 按模型报告的元素顺序编号
    pub fn new(elements: Vec<String>) -> Self {
        let index = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clone(), i as i32))
            .collect();
        ElementIndexMap { elements, index }
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn index_of(&self, symbol: &str) -> Result<i32> {
        self.index
            .get(symbol)
            .copied()
            .ok_or_else(|| NepError::UnknownElement {
                symbol: symbol.to_string(),
            })
    }
}

/// 单个结构或结构序列
pub trait AsStructures {
    fn as_structures(&self) -> &[Structure];
}

impl AsStructures for Structure {
    fn as_structures(&self) -> &[Structure] {
        std::slice::from_ref(self)
    }
}

impl AsStructures for [Structure] {
    fn as_structures(&self) -> &[Structure] {
        self
    }
}

impl AsStructures for Vec<Structure> {
    fn as_structures(&self) -> &[Structure] {
        self
    }
}

/// 展平后的结构批次，四个序列按结构一一对应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatBatch {
    pub types: Vec<Vec<i32>>,
    pub boxes: Vec<Vec<f64>>,
    pub positions: Vec<Vec<f64>>,
    pub group_size: Vec<usize>,
}

impl FlatBatch {
    /// 结构数
    pub fn len(&self) -> usize {
        self.group_size.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_size.is_empty()
    }

    /// 批次内原子总数
    pub fn total_atoms(&self) -> usize {
        self.group_size.iter().sum()
    }
}

/// 展平单个结构：(类型索引, 晶胞, 坐标)
pub fn flatten_structure(
    structure: &Structure,
    map: &ElementIndexMap,
) -> Result<(Vec<i32>, Vec<f64>, Vec<f64>)> {
    let types = structure
        .elements
        .iter()
        .map(|e| map.index_of(e))
        .collect::<Result<Vec<_>>>()?;

    Ok((types, flatten_cell(&structure.cell), flatten_positions(&structure.positions)))
}

/// 按结构顺序展平整个批次；遇到未知元素时整体失败
pub fn compose<S: AsStructures + ?Sized>(structures: &S, map: &ElementIndexMap) -> Result<FlatBatch> {
    let structures = structures.as_structures();
    let mut batch = FlatBatch {
        types: Vec::with_capacity(structures.len()),
        boxes: Vec::with_capacity(structures.len()),
        positions: Vec::with_capacity(structures.len()),
        group_size: Vec::with_capacity(structures.len()),
    };

    for structure in structures {
        let (types, cell, positions) = flatten_structure(structure, map)?;
        batch.group_size.push(types.len());
        batch.types.push(types);
        batch.boxes.push(cell);
        batch.positions.push(positions);
    }

    Ok(batch)
}

/// 晶胞转置后展平
pub fn flatten_cell(cell: &[[f64; 3]; 3]) -> Vec<f64> {
    (0..3)
        .flat_map(|j| (0..3).map(move |i| cell[i][j]))
        .collect()
}

/// 坐标 (N x 3) 转置后展平为 3N
pub fn flatten_positions(positions: &[[f64; 3]]) -> Vec<f64> {
    (0..3)
        .flat_map(|j| positions.iter().map(move |p| p[j]))
        .collect()
}

/// 把整批拼接的逐原子势能按结构切分并求和
pub fn sum_potentials(per_atom: &[f64], group_size: &[usize]) -> Result<Array1<f32>> {
    let total: usize = group_size.iter().sum();
    if per_atom.len() != total {
        return Err(NepError::ShapeMismatch {
            what: "potentials".to_string(),
            expected: total,
            found: per_atom.len(),
        });
    }

    let mut start = 0;
    let sums = group_size
        .iter()
        .map(|&n| {
            let slice = &per_atom[start..start + n];
            start += n;
            slice.iter().sum::<f64>() as f32
        })
        .collect();

    Ok(sums)
}

/// 每个结构的 3 x N 力缓冲区转为 N x 3 并按结构顺序堆叠
pub fn stack_forces(forces: &[Vec<f64>], group_size: &[usize]) -> Result<Array2<f32>> {
    check_count("forces", forces.len(), group_size.len())?;

    let blocks = forces
        .iter()
        .zip(group_size)
        .map(|(buf, &n)| {
            check_count("forces", buf.len(), 3 * n)?;
            let block = Array2::from_shape_vec((3, n), buf.clone())?;
            Ok(block.reversed_axes().mapv(|x| x as f32))
        })
        .collect::<Result<Vec<_>>>()?;

    if blocks.is_empty() {
        return Ok(Array2::zeros((0, 3)));
    }
    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    Ok(concatenate(Axis(0), &views)?)
}

/// 每个结构的 9 x N 维里缓冲区按原子平均，再取 Voigt 分量
pub fn reduce_virials(virials: &[Vec<f64>], group_size: &[usize]) -> Result<Array2<f32>> {
    check_count("virials", virials.len(), group_size.len())?;

    let mut full = Array2::<f32>::zeros((virials.len(), 9));
    for (row, (buf, &n)) in virials.iter().zip(group_size).enumerate() {
        check_count("virials", buf.len(), 9 * n)?;
        let block = Array2::from_shape_vec((9, n), buf.clone())?;
        // 零原子结构没有平均值，保留 NaN
        let mean = block
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::from_elem(9, f64::NAN));
        full.row_mut(row).assign(&mean.mapv(|x| x as f32));
    }

    Ok(select_voigt(&full))
}

/// 从 S x 9 维里中按 `VOIGT_INDICES` 取出 S x 6
pub fn select_voigt(full: &Array2<f32>) -> Array2<f32> {
    full.select(Axis(1), &VOIGT_INDICES)
}

/// 单结构描述符：dim x N 转为 N x dim
pub fn atom_descriptors(flat: Vec<f64>, num_atoms: usize) -> Result<Array2<f32>> {
    if num_atoms == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if flat.len() % num_atoms != 0 {
        return Err(NepError::ShapeMismatch {
            what: "descriptor".to_string(),
            expected: flat.len() - flat.len() % num_atoms,
            found: flat.len(),
        });
    }

    let dim = flat.len() / num_atoms;
    let block = Array2::from_shape_vec((dim, num_atoms), flat)?;
    Ok(block.reversed_axes().mapv(|x| x as f32))
}

/// 每个结构一行的原生输出直接包装为 S x k 数组
pub fn rows_to_array(what: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f32>> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(rows.len() * width);
    for row in &rows {
        check_count(what, row.len(), width)?;
        flat.extend(row.iter().map(|&x| x as f32));
    }

    Ok(Array2::from_shape_vec((rows.len(), width), flat)?)
}

fn check_count(what: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(NepError::ShapeMismatch {
            what: what.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn map() -> ElementIndexMap {
        ElementIndexMap::new(vec!["H".to_string(), "O".to_string()])
    }

    fn water() -> Structure {
        Structure::new(
            vec!["O".to_string(), "H".to_string(), "H".to_string()],
            [[10.0, 0.0, 0.0], [0.0, 11.0, 0.0], [0.0, 0.0, 12.0]],
            vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_compose_identity_cell_two_atoms() {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let structure = Structure::new(
            vec!["H".to_string(), "O".to_string()],
            identity,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        )
        .unwrap();

        let batch = compose(&structure, &map()).unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.types, vec![vec![0, 1]]);
        assert_eq!(
            batch.boxes,
            vec![vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]]
        );
        assert_eq!(batch.positions[0].len(), 6);
        assert_eq!(batch.positions[0], vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(batch.group_size, vec![2]);
    }

    #[test]
    fn test_flatten_cell_is_transposed() {
        let cell = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        assert_eq!(
            flatten_cell(&cell),
            vec![1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0]
        );
    }

    #[test]
    fn test_flatten_positions_groups_by_axis() {
        let positions = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(
            flatten_positions(&positions),
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
        );
    }

    #[test]
    fn test_compose_unknown_element() {
        let mut structure = water();
        structure.elements[2] = "Fe".to_string();

        let result = compose(&vec![water(), structure], &map());
        match result {
            Err(NepError::UnknownElement { symbol }) => assert_eq!(symbol, "Fe"),
            other => panic!("expected UnknownElement, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_total_atoms() {
        let batch = compose(&vec![water(), water(), water()], &map()).unwrap();
        assert_eq!(batch.group_size, vec![3, 3, 3]);
        assert_eq!(batch.total_atoms(), 9);
    }

    #[test]
    fn test_sum_potentials() {
        let per_atom = [1.0, 2.0, 3.0, 10.0, 20.0];
        let sums = sum_potentials(&per_atom, &[3, 2]).unwrap();
        assert_eq!(sums, array![6.0, 30.0]);

        assert!(matches!(
            sum_potentials(&per_atom, &[3, 3]),
            Err(NepError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_stack_forces_transposes_each_structure() {
        // 结构 1: 2 个原子；结构 2: 1 个原子
        let forces = vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];
        let stacked = stack_forces(&forces, &[2, 1]).unwrap();

        assert_eq!(stacked.dim(), (3, 3));
        assert_eq!(stacked.row(0).to_vec(), vec![1.0, 3.0, 5.0]);
        assert_eq!(stacked.row(1).to_vec(), vec![2.0, 4.0, 6.0]);
        assert_eq!(stacked.row(2).to_vec(), vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_voigt_selection_is_positional() {
        let full = array![[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]];
        let voigt = select_voigt(&full);
        assert_eq!(voigt.row(0).to_vec(), vec![1.0, 5.0, 9.0, 2.0, 6.0, 7.0]);
    }

    #[test]
    fn test_reduce_virials_averages_atoms() {
        // 9 x 2：第 k 个分量两个原子分别为 k 和 k + 2
        let buf: Vec<f64> = (0..9).flat_map(|k| [k as f64, k as f64 + 2.0]).collect();
        let reduced = reduce_virials(&[buf], &[2]).unwrap();

        assert_eq!(reduced.dim(), (1, 6));
        let expected = [1.0, 5.0, 9.0, 2.0, 6.0, 7.0];
        for (got, want) in reduced.row(0).iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_atom_descriptors_shape() {
        // dim = 2, N = 3
        let flat = vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0];
        let desc = atom_descriptors(flat, 3).unwrap();

        assert_eq!(desc.dim(), (3, 2));
        assert_eq!(desc.row(1).to_vec(), vec![1.0, 11.0]);
        assert!(atom_descriptors(vec![1.0; 5], 3).is_err());
    }

    #[test]
    fn test_rows_to_array_rejects_ragged() {
        let ok = rows_to_array("dipole", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(ok.dim(), (2, 3));

        let ragged = rows_to_array("dipole", vec![vec![1.0, 2.0, 3.0], vec![4.0]]);
        assert!(matches!(ragged, Err(NepError::ShapeMismatch { .. })));
    }
}
