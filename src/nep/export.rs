//! # 计算结果导出
//!
//! 把 NEP 计算结果写成 CSV 文件。
//!
//! ## 输出文件
//! - `<stem>_energy.csv`: structure, atoms, energy
//! - `<stem>_forces.csv`: structure, atom, fx, fy, fz
//! - `<stem>_virial.csv`: structure, xx, yy, zz, xy, yz, zx
//! - `<stem>_<kind>.csv`: structure, c0, c1, ...
//! - `<stem>_atom-descriptor.csv`: structure, atom, d0, d1, ...
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs` 调用
//! - 使用 `models/results.rs`
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{NepError, Result};
use crate::models::{CalcKind, CalcOutput, Energetics};

use ndarray::Array2;
use std::path::{Path, PathBuf};

/// 导出计算结果，返回写入的文件列表
///
/// `group_size` 为每个结构的原子数，用于给力的每一行标注所属结构。
pub fn write_output(
    output: &CalcOutput,
    kind: CalcKind,
    group_size: &[usize],
    output_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    match output {
        CalcOutput::Energetics(e) => write_energetics(e, group_size, output_dir, stem),
        CalcOutput::Array(a) => {
            let path = output_dir.join(format!("{}_{}.csv", stem, kind));
            write_rows(a, &path)?;
            Ok(vec![path])
        }
        CalcOutput::AtomDescriptors(d) => {
            let path = output_dir.join(format!("{}_{}.csv", stem, kind));
            write_atom_descriptors(d, &path)?;
            Ok(vec![path])
        }
    }
}

fn write_energetics(
    energetics: &Energetics,
    group_size: &[usize],
    output_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    let energy_path = output_dir.join(format!("{}_energy.csv", stem));
    let mut wtr = csv::Writer::from_path(&energy_path)?;
    wtr.write_record(["structure", "atoms", "energy"])?;
    for (i, energy) in energetics.potentials.iter().enumerate() {
        let atoms = group_size.get(i).copied().unwrap_or(0);
        wtr.write_record(&[i.to_string(), atoms.to_string(), format!("{:.8}", energy)])?;
    }
    flush(wtr, &energy_path)?;

    let forces_path = output_dir.join(format!("{}_forces.csv", stem));
    let mut wtr = csv::Writer::from_path(&forces_path)?;
    wtr.write_record(["structure", "atom", "fx", "fy", "fz"])?;
    let owners = group_size
        .iter()
        .enumerate()
        .flat_map(|(s, &n)| (0..n).map(move |a| (s, a)));
    for ((s, a), row) in owners.zip(energetics.forces.rows()) {
        wtr.write_record(&[
            s.to_string(),
            a.to_string(),
            format!("{:.8}", row[0]),
            format!("{:.8}", row[1]),
            format!("{:.8}", row[2]),
        ])?;
    }
    flush(wtr, &forces_path)?;

    let virial_path = output_dir.join(format!("{}_virial.csv", stem));
    let mut wtr = csv::Writer::from_path(&virial_path)?;
    wtr.write_record(["structure", "xx", "yy", "zz", "xy", "yz", "zx"])?;
    for (i, row) in energetics.virials.rows().into_iter().enumerate() {
        let mut record = vec![i.to_string()];
        record.extend(row.iter().map(|v| format!("{:.8}", v)));
        wtr.write_record(&record)?;
    }
    flush(wtr, &virial_path)?;

    Ok(vec![energy_path, forces_path, virial_path])
}

/// 每行一个结构
pub fn write_rows(array: &Array2<f32>, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["structure".to_string()];
    header.extend((0..array.ncols()).map(|c| format!("c{}", c)));
    wtr.write_record(&header)?;

    for (i, row) in array.rows().into_iter().enumerate() {
        let mut record = vec![i.to_string()];
        record.extend(row.iter().map(|v| format!("{:.8}", v)));
        wtr.write_record(&record)?;
    }

    flush(wtr, path)
}

fn write_atom_descriptors(descriptors: &[Array2<f32>], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let dim = descriptors.iter().map(|d| d.ncols()).max().unwrap_or(0);

    let mut header = vec!["structure".to_string(), "atom".to_string()];
    header.extend((0..dim).map(|c| format!("d{}", c)));
    wtr.write_record(&header)?;

    for (s, desc) in descriptors.iter().enumerate() {
        if desc.ncols() != dim {
            return Err(NepError::ShapeMismatch {
                what: format!("descriptor of structure {}", s),
                expected: dim,
                found: desc.ncols(),
            });
        }
        for (a, row) in desc.rows().into_iter().enumerate() {
            let mut record = vec![s.to_string(), a.to_string()];
            record.extend(row.iter().map(|v| format!("{:.8}", v)));
            wtr.write_record(&record)?;
        }
    }

    flush(wtr, path)
}

fn flush(mut wtr: csv::Writer<std::fs::File>, path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| NepError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
