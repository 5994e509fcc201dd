//! # 扩展 XYZ 格式解析器
//!
//! 解析多帧扩展 XYZ (extxyz) 轨迹文件，例如 NEP 训练集 `train.xyz`。
//!
//! ## 格式说明
//! ```text
//! 3                                                   # 原子数
//! Lattice="10 0 0 0 10 0 0 0 10" Properties=species:S:1:pos:R:3 energy=-14.2
//! O  0.00 0.00 0.00
//! H  0.96 0.00 0.00
//! H -0.24 0.93 0.00
//! ...                                                 # 下一帧
//! ```
//!
//! `Lattice` 必须存在；`Properties` 缺省时按 species 第 0 列、pos 第 1-3 列读取。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`
//! - 使用 `regex` 解析注释行键值

use crate::error::{NepError, Result};
use crate::models::Structure;

use regex::Regex;
use std::fs;
use std::path::Path;

/// 读取多帧扩展 XYZ 文件
pub fn parse_xyz_file(path: &Path) -> Result<Vec<Structure>> {
    let content = fs::read_to_string(path).map_err(|e| NepError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_xyz_content(&content, &path.display().to_string())
}

/// 从字符串内容解析所有帧
pub fn parse_xyz_content(content: &str, source: &str) -> Result<Vec<Structure>> {
    let lattice_re = Regex::new(r#"(?i)\blattice\s*=\s*"([^"]*)""#)
        .map_err(|e| parse_error(source, e.to_string()))?;
    let properties_re = Regex::new(r#"(?i)\bproperties\s*=\s*"?([^"\s]+)"?"#)
        .map_err(|e| parse_error(source, e.to_string()))?;

    let lines: Vec<&str> = content.lines().collect();
    let mut structures = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let head = lines[idx].trim();
        if head.is_empty() {
            idx += 1;
            continue;
        }

        let frame = structures.len();
        let num_atoms: usize = head.parse().map_err(|_| {
            parse_error(
                source,
                format!("Expected atom count at line {}, found '{}'", idx + 1, head),
            )
        })?;

        let comment = lines.get(idx + 1).copied().ok_or_else(|| {
            parse_error(source, format!("Frame {} is missing its comment line", frame))
        })?;

        let cell = match lattice_re.captures(comment) {
            Some(caps) => parse_lattice(&caps[1])
                .ok_or_else(|| parse_error(source, format!("Invalid Lattice in frame {}", frame)))?,
            None => {
                return Err(parse_error(
                    source,
                    format!("Frame {} has no Lattice=\"...\" entry", frame),
                ))
            }
        };

        let (species_col, pos_col) = match properties_re.captures(comment) {
            Some(caps) => parse_properties(&caps[1]).ok_or_else(|| {
                parse_error(
                    source,
                    format!("Properties of frame {} lack species or pos", frame),
                )
            })?,
            None => (0, 1),
        };

        let truncated = || {
            parse_error(
                source,
                format!("Frame {} is truncated: expected {} atoms", frame, num_atoms),
            )
        };
        let frame_end = (idx + 2).checked_add(num_atoms).ok_or_else(truncated)?;
        let atom_lines = lines.get(idx + 2..frame_end).ok_or_else(truncated)?;

        let mut elements = Vec::with_capacity(num_atoms);
        let mut positions = Vec::with_capacity(num_atoms);
        for (offset, line) in atom_lines.iter().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let line_no = idx + 3 + offset;

            let element = fields
                .get(species_col)
                .ok_or_else(|| parse_error(source, format!("Missing species at line {}", line_no)))?;

            let mut position = [0.0; 3];
            for (k, slot) in position.iter_mut().enumerate() {
                *slot = fields
                    .get(pos_col + k)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| {
                        parse_error(source, format!("Invalid position at line {}", line_no))
                    })?;
            }

            elements.push(element.to_string());
            positions.push(position);
        }

        structures.push(Structure::new(elements, cell, positions)?);
        idx = frame_end;
    }

    Ok(structures)
}

/// 9 个数，依次为 a, b, c 三个晶格向量
fn parse_lattice(text: &str) -> Option<[[f64; 3]; 3]> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if values.len() != 9 {
        return None;
    }

    let mut cell = [[0.0; 3]; 3];
    for (i, row) in cell.iter_mut().enumerate() {
        row.copy_from_slice(&values[3 * i..3 * i + 3]);
    }
    Some(cell)
}

/// 由 `name:type:count` 三元组计算 species 和 pos 的起始列
fn parse_properties(spec: &str) -> Option<(usize, usize)> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() % 3 != 0 {
        return None;
    }

    let mut column = 0;
    let mut species = None;
    let mut pos = None;
    for chunk in parts.chunks(3) {
        let count: usize = chunk[2].parse().ok()?;
        match chunk[0].to_lowercase().as_str() {
            "species" => species = Some(column),
            "pos" if count == 3 => pos = Some(column),
            _ => {}
        }
        column += count;
    }

    Some((species?, pos?))
}

fn parse_error(source: &str, reason: String) -> NepError {
    NepError::ParseError {
        format: "extxyz".to_string(),
        path: source.to_string(),
        reason,
    }
}
