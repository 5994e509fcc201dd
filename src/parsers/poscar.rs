//! # VASP POSCAR 格式解析器
//!
//! 解析 VASP POSCAR/CONTCAR 文件，坐标统一转换为笛卡尔坐标。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! NEP 需要元素符号，因此不支持没有元素行的 VASP 4 格式。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{NepError, Result};
use crate::models::Structure;
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| NepError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, source: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(source, "File too short".to_string()));
    }

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .trim()
        .parse()
        .map_err(|_| parse_error(source, format!("Invalid scaling factor '{}'", lines[1].trim())))?;

    // Lines 2-4: Lattice vectors
    let mut cell = [[0.0; 3]; 3];
    for (i, row) in cell.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                source,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }

    // Line 5: Element symbols, Line 6: counts
    let elements: Vec<String> = lines[5].split_whitespace().map(|s| s.to_string()).collect();
    if elements.is_empty() || elements[0].parse::<i32>().is_ok() {
        return Err(parse_error(
            source,
            "Missing element symbol line (VASP 4 format is not supported)".to_string(),
        ));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error(source, "Invalid atom counts at line 7".to_string()))?;
    if counts.len() != elements.len() {
        return Err(parse_error(
            source,
            format!("{} element symbols but {} counts", elements.len(), counts.len()),
        ));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    if lines[coord_line]
        .trim()
        .to_lowercase()
        .starts_with("selective")
    {
        coord_line += 1;
    }

    // Coordinate type line
    let coord_type = lines
        .get(coord_line)
        .map(|l| l.trim().to_lowercase())
        .ok_or_else(|| parse_error(source, "Missing coordinate type line".to_string()))?;
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let mut symbols = Vec::new();
    let mut positions = Vec::new();
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .ok_or_else(|| parse_error(source, "Unexpected end of positions".to_string()))?
                .split_whitespace()
                .take(3)
                .filter_map(|s| s.parse().ok())
                .collect();

            if parts.len() < 3 {
                return Err(parse_error(
                    source,
                    format!("Invalid position at line {}", line_idx + 1),
                ));
            }

            let position = if is_cartesian {
                [parts[0] * scale, parts[1] * scale, parts[2] * scale]
            } else {
                frac_to_cart([parts[0], parts[1], parts[2]], &cell)
            };
            symbols.push(elem.clone());
            positions.push(position);
            line_idx += 1;
        }
    }

    Structure::new(symbols, cell, positions)
}

/// 分数坐标转笛卡尔坐标
fn frac_to_cart(frac: [f64; 3], m: &[[f64; 3]; 3]) -> [f64; 3] {
    [
        frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
        frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
        frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
    ]
}

fn parse_error(source: &str, reason: String) -> NepError {
    NepError::ParseError {
        format: "poscar".to_string(),
        path: source.to_string(),
        reason,
    }
}
