//! # 解析器模块
//!
//! 读取 NEP 计算所需的结构文件。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: xyz, poscar

pub mod poscar;
pub mod xyz;

use crate::error::{NepError, Result};
use crate::models::Structure;
use std::path::Path;

/// 从文件路径推断格式并读取全部结构
pub fn read_structures(path: &Path) -> Result<Vec<Structure>> {
    if !path.exists() {
        return Err(NepError::PathNotFound {
            path: path.display().to_string(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xyz" | "extxyz" => xyz::parse_xyz_file(path),
        "vasp" | "poscar" => Ok(vec![poscar::parse_poscar_file(path)?]),
        _ => {
            // 可能是 POSCAR/CONTCAR (无扩展名)
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                    return Ok(vec![poscar::parse_poscar_file(path)?]);
                }
            }
            Err(NepError::UnsupportedFormat(format!(
                "Cannot determine format for: {}",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_structures_dispatch() {
        let dir = std::env::temp_dir().join("nepkit-parsers-dispatch");
        std::fs::create_dir_all(&dir).unwrap();

        let xyz = dir.join("frames.xyz");
        std::fs::write(
            &xyz,
            "1\nLattice=\"2 0 0 0 2 0 0 0 2\"\nH 0 0 0\n1\nLattice=\"2 0 0 0 2 0 0 0 2\"\nH 1 0 0\n",
        )
        .unwrap();
        assert_eq!(read_structures(&xyz).unwrap().len(), 2);

        let unknown = dir.join("frames.pdb");
        std::fs::write(&unknown, "ATOM").unwrap();
        assert!(matches!(
            read_structures(&unknown),
            Err(NepError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            read_structures(&dir.join("absent.xyz")),
            Err(NepError::PathNotFound { .. })
        ));
    }
}
