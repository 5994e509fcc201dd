//! # worker 命令实现
//!
//! 隔离执行的子进程入口：从 stdin 读取结构 JSON，构造计算器并完成一次
//! 计算，把结果 JSON 写到 stdout。失败信息只写 stderr。
//!
//! ## 依赖关系
//! - 使用 `cli/worker.rs` 定义的参数
//! - 由 `nep/isolate.rs` 启动
//! - 使用 `serde_json` 作为结果通道

use crate::cli::worker::WorkerArgs;
use crate::error::{NepError, Result};
use crate::models::{CalcKind, Structure};
use crate::nep::evaluator::NepEvaluator;
use crate::nep::isolate::run_calculator;
use crate::nep::NativeNep;

use std::io::{self, Read, Write};
use std::path::Path;

/// 执行 worker 命令
pub fn execute(args: WorkerArgs) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve::<NativeNep, _, _>(&args.model, args.kind, stdin.lock(), stdout.lock())
}

/// 读取结构、计算、写出结果
fn serve<E, R, W>(model: &Path, kind: CalcKind, mut reader: R, mut writer: W) -> Result<()>
where
    E: NepEvaluator,
    R: Read,
    W: Write,
{
    let mut payload = String::new();
    reader
        .read_to_string(&mut payload)
        .map_err(|e| NepError::FileReadError {
            path: "stdin".to_string(),
            source: e,
        })?;

    let structures: Vec<Structure> = serde_json::from_str(&payload)?;
    let output = run_calculator::<E>(model, &structures, kind);

    serde_json::to_writer(&mut writer, &output)?;
    writer.flush().map_err(|e| NepError::FileWriteError {
        path: "stdout".to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalcOutput;
    use crate::nep::testing::{fixture_structures, MockNep};

    #[test]
    fn test_serve_round_trip() {
        let model = std::env::temp_dir().join("nepkit-worker-model.txt");
        std::fs::write(&model, "nep3 2 H O\n").unwrap();

        let input = serde_json::to_vec(&fixture_structures()).unwrap();
        let mut out = Vec::new();
        serve::<MockNep, _, _>(&model, CalcKind::Descriptor, input.as_slice(), &mut out).unwrap();

        let output: CalcOutput = serde_json::from_slice(&out).unwrap();
        let CalcOutput::Array(rows) = output else {
            panic!("expected per-structure rows");
        };
        assert_eq!(rows.nrows(), 3);
        assert_eq!(rows[[0, 0]], 3.0);
    }

    #[test]
    fn test_serve_zero_atom_frame_reaches_parent() {
        let model = std::env::temp_dir().join("nepkit-worker-zero-atoms.txt");
        std::fs::write(&model, "nep3 2 H O\n").unwrap();

        let cell = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]];
        let structures = vec![
            Structure::new(vec!["H".to_string()], cell, vec![[0.0, 0.0, 0.0]]).unwrap(),
            Structure::new(vec![], cell, vec![]).unwrap(),
        ];
        let input = serde_json::to_vec(&structures).unwrap();
        let mut out = Vec::new();
        serve::<MockNep, _, _>(&model, CalcKind::Energy, input.as_slice(), &mut out).unwrap();

        let output: CalcOutput = serde_json::from_slice(&out).unwrap();
        let CalcOutput::Energetics(energetics) = output else {
            panic!("expected energetics");
        };
        assert_eq!(energetics.potentials.to_vec(), vec![1.0, 0.0]);
        assert_eq!(energetics.forces.nrows(), 1);
        assert_eq!(energetics.virials[[0, 1]], 40.0);
        assert!(energetics.virials.row(1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_serve_missing_model_is_empty() {
        let model = std::env::temp_dir().join("nepkit-worker-absent.txt");
        let input = serde_json::to_vec(&fixture_structures()).unwrap();
        let mut out = Vec::new();
        serve::<MockNep, _, _>(&model, CalcKind::Energy, input.as_slice(), &mut out).unwrap();

        let output: CalcOutput = serde_json::from_slice(&out).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_serve_rejects_bad_payload() {
        let model = std::env::temp_dir().join("nepkit-worker-bad.txt");
        let mut out = Vec::new();
        let result = serve::<MockNep, _, _>(&model, CalcKind::Energy, "not json".as_bytes(), &mut out);

        assert!(matches!(result, Err(NepError::JsonError(_))));
    }
}
