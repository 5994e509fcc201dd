//! # 隔离执行
//!
//! 在独立的 worker 进程中完成「构造计算器 + 单次计算」，原生库崩溃或内存
//! 异常不会影响调用方进程。
//!
//! ## 流程
//! ```text
//! 父进程 ── stdin: 结构 JSON ──> nepkit worker --model ... --kind ...
//!        <── stdout: 结果 JSON ──
//! ```
//! 任何失败（错误、panic、进程异常退出、输出无法解析）都会带完整错误链
//! 打印到 stderr，并转换为空结果。不做超时和重试。
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs` 和 `commands/worker.rs` 使用
//! - 使用 `nep/calculator.rs`
//! - 使用 `serde_json` 作为进程间结果通道

use crate::error::{NepError, Result};
use crate::models::{CalcKind, CalcOutput, Structure};
use crate::nep::calculator::NepCalculator;
use crate::nep::evaluator::NepEvaluator;
use crate::utils::output;

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::{Command, Stdio};

/// 对已构造的计算器执行一次指定类型的计算
pub fn evaluate<E: NepEvaluator>(
    calc: &mut NepCalculator<E>,
    structures: &[Structure],
    kind: CalcKind,
) -> Result<CalcOutput> {
    let output = match kind {
        CalcKind::Energy => CalcOutput::Energetics(calc.calculate(structures)?),
        CalcKind::Descriptor => CalcOutput::Array(calc.get_structures_descriptor(structures)?),
        CalcKind::Polarizability => {
            CalcOutput::Array(calc.get_structures_polarizability(structures)?)
        }
        CalcKind::PolarizabilityAtomic => {
            CalcOutput::Array(calc.get_structures_polarizability_atomic(structures)?)
        }
        CalcKind::Dipole => CalcOutput::Array(calc.get_structures_dipole(structures)?),
        CalcKind::AtomDescriptor => {
            if !calc.is_initialized() {
                return Ok(CalcOutput::empty(kind));
            }
            let descriptors = structures
                .iter()
                .map(|s| calc.get_descriptor(s))
                .collect::<Result<Vec<_>>>()?;
            CalcOutput::AtomDescriptors(descriptors)
        }
    };

    Ok(output)
}

/// 在当前进程中构造计算器并完成一次计算
///
/// 错误和 panic 都不会向上传播：打印完整错误链后返回空结果。
pub fn run_calculator<E: NepEvaluator>(
    model_path: &Path,
    structures: &[Structure],
    kind: CalcKind,
) -> CalcOutput {
    let mut elements = Vec::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut calc = NepCalculator::<E>::open(model_path)?;
        elements = calc.element_list().to_vec();
        evaluate(&mut calc, structures, kind)
    }));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            let model = if elements.is_empty() {
                model_path.display().to_string()
            } else {
                format!("{} (elements {})", model_path.display(), elements.join(", "))
            };
            report_failure(
                anyhow::Error::new(e).context(format!("{} calculation with model {} failed", kind, model)),
            );
            CalcOutput::empty(kind)
        }
        Err(payload) => {
            report_failure(anyhow::anyhow!(
                "{} calculation panicked: {}",
                kind,
                panic_message(payload.as_ref())
            ));
            CalcOutput::empty(kind)
        }
    }
}

/// 在独立的 worker 进程中完成一次计算，失败时返回空结果
pub fn run_calculator_process(
    model_path: &Path,
    structures: &[Structure],
    kind: CalcKind,
) -> CalcOutput {
    let outcome = worker_command(model_path, kind).and_then(|cmd| exchange(cmd, structures));
    recover_isolated(outcome, model_path, kind)
}

/// 子进程结果转为计算输出，失败时打印错误链并返回空结果
fn recover_isolated(outcome: Result<CalcOutput>, model_path: &Path, kind: CalcKind) -> CalcOutput {
    match outcome {
        Ok(result) => result,
        Err(e) => {
            report_failure(anyhow::Error::new(e).context(format!(
                "isolated {} calculation with model {} failed",
                kind,
                model_path.display()
            )));
            CalcOutput::empty(kind)
        }
    }
}

/// 重新调用当前可执行文件的 `worker` 子命令
fn worker_command(model_path: &Path, kind: CalcKind) -> Result<Command> {
    let exe = std::env::current_exe().map_err(|e| NepError::FileReadError {
        path: "current executable".to_string(),
        source: e,
    })?;

    let mut command = Command::new(exe);
    command
        .arg("worker")
        .arg("--model")
        .arg(model_path)
        .arg("--kind")
        .arg(kind.to_string());
    Ok(command)
}

/// 把结构 JSON 写入子进程 stdin，等待退出并解析 stdout 中的结果
fn exchange(mut command: Command, structures: &[Structure]) -> Result<CalcOutput> {
    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| NepError::WorkerFailed {
            status: "spawn".to_string(),
            stderr: format!("{}: {}", program, e),
        })?;

    let payload = serde_json::to_vec(structures)?;
    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(&payload) {
            Ok(()) => {}
            // 子进程提前退出，由退出状态报告
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Err(e) => {
                return Err(NepError::FileWriteError {
                    path: "worker stdin".to_string(),
                    source: e,
                })
            }
        }
    }

    let out = child
        .wait_with_output()
        .map_err(|e| NepError::FileReadError {
            path: "worker stdout".to_string(),
            source: e,
        })?;

    // worker 自身已把失败写到 stderr，这里原样转发
    let stderr = String::from_utf8_lossy(&out.stderr).trim_end().to_string();
    if !out.status.success() {
        return Err(NepError::WorkerFailed {
            status: out.status.to_string(),
            stderr,
        });
    }
    if !stderr.is_empty() {
        eprintln!("{}", stderr);
    }

    Ok(serde_json::from_slice(&out.stdout)?)
}

fn report_failure(err: anyhow::Error) {
    output::print_error_chain(&err);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
