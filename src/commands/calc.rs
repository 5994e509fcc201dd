//! # calc 命令实现
//!
//! 对轨迹文件批量执行 NEP 计算。
//!
//! ## 功能
//! - 收集输入文件（单文件或目录 + glob）
//! - 按文件并行，每个文件内按 `--batch-size` 分批调用计算器
//! - 可选在独立 worker 进程中执行每一批
//! - 导出 CSV 并打印汇总表
//!
//! ## 依赖关系
//! - 使用 `cli/calc.rs` 定义的参数
//! - 使用 `batch/`, `parsers/`, `nep/`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::calc::CalcArgs;
use crate::error::{NepError, Result};
use crate::models::{CalcKind, CalcOutput, Structure};
use crate::nep::export::write_output;
use crate::nep::isolate::{run_calculator, run_calculator_process};
use crate::nep::NativeNep;
use crate::parsers;
use crate::utils::output;

use ndarray::{Array1, Array2, Axis};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tabled::{Table, Tabled};

/// 能量表最多显示的行数，完整结果见 CSV
const MAX_TABLE_ROWS: usize = 30;

/// 能量汇总行
#[derive(Debug, Clone, Tabled)]
struct EnergyRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Atoms")]
    atoms: usize,
    #[tabled(rename = "Volume (Å³)")]
    volume: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "E/atom (eV)")]
    energy_per_atom: String,
}

/// 数组类结果的列平均
#[derive(Debug, Clone, Tabled)]
struct MeanRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Structures")]
    structures: usize,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Column mean")]
    mean: String,
}

/// 单个文件的汇总
#[derive(Debug, Clone)]
enum FileSummary {
    Energy(Vec<EnergyRow>),
    Mean(MeanRow),
}

/// 执行 calc 命令
pub fn execute(args: CalcArgs) -> Result<()> {
    output::print_header(&format!("NEP {} calculation", args.kind));

    if !args.model.exists() {
        output::print_warning(&format!(
            "Model file '{}' not found, every result will be empty",
            args.model.display()
        ));
    }

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect()?;

    if files.is_empty() {
        return Err(NepError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }

    fs::create_dir_all(&args.output).map_err(|e| NepError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    output::print_info(&format!(
        "Found {} file(s), model '{}'{}",
        files.len(),
        args.model.display(),
        if args.isolate { ", isolated workers" } else { "" }
    ));

    let summaries: Mutex<Vec<(String, FileSummary)>> = Mutex::new(Vec::new());
    let runner = BatchRunner::new(args.jobs);

    let result = runner.run(&files, |path| {
        let name = path.display().to_string();
        match process_file(path, &args) {
            Ok(Some((n, summary))) => {
                if let Ok(mut list) = summaries.lock() {
                    list.push((name.clone(), summary));
                }
                ProcessResult::Success(n)
            }
            Ok(None) => ProcessResult::Empty(name),
            Err(e) => ProcessResult::Failed(name, e.to_string()),
        }
    })?;

    let mut summaries = summaries
        .into_inner()
        .map_err(|_| NepError::InvalidArgument("summary collection was poisoned".to_string()))?;
    summaries.sort_by(|a, b| a.0.cmp(&b.0));
    print_summaries(summaries);

    for (path, err) in &result.failures {
        output::print_error(&format!("{}: {}", path, err));
    }
    for path in &result.empty_files {
        output::print_warning(&format!(
            "{}: no results (missing model or failed evaluation)",
            path
        ));
    }

    if result.success > 0 {
        output::print_success(&format!("CSV files written to '{}'", args.output.display()));
    }

    output::print_done(&format!(
        "Evaluated {} structure(s) from {}/{} file(s)",
        result.structures,
        result.success,
        result.total()
    ));

    Ok(())
}

/// 处理单个文件：读取、分批计算、导出
///
/// 返回 `None` 表示计算器给出了空结果（已在其内部记录原因）。
fn process_file(path: &Path, args: &CalcArgs) -> Result<Option<(usize, FileSummary)>> {
    let structures = parsers::read_structures(path)?;

    let output = evaluate_batches(&structures, args.kind, args.batch_size, |batch| {
        if args.isolate {
            run_calculator_process(&args.model, batch, args.kind)
        } else {
            run_calculator::<NativeNep>(&args.model, batch, args.kind)
        }
    })?;

    let Some(output) = output else {
        return Ok(None);
    };

    let stem = output_stem(&args.input, path);
    let group_size: Vec<usize> = structures.iter().map(Structure::len).collect();
    write_output(&output, args.kind, &group_size, &args.output, &stem)?;

    Ok(Some((structures.len(), summarize(&stem, &structures, &output))))
}

/// 按批次大小切分结构并依次计算，合并为一个结果
///
/// `batch_size == 0` 时整份结构一次计算。任一批次返回空结果时整体视为空。
fn evaluate_batches<F>(
    structures: &[Structure],
    kind: CalcKind,
    batch_size: usize,
    mut eval: F,
) -> Result<Option<CalcOutput>>
where
    F: FnMut(&[Structure]) -> CalcOutput,
{
    if structures.is_empty() {
        return Ok(None);
    }

    let size = if batch_size == 0 {
        structures.len()
    } else {
        batch_size
    };

    let mut parts = Vec::new();
    for batch in structures.chunks(size) {
        let part = eval(batch);
        if part.is_empty() {
            return Ok(None);
        }
        parts.push(part);
    }

    let output = CalcOutput::concat(kind, parts)?;
    if output.num_structures() != structures.len() {
        return Err(NepError::ShapeMismatch {
            what: format!("{} results", kind),
            expected: structures.len(),
            found: output.num_structures(),
        });
    }

    Ok(Some(output))
}

/// 输出文件名前缀：相对输入目录的路径去掉扩展名，分隔符替换为 `_`
fn output_stem(input: &Path, path: &Path) -> String {
    let relative = if input.is_dir() {
        path.strip_prefix(input).unwrap_or(path)
    } else {
        Path::new(path.file_name().unwrap_or(path.as_os_str()))
    };

    let stem = relative.with_extension("");
    stem.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("_")
}

fn summarize(file: &str, structures: &[Structure], output: &CalcOutput) -> FileSummary {
    match output {
        CalcOutput::Energetics(e) => FileSummary::Energy(
            structures
                .iter()
                .zip(e.potentials.iter())
                .enumerate()
                .map(|(i, (s, &energy))| EnergyRow {
                    file: file.to_string(),
                    index: i,
                    formula: s.formula(),
                    atoms: s.len(),
                    volume: format!("{:.3}", s.volume()),
                    energy: format!("{:.6}", energy),
                    energy_per_atom: if s.is_empty() {
                        "-".to_string()
                    } else {
                        format!("{:.6}", energy / s.len() as f32)
                    },
                })
                .collect(),
        ),
        CalcOutput::Array(a) => FileSummary::Mean(mean_row(file, structures.len(), std::slice::from_ref(a))),
        CalcOutput::AtomDescriptors(d) => FileSummary::Mean(mean_row(file, structures.len(), d)),
    }
}

fn mean_row(file: &str, structures: usize, blocks: &[Array2<f32>]) -> MeanRow {
    let rows = blocks.iter().map(|b| b.nrows()).sum();
    let mean = column_means(blocks)
        .map(|m| {
            let values: Vec<String> = m.iter().map(|v| format!("{:.4}", v)).collect();
            format!("[{}]", values.join(", "))
        })
        .unwrap_or_else(|| "-".to_string());

    MeanRow {
        file: file.to_string(),
        structures,
        rows,
        mean,
    }
}

/// 所有块按行拼接后的列平均；列数与首个非空块不同的块被忽略
fn column_means(blocks: &[Array2<f32>]) -> Option<Array1<f32>> {
    let first = blocks.iter().find(|b| b.nrows() > 0)?;
    let ncols = first.ncols();

    let mut total = Array1::<f32>::zeros(ncols);
    let mut rows = 0usize;
    for block in blocks.iter().filter(|b| b.nrows() > 0 && b.ncols() == ncols) {
        total += &block.sum_axis(Axis(0));
        rows += block.nrows();
    }

    Some(total / rows as f32)
}

fn print_summaries(summaries: Vec<(String, FileSummary)>) {
    let mut energy_rows = Vec::new();
    let mut mean_rows = Vec::new();
    for (_, summary) in summaries {
        match summary {
            FileSummary::Energy(rows) => energy_rows.extend(rows),
            FileSummary::Mean(row) => mean_rows.push(row),
        }
    }

    if !energy_rows.is_empty() {
        let total = energy_rows.len();
        output::print_header("Potential energies");
        println!("{}", Table::new(energy_rows.iter().take(MAX_TABLE_ROWS)));
        if total > MAX_TABLE_ROWS {
            output::print_info(&format!(
                "Showing {} of {} structures, see the energy CSV files for the rest",
                MAX_TABLE_ROWS, total
            ));
        }
    }

    if !mean_rows.is_empty() {
        output::print_header("Column means");
        println!("{}", Table::new(&mean_rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nep::calculator::NepCalculator;
    use crate::nep::isolate::evaluate;
    use crate::nep::testing::{fixture_structures, MockNep};
    use ndarray::array;
    use std::path::PathBuf;

    fn mock_eval(kind: CalcKind) -> impl FnMut(&[Structure]) -> CalcOutput {
        move |batch| {
            let mut calc = NepCalculator::from_evaluator(MockNep);
            evaluate(&mut calc, batch, kind).unwrap()
        }
    }

    #[test]
    fn test_batches_match_single_call() {
        let structures = fixture_structures();

        let whole = evaluate_batches(&structures, CalcKind::Energy, 0, mock_eval(CalcKind::Energy))
            .unwrap()
            .unwrap();
        let split = evaluate_batches(&structures, CalcKind::Energy, 2, mock_eval(CalcKind::Energy))
            .unwrap()
            .unwrap();

        assert_eq!(whole, split);
        assert_eq!(split.num_structures(), 3);
    }

    #[test]
    fn test_batches_count_calls() {
        let structures = fixture_structures();
        let mut calls = 0;

        let output = evaluate_batches(&structures, CalcKind::Dipole, 1, |batch| {
            calls += 1;
            let mut calc = NepCalculator::from_evaluator(MockNep);
            evaluate(&mut calc, batch, CalcKind::Dipole).unwrap()
        })
        .unwrap()
        .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(output.num_structures(), 3);
    }

    #[test]
    fn test_empty_batch_result_means_empty_file() {
        let structures = fixture_structures();

        let output = evaluate_batches(&structures, CalcKind::Energy, 2, |_| {
            CalcOutput::empty(CalcKind::Energy)
        })
        .unwrap();
        assert!(output.is_none());

        let none = evaluate_batches(&[], CalcKind::Energy, 0, mock_eval(CalcKind::Energy)).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_output_stem() {
        let dir = std::env::temp_dir().join("nepkit-stem");
        std::fs::create_dir_all(dir.join("md")).unwrap();

        assert_eq!(output_stem(&dir, &dir.join("md").join("run.xyz")), "md_run");
        assert_eq!(
            output_stem(&PathBuf::from("data/train.xyz"), &PathBuf::from("data/train.xyz")),
            "train"
        );
    }

    #[test]
    fn test_column_means() {
        let blocks = vec![array![[1.0f32, 2.0], [3.0, 4.0]], array![[5.0f32, 6.0]]];
        let means = column_means(&blocks).unwrap();

        assert!((means[0] - 3.0).abs() < 1e-6);
        assert!((means[1] - 4.0).abs() < 1e-6);
        assert!(column_means(&[]).is_none());
    }

    #[test]
    fn test_summarize_energy_rows() {
        let structures = fixture_structures();
        let mut calc = NepCalculator::from_evaluator(MockNep);
        let output = evaluate(&mut calc, &structures, CalcKind::Energy).unwrap();

        let FileSummary::Energy(rows) = summarize("water", &structures, &output) else {
            panic!("expected energy rows");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].formula, "H2O");
        assert_eq!(rows[0].atoms, 3);
    }
}
