//! # 原生 NEP 计算器绑定
//!
//! 通过 C ABI 调用预编译的 NEP 库 (`libnep`)。启用 `native` feature 时链接，
//! 未启用时 `NativeNep` 只会报告计算器不可用。
//!
//! ## C 接口
//! ```text
//! nep_create(path) -> handle            nep_destroy(handle)
//! nep_last_error(handle) -> char*       nep_num_elements / nep_element_name
//! nep_compute(handle, n, type, box, pos, potential[N], force[3N], virial[9N])
//! nep_descriptor_dim / nep_find_descriptor(..., descriptor[dim*N])
//! nep_structure_output_dim(handle, kind) / nep_structure_output(handle, kind, ..., out[dim])
//! ```
//! 所有输出缓冲区由调用方分配；返回值非零表示失败。
//!
//! ## 依赖关系
//! - 实现 `nep/evaluator.rs` 的 `NepEvaluator`
//! - 使用 `nep/batch.rs` 的 `FlatBatch`

use crate::error::{NepError, Result};
use crate::nep::batch::FlatBatch;
use crate::nep::evaluator::{NepEvaluator, RawEnergetics};

use std::path::Path;

/// 按结构聚合的输出种类，与 C 接口的 `kind` 参数一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum StructureOutput {
    Descriptor = 0,
    Polarizability = 1,
    PolarizabilityAtomic = 2,
    Dipole = 3,
}

impl StructureOutput {
    #[cfg_attr(not(feature = "native"), allow(dead_code))]
    fn call_name(self) -> &'static str {
        match self {
            StructureOutput::Descriptor => "structures_descriptor",
            StructureOutput::Polarizability => "structures_polarizability",
            StructureOutput::PolarizabilityAtomic => "structures_polarizability_atomic",
            StructureOutput::Dipole => "structures_dipole",
        }
    }
}

#[cfg(feature = "native")]
mod ffi {
    use std::os::raw::{c_char, c_double, c_int};

    #[repr(C)]
    pub struct NepHandle {
        _private: [u8; 0],
    }

    #[link(name = "nep")]
    extern "C" {
        pub fn nep_create(model_path: *const c_char) -> *mut NepHandle;
        pub fn nep_destroy(handle: *mut NepHandle);
        pub fn nep_last_error(handle: *const NepHandle) -> *const c_char;

        pub fn nep_num_elements(handle: *const NepHandle) -> c_int;
        pub fn nep_element_name(handle: *const NepHandle, index: c_int) -> *const c_char;

        pub fn nep_compute(
            handle: *mut NepHandle,
            num_atoms: c_int,
            types: *const c_int,
            cell: *const c_double,
            positions: *const c_double,
            potential: *mut c_double,
            force: *mut c_double,
            virial: *mut c_double,
        ) -> c_int;

        pub fn nep_descriptor_dim(handle: *const NepHandle) -> c_int;
        pub fn nep_find_descriptor(
            handle: *mut NepHandle,
            num_atoms: c_int,
            types: *const c_int,
            cell: *const c_double,
            positions: *const c_double,
            descriptor: *mut c_double,
        ) -> c_int;

        pub fn nep_structure_output_dim(handle: *const NepHandle, kind: c_int) -> c_int;
        pub fn nep_structure_output(
            handle: *mut NepHandle,
            kind: c_int,
            num_atoms: c_int,
            types: *const c_int,
            cell: *const c_double,
            positions: *const c_double,
            out: *mut c_double,
        ) -> c_int;
    }
}

/// 原生 NEP 计算器
#[cfg_attr(not(feature = "native"), allow(dead_code))]
pub struct NativeNep {
    #[cfg(feature = "native")]
    handle: std::ptr::NonNull<ffi::NepHandle>,
    elements: Vec<String>,
}

#[cfg(feature = "native")]
impl NativeNep {
    fn create(model_path: &Path) -> Result<Self> {
        use std::ffi::{CStr, CString};

        let init_error = |reason: String| NepError::EvaluatorInit {
            path: model_path.display().to_string(),
            reason,
        };

        let c_path = CString::new(model_path.to_string_lossy().as_bytes())
            .map_err(|e| init_error(e.to_string()))?;

        // SAFETY: c_path 是合法的 NUL 结尾字符串，调用期间有效
        let raw = unsafe { ffi::nep_create(c_path.as_ptr()) };
        let handle = match std::ptr::NonNull::new(raw) {
            Some(h) => h,
            None => {
                // SAFETY: 空句柄时读取全局错误信息
                let reason = unsafe { Self::error_string(ffi::nep_last_error(std::ptr::null())) };
                return Err(init_error(reason));
            }
        };

        // SAFETY: handle 非空且由 nep_create 返回；元素名在句柄存活期间有效
        let elements = unsafe {
            let count = ffi::nep_num_elements(handle.as_ptr());
            (0..count.max(0))
                .map(|i| {
                    let name = ffi::nep_element_name(handle.as_ptr(), i);
                    if name.is_null() {
                        String::new()
                    } else {
                        CStr::from_ptr(name).to_string_lossy().into_owned()
                    }
                })
                .collect()
        };

        Ok(NativeNep { handle, elements })
    }

    /// # Safety
    /// `ptr` 为空或指向有效的 NUL 结尾字符串
    unsafe fn error_string(ptr: *const std::os::raw::c_char) -> String {
        if ptr.is_null() {
            "unknown error".to_string()
        } else {
            std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    fn check(&self, call: &str, status: i32) -> Result<()> {
        if status == 0 {
            return Ok(());
        }
        // SAFETY: handle 在 self 存活期间有效
        let reason = unsafe { Self::error_string(ffi::nep_last_error(self.handle.as_ptr())) };
        Err(NepError::Evaluator {
            call: call.to_string(),
            reason,
        })
    }

    fn compute(
        &mut self,
        types: &[i32],
        cell: &[f64],
        positions: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        let n = check_inputs(types, cell, positions)?;
        let mut potential = vec![0.0; n];
        let mut force = vec![0.0; 3 * n];
        let mut virial = vec![0.0; 9 * n];

        // SAFETY: 输入长度已检查，输出缓冲区按 C 接口约定的长度分配
        let status = unsafe {
            ffi::nep_compute(
                self.handle.as_ptr(),
                n as i32,
                types.as_ptr(),
                cell.as_ptr(),
                positions.as_ptr(),
                potential.as_mut_ptr(),
                force.as_mut_ptr(),
                virial.as_mut_ptr(),
            )
        };
        self.check("calculate", status)?;

        Ok((potential, force, virial))
    }

    fn find_descriptor(&mut self, types: &[i32], cell: &[f64], positions: &[f64]) -> Result<Vec<f64>> {
        let n = check_inputs(types, cell, positions)?;
        // SAFETY: handle 有效
        let dim = unsafe { ffi::nep_descriptor_dim(self.handle.as_ptr()) }.max(0) as usize;
        let mut descriptor = vec![0.0; dim * n];

        // SAFETY: 输入长度已检查，输出长度为 dim * N
        let status = unsafe {
            ffi::nep_find_descriptor(
                self.handle.as_ptr(),
                n as i32,
                types.as_ptr(),
                cell.as_ptr(),
                positions.as_ptr(),
                descriptor.as_mut_ptr(),
            )
        };
        self.check("descriptor", status)?;

        Ok(descriptor)
    }

    fn structure_output(&mut self, kind: StructureOutput, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        // SAFETY: handle 有效
        let dim = unsafe { ffi::nep_structure_output_dim(self.handle.as_ptr(), kind as i32) }.max(0)
            as usize;

        let mut rows = Vec::with_capacity(batch.len());
        for ((types, cell), positions) in batch.types.iter().zip(&batch.boxes).zip(&batch.positions) {
            let n = check_inputs(types, cell, positions)?;
            let mut out = vec![0.0; dim];

            // SAFETY: 输入长度已检查，输出长度为 dim
            let status = unsafe {
                ffi::nep_structure_output(
                    self.handle.as_ptr(),
                    kind as i32,
                    n as i32,
                    types.as_ptr(),
                    cell.as_ptr(),
                    positions.as_ptr(),
                    out.as_mut_ptr(),
                )
            };
            self.check(kind.call_name(), status)?;
            rows.push(out);
        }

        Ok(rows)
    }
}

#[cfg(feature = "native")]
impl Drop for NativeNep {
    fn drop(&mut self) {
        // SAFETY: handle 由 nep_create 返回且只释放一次
        unsafe { ffi::nep_destroy(self.handle.as_ptr()) }
    }
}

#[cfg(not(feature = "native"))]
impl NativeNep {
    fn unavailable() -> NepError {
        NepError::EvaluatorUnavailable(
            "nepkit was built without the `native` feature".to_string(),
        )
    }

    fn create(_model_path: &Path) -> Result<Self> {
        Err(Self::unavailable())
    }

    fn compute(
        &mut self,
        _types: &[i32],
        _cell: &[f64],
        _positions: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        Err(Self::unavailable())
    }

    fn find_descriptor(&mut self, _types: &[i32], _cell: &[f64], _positions: &[f64]) -> Result<Vec<f64>> {
        Err(Self::unavailable())
    }

    fn structure_output(&mut self, _kind: StructureOutput, _batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        Err(Self::unavailable())
    }
}

/// 检查单结构输入长度一致，返回原子数
fn check_inputs(types: &[i32], cell: &[f64], positions: &[f64]) -> Result<usize> {
    let n = types.len();
    if cell.len() != 9 {
        return Err(NepError::ShapeMismatch {
            what: "cell".to_string(),
            expected: 9,
            found: cell.len(),
        });
    }
    if positions.len() != 3 * n {
        return Err(NepError::ShapeMismatch {
            what: "positions".to_string(),
            expected: 3 * n,
            found: positions.len(),
        });
    }
    if i32::try_from(n).is_err() {
        return Err(NepError::InvalidArgument(format!(
            "{} atoms exceed the native atom count limit",
            n
        )));
    }
    Ok(n)
}

impl NepEvaluator for NativeNep {
    fn ensure_available() -> Result<()> {
        #[cfg(feature = "native")]
        {
            Ok(())
        }
        #[cfg(not(feature = "native"))]
        {
            Err(Self::unavailable())
        }
    }

    fn load(model_path: &Path) -> Result<Self> {
        Self::create(model_path)
    }

    fn element_list(&self) -> Vec<String> {
        self.elements.clone()
    }

    fn calculate(&mut self, batch: &FlatBatch) -> Result<RawEnergetics> {
        let mut raw = RawEnergetics::default();
        for ((types, cell), positions) in batch.types.iter().zip(&batch.boxes).zip(&batch.positions) {
            let (potential, force, virial) = self.compute(types, cell, positions)?;
            raw.potentials.push(potential);
            raw.forces.push(force);
            raw.virials.push(virial);
        }
        Ok(raw)
    }

    fn descriptor(&mut self, types: &[i32], cell: &[f64], positions: &[f64]) -> Result<Vec<f64>> {
        self.find_descriptor(types, cell, positions)
    }

    fn structures_descriptor(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        self.structure_output(StructureOutput::Descriptor, batch)
    }

    fn structures_polarizability(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        self.structure_output(StructureOutput::Polarizability, batch)
    }

    fn structures_polarizability_atomic(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        self.structure_output(StructureOutput::PolarizabilityAtomic, batch)
    }

    fn structures_dipole(&mut self, batch: &FlatBatch) -> Result<Vec<Vec<f64>>> {
        self.structure_output(StructureOutput::Dipole, batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_inputs() {
        assert_eq!(check_inputs(&[0, 1], &[0.0; 9], &[0.0; 6]).unwrap(), 2);
        assert!(check_inputs(&[0, 1], &[0.0; 6], &[0.0; 6]).is_err());
        assert!(check_inputs(&[0, 1], &[0.0; 9], &[0.0; 3]).is_err());
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_unavailable_without_native_feature() {
        let check = match NativeNep::ensure_available() {
            Err(NepError::EvaluatorUnavailable(reason)) => reason,
            other => panic!("expected EvaluatorUnavailable, got {:?}", other),
        };
        let load = match NativeNep::load(Path::new("nep.txt")) {
            Err(NepError::EvaluatorUnavailable(reason)) => reason,
            Err(other) => panic!("expected EvaluatorUnavailable, got {:?}", other),
            Ok(_) => panic!("load succeeded without the native library"),
        };
        assert_eq!(check, load);
    }
}
