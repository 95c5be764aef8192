// 该文件是 DLR Classify 项目的一部分。
// src/runtime/library.rs - 运行时库加载
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::ffi::{CStr, c_int};

use tracing::{debug, info};

use super::DlrError;
use super::ffi::*;

/// 已加载的 `libdlr` 及其函数表。
///
/// 由 [`DlrModel`](super::DlrModel) 通过 `Arc` 共享，
/// 因此库在最后一个模型释放之前不会被卸载。
pub struct DlrLibrary {
  funcs: DlrFunctions,
  _lib: Option<libloading::Library>,
}

macro_rules! required {
  ($lib:expr, $ty:ty, $name:literal) => {
    *$lib
      .get::<$ty>(concat!($name, "\0").as_bytes())
      .map_err(|_| DlrError::SymbolNotFound($name))?
  };
}

macro_rules! optional {
  ($lib:expr, $ty:ty, $name:literal) => {
    match $lib.get::<$ty>(concat!($name, "\0").as_bytes()) {
      Ok(symbol) => Some(*symbol),
      Err(_) => {
        debug!("运行时库未导出可选符号 {}", $name);
        None
      }
    }
  };
}

impl DlrLibrary {
  /// 在运行时加载 `libdlr.so` 并解析全部符号。
  pub fn load(path: &str) -> Result<Self, DlrError> {
    info!("加载运行时库: {}", path);
    let lib = unsafe {
      libloading::Library::new(path).map_err(|source| DlrError::LibraryNotFound {
        path: path.to_string(),
        source,
      })?
    };

    let funcs = unsafe {
      DlrFunctions {
        create_model: required!(lib, FnCreateDlrModel, "CreateDLRModel"),
        create_model_from_tflite: optional!(lib, FnCreateDlrModelFromTflite, "CreateDLRModelFromTFLite"),
        delete_model: required!(lib, FnDeleteDlrModel, "DeleteDLRModel"),
        run_model: required!(lib, FnRunDlrModel, "RunDLRModel"),
        num_inputs: required!(lib, FnGetDlrCount, "GetDLRNumInputs"),
        num_weights: required!(lib, FnGetDlrCount, "GetDLRNumWeights"),
        num_outputs: required!(lib, FnGetDlrCount, "GetDLRNumOutputs"),
        input_name: required!(lib, FnGetDlrName, "GetDLRInputName"),
        weight_name: required!(lib, FnGetDlrName, "GetDLRWeightName"),
        set_input: required!(lib, FnSetDlrInput, "SetDLRInput"),
        get_input: required!(lib, FnGetDlrInput, "GetDLRInput"),
        output_shape: required!(lib, FnGetDlrOutputShape, "GetDLROutputShape"),
        get_output: required!(lib, FnGetDlrOutput, "GetDLROutput"),
        output_size_dim: required!(lib, FnGetDlrOutputSizeDim, "GetDLROutputSizeDim"),
        last_error: required!(lib, FnDlrGetLastError, "DLRGetLastError"),
        backend: required!(lib, FnGetDlrBackend, "GetDLRBackend"),
        set_num_threads: optional!(lib, FnSetDlrNumThreads, "SetDLRNumThreads"),
        use_cpu_affinity: optional!(lib, FnUseDlrCpuAffinity, "UseDLRCPUAffinity"),
      }
    };

    Ok(Self {
      funcs,
      _lib: Some(lib),
    })
  }

  /// 使用已解析好的函数表（静态链接或进程内实现）。
  pub fn from_functions(funcs: DlrFunctions) -> Self {
    Self { funcs, _lib: None }
  }

  pub(crate) fn funcs(&self) -> &DlrFunctions {
    &self.funcs
  }

  /// 运行时最近一次失败的错误信息。
  pub fn last_error(&self) -> String {
    let ptr = unsafe { (self.funcs.last_error)() };
    if ptr.is_null() {
      return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
  }

  /// 非 0 状态码一律视为失败，并附带运行时的错误信息。
  pub(crate) fn check(&self, call: &'static str, status: c_int) -> Result<(), DlrError> {
    if status == 0 {
      Ok(())
    } else {
      Err(DlrError::Runtime {
        call,
        message: self.last_error(),
      })
    }
  }
}
