// 该文件是 DLR Classify 项目的一部分。
// src/runtime/ffi.rs - DLR C 接口定义
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

//! `libdlr` 导出的 C 接口签名。
//!
//! 所有函数在成功时返回 0，失败时返回非 0，
//! 失败原因通过 `DLRGetLastError` 获取。

use std::ffi::{c_char, c_int, c_void};

/// 运行时持有的模型句柄，本库从不解引用。
pub type DlrModelHandle = *mut c_void;

// DLPack 设备类型
pub const DL_DEVICE_CPU: c_int = 1;
pub const DL_DEVICE_GPU: c_int = 2;
pub const DL_DEVICE_OPENCL: c_int = 4;

pub type FnCreateDlrModel =
  unsafe extern "C" fn(*mut DlrModelHandle, *const c_char, c_int, c_int) -> c_int;

/// `CreateDLRModelFromTFLite(handle, path, threads, use_nnapi)`
pub type FnCreateDlrModelFromTflite =
  unsafe extern "C" fn(*mut DlrModelHandle, *const c_char, c_int, c_int) -> c_int;

pub type FnDeleteDlrModel = unsafe extern "C" fn(*mut DlrModelHandle) -> c_int;

pub type FnRunDlrModel = unsafe extern "C" fn(*mut DlrModelHandle) -> c_int;

/// `GetDLRNumInputs` / `GetDLRNumWeights` / `GetDLRNumOutputs`
pub type FnGetDlrCount = unsafe extern "C" fn(*mut DlrModelHandle, *mut c_int) -> c_int;

/// `GetDLRInputName` / `GetDLRWeightName`
pub type FnGetDlrName =
  unsafe extern "C" fn(*mut DlrModelHandle, c_int, *mut *const c_char) -> c_int;

pub type FnSetDlrInput = unsafe extern "C" fn(
  *mut DlrModelHandle,
  *const c_char,
  *const i64,
  *mut f32,
  c_int,
) -> c_int;

pub type FnGetDlrInput =
  unsafe extern "C" fn(*mut DlrModelHandle, *const c_char, *mut f32) -> c_int;

pub type FnGetDlrOutputShape = unsafe extern "C" fn(*mut DlrModelHandle, c_int, *mut i64) -> c_int;

pub type FnGetDlrOutput = unsafe extern "C" fn(*mut DlrModelHandle, c_int, *mut f32) -> c_int;

pub type FnGetDlrOutputSizeDim =
  unsafe extern "C" fn(*mut DlrModelHandle, c_int, *mut i64, *mut c_int) -> c_int;

pub type FnDlrGetLastError = unsafe extern "C" fn() -> *const c_char;

pub type FnGetDlrBackend =
  unsafe extern "C" fn(*mut DlrModelHandle, *mut *const c_char) -> c_int;

pub type FnSetDlrNumThreads = unsafe extern "C" fn(*mut DlrModelHandle, c_int) -> c_int;

pub type FnUseDlrCpuAffinity = unsafe extern "C" fn(*mut DlrModelHandle, c_int) -> c_int;

/// 运行时函数表。
///
/// 动态加载时由 [`DlrLibrary::load`](super::DlrLibrary::load) 填充；
/// 静态链接或进程内实现时可以直接构造后交给
/// [`DlrLibrary::from_functions`](super::DlrLibrary::from_functions)。
/// 可选项对应旧版 `libdlr` 中可能缺失的符号。
#[derive(Clone, Copy)]
pub struct DlrFunctions {
  pub create_model: FnCreateDlrModel,
  pub create_model_from_tflite: Option<FnCreateDlrModelFromTflite>,
  pub delete_model: FnDeleteDlrModel,
  pub run_model: FnRunDlrModel,
  pub num_inputs: FnGetDlrCount,
  pub num_weights: FnGetDlrCount,
  pub num_outputs: FnGetDlrCount,
  pub input_name: FnGetDlrName,
  pub weight_name: FnGetDlrName,
  pub set_input: FnSetDlrInput,
  pub get_input: FnGetDlrInput,
  pub output_shape: FnGetDlrOutputShape,
  pub get_output: FnGetDlrOutput,
  pub output_size_dim: FnGetDlrOutputSizeDim,
  pub last_error: FnDlrGetLastError,
  pub backend: FnGetDlrBackend,
  pub set_num_threads: Option<FnSetDlrNumThreads>,
  pub use_cpu_affinity: Option<FnUseDlrCpuAffinity>,
}
