// 该文件是 DLR Classify 项目的一部分。
// src/runtime/model.rs - 模型句柄
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

use std::{
  cell::RefCell,
  collections::HashMap,
  ffi::{CStr, CString, c_char, c_int},
  path::Path,
  sync::Arc,
};

use tracing::{debug, info, warn};

use super::ffi::{DlrModelHandle, FnGetDlrCount, FnGetDlrName};
use super::{Device, DlrError, DlrLibrary};
use crate::tensor::Tensor;

/// 运行时中的一个已加载模型。
///
/// 句柄只由 `CreateDLRModel` 创建，并且只通过一次 `DeleteDLRModel` 释放
/// （显式 [`close`](Self::close) 或 `Drop`）。
/// 释放之后的任何调用都会在进入运行时之前返回 [`DlrError::InvalidHandle`]。
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use dlr_classify::runtime::{Device, DlrLibrary, DlrModel};
/// use dlr_classify::tensor::Tensor;
///
/// let lib = Arc::new(DlrLibrary::load("libdlr.so")?);
/// let model = DlrModel::create(lib, "models/resnet18", Device::cpu())?;
/// let name = model.input_name(0)?;
/// model.set_input(&name, &Tensor::zeros(vec![1, 3, 224, 224])?)?;
/// model.run()?;
/// let probabilities = model.output(0)?;
/// assert_eq!(model.input(&name)?.shape(), [1, 3, 224, 224]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DlrModel {
  // 装箱保证句柄地址在模型生命周期内不变
  handle: Option<Box<DlrModelHandle>>,
  lib: Arc<DlrLibrary>,
  // 运行时接受过的输入形状，按输入名称记录
  input_shapes: RefCell<HashMap<String, Box<[i64]>>>,
}

impl DlrModel {
  /// 从模型目录（`model.so` / `model.json` / `model.params`）创建模型。
  pub fn create(
    lib: Arc<DlrLibrary>,
    model_path: impl AsRef<Path>,
    device: Device,
  ) -> Result<Self, DlrError> {
    let model_path = model_path.as_ref();
    info!(
      "创建 DLR 模型: {} (设备 {:?}:{})",
      model_path.display(),
      device.kind,
      device.id
    );
    let path = path_to_cstring(model_path)?;
    let mut handle: Box<DlrModelHandle> = Box::new(std::ptr::null_mut());
    let status = unsafe {
      (lib.funcs().create_model)(&mut *handle, path.as_ptr(), device.kind.as_raw(), device.id)
    };
    Self::finish_create(lib, handle, "CreateDLRModel", status)
  }

  /// 从 TFLite 模型文件创建模型。
  pub fn create_from_tflite(
    lib: Arc<DlrLibrary>,
    model_path: impl AsRef<Path>,
    threads: i32,
    use_nnapi: bool,
  ) -> Result<Self, DlrError> {
    let create = lib
      .funcs()
      .create_model_from_tflite
      .ok_or(DlrError::Unsupported("CreateDLRModelFromTFLite"))?;
    let model_path = model_path.as_ref();
    info!(
      "创建 TFLite 模型: {} (线程数 {}, NNAPI {})",
      model_path.display(),
      threads,
      use_nnapi
    );
    let path = path_to_cstring(model_path)?;
    let mut handle: Box<DlrModelHandle> = Box::new(std::ptr::null_mut());
    let status = unsafe { create(&mut *handle, path.as_ptr(), threads, use_nnapi as c_int) };
    Self::finish_create(lib, handle, "CreateDLRModelFromTFLite", status)
  }

  fn finish_create(
    lib: Arc<DlrLibrary>,
    handle: Box<DlrModelHandle>,
    call: &'static str,
    status: c_int,
  ) -> Result<Self, DlrError> {
    lib.check(call, status)?;
    if handle.is_null() {
      return Err(DlrError::Runtime {
        call,
        message: "运行时返回了空句柄".to_string(),
      });
    }
    debug!("模型句柄: {:p}", *handle);
    Ok(Self {
      handle: Some(handle),
      lib,
      input_shapes: RefCell::new(HashMap::new()),
    })
  }

  fn raw(&self) -> Result<*mut DlrModelHandle, DlrError> {
    self
      .handle
      .as_deref()
      .map(|handle| std::ptr::from_ref(handle).cast_mut())
      .ok_or(DlrError::InvalidHandle)
  }

  pub fn is_closed(&self) -> bool {
    self.handle.is_none()
  }

  pub fn library(&self) -> &Arc<DlrLibrary> {
    &self.lib
  }

  fn count(&self, call: &'static str, f: FnGetDlrCount) -> Result<usize, DlrError> {
    let handle = self.raw()?;
    let mut value: c_int = 0;
    let status = unsafe { f(handle, &mut value) };
    self.lib.check(call, status)?;
    Ok(value.max(0) as usize)
  }

  fn name(&self, call: &'static str, f: FnGetDlrName, index: usize) -> Result<String, DlrError> {
    let handle = self.raw()?;
    let mut name: *const c_char = std::ptr::null();
    let status = unsafe { f(handle, index as c_int, &mut name) };
    self.lib.check(call, status)?;
    Ok(c_str_to_string(name))
  }

  pub fn num_inputs(&self) -> Result<usize, DlrError> {
    self.count("GetDLRNumInputs", self.lib.funcs().num_inputs)
  }

  pub fn num_weights(&self) -> Result<usize, DlrError> {
    self.count("GetDLRNumWeights", self.lib.funcs().num_weights)
  }

  pub fn num_outputs(&self) -> Result<usize, DlrError> {
    self.count("GetDLRNumOutputs", self.lib.funcs().num_outputs)
  }

  pub fn input_name(&self, index: usize) -> Result<String, DlrError> {
    check_index(index, self.num_inputs()?)?;
    self.name("GetDLRInputName", self.lib.funcs().input_name, index)
  }

  pub fn weight_name(&self, index: usize) -> Result<String, DlrError> {
    check_index(index, self.num_weights()?)?;
    self.name("GetDLRWeightName", self.lib.funcs().weight_name, index)
  }

  /// 运行时选择的后端名称（如 `tvm`、`treelite`）。
  pub fn backend(&self) -> Result<String, DlrError> {
    let handle = self.raw()?;
    let mut name: *const c_char = std::ptr::null();
    let status = unsafe { (self.lib.funcs().backend)(handle, &mut name) };
    self.lib.check("GetDLRBackend", status)?;
    Ok(c_str_to_string(name))
  }

  /// 按名称设置输入，形状与数据长度由 [`Tensor`] 保证一致。
  pub fn set_input(&self, name: &str, input: &Tensor) -> Result<(), DlrError> {
    let handle = self.raw()?;
    let c_name = CString::new(name)?;
    // 运行时只读取输入数据
    let status = unsafe {
      (self.lib.funcs().set_input)(
        handle,
        c_name.as_ptr(),
        input.shape().as_ptr(),
        input.data().as_ptr().cast_mut(),
        input.dim() as c_int,
      )
    };
    self.lib.check("SetDLRInput", status)?;
    self
      .input_shapes
      .borrow_mut()
      .insert(name.to_string(), input.shape().into());
    Ok(())
  }

  /// 读回当前输入。
  ///
  /// 只能读取已通过 [`set_input`](Self::set_input) 设置过的输入，
  /// 缓冲区按运行时接受的形状分配。
  pub fn input(&self, name: &str) -> Result<Tensor, DlrError> {
    let handle = self.raw()?;
    let shape = self
      .input_shapes
      .borrow()
      .get(name)
      .cloned()
      .ok_or_else(|| DlrError::InputNotSet(name.to_string()))?;
    let c_name = CString::new(name)?;
    let mut input = Tensor::zeros(shape.clone())?.into_data();
    let status =
      unsafe { (self.lib.funcs().get_input)(handle, c_name.as_ptr(), input.as_mut_ptr()) };
    self.lib.check("GetDLRInput", status)?;
    Ok(Tensor::new(shape, input)?)
  }

  pub fn run(&self) -> Result<(), DlrError> {
    let handle = self.raw()?;
    let status = unsafe { (self.lib.funcs().run_model)(handle) };
    self.lib.check("RunDLRModel", status)
  }

  /// 第 `index` 个输出的 (元素个数, 维数)。
  pub fn output_size_dim(&self, index: usize) -> Result<(usize, usize), DlrError> {
    check_index(index, self.num_outputs()?)?;
    let handle = self.raw()?;
    let mut size: i64 = 0;
    let mut dim: c_int = 0;
    let status =
      unsafe { (self.lib.funcs().output_size_dim)(handle, index as c_int, &mut size, &mut dim) };
    self.lib.check("GetDLROutputSizeDim", status)?;
    Ok((size.max(0) as usize, dim.max(0) as usize))
  }

  pub fn output_size(&self, index: usize) -> Result<usize, DlrError> {
    self.output_size_dim(index).map(|(size, _)| size)
  }

  pub fn output_dim(&self, index: usize) -> Result<usize, DlrError> {
    self.output_size_dim(index).map(|(_, dim)| dim)
  }

  pub fn output_shape(&self, index: usize) -> Result<Vec<i64>, DlrError> {
    let dim = self.output_dim(index)?;
    self.read_output_shape(index, dim)
  }

  /// 将第 `index` 个输出拷贝进 `buffer`，其长度必须等于输出元素个数。
  pub fn get_output(&self, index: usize, buffer: &mut [f32]) -> Result<(), DlrError> {
    let size = self.output_size(index)?;
    self.read_output(index, size, buffer)
  }

  /// 读取第 `index` 个输出及其形状。
  pub fn output(&self, index: usize) -> Result<Tensor, DlrError> {
    let (size, dim) = self.output_size_dim(index)?;
    let shape = self.read_output_shape(index, dim)?;
    let mut data = vec![0.0f32; size];
    self.read_output(index, size, &mut data)?;
    Ok(Tensor::new(shape, data)?)
  }

  // 以下两个函数要求 `index` 已经检查过
  fn read_output_shape(&self, index: usize, dim: usize) -> Result<Vec<i64>, DlrError> {
    let handle = self.raw()?;
    let mut shape = vec![0i64; dim];
    let status =
      unsafe { (self.lib.funcs().output_shape)(handle, index as c_int, shape.as_mut_ptr()) };
    self.lib.check("GetDLROutputShape", status)?;
    Ok(shape)
  }

  fn read_output(&self, index: usize, size: usize, buffer: &mut [f32]) -> Result<(), DlrError> {
    if buffer.len() != size {
      return Err(DlrError::BufferSize {
        expected: size,
        actual: buffer.len(),
      });
    }
    let handle = self.raw()?;
    let status =
      unsafe { (self.lib.funcs().get_output)(handle, index as c_int, buffer.as_mut_ptr()) };
    self.lib.check("GetDLROutput", status)
  }

  pub fn set_num_threads(&self, threads: i32) -> Result<(), DlrError> {
    let f = self
      .lib
      .funcs()
      .set_num_threads
      .ok_or(DlrError::Unsupported("SetDLRNumThreads"))?;
    let handle = self.raw()?;
    let status = unsafe { f(handle, threads) };
    self.lib.check("SetDLRNumThreads", status)
  }

  pub fn use_cpu_affinity(&self, enable: bool) -> Result<(), DlrError> {
    let f = self
      .lib
      .funcs()
      .use_cpu_affinity
      .ok_or(DlrError::Unsupported("UseDLRCPUAffinity"))?;
    let handle = self.raw()?;
    let status = unsafe { f(handle, enable as c_int) };
    self.lib.check("UseDLRCPUAffinity", status)
  }

  /// 释放模型。重复调用不会再次进入运行时。
  pub fn close(&mut self) -> Result<(), DlrError> {
    match self.handle.take() {
      Some(mut handle) => {
        debug!("释放模型句柄: {:p}", *handle);
        let status = unsafe { (self.lib.funcs().delete_model)(&mut *handle) };
        self.lib.check("DeleteDLRModel", status)
      }
      None => Ok(()),
    }
  }
}

impl Drop for DlrModel {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      warn!("释放模型失败: {}", e);
    }
  }
}

fn check_index(index: usize, available: usize) -> Result<(), DlrError> {
  if index >= available {
    return Err(DlrError::InvalidIndex {
      requested: index,
      available,
    });
  }
  Ok(())
}

fn path_to_cstring(path: &Path) -> Result<CString, DlrError> {
  Ok(CString::new(path.to_string_lossy().as_bytes())?)
}

fn c_str_to_string(ptr: *const c_char) -> String {
  if ptr.is_null() {
    return String::new();
  }
  unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
