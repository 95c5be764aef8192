// 该文件是 DLR Classify 项目的一部分。
// src/runtime.rs - DLR 运行时绑定
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

use std::{ffi::c_int, str::FromStr};

use thiserror::Error;

pub mod ffi;
mod library;
mod model;

pub use self::library::DlrLibrary;
pub use self::model::DlrModel;

#[derive(Error, Debug)]
pub enum DlrError {
  #[error("无法加载运行时库 {path}: {source}")]
  LibraryNotFound {
    path: String,
    source: libloading::Error,
  },
  #[error("运行时库缺少符号: {0}")]
  SymbolNotFound(&'static str),
  #[error("运行时库不支持 {0}")]
  Unsupported(&'static str),
  #[error("{call} 调用失败: {message}")]
  Runtime { call: &'static str, message: String },
  #[error("模型句柄无效（已释放）")]
  InvalidHandle,
  #[error("输入 {0} 尚未设置")]
  InputNotSet(String),
  #[error("索引 {requested} 越界 (共 {available} 个)")]
  InvalidIndex { requested: usize, available: usize },
  #[error("缓冲区大小不匹配: 期望 {expected}, 实际 {actual}")]
  BufferSize { expected: usize, actual: usize },
  #[error("名称或路径包含 NUL 字符: {0}")]
  InvalidName(#[from] std::ffi::NulError),
  #[error("张量错误: {0}")]
  Tensor(#[from] crate::tensor::TensorError),
}

/// 运行模型的设备，数值与 DLPack 的 `DLDeviceType` 保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
  #[default]
  Cpu,
  Gpu,
  Opencl,
}

impl DeviceType {
  pub fn as_raw(self) -> c_int {
    match self {
      DeviceType::Cpu => ffi::DL_DEVICE_CPU,
      DeviceType::Gpu => ffi::DL_DEVICE_GPU,
      DeviceType::Opencl => ffi::DL_DEVICE_OPENCL,
    }
  }
}

impl FromStr for DeviceType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "cpu" => Ok(DeviceType::Cpu),
      "gpu" | "cuda" => Ok(DeviceType::Gpu),
      "opencl" => Ok(DeviceType::Opencl),
      other => Err(format!("未知设备类型: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Device {
  pub kind: DeviceType,
  pub id: i32,
}

impl Device {
  pub fn cpu() -> Self {
    Self::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn device_type_matches_dlpack() {
    assert_eq!(DeviceType::Cpu.as_raw(), 1);
    assert_eq!(DeviceType::Gpu.as_raw(), 2);
    assert_eq!(DeviceType::Opencl.as_raw(), 4);
  }

  #[test]
  fn device_type_parses_case_insensitive() {
    assert_eq!("CPU".parse::<DeviceType>(), Ok(DeviceType::Cpu));
    assert_eq!("cuda".parse::<DeviceType>(), Ok(DeviceType::Gpu));
    assert!("npu".parse::<DeviceType>().is_err());
  }
}
