// 该文件是 DLR Classify 项目的一部分。
// src/tensor.rs - 扁平张量与布局
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

use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
  #[error("形状 {shape:?} 需要 {expected} 个元素, 实际 {actual} 个")]
  ShapeMismatch {
    shape: Vec<i64>,
    expected: usize,
    actual: usize,
  },
  #[error("形状包含负数维度: {0:?}")]
  NegativeDim(Vec<i64>),
  #[error("形状 {0:?} 的元素个数溢出")]
  Overflow(Vec<i64>),
}

/// 张量内存布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  /// 通道在前: `[N, C, H, W]`
  Nchw,
  /// 通道在后: `[N, H, W, C]`
  Nhwc,
}

impl fmt::Display for TensorLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TensorLayout::Nchw => write!(f, "NCHW"),
      TensorLayout::Nhwc => write!(f, "NHWC"),
    }
  }
}

impl FromStr for TensorLayout {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nchw" => Ok(TensorLayout::Nchw),
      "nhwc" => Ok(TensorLayout::Nhwc),
      other => Err(format!("未知张量布局: {}", other)),
    }
  }
}

/// 形状的元素个数。
pub fn element_count(shape: &[i64]) -> Result<usize, TensorError> {
  if shape.iter().any(|&d| d < 0) {
    return Err(TensorError::NegativeDim(shape.to_vec()));
  }
  shape
    .iter()
    .try_fold(1usize, |acc, &d| {
      usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
    })
    .ok_or_else(|| TensorError::Overflow(shape.to_vec()))
}

/// 与运行时约定形状的扁平 `f32` 张量。
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  shape: Box<[i64]>,
  data: Box<[f32]>,
}

impl Tensor {
  pub fn new(shape: impl Into<Box<[i64]>>, data: impl Into<Box<[f32]>>) -> Result<Self, TensorError> {
    let shape = shape.into();
    let data = data.into();
    let expected = element_count(&shape)?;
    if expected != data.len() {
      return Err(TensorError::ShapeMismatch {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { shape, data })
  }

  pub fn zeros(shape: impl Into<Box<[i64]>>) -> Result<Self, TensorError> {
    let shape = shape.into();
    let len = element_count(&shape)?;
    Ok(Self {
      shape,
      data: vec![0.0; len].into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> &[i64] {
    &self.shape
  }

  pub fn dim(&self) -> usize {
    self.shape.len()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn into_data(self) -> Box<[f32]> {
    self.data
  }
}

impl AsRef<[f32]> for Tensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

/// 将交错存储的 HWC 数据重排为平面 CHW。
pub fn hwc_to_chw<T: Copy + Default>(data: &[T], h: usize, w: usize, c: usize) -> Vec<T> {
  let plane = h * w;
  let mut out = vec![T::default(); plane * c];
  for (i, pixel) in data.chunks_exact(c).take(plane).enumerate() {
    for (ch, &value) in pixel.iter().enumerate() {
      out[ch * plane + i] = value;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_checks_element_count() {
    assert!(Tensor::new(vec![1, 2, 3], vec![0.0; 6]).is_ok());
    let err = Tensor::new(vec![1, 2, 3], vec![0.0; 5]).unwrap_err();
    assert_eq!(
      err,
      TensorError::ShapeMismatch {
        shape: vec![1, 2, 3],
        expected: 6,
        actual: 5
      }
    );
  }

  #[test]
  fn negative_dims_are_rejected() {
    assert_eq!(
      Tensor::zeros(vec![1, -1]).unwrap_err(),
      TensorError::NegativeDim(vec![1, -1])
    );
  }

  #[test]
  fn huge_shape_overflows() {
    assert_eq!(
      Tensor::zeros(vec![i64::MAX, 4]).unwrap_err(),
      TensorError::Overflow(vec![i64::MAX, 4])
    );
  }

  #[test]
  fn scalar_shape_holds_one_element() {
    let t = Tensor::zeros(Vec::<i64>::new()).unwrap();
    assert_eq!(t.len(), 1);
    assert_eq!(t.dim(), 0);
  }

  #[test]
  fn hwc_to_chw_splits_planes() {
    // 2x2 像素, 3 通道
    let hwc = [1, 10, 100, 2, 20, 200, 3, 30, 300, 4, 40, 400];
    let chw = hwc_to_chw(&hwc, 2, 2, 3);
    assert_eq!(chw, vec![1, 2, 3, 4, 10, 20, 30, 40, 100, 200, 300, 400]);
  }

  #[test]
  fn layout_parses_and_displays() {
    assert_eq!("NCHW".parse::<TensorLayout>(), Ok(TensorLayout::Nchw));
    assert_eq!(TensorLayout::Nhwc.to_string(), "NHWC");
  }
}
