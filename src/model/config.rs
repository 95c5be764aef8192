// 该文件是 DLR Classify 项目的一部分。
// src/model/config.rs - 模型配置表
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

use crate::{preprocess::Normalization, tensor::TensorLayout};

/// 所有示例模型的输入边长。
pub const INPUT_SIZE: i64 = 224;

const MOBILENET_NORMALIZATION: Normalization = Normalization::uniform(127.5, 127.5);

const GLUONCV_NORMALIZATION: Normalization = Normalization {
  mean: [123.0, 117.0, 104.0],
  std: [58.395, 57.12, 57.375],
};

const NHWC_SHAPE: [i64; 4] = [1, INPUT_SIZE, INPUT_SIZE, 3];
const NCHW_SHAPE: [i64; 4] = [1, 3, INPUT_SIZE, INPUT_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
  TensorflowMobilenetV1,
  KerasMobilenetV2,
  GluoncvMobilenetV2_075,
  GluoncvMobilenetV2_100,
  GluoncvResnet18V2,
  GluoncvResnet50V2,
  /// 不调用运行时的占位分类器
  Pass,
}

/// 单个模型的全部差异：目录、输入形状、布局、归一化和标签文件。
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
  pub kind: ModelKind,
  pub name: &'static str,
  pub model_dir: &'static str,
  pub input_shape: [i64; 4],
  pub layout: TensorLayout,
  pub normalization: Normalization,
  pub labels_file: &'static str,
}

impl ModelConfig {
  pub fn input_width(&self) -> u32 {
    match self.layout {
      TensorLayout::Nhwc => self.input_shape[2] as u32,
      TensorLayout::Nchw => self.input_shape[3] as u32,
    }
  }

  pub fn input_height(&self) -> u32 {
    match self.layout {
      TensorLayout::Nhwc => self.input_shape[1] as u32,
      TensorLayout::Nchw => self.input_shape[2] as u32,
    }
  }
}

const fn gluoncv(kind: ModelKind, name: &'static str, model_dir: &'static str) -> ModelConfig {
  ModelConfig {
    kind,
    name,
    model_dir,
    input_shape: NCHW_SHAPE,
    layout: TensorLayout::Nchw,
    normalization: GLUONCV_NORMALIZATION,
    labels_file: "labels1000.txt",
  }
}

pub static MODEL_CONFIGS: [ModelConfig; 7] = [
  ModelConfig {
    kind: ModelKind::TensorflowMobilenetV1,
    name: "tensorflow_mobilenet_v1",
    model_dir: "dlr_tf_mobilenet_v1_100",
    input_shape: NHWC_SHAPE,
    layout: TensorLayout::Nhwc,
    normalization: MOBILENET_NORMALIZATION,
    labels_file: "labels.txt",
  },
  ModelConfig {
    kind: ModelKind::KerasMobilenetV2,
    name: "keras_mobilenet_v2",
    model_dir: "dlr_keras_mobilenet_v2",
    input_shape: NCHW_SHAPE,
    layout: TensorLayout::Nchw,
    normalization: MOBILENET_NORMALIZATION,
    labels_file: "labels1000.txt",
  },
  gluoncv(
    ModelKind::GluoncvMobilenetV2_075,
    "gluoncv_mobilenet_v2_075",
    "dlr_gluoncv_mobilenet_v2_075",
  ),
  gluoncv(
    ModelKind::GluoncvMobilenetV2_100,
    "gluoncv_mobilenet_v2_100",
    "dlr_gluoncv_mobilenet_v2_100",
  ),
  gluoncv(
    ModelKind::GluoncvResnet18V2,
    "gluoncv_resnet18_v2",
    "dlr_gluoncv_resnet18_v2",
  ),
  gluoncv(
    ModelKind::GluoncvResnet50V2,
    "gluoncv_resnet50_v2",
    "dlr_gluoncv_resnet50_v2",
  ),
  ModelConfig {
    kind: ModelKind::Pass,
    name: "pass",
    model_dir: "",
    input_shape: NHWC_SHAPE,
    layout: TensorLayout::Nhwc,
    normalization: MOBILENET_NORMALIZATION,
    labels_file: "labels.txt",
  },
];

impl ModelKind {
  pub fn config(self) -> &'static ModelConfig {
    MODEL_CONFIGS
      .iter()
      .find(|c| c.kind == self)
      .unwrap_or(&MODEL_CONFIGS[MODEL_CONFIGS.len() - 1])
  }

  pub fn name(self) -> &'static str {
    self.config().name
  }
}

impl fmt::Display for ModelKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ModelKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.to_ascii_lowercase().replace('-', "_");
    MODEL_CONFIGS
      .iter()
      .find(|c| c.name == s)
      .map(|c| c.kind)
      .ok_or_else(|| {
        let names: Vec<&str> = MODEL_CONFIGS.iter().map(|c| c.name).collect();
        format!("未知模型 '{}'，可选: {}", s, names.join(", "))
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_kind_has_its_own_config() {
    for config in &MODEL_CONFIGS {
      assert_eq!(config.kind.config(), config);
      assert_eq!(config.name.parse::<ModelKind>(), Ok(config.kind));
    }
  }

  #[test]
  fn input_size_follows_layout() {
    for config in &MODEL_CONFIGS {
      assert_eq!(config.input_width(), 224);
      assert_eq!(config.input_height(), 224);
      let channels = match config.layout {
        TensorLayout::Nhwc => config.input_shape[3],
        TensorLayout::Nchw => config.input_shape[1],
      };
      assert_eq!(channels, 3);
    }
  }

  #[test]
  fn tensorflow_model_is_channels_last() {
    let config = ModelKind::TensorflowMobilenetV1.config();
    assert_eq!(config.layout, TensorLayout::Nhwc);
    assert_eq!(config.input_shape, [1, 224, 224, 3]);
    assert_eq!(config.labels_file, "labels.txt");
  }

  #[test]
  fn gluoncv_models_share_normalization() {
    let a = ModelKind::GluoncvResnet18V2.config();
    let b = ModelKind::GluoncvMobilenetV2_075.config();
    assert_eq!(a.normalization, b.normalization);
    assert_eq!(a.layout, TensorLayout::Nchw);
  }

  #[test]
  fn parse_accepts_dashes() {
    assert_eq!(
      "GluonCV-ResNet50-v2".parse::<ModelKind>(),
      Ok(ModelKind::GluoncvResnet50V2)
    );
    assert!("vgg16".parse::<ModelKind>().is_err());
  }
}
