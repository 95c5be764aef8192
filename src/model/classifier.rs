// 该文件是 DLR Classify 项目的一部分。
// src/model/classifier.rs - 图像分类器
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
  cell::Cell,
  path::{Path, PathBuf},
  sync::Arc,
};

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl,
  assets::{AssetError, stage_model},
  labels::load_labels,
  model::{Model, ModelConfig, ModelKind},
  preprocess::{image_to_tensor, resize_to_input},
  recognition::{ClassifyResult, MAX_RESULTS, top_k},
  runtime::{Device, DeviceType, DlrError, DlrLibrary, DlrModel},
  tensor::{Tensor, TensorError},
};

const DEFAULT_LIB_PATH: &str = "libdlr.so";
const DLR_SCHEME: &str = "dlr";
const PASS_SCHEME: &str = "pass";

#[derive(Error, Debug)]
pub enum ClassifierError {
  #[error("运行时错误: {0}")]
  Runtime(#[from] DlrError),
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
  #[error("模型部署错误: {0}")]
  Asset(#[from] AssetError),
  #[error("标签文件读取错误 ({path}): {source}")]
  Labels {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
}

/// 基于 DLR 运行时的分类器。
pub struct DlrClassifier {
  model: DlrModel,
  config: &'static ModelConfig,
  labels: Vec<String>,
  input_name: String,
  max_results: usize,
}

impl DlrClassifier {
  pub fn new(
    model: DlrModel,
    config: &'static ModelConfig,
    labels: Vec<String>,
  ) -> Result<Self, ClassifierError> {
    info!("模型后端: {}", model.backend()?);

    let num_inputs = model.num_inputs()?;
    let num_weights = model.num_weights()?;
    let num_outputs = model.num_outputs()?;
    debug!("模型输入数量: {}", num_inputs);
    debug!("模型权重数量: {}", num_weights);
    debug!("模型输出数量: {}", num_outputs);

    if num_inputs == 0 || num_outputs == 0 {
      error!(
        "模型输入/输出数量无效: {} / {}",
        num_inputs, num_outputs
      );
      return Err(ClassifierError::ModelInvalid(format!(
        "预期至少 1 个输入和 1 个输出, 实际为 {} 个输入, {} 个输出",
        num_inputs, num_outputs
      )));
    }

    let input_name = model.input_name(0)?;
    debug!("模型输入名称: {}", input_name);

    let (output_size, output_dim) = model.output_size_dim(0)?;
    let output_shape = model.output_shape(0)?;
    debug!(
      "模型输出: 大小 {}, 维数 {}, 形状 {:?}",
      output_size, output_dim, output_shape
    );

    if output_size != labels.len() {
      warn!(
        "输出大小 {} 与标签数量 {} 不一致",
        output_size,
        labels.len()
      );
    }

    Ok(Self {
      model,
      config,
      labels,
      input_name,
      max_results: MAX_RESULTS,
    })
  }

  pub fn with_max_results(mut self, max_results: usize) -> Self {
    self.max_results = max_results;
    self
  }

  pub fn config(&self) -> &'static ModelConfig {
    self.config
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn model(&self) -> &DlrModel {
    &self.model
  }

  /// 缩放并归一化为模型输入张量。
  pub fn preprocess(&self, image: &DynamicImage) -> Result<Tensor, TensorError> {
    let resized = resize_to_input(
      image,
      self.config.input_width(),
      self.config.input_height(),
    );
    image_to_tensor(&resized, self.config.layout, &self.config.normalization)
  }
}

impl Model for DlrClassifier {
  type Input = DynamicImage;
  type Output = ClassifyResult;
  type Error = ClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像");
    let tensor = self.preprocess(input)?;

    debug!("设置模型输入");
    self.model.set_input(&self.input_name, &tensor)?;

    debug!("执行模型推理");
    self.model.run()?;

    debug!("获取模型输出");
    let output = self.model.output(0)?;

    Ok(self.postprocess(output.data()))
  }

  fn postprocess(&self, probabilities: &[f32]) -> Self::Output {
    top_k(probabilities, &self.labels, self.max_results)
  }
}

// 两组固定输出交替出现
const PASS_PATTERNS: [[(usize, f32); 3]; 2] = [
  [(284, 0.998), (285, 0.61), (286, 0.51)],
  [(153, 0.998), (154, 0.61), (155, 0.51)],
];

/// 不调用运行时的占位分类器，用于在没有模型的情况下检查整条流程。
pub struct PassClassifier {
  labels: Vec<String>,
  max_results: usize,
  calls: Cell<usize>,
}

impl PassClassifier {
  pub fn new(labels: Vec<String>) -> Self {
    Self {
      labels,
      max_results: MAX_RESULTS,
      calls: Cell::new(0),
    }
  }

  pub fn with_max_results(mut self, max_results: usize) -> Self {
    self.max_results = max_results;
    self
  }
}

impl Model for PassClassifier {
  type Input = DynamicImage;
  type Output = ClassifyResult;
  type Error = ClassifierError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let call = self.calls.get();
    self.calls.set(call.wrapping_add(1));

    let mut probabilities = vec![0.0f32; self.labels.len()];
    for &(index, value) in &PASS_PATTERNS[call % PASS_PATTERNS.len()] {
      if let Some(p) = probabilities.get_mut(index) {
        *p = value;
      }
    }
    Ok(self.postprocess(&probabilities))
  }

  fn postprocess(&self, probabilities: &[f32]) -> Self::Output {
    top_k(probabilities, &self.labels, self.max_results)
  }
}

pub enum Classifier {
  Dlr(Box<DlrClassifier>),
  Pass(PassClassifier),
}

impl Model for Classifier {
  type Input = DynamicImage;
  type Output = ClassifyResult;
  type Error = ClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      Classifier::Dlr(c) => c.infer(input),
      Classifier::Pass(c) => c.infer(input),
    }
  }

  fn postprocess(&self, probabilities: &[f32]) -> Self::Output {
    match self {
      Classifier::Dlr(c) => c.postprocess(probabilities),
      Classifier::Pass(c) => c.postprocess(probabilities),
    }
  }
}

/// 分类器构建参数。
///
/// URL 形式:
/// - `dlr:///models?kind=gluoncv_resnet18_v2&device=cpu&device_id=0&threads=4`
///   其余可选参数: `lib`（运行时库路径）、`labels`（标签文件）、
///   `assets`（部署源目录，存在时先把模型复制到 URL 路径下）、
///   `top_k`、`cpu_affinity`
/// - `pass:///path/to/labels.txt?top_k=5`
#[derive(Clone)]
pub struct ClassifierBuilder {
  kind: ModelKind,
  path: PathBuf,
  labels: Option<PathBuf>,
  assets: Option<PathBuf>,
  lib_path: String,
  library: Option<Arc<DlrLibrary>>,
  device: Device,
  threads: Option<i32>,
  cpu_affinity: Option<bool>,
  max_results: usize,
}

fn parse_query<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ClassifierError> {
  value
    .parse()
    .map_err(|_| ClassifierError::ModelPathError(format!("参数 {} 的值无效: {}", key, value)))
}

impl FromUrl for ClassifierBuilder {
  type Error = ClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let mut builder = match url.scheme() {
      DLR_SCHEME => ClassifierBuilder::new(ModelKind::GluoncvResnet18V2, url.path()),
      PASS_SCHEME => {
        let mut builder = ClassifierBuilder::new(ModelKind::Pass, url.path());
        builder.labels = Some(PathBuf::from(url.path()));
        builder
      }
      other => {
        return Err(ClassifierError::ModelPathError(format!(
          "模型路径必须使用 {} 或 {} 方案, 实际为 {}",
          DLR_SCHEME, PASS_SCHEME, other
        )));
      }
    };

    for (key, value) in url.query_pairs() {
      match &*key {
        "kind" if url.scheme() == DLR_SCHEME => {
          builder.kind = value.parse().map_err(ClassifierError::ModelPathError)?;
        }
        "labels" => builder.labels = Some(PathBuf::from(&*value)),
        "assets" => builder.assets = Some(PathBuf::from(&*value)),
        "lib" => builder.lib_path = value.to_string(),
        "device" => {
          builder.device.kind = value
            .parse::<DeviceType>()
            .map_err(ClassifierError::ModelPathError)?;
        }
        "device_id" => builder.device.id = parse_query(&key, &value)?,
        "threads" => builder.threads = Some(parse_query(&key, &value)?),
        "cpu_affinity" => builder.cpu_affinity = Some(parse_query(&key, &value)?),
        "top_k" => builder.max_results = parse_query(&key, &value)?,
        other => warn!("忽略未知模型参数: {}", other),
      }
    }

    Ok(builder)
  }
}

impl ClassifierBuilder {
  pub fn new(kind: ModelKind, path: impl AsRef<Path>) -> Self {
    Self {
      kind,
      path: path.as_ref().to_path_buf(),
      labels: None,
      assets: None,
      lib_path: DEFAULT_LIB_PATH.to_string(),
      library: None,
      device: Device::cpu(),
      threads: None,
      cpu_affinity: None,
      max_results: MAX_RESULTS,
    }
  }

  pub fn kind(&self) -> ModelKind {
    self.kind
  }

  /// 使用已加载的运行时库，而不是按 `lib` 路径加载。
  pub fn library(mut self, library: Arc<DlrLibrary>) -> Self {
    self.library = Some(library);
    self
  }

  pub fn lib_path(mut self, lib_path: impl Into<String>) -> Self {
    self.lib_path = lib_path.into();
    self
  }

  pub fn labels(mut self, path: impl AsRef<Path>) -> Self {
    self.labels = Some(path.as_ref().to_path_buf());
    self
  }

  pub fn assets(mut self, path: impl AsRef<Path>) -> Self {
    self.assets = Some(path.as_ref().to_path_buf());
    self
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn cpu_affinity(mut self, enable: bool) -> Self {
    self.cpu_affinity = Some(enable);
    self
  }

  pub fn threads(mut self, threads: i32) -> Self {
    self.threads = Some(threads);
    self
  }

  pub fn max_results(mut self, max_results: usize) -> Self {
    self.max_results = max_results;
    self
  }

  fn load_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    load_labels(path).map_err(|source| ClassifierError::Labels {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn build(self) -> Result<Classifier, ClassifierError> {
    let config = self.kind.config();

    if self.kind == ModelKind::Pass {
      let labels_path = self
        .labels
        .clone()
        .unwrap_or_else(|| self.path.join(config.labels_file));
      let labels = Self::load_labels(&labels_path)?;
      info!("使用占位分类器, 标签数量 {}", labels.len());
      return Ok(Classifier::Pass(
        PassClassifier::new(labels).with_max_results(self.max_results),
      ));
    }

    let model_dir = match &self.assets {
      Some(assets) => stage_model(assets, config.model_dir, &self.path)?,
      None => self.path.clone(),
    };

    let labels_path = self
      .labels
      .clone()
      .unwrap_or_else(|| model_dir.join(config.labels_file));
    let labels = Self::load_labels(&labels_path)?;

    let library = match self.library {
      Some(library) => library,
      None => Arc::new(DlrLibrary::load(&self.lib_path)?),
    };

    info!("加载模型 {}: {}", config.name, model_dir.display());
    let model = DlrModel::create(library, &model_dir, self.device)?;

    // 默认关闭 CPU 亲和性
    let cpu_affinity = self.cpu_affinity.unwrap_or(false);
    match model.use_cpu_affinity(cpu_affinity) {
      Ok(()) => debug!("CPU 亲和性: {}", cpu_affinity),
      Err(DlrError::Unsupported(call)) => warn!("运行时不支持 {}, 忽略 CPU 亲和性设置", call),
      Err(e) => return Err(e.into()),
    }
    if let Some(threads) = self.threads {
      match model.set_num_threads(threads) {
        Ok(()) => debug!("推理线程数: {}", threads),
        Err(DlrError::Unsupported(call)) => warn!("运行时不支持 {}, 忽略线程设置", call),
        Err(e) => return Err(e.into()),
      }
    }

    let classifier = DlrClassifier::new(model, config, labels)?.with_max_results(self.max_results);
    info!("模型加载完成");
    Ok(Classifier::Dlr(Box::new(classifier)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("class-{}", i)).collect()
  }

  #[test]
  fn pass_classifier_alternates_patterns() {
    let pass = PassClassifier::new(labels(1000));
    let image = DynamicImage::new_rgb8(8, 8);

    let first = pass.infer(&image).unwrap();
    let second = pass.infer(&image).unwrap();
    let third = pass.infer(&image).unwrap();

    let ids = |r: &ClassifyResult| r.items.iter().map(|i| i.id().to_string()).collect::<Vec<_>>();
    assert_eq!(ids(&first), vec!["284", "285", "286"]);
    assert_eq!(ids(&second), vec!["153", "154", "155"]);
    assert_eq!(ids(&first), ids(&third));
    assert_eq!(first.best().map(|r| r.confidence()), Some(0.998));
  }

  #[test]
  fn pass_classifier_with_few_labels() {
    let pass = PassClassifier::new(labels(2));
    let result = pass.infer(&DynamicImage::new_rgb8(1, 1)).unwrap();
    assert_eq!(result.len(), 2);
    assert!(result.items.iter().all(|r| r.confidence() == 0.0));
  }

  #[test]
  fn builder_from_dlr_url() {
    let url = Url::parse(
      "dlr:///data/models?kind=tensorflow_mobilenet_v1&device=gpu&device_id=1&threads=4&top_k=5&lib=/opt/libdlr.so",
    )
    .unwrap();
    let builder = ClassifierBuilder::from_url(&url).unwrap();
    assert_eq!(builder.kind, ModelKind::TensorflowMobilenetV1);
    assert_eq!(builder.path, PathBuf::from("/data/models"));
    assert_eq!(builder.device.kind, DeviceType::Gpu);
    assert_eq!(builder.device.id, 1);
    assert_eq!(builder.threads, Some(4));
    assert_eq!(builder.max_results, 5);
    assert_eq!(builder.lib_path, "/opt/libdlr.so");
  }

  #[test]
  fn builder_from_pass_url() {
    let url = Url::parse("pass:///assets/labels.txt").unwrap();
    let builder = ClassifierBuilder::from_url(&url).unwrap();
    assert_eq!(builder.kind, ModelKind::Pass);
    assert_eq!(builder.labels, Some(PathBuf::from("/assets/labels.txt")));
  }

  #[test]
  fn builder_rejects_bad_urls() {
    let wrong_scheme = Url::parse("onnx:///model.onnx").unwrap();
    assert!(matches!(
      ClassifierBuilder::from_url(&wrong_scheme),
      Err(ClassifierError::ModelPathError(_))
    ));
    let bad_threads = Url::parse("dlr:///m?threads=many").unwrap();
    assert!(ClassifierBuilder::from_url(&bad_threads).is_err());
    let bad_kind = Url::parse("dlr:///m?kind=vgg16").unwrap();
    assert!(ClassifierBuilder::from_url(&bad_kind).is_err());
  }

  #[test]
  fn pass_build_reads_labels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.txt");
    std::fs::write(&path, "a\nb\nc\n").unwrap();

    let classifier = ClassifierBuilder::new(ModelKind::Pass, dir.path())
      .build()
      .unwrap();
    assert!(matches!(classifier, Classifier::Pass(_)));
  }

  #[test]
  fn missing_library_fails_build() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("labels1000.txt"), "a\n").unwrap();
    let url = Url::parse(&format!(
      "dlr://{}?kind=gluoncv_resnet18_v2&lib=/nonexistent/libdlr.so",
      dir.path().display()
    ))
    .unwrap();
    let result = ClassifierBuilder::from_url(&url).unwrap().build();
    assert!(matches!(
      result,
      Err(ClassifierError::Runtime(DlrError::LibraryNotFound { .. }))
    ));
  }
}
