// 该文件是 DLR Classify 项目的一部分。
// src/recognition.rs - 分类结果与 Top-K 选择
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

use std::{cmp::Ordering, cmp::Reverse, collections::BinaryHeap, fmt};

/// 界面上展示的结果数量。
pub const MAX_RESULTS: usize = 3;

/// 一次识别的结果，不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
  id: String,
  title: String,
  confidence: f32,
  location: Option<[f32; 4]>, // [x_min, y_min, x_max, y_max]
}

impl Recognition {
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    confidence: f32,
    location: Option<[f32; 4]>,
  ) -> Self {
    Self {
      id: id.into(),
      title: title.into(),
      confidence,
      location,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn location(&self) -> Option<[f32; 4]> {
    self.location
  }
}

impl fmt::Display for Recognition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut parts = Vec::with_capacity(4);
    if !self.id.is_empty() {
      parts.push(format!("[{}]", self.id));
    }
    if !self.title.is_empty() {
      parts.push(self.title.clone());
    }
    parts.push(format!("({:.1}%)", self.confidence * 100.0));
    if let Some([x0, y0, x1, y1]) = self.location {
      parts.push(format!("[{:.3}, {:.3}, {:.3}, {:.3}]", x0, y0, x1, y1));
    }
    write!(f, "{}", parts.join(" "))
  }
}

/// 按置信度降序排列的识别结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyResult {
  pub items: Box<[Recognition]>,
}

impl ClassifyResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn best(&self) -> Option<&Recognition> {
    self.items.first()
  }
}

struct Ranked<'a> {
  confidence: f32,
  index: usize,
  title: &'a str,
}

impl Ranked<'_> {
  // NaN 排在最后
  fn key(&self) -> f32 {
    if self.confidence.is_nan() {
      f32::NEG_INFINITY
    } else {
      self.confidence
    }
  }
}

impl Ord for Ranked<'_> {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .key()
      .total_cmp(&other.key())
      .then_with(|| other.index.cmp(&self.index))
  }
}

impl PartialOrd for Ranked<'_> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Ranked<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Ranked<'_> {}

/// 从概率中选出置信度最高的 `k` 个。
///
/// 只在标签表覆盖的下标中排序：超出标签表的概率被忽略，
/// 标签表为空时结果为空。置信度相同时下标小的在前。
pub fn top_k(probabilities: &[f32], labels: &[String], k: usize) -> ClassifyResult {
  if k == 0 {
    return ClassifyResult::default();
  }

  let mut heap = BinaryHeap::with_capacity(k + 1);
  for (index, (&confidence, title)) in probabilities.iter().zip(labels).enumerate() {
    heap.push(Reverse(Ranked {
      confidence,
      index,
      title: title.as_str(),
    }));
    if heap.len() > k {
      heap.pop();
    }
  }

  let items = heap
    .into_sorted_vec()
    .into_iter()
    .map(|Reverse(ranked)| {
      Recognition::new(ranked.index.to_string(), ranked.title, ranked.confidence, None)
    })
    .collect();

  ClassifyResult { items }
}
