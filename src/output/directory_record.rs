// 该文件是 DLR Classify 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{DateTime, Datelike, Utc};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  recognition::ClassifyResult,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录格式: 每行 `标签, 置信度`。
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn record(&self, result: &ClassifyResult, path: &Path) -> Result<(), std::io::Error> {
    let mut records = Vec::new();
    for item in result.items.iter() {
      let name = if self.label_with_name {
        item.title()
      } else {
        item.id()
      };
      records.push(format!("{}, {:.4}", name, item.confidence()));
    }
    std::fs::write(path.with_extension("txt"), records.join("\n"))?;
    Ok(())
  }
}

/// 按日期分目录保存每一帧图像及其识别记录。
///
/// `folder:///var/records?record=name&image`: `record=id` 时记录标签编号，
/// 带 `image` 参数时同时保存原图。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Record,
  save_image: bool,
  frame_counter: AtomicU16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let label_with_name = !uri.query_pairs().any(|(k, v)| k == "record" && v == "id");
    let save_image = uri.query_pairs().any(|(k, _)| k == "image");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      record: Record { label_with_name },
      save_image,
      frame_counter: AtomicU16::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, std::io::Error> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<DynamicImage, ClassifyResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &DynamicImage, result: &ClassifyResult) -> Result<(), Self::Error> {
    let path = self.frame_path(Utc::now())?;
    if self.save_image {
      frame.to_rgb8().save(&path)?;
    }
    self.record.record(result, &path)?;
    debug!("记录已保存: {}", path.with_extension("txt").display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recognition::Recognition;

  fn result() -> ClassifyResult {
    ClassifyResult {
      items: vec![
        Recognition::new("281", "tabby", 0.75, None),
        Recognition::new("282", "tiger cat", 0.125, None),
      ]
      .into_boxed_slice(),
    }
  }

  fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn writes_record_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?image", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&DynamicImage::new_rgb8(2, 2), &result())
      .unwrap();

    let records = files_with_extension(dir.path(), "txt");
    assert_eq!(records.len(), 1);
    let text = std::fs::read_to_string(&records[0]).unwrap();
    assert_eq!(text, "tabby, 0.7500\ntiger cat, 0.1250");
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
  }

  #[test]
  fn writes_record_by_id_without_image() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?record=id", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&DynamicImage::new_rgb8(2, 2), &result())
      .unwrap();

    let records = files_with_extension(dir.path(), "txt");
    let text = std::fs::read_to_string(&records[0]).unwrap();
    assert!(text.starts_with("281, 0.7500"));
    assert!(files_with_extension(dir.path(), "png").is_empty());
  }
}
