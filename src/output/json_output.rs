// 该文件是 DLR Classify 项目的一部分。
// src/output/json_output.rs - JSON Lines 输出
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
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use image::DynamicImage;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  recognition::{ClassifyResult, Recognition},
};

#[derive(Error, Debug)]
pub enum JsonOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出文件锁已损坏")]
  Poisoned,
}

/// 每帧一行 JSON，文件在创建输出时被截断。
pub struct JsonOutput {
  writer: Mutex<(u64, BufWriter<File>)>,
}

impl FromUrlWithScheme for JsonOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonOutput {
  type Error = JsonOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = Path::new(uri.path());
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    info!("结果写入: {}", path.display());

    Ok(Self {
      writer: Mutex::new((0, BufWriter::new(File::create(path)?))),
    })
  }
}

pub fn recognition_to_json(item: &Recognition) -> Value {
  json!({
    "id": item.id(),
    "title": item.title(),
    "confidence": item.confidence(),
    "location": item.location(),
  })
}

pub fn result_to_json(frame: u64, image: &DynamicImage, result: &ClassifyResult) -> Value {
  json!({
    "frame": frame,
    "width": image.width(),
    "height": image.height(),
    "results": result.items.iter().map(recognition_to_json).collect::<Vec<_>>(),
  })
}

impl Render<DynamicImage, ClassifyResult> for JsonOutput {
  type Error = JsonOutputError;

  fn render_result(&self, frame: &DynamicImage, result: &ClassifyResult) -> Result<(), Self::Error> {
    let mut guard = self.writer.lock().map_err(|_| JsonOutputError::Poisoned)?;
    let (count, writer) = &mut *guard;
    *count += 1;
    serde_json::to_writer(&mut *writer, &result_to_json(*count, frame, result))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
  }
}
