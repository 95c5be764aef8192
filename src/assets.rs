// 该文件是 DLR Classify 项目的一部分。
// src/assets.rs - 模型文件部署
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// 编译后模型目录中的三个文件：算子库、计算图和权重。
pub const MODEL_ARTIFACTS: [&str; 3] = ["model.so", "model.json", "model.params"];

#[derive(Error, Debug)]
pub enum AssetError {
  #[error("模型文件缺失: {0}")]
  Missing(PathBuf),
  #[error("I/O 错误 ({path}): {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
}

/// 将 `asset_root/model_dir` 下的模型文件复制到 `target_root/model_dir`。
///
/// 目标文件已存在且大小一致时跳过，因此可以在每次启动时调用。
/// 返回目标模型目录。
pub fn stage_model(
  asset_root: impl AsRef<Path>,
  model_dir: &str,
  target_root: impl AsRef<Path>,
) -> Result<PathBuf, AssetError> {
  let source_dir = asset_root.as_ref().join(model_dir);
  let target_dir = target_root.as_ref().join(model_dir);

  std::fs::create_dir_all(&target_dir).map_err(|source| AssetError::Io {
    path: target_dir.clone(),
    source,
  })?;

  for name in MODEL_ARTIFACTS {
    let from = source_dir.join(name);
    let to = target_dir.join(name);
    let from_meta = std::fs::metadata(&from).map_err(|_| AssetError::Missing(from.clone()))?;

    if let Ok(to_meta) = std::fs::metadata(&to)
      && to_meta.len() == from_meta.len()
    {
      debug!("模型文件已存在，跳过: {}", to.display());
      continue;
    }

    info!("复制模型文件: {} -> {}", from.display(), to.display());
    std::fs::copy(&from, &to).map_err(|source| AssetError::Io {
      path: to.clone(),
      source,
    })?;
  }

  Ok(target_dir)
}
