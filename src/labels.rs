// 该文件是 DLR Classify 项目的一部分。
// src/labels.rs - 标签文件读取
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
  io::{BufRead, BufReader},
  path::Path,
};

use tracing::debug;

/// 读取标签文件，每行一个标签，保持原有顺序。
pub fn load_labels(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
  let path = path.as_ref();
  let reader = BufReader::new(File::open(path)?);
  let labels = reader
    .lines()
    .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
    .collect::<Result<Vec<_>, _>>()?;
  debug!("从 {} 读取 {} 个标签", path.display(), labels.len());
  Ok(labels)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn one_label_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.txt");
    std::fs::write(&path, "background\ntench\r\ngoldfish\n").unwrap();

    let labels = load_labels(&path).unwrap();
    assert_eq!(labels, vec!["background", "tench", "goldfish"]);
  }

  #[test]
  fn missing_file_is_an_error() {
    assert!(load_labels("/nonexistent/labels.txt").is_err());
  }
}
