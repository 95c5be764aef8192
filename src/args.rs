// 该文件是 DLR Classify 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use url::Url;

/// 任务模式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
  /// 只分类第一帧
  Oneshot,
  /// 反复分类第一帧并统计平均耗时
  Repeat,
  /// 逐帧分类全部输入
  Continuous,
}

/// DLR Classify 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// DLR 运行时动态库路径，覆盖模型 URL 中的 `lib` 参数
  #[arg(long, value_name = "LIB")]
  pub lib: Option<String>,

  /// 模型地址
  /// 支持格式:
  /// - dlr:///path/to/model?kind=gluoncv_resnet18_v2&device=cpu&device_id=0&threads=4
  /// - pass:///path/to/labels.txt
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 模型部署源目录，指定时先把模型文件复制到模型路径下
  #[arg(long, value_name = "DIR")]
  pub assets: Option<PathBuf>,

  /// 输入来源
  /// 支持格式:
  /// - 图片: image:///path/to/image.jpg
  /// - 目录: dir:///path/to/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出地址
  /// 支持格式:
  /// - 日志: log://
  /// - JSON Lines: json:///path/to/result.json
  /// - 目录记录: folder:///path/to/records?record=name&image
  #[arg(long, default_value = "log://", value_name = "OUTPUT")]
  pub output: Url,

  /// 每帧输出的结果数量
  #[arg(long, value_name = "K")]
  pub top_k: Option<usize>,

  /// 任务模式
  #[arg(long, value_enum, default_value_t = Mode::Oneshot)]
  pub mode: Mode,

  /// 帧数: 连续模式下的最大处理帧数，重复模式下的重复次数
  #[arg(long, value_name = "COUNT")]
  pub frames: Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_minimal() {
    let args = Args::try_parse_from([
      "dlr-classify",
      "--model",
      "dlr:///data/model?kind=keras_mobilenet_v2",
      "--input",
      "image:///tmp/cat.jpg",
    ])
    .unwrap();
    assert_eq!(args.mode, Mode::Oneshot);
    assert_eq!(args.output.scheme(), "log");
    assert!(args.lib.is_none());
  }

  #[test]
  fn parse_continuous() {
    let args = Args::try_parse_from([
      "dlr-classify",
      "--lib",
      "/opt/dlr/libdlr.so",
      "--model",
      "dlr:///data/model",
      "--input",
      "dir:///tmp/images",
      "--output",
      "json:///tmp/out.json",
      "--mode",
      "continuous",
      "--frames",
      "10",
      "--top-k",
      "5",
    ])
    .unwrap();
    assert_eq!(args.mode, Mode::Continuous);
    assert_eq!(args.frames, Some(10));
    assert_eq!(args.top_k, Some(5));
    assert_eq!(args.lib.as_deref(), Some("/opt/dlr/libdlr.so"));
  }
}
