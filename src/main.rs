// 该文件是 DLR Classify 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dlr_classify::{
  FromUrl,
  input::InputWrapper,
  model::ClassifierBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

use args::{Args, Mode};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("DLR Classify 图像分类");
  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出地址: {}", args.output);
  info!("任务模式: {:?}", args.mode);

  let mut builder = ClassifierBuilder::from_url(&args.model)?;
  if let Some(lib) = args.lib {
    builder = builder.lib_path(lib);
  }
  if let Some(assets) = args.assets {
    builder = builder.assets(assets);
  }
  if let Some(top_k) = args.top_k {
    builder = builder.max_results(top_k);
  }
  info!("正在加载模型 {}...", builder.kind());
  let model = builder.build()?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  match args.mode {
    Mode::Oneshot => OneShotTask.run_task(input, model, output)?,
    Mode::Repeat => {
      let mut task = RepeatShotTask::default();
      if let Some(frames) = args.frames {
        task = task.with_repeat_times(frames);
      }
      task.run_task(input, model, output)?
    }
    Mode::Continuous => ContinuousTask::default()
      .with_frame_number(args.frames)
      .run_task(input, model, output)?,
  }

  Ok(())
}
