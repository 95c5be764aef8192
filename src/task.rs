// 该文件是 DLR Classify 项目的一部分。
// src/task.rs - 任务调度
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
  sync::mpsc,
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧输入。
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始单次分类任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始分类...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("分类完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("输出完成，总耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧反复分类，统计预热后的平均耗时。
#[derive(Debug)]
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  /// 不计入平均耗时的预热次数
  pub const WARM_UP: usize = 2;

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }

  pub fn repeat_times(&self) -> usize {
    self.repeat_times
  }

  /// 跳过预热轮次后的平均值；样本不足时退回到全部样本。
  pub fn average(times: &[Duration]) -> Option<Duration> {
    let measured = if times.len() > Self::WARM_UP {
      &times[Self::WARM_UP..]
    } else {
      times
    };
    let count = u32::try_from(measured.len()).ok().filter(|n| *n > 0)?;
    Some(measured.iter().sum::<Duration>() / count)
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始重复分类任务，共 {} 次...", self.repeat_times);
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({}) 分类完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    if let Some(average) = Self::average(&times) {
      warn!("平均分类时间: {:.2?}", average);
    }

    Ok(())
  }
}

/// 逐帧处理所有输入，直到输入耗尽、达到帧数上限或收到 Ctrl-C。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  fn install_interrupt() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    let handler = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = handler {
      warn!("无法设置 Ctrl-C 处理: {}", e);
    }
    rx
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始连续分类任务...");
    let rx = Self::install_interrupt();

    let mut frame_index = 0usize;
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      info!("第 {} 帧完成，耗时: {:.2?} / {:.2?}", frame_index, elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::{Cell, RefCell};

  #[derive(Debug, thiserror::Error)]
  #[error("失败")]
  struct Failure;

  struct Doubler {
    calls: Cell<usize>,
    fail: bool,
  }

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = Failure;

    fn infer(&self, input: &u32) -> Result<u32, Failure> {
      self.calls.set(self.calls.get() + 1);
      if self.fail {
        return Err(Failure);
      }
      Ok(input * 2)
    }

    fn postprocess(&self, _probabilities: &[f32]) -> u32 {
      0
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(u32, u32)>>,
  }

  impl Render<u32, u32> for &Collect {
    type Error = Failure;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Failure> {
      self.seen.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  fn doubler() -> Doubler {
    Doubler {
      calls: Cell::new(0),
      fail: false,
    }
  }

  #[test]
  fn oneshot_uses_first_frame() {
    let out = Collect::default();
    OneShotTask
      .run_task(vec![3, 4].into_iter(), doubler(), &out)
      .unwrap();
    assert_eq!(*out.seen.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn oneshot_without_input_fails() {
    let out = Collect::default();
    assert!(
      OneShotTask
        .run_task(Vec::<u32>::new().into_iter(), doubler(), &out)
        .is_err()
    );
  }

  #[test]
  fn model_error_is_propagated() {
    let out = Collect::default();
    let model = Doubler {
      calls: Cell::new(0),
      fail: true,
    };
    assert!(OneShotTask.run_task(vec![1].into_iter(), model, &out).is_err());
    assert!(out.seen.borrow().is_empty());
  }

  #[test]
  fn repeatshot_runs_requested_times() {
    let out = Collect::default();
    RepeatShotTask::default()
      .with_repeat_times(5)
      .run_task(vec![7].into_iter(), doubler(), &out)
      .unwrap();
    assert_eq!(out.seen.borrow().len(), 5);
    assert!(out.seen.borrow().iter().all(|s| *s == (7, 14)));
  }

  #[test]
  fn average_skips_warm_up() {
    let ms = Duration::from_millis;
    assert_eq!(
      RepeatShotTask::average(&[ms(100), ms(100), ms(10), ms(20)]),
      Some(ms(15))
    );
    assert_eq!(RepeatShotTask::average(&[ms(8)]), Some(ms(8)));
    assert_eq!(RepeatShotTask::average(&[]), None);
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let out = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(vec![1, 2, 3, 4].into_iter(), doubler(), &out)
      .unwrap();
    assert_eq!(*out.seen.borrow(), vec![(1, 2), (2, 4)]);
  }

  #[test]
  fn continuous_drains_input() {
    let out = Collect::default();
    ContinuousTask::default()
      .run_task(vec![1, 2, 3].into_iter(), doubler(), &out)
      .unwrap();
    assert_eq!(out.seen.borrow().len(), 3);
  }
}
