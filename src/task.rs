// 该文件是 Renshu （人数） 项目的一部分。
// src/task.rs - 逐帧处理任务
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
  sync::mpsc::{Receiver, TryRecvError},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
  count::{AnnouncePolicy, Announcer, FrameReport, announcement_phrase},
  frame::Frame,
  model::Model,
  output::Render,
  settings::CountSettings,
  speech::{LogSpeaker, Speaker},
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<RunSummary, Self::Error>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub frames: u64,
  pub announcements: u64,
  pub last_estimate: Option<usize>,
}

/// 播报去抖使用的时间来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnnounceClock {
  /// 墙上时钟
  #[default]
  Wall,
  /// 帧时间戳，回放录制的图像序列时与录制时的节奏一致
  FrameTimestamp,
}

/// 连接 Ctrl-C 到退出信号；收到信号 30 秒后仍未退出则强制结束进程
pub fn install_quit_handler() -> Result<Receiver<()>, ctrlc::Error> {
  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(rx)
}

fn speak_or_log<S: Speaker>(speaker: &S, estimate: usize) {
  let phrase = announcement_phrase(estimate);
  if let Err(e) = speaker.speak(&phrase) {
    warn!("语音播报失败: {}", e);
    warn!("人数: {}", estimate);
  }
}

fn render_or_log<O>(output: &O, frame: &Frame, report: &FrameReport)
where
  O: Render<Frame, FrameReport>,
  O::Error: std::fmt::Display,
{
  if let Err(e) = output.render_result(frame, report) {
    warn!("第 {} 帧输出失败: {}", frame.index, e);
  }
}

/// 只处理第一帧并播报一次
pub struct OneShotTask<S = LogSpeaker> {
  speaker: S,
  resize_width: u32,
}

impl Default for OneShotTask {
  fn default() -> Self {
    Self {
      speaker: LogSpeaker,
      resize_width: CountSettings::default().resize_width,
    }
  }
}

impl<S> OneShotTask<S> {
  pub fn with_speaker<T: Speaker>(self, speaker: T) -> OneShotTask<T> {
    OneShotTask {
      speaker,
      resize_width: self.resize_width,
    }
  }

  pub fn with_settings(mut self, settings: &CountSettings) -> Self {
    self.resize_width = settings.resize_width;
    self
  }
}

impl<I, E, M, O, S> Task<I, M, O> for OneShotTask<S>
where
  I: Iterator<Item = Result<Frame, E>>,
  E: std::error::Error + Send + Sync + 'static,
  M: Model<Input = Frame, Output = FrameReport>,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Frame, FrameReport>,
  O::Error: std::fmt::Display,
  S: Speaker,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<RunSummary, Self::Error> {
    info!("开始任务...");
    let frame = input
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?
      .context("读取输入帧失败")?
      .resized_to_width(self.resize_width);

    let now = Instant::now();
    let report = model.infer(&frame)?;
    info!(
      "检测完成，耗时: {:.2?}，估计人数: {}",
      now.elapsed(),
      report.estimate
    );
    render_or_log(&output, &frame, &report);
    speak_or_log(&self.speaker, report.estimate);

    Ok(RunSummary {
      frames: 1,
      announcements: 1,
      last_estimate: Some(report.estimate),
    })
  }
}

/// 逐帧连续处理：读取、检测、合并、计数、输出、按去抖策略播报
///
/// 每帧处理完才读取下一帧。输入读取失败时记录错误并结束任务，
/// 语音或输出失败只记录警告。每帧检查一次退出信号。
pub struct ContinuousTask<S = LogSpeaker> {
  speaker: S,
  policy: AnnouncePolicy,
  clock: AnnounceClock,
  resize_width: u32,
  frame_number: Option<usize>,
  quit: Option<Receiver<()>>,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      speaker: LogSpeaker,
      policy: AnnouncePolicy::default(),
      clock: AnnounceClock::default(),
      resize_width: CountSettings::default().resize_width,
      frame_number: None,
      quit: None,
    }
  }
}

impl<S> ContinuousTask<S> {
  pub fn with_speaker<T: Speaker>(self, speaker: T) -> ContinuousTask<T> {
    ContinuousTask {
      speaker,
      policy: self.policy,
      clock: self.clock,
      resize_width: self.resize_width,
      frame_number: self.frame_number,
      quit: self.quit,
    }
  }

  pub fn with_settings(mut self, settings: &CountSettings) -> Self {
    self.policy = settings.announce;
    self.resize_width = settings.resize_width;
    self
  }

  pub fn with_clock(mut self, clock: AnnounceClock) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_quit_signal(mut self, quit: Receiver<()>) -> Self {
    self.quit = Some(quit);
    self
  }

  fn quit_requested(&self) -> bool {
    match &self.quit {
      Some(rx) => match rx.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Empty) => false,
        // 发送端已释放，不会再收到信号
        Err(TryRecvError::Disconnected) => false,
      },
      None => false,
    }
  }
}

impl<I, E, M, O, S> Task<I, M, O> for ContinuousTask<S>
where
  I: Iterator<Item = Result<Frame, E>>,
  E: std::error::Error + Send + Sync + 'static,
  M: Model<Input = Frame, Output = FrameReport>,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Frame, FrameReport>,
  O::Error: std::fmt::Display,
  S: Speaker,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<RunSummary, Self::Error> {
    info!("开始任务...");
    let mut announcer = Announcer::new(self.policy);
    let mut summary = RunSummary::default();
    let start = Instant::now();

    for item in input {
      let frame = match item {
        Ok(frame) => frame.resized_to_width(self.resize_width),
        Err(e) => {
          error!("读取帧失败，结束任务: {}", e);
          return Err(anyhow::Error::new(e).context("读取输入帧失败"));
        }
      };

      let now = Instant::now();
      let report = model.infer(&frame)?;
      let elapsed = now.elapsed();
      render_or_log(&output, &frame, &report);

      let at = match self.clock {
        AnnounceClock::Wall => Instant::now(),
        AnnounceClock::FrameTimestamp => start + frame.timestamp,
      };
      if announcer.observe(report.estimate, at) {
        speak_or_log(&self.speaker, report.estimate);
        summary.announcements += 1;
      }

      summary.frames += 1;
      summary.last_estimate = Some(report.estimate);
      info!(
        "第 {} 帧处理完成，估计人数 {}，耗时: {:.2?}",
        frame.index, report.estimate, elapsed
      );

      if self
        .frame_number
        .is_some_and(|n| summary.frames >= n as u64)
      {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      if self.quit_requested() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共 {} 帧，播报 {} 次",
      summary.frames, summary.announcements
    );
    Ok(summary)
  }
}
