// 该文件是 Renshu （人数） 项目的一部分。
// src/main.rs - 摄像头人数统计与语音播报
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use renshu::{
  FromUrl,
  detector::DetectorWrapper,
  input::InputWrapper,
  merge::MergeStrategy,
  model::PeopleCounter,
  output::OutputWrapper,
  settings::{self, CountSettings},
  speech::{Speaker, SpeakerWrapper, SpeechWorker},
  task::{AnnounceClock, ContinuousTask, Task, install_quit_handler},
};

/// Renshu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，例如 v4l:///dev/video0、folder:///path/to/frames?fps=10
  #[arg(long, value_name = "SOURCE", default_value = "v4l:///dev/video0")]
  pub input: Url,
  /// 人脸检测器，例如 seeta:///path/to/model.bin、replay:///path/to/faces.jsonl
  #[arg(long, value_name = "DETECTOR", default_value = "none://")]
  pub faces: Url,
  /// 人体检测器
  #[arg(long, value_name = "DETECTOR", default_value = "none://")]
  pub persons: Url,
  /// 输出路径，例如 log://、image:///tmp/latest.png、folder:///var/renshu?record
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,
  /// 语音输出，例如 command://espeak?rate=150、log://
  #[arg(long, value_name = "SPEECH", default_value = "log://")]
  pub speech: Url,

  /// 人体框合并的 IoU 阈值
  #[arg(long, value_name = "THRESHOLD", default_value_t = settings::DEFAULT_IOU_THRESHOLD)]
  pub iou_threshold: f32,
  /// 人体框合并方式: greedy 或 connected
  #[arg(long, value_name = "STRATEGY", default_value_t = MergeStrategy::Greedy)]
  pub merge_strategy: MergeStrategy,
  /// 人数变化后再次播报的最短间隔（秒）
  #[arg(long, value_name = "SECONDS", default_value_t = 1.0)]
  pub cooldown: f32,
  /// 人数不变时重复播报的间隔（秒），0 表示只在变化时播报
  #[arg(long, value_name = "SECONDS", default_value_t = 5.0)]
  pub heartbeat: f32,
  /// 检测前将帧缩放到的宽度，0 表示不缩放
  #[arg(long, value_name = "WIDTH", default_value_t = settings::DEFAULT_RESIZE_WIDTH)]
  pub resize_width: u32,

  /// 在处理循环中直接播报，不使用后台线程
  #[arg(long)]
  pub blocking_speech: bool,
  /// 按帧时间戳计算播报间隔
  #[arg(long)]
  pub frame_clock: bool,
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

impl Args {
  fn settings(&self) -> Result<CountSettings> {
    let settings = CountSettings {
      iou_threshold: self.iou_threshold,
      merge_strategy: self.merge_strategy,
      announce: Default::default(),
      resize_width: self.resize_width,
    };
    let announce = settings
      .announce
      .with_cooldown(settings::seconds(self.cooldown)?)
      .with_heartbeat(settings::heartbeat_seconds(self.heartbeat)?);
    Ok(CountSettings { announce, ..settings }.validate()?)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let settings = args.settings()?;

  info!("输入来源: {}", args.input);
  info!("人脸检测器: {}", args.faces);
  info!("人体检测器: {}", args.persons);
  info!("输出路径: {}", args.output);
  info!("语音输出: {}", args.speech);
  info!("计数参数: {:?}", settings);

  let input = InputWrapper::from_url(&args.input)?;
  let faces = DetectorWrapper::from_url(&args.faces)?;
  let persons = DetectorWrapper::from_url(&args.persons)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let speaker = SpeakerWrapper::from_url(&args.speech)?;
  let speaker: Box<dyn Speaker> = if args.blocking_speech {
    Box::new(speaker)
  } else {
    Box::new(SpeechWorker::spawn(speaker)?)
  };

  let clock = if args.frame_clock {
    AnnounceClock::FrameTimestamp
  } else {
    AnnounceClock::Wall
  };

  let summary = ContinuousTask::default()
    .with_speaker(speaker)
    .with_settings(&settings)
    .with_clock(clock)
    .with_frame_number(args.frame_number)
    .with_quit_signal(install_quit_handler()?)
    .run_task(input, PeopleCounter::new(faces, persons, &settings), output)?;

  info!(
    "共处理 {} 帧，播报 {} 次，最后人数 {:?}",
    summary.frames, summary.announcements, summary.last_estimate
  );
  Ok(())
}
