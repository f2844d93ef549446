// 该文件是 Renshu （人数） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧人数统计
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
  model::PeopleCounter,
  output::OutputWrapper,
  settings::CountSettings,
  speech::SpeakerWrapper,
  task::{OneShotTask, Task},
};

/// 读取一帧，统计人数并播报一次
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 人脸检测器
  #[arg(long, value_name = "DETECTOR", default_value = "none://")]
  pub faces: Url,
  /// 人体检测器
  #[arg(long, value_name = "DETECTOR", default_value = "none://")]
  pub persons: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,
  /// 语音输出
  #[arg(long, value_name = "SPEECH", default_value = "log://")]
  pub speech: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let settings = CountSettings::default();
  let input = InputWrapper::from_url(&args.input)?;
  let faces = DetectorWrapper::from_url(&args.faces)?;
  let persons = DetectorWrapper::from_url(&args.persons)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let speaker = SpeakerWrapper::from_url(&args.speech)?;

  let summary = OneShotTask::default()
    .with_speaker(speaker)
    .with_settings(&settings)
    .run_task(input, PeopleCounter::new(faces, persons, &settings), output)?;
  info!("估计人数: {:?}", summary.last_estimate);

  Ok(())
}
