// 该文件是 Renshu （人数） 项目的一部分。
// tests/counting_task.rs - 逐帧任务集成测试
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
  cell::RefCell,
  convert::Infallible,
  io,
  sync::{Arc, Mutex},
  time::Duration,
};

use image::RgbImage;
use renshu::{
  count::{AnnouncePolicy, FrameReport},
  detector::{NoneDetector, ReplayDetector},
  frame::Frame,
  geometry::Rect,
  model::PeopleCounter,
  output::Render,
  settings::CountSettings,
  speech::{Speaker, SpeechError},
  task::{AnnounceClock, ContinuousTask, OneShotTask, Task},
};

#[derive(Clone, Default)]
struct Phrases(Arc<Mutex<Vec<String>>>);

impl Phrases {
  fn take(&self) -> Vec<String> {
    self.0.lock().unwrap().clone()
  }
}

impl Speaker for Phrases {
  fn speak(&self, text: &str) -> Result<(), SpeechError> {
    self.0.lock().unwrap().push(text.to_string());
    Ok(())
  }
}

struct Mute;

impl Speaker for Mute {
  fn speak(&self, _text: &str) -> Result<(), SpeechError> {
    Err(SpeechError::MissingProgram)
  }
}

#[derive(Default)]
struct Estimates(RefCell<Vec<usize>>);

impl Render<Frame, FrameReport> for &Estimates {
  type Error = Infallible;

  fn render_result(&self, _frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    self.0.borrow_mut().push(result.estimate);
    Ok(())
  }
}

fn settings() -> CountSettings {
  CountSettings {
    resize_width: 0,
    announce: AnnouncePolicy::default()
      .with_cooldown(Duration::from_secs(1))
      .with_heartbeat(Some(Duration::from_secs(5))),
    ..Default::default()
  }
}

/// 每 500 毫秒一帧
fn frames(n: usize) -> Vec<Result<Frame, io::Error>> {
  (0..n)
    .map(|i| {
      Ok(Frame::new(
        RgbImage::new(8, 8),
        i as u64,
        Duration::from_millis(500 * i as u64),
      ))
    })
    .collect()
}

/// 生成指定人数的人体框，每个人两个高度重叠的框
fn people(n: usize) -> Vec<Rect> {
  (0..n)
    .flat_map(|i| {
      let x = 100.0 * i as f32;
      [Rect::new(x, 0.0, 40.0, 80.0), Rect::new(x + 2.0, 1.0, 40.0, 80.0)]
    })
    .collect()
}

fn counter(counts: &[usize]) -> PeopleCounter<NoneDetector, ReplayDetector> {
  let persons = ReplayDetector::from_frames(counts.iter().map(|&n| people(n)).collect());
  PeopleCounter::new(NoneDetector, persons, &settings())
}

#[test]
fn flicker_is_suppressed_and_heartbeat_repeats() {
  // t=0 播报 1；t=0.5 变为 2 但未过冷却；t=1.5 播报 2；t=7.0 心跳重复
  let mut counts = vec![1, 2, 1, 2];
  counts.extend(std::iter::repeat_n(2, 11));
  let phrases = Phrases::default();
  let estimates = Estimates::default();

  let summary = ContinuousTask::default()
    .with_speaker(phrases.clone())
    .with_settings(&settings())
    .with_clock(AnnounceClock::FrameTimestamp)
    .run_task(frames(counts.len()).into_iter(), counter(&counts), &estimates)
    .unwrap();

  assert_eq!(*estimates.0.borrow(), counts);
  assert_eq!(summary.frames, 15);
  assert_eq!(summary.announcements, 3);
  assert_eq!(summary.last_estimate, Some(2));
  assert_eq!(
    phrases.take(),
    [
      "One person is present in the room.",
      "2 people are present in the room.",
      "2 people are present in the room.",
    ]
  );
}

#[test]
fn change_only_without_heartbeat() {
  let counts = vec![0; 30];
  let phrases = Phrases::default();
  let mut settings = settings();
  settings.announce = settings.announce.with_heartbeat(None);

  let summary = ContinuousTask::default()
    .with_speaker(phrases.clone())
    .with_settings(&settings)
    .with_clock(AnnounceClock::FrameTimestamp)
    .run_task(frames(counts.len()).into_iter(), counter(&counts), &Estimates::default())
    .unwrap();

  assert_eq!(summary.announcements, 1);
  assert_eq!(phrases.take(), ["No people detected in the room."]);
}

#[test]
fn speech_failure_does_not_stop_the_loop() {
  let counts = [1, 1, 3, 3, 3];
  let estimates = Estimates::default();

  let summary = ContinuousTask::default()
    .with_speaker(Mute)
    .with_settings(&settings())
    .with_clock(AnnounceClock::FrameTimestamp)
    .run_task(frames(counts.len()).into_iter(), counter(&counts), &estimates)
    .unwrap();

  assert_eq!(summary.frames, 5);
  // 播报失败仍然计入，状态照常更新
  assert_eq!(summary.announcements, 2);
  assert_eq!(*estimates.0.borrow(), counts);
}

#[test]
fn read_error_ends_the_task() {
  let counts = [1, 1, 1, 1];
  let mut input = frames(2);
  input.push(Err(io::Error::new(io::ErrorKind::UnexpectedEof, "camera gone")));
  input.extend(frames(4).into_iter().skip(3));
  let estimates = Estimates::default();

  let result = ContinuousTask::default()
    .with_settings(&settings())
    .run_task(input.into_iter(), counter(&counts), &estimates);

  assert!(result.is_err());
  assert_eq!(estimates.0.borrow().len(), 2);
}

#[test]
fn frame_number_and_quit_signal_stop_early() {
  let counts = [2; 10];
  let summary = ContinuousTask::default()
    .with_settings(&settings())
    .with_frame_number(Some(3))
    .run_task(frames(10).into_iter(), counter(&counts), &Estimates::default())
    .unwrap();
  assert_eq!(summary.frames, 3);

  let (tx, rx) = std::sync::mpsc::channel();
  tx.send(()).unwrap();
  let summary = ContinuousTask::default()
    .with_settings(&settings())
    .with_quit_signal(rx)
    .run_task(frames(10).into_iter(), counter(&counts), &Estimates::default())
    .unwrap();
  assert_eq!(summary.frames, 1);
}

#[test]
fn one_shot_announces_once() {
  let phrases = Phrases::default();
  let summary = OneShotTask::default()
    .with_speaker(phrases.clone())
    .with_settings(&settings())
    .run_task(frames(3).into_iter(), counter(&[4, 1, 1]), &Estimates::default())
    .unwrap();

  assert_eq!(summary.last_estimate, Some(4));
  assert_eq!(phrases.take(), ["4 people are present in the room."]);
}

#[test]
fn one_shot_without_frames_fails() {
  let result = OneShotTask::default().run_task(
    Vec::<Result<Frame, io::Error>>::new().into_iter(),
    counter(&[]),
    &Estimates::default(),
  );
  assert!(result.is_err());
}
