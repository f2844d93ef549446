// 该文件是 Renshu （人数） 项目的一部分。
// src/model.rs - 人数统计模型
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

use thiserror::Error;
use tracing::debug;

use crate::{
  count::FrameReport, detector::Detector, frame::Frame, merge::MergeStrategy,
  settings::CountSettings,
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum PeopleCounterError<FE, PE> {
  #[error("人脸检测失败: {0}")]
  Faces(#[source] FE),
  #[error("人体检测失败: {0}")]
  Persons(#[source] PE),
}

/// 两个相互独立的检测器加上人体框合并
///
/// 人脸检测结果原样计数，人体检测结果先合并重叠框再计数，
/// 两组结果之间从不合并。
pub struct PeopleCounter<F, P> {
  faces: F,
  persons: P,
  iou_threshold: f32,
  merge_strategy: MergeStrategy,
}

impl<F, P> PeopleCounter<F, P> {
  pub fn new(faces: F, persons: P, settings: &CountSettings) -> Self {
    Self {
      faces,
      persons,
      iou_threshold: settings.iou_threshold,
      merge_strategy: settings.merge_strategy,
    }
  }
}

impl<F: Detector, P: Detector> Model for PeopleCounter<F, P> {
  type Input = Frame;
  type Output = FrameReport;
  type Error = PeopleCounterError<F::Error, P::Error>;

  fn infer(&self, frame: &Frame) -> Result<FrameReport, Self::Error> {
    let faces = self.faces.detect(frame).map_err(PeopleCounterError::Faces)?;
    let persons = self
      .persons
      .detect(frame)
      .map_err(PeopleCounterError::Persons)?;
    let raw_persons = persons.len();
    let merged = self.merge_strategy.merge(&persons, self.iou_threshold);

    let report = FrameReport::new(frame.index, faces, merged);
    debug!(
      "帧 {}: 人脸 {}, 人体 {} -> {}, 估计 {}",
      frame.index,
      report.faces.len(),
      raw_persons,
      report.persons.len(),
      report.estimate
    );
    Ok(report)
  }
}
