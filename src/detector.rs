// 该文件是 Renshu （人数） 项目的一部分。
// src/detector.rs - 检测器
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, geometry::Rect};

/// 黑盒检测器：给定一帧，返回该帧中的检测框序列
pub trait Detector {
  type Error;

  fn detect(&self, frame: &Frame) -> Result<Vec<Rect>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
  type Error = D::Error;

  fn detect(&self, frame: &Frame) -> Result<Vec<Rect>, Self::Error> {
    (**self).detect(frame)
  }
}

mod replay;
pub use self::replay::{ReplayDetector, ReplayDetectorError};

#[cfg(feature = "seeta_face")]
mod seeta;
#[cfg(feature = "seeta_face")]
pub use self::seeta::{SeetaFaceDetector, SeetaFaceDetectorError};

/// 不产生任何检测结果，用于只启用一种检测器的场景
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneDetector;

impl FromUrlWithScheme for NoneDetector {
  const SCHEME: &'static str = "none";
}

impl FromUrl for NoneDetector {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(NoneDetector)
  }
}

impl Detector for NoneDetector {
  type Error = std::convert::Infallible;

  fn detect(&self, _frame: &Frame) -> Result<Vec<Rect>, Self::Error> {
    Ok(Vec::new())
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("回放检测器错误: {0}")]
  ReplayDetectorError(#[from] ReplayDetectorError),
  #[cfg(feature = "seeta_face")]
  #[error("SeetaFace 检测器错误: {0}")]
  SeetaFaceDetectorError(#[from] SeetaFaceDetectorError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum DetectorWrapper {
  None(NoneDetector),
  Replay(ReplayDetector),
  #[cfg(feature = "seeta_face")]
  SeetaFace(SeetaFaceDetector),
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      NoneDetector::SCHEME => Ok(DetectorWrapper::None(NoneDetector::from_url(url)?)),
      ReplayDetector::SCHEME => Ok(DetectorWrapper::Replay(ReplayDetector::from_url(url)?)),
      #[cfg(feature = "seeta_face")]
      SeetaFaceDetector::SCHEME => Ok(DetectorWrapper::SeetaFace(SeetaFaceDetector::from_url(
        url,
      )?)),
      other => Err(DetectorError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Detector for DetectorWrapper {
  type Error = DetectorError;

  fn detect(&self, frame: &Frame) -> Result<Vec<Rect>, Self::Error> {
    match self {
      DetectorWrapper::None(detector) => detector.detect(frame).map_err(|never| match never {}),
      DetectorWrapper::Replay(detector) => detector.detect(frame).map_err(DetectorError::from),
      #[cfg(feature = "seeta_face")]
      DetectorWrapper::SeetaFace(detector) => detector.detect(frame).map_err(DetectorError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::time::Duration;

  #[test]
  fn none_detector_checks_scheme() {
    assert!(NoneDetector::from_url(&Url::parse("none://").unwrap()).is_ok());
    assert!(matches!(
      NoneDetector::from_url(&Url::parse("replay:///tmp/faces.jsonl").unwrap()),
      Err(DetectorError::SchemeMismatch(s)) if s == "replay"
    ));
  }

  #[test]
  fn none_detector_is_always_empty() {
    let url = Url::parse("none://").unwrap();
    let detector = DetectorWrapper::from_url(&url).unwrap();
    let frame = Frame::new(RgbImage::new(8, 8), 0, Duration::ZERO);
    assert!(detector.detect(&frame).unwrap().is_empty());
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("haar:///cascade.xml").unwrap();
    assert!(matches!(
      DetectorWrapper::from_url(&url),
      Err(DetectorError::SchemeMismatch(s)) if s == "haar"
    ));
  }
}
