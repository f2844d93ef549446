// 该文件是 Renshu （人数） 项目的一部分。
// src/detector/seeta.rs - SeetaFace 级联人脸检测器
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
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detector::Detector, frame::Frame, geometry::Rect};

#[derive(Error, Debug)]
pub enum SeetaFaceDetectorError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("模型加载失败: {0}")]
  ModelError(String),
  #[error("无效的参数 {0}={1}")]
  InvalidParameter(String, String),
}

/// 检测参数，对应 `seeta:///model.bin?min_face=30&score=2.0&scale=0.8&step=4`
#[derive(Debug, Clone, Copy)]
pub struct SeetaFaceParams {
  pub min_face_size: u32,
  pub score_thresh: f64,
  pub pyramid_scale_factor: f32,
  pub slide_window_step: u32,
}

impl Default for SeetaFaceParams {
  fn default() -> Self {
    Self {
      min_face_size: 30,
      score_thresh: 2.0,
      pyramid_scale_factor: 0.8,
      slide_window_step: 4,
    }
  }
}

pub struct SeetaFaceDetector {
  model: rustface::Model,
  params: SeetaFaceParams,
}

impl FromUrlWithScheme for SeetaFaceDetector {
  const SCHEME: &'static str = "seeta";
}

impl FromUrl for SeetaFaceDetector {
  type Error = SeetaFaceDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SeetaFaceDetectorError::SchemeMismatch);
    }

    let mut params = SeetaFaceParams::default();
    for (k, v) in url.query_pairs() {
      let invalid = || SeetaFaceDetectorError::InvalidParameter(k.to_string(), v.to_string());
      match k.as_ref() {
        "min_face" => params.min_face_size = v.parse().map_err(|_| invalid())?,
        "score" => params.score_thresh = v.parse().map_err(|_| invalid())?,
        "scale" => params.pyramid_scale_factor = v.parse().map_err(|_| invalid())?,
        "step" => params.slide_window_step = v.parse().map_err(|_| invalid())?,
        _ => {}
      }
    }

    let file = std::fs::File::open(url.path())?;
    let model = rustface::read_model(std::io::BufReader::new(file))
      .map_err(|e| SeetaFaceDetectorError::ModelError(e.to_string()))?;
    info!("SeetaFace 模型已加载: {} {:?}", url.path(), params);

    Ok(Self { model, params })
  }
}

impl Detector for SeetaFaceDetector {
  type Error = SeetaFaceDetectorError;

  fn detect(&self, frame: &Frame) -> Result<Vec<Rect>, Self::Error> {
    let gray = frame.gray();
    let (width, height) = gray.dimensions();

    // rustface 的检测器需要可变引用，每帧用模型副本创建一个
    let mut detector = rustface::create_detector_with_model(self.model.clone());
    detector.set_min_face_size(self.params.min_face_size);
    detector.set_score_thresh(self.params.score_thresh);
    detector.set_pyramid_scale_factor(self.params.pyramid_scale_factor);
    detector.set_slide_window_step(self.params.slide_window_step, self.params.slide_window_step);

    let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));
    debug!("第 {} 帧检测到 {} 张人脸", frame.index, faces.len());

    Ok(
      faces
        .iter()
        .map(|face| {
          let bbox = face.bbox();
          Rect::new(
            bbox.x().max(0) as f32,
            bbox.y().max(0) as f32,
            bbox.width() as f32,
            bbox.height() as f32,
          )
        })
        .collect(),
    )
  }
}
