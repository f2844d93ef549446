// 该文件是 Renshu （人数） 项目的一部分。
// src/detector/replay.rs - 回放预先记录的检测结果
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

use std::io::BufRead;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detector::Detector, frame::Frame, geometry::Rect};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    source: serde_json::Error,
  },
}

/// 按帧序号回放检测结果
///
/// 文件每行对应一帧，内容为 `[[x, y, w, h], ...]` 形式的 JSON 数组，
/// 空行表示该帧没有检测结果。超出文件行数的帧返回空结果。
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
  frames: Vec<Vec<Rect>>,
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch);
    }

    let file = std::fs::File::open(url.path())?;
    let detector = Self::from_reader(std::io::BufReader::new(file))?;
    info!("回放检测结果 {}，共 {} 帧", url.path(), detector.len());
    Ok(detector)
  }
}

impl ReplayDetector {
  pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ReplayDetectorError> {
    let mut frames = Vec::new();
    for (i, line) in reader.lines().enumerate() {
      let line = line?;
      let line = line.trim();
      if line.is_empty() {
        frames.push(Vec::new());
        continue;
      }
      let boxes: Vec<[f32; 4]> = serde_json::from_str(line)
        .map_err(|source| ReplayDetectorError::ParseError { line: i + 1, source })?;
      frames.push(boxes.into_iter().map(Rect::from).collect());
    }
    Ok(Self { frames })
  }

  pub fn from_frames(frames: Vec<Vec<Rect>>) -> Self {
    Self { frames }
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }
}

impl Detector for ReplayDetector {
  type Error = ReplayDetectorError;

  fn detect(&self, frame: &Frame) -> Result<Vec<Rect>, Self::Error> {
    let rects = usize::try_from(frame.index)
      .ok()
      .and_then(|i| self.frames.get(i))
      .cloned()
      .unwrap_or_default();
    Ok(rects)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::time::Duration;

  fn frame(index: u64) -> Frame {
    Frame::new(RgbImage::new(4, 4), index, Duration::ZERO)
  }

  #[test]
  fn replays_by_frame_index() {
    let data = "[[0, 0, 10, 10], [5, 5, 10, 10]]\n\n[[1.5, 2, 3, 4]]\n";
    let detector = ReplayDetector::from_reader(data.as_bytes()).unwrap();
    assert_eq!(detector.len(), 3);
    assert_eq!(detector.detect(&frame(0)).unwrap().len(), 2);
    assert!(detector.detect(&frame(1)).unwrap().is_empty());
    assert_eq!(
      detector.detect(&frame(2)).unwrap(),
      vec![Rect::new(1.5, 2.0, 3.0, 4.0)]
    );
    assert!(detector.detect(&frame(99)).unwrap().is_empty());
  }

  #[test]
  fn reports_bad_line() {
    let data = "[]\n[[1, 2, 3]]\n";
    let err = ReplayDetector::from_reader(data.as_bytes()).unwrap_err();
    assert!(matches!(err, ReplayDetectorError::ParseError { line: 2, .. }));
  }

  #[test]
  fn loads_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("faces.jsonl");
    std::fs::write(&path, "[[0, 0, 4, 4]]\n").unwrap();
    let mut url = Url::parse("replay:///").unwrap();
    url.set_path(path.to_str().unwrap());
    let detector = ReplayDetector::from_url(&url).unwrap();
    assert_eq!(detector.detect(&frame(0)).unwrap().len(), 1);
  }
}
