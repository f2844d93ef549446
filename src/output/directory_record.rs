// 该文件是 Renshu （人数） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  count::FrameReport,
  frame::Frame,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

/// 按日期目录保存标注后的帧：`dir/YYYY/MM/DD/HH-MM-SS-XXXX.png`
///
/// 默认只保存估计人数大于 0 的帧，`always` 保存所有帧；
/// `record` 同时写入同名 `.json` 检测结果。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: AtomicU16,
  always: bool,
  record: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let record = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: Draw::from_url_query(uri)?,
      frame_counter: AtomicU16::new(0),
      always,
      record,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, FrameReport> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    if !self.always && result.estimate == 0 {
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.draw_frame(&frame.image, result).save(&path)?;
    if self.record {
      let file = std::fs::File::create(path.with_extension("json"))?;
      serde_json::to_writer_pretty(file, result)?;
    }
    debug!("帧 {} 已保存到 {}", frame.index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Rect;
  use image::RgbImage;
  use std::time::Duration;

  fn saved_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(path) = stack.pop() {
      for entry in std::fs::read_dir(path).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let mut url = url::Url::parse("folder:///").unwrap();
    url.set_path(dir.to_str().unwrap());
    url.set_query(Some(query));
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  #[test]
  fn skips_empty_frames_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "");
    let frame = Frame::new(RgbImage::new(16, 16), 0, Duration::ZERO);

    output.render_result(&frame, &FrameReport::default()).unwrap();
    assert!(saved_files(dir.path()).is_empty());

    let report = FrameReport::new(1, vec![Rect::new(1.0, 1.0, 4.0, 4.0)], Vec::new());
    output.render_result(&frame, &report).unwrap();
    let files = saved_files(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension().unwrap(), "png");
  }

  #[test]
  fn always_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "always&record");
    let frame = Frame::new(RgbImage::new(16, 16), 0, Duration::ZERO);
    output.render_result(&frame, &FrameReport::default()).unwrap();

    let files = saved_files(dir.path());
    assert_eq!(files.len(), 2);
    let json = files.iter().find(|p| p.extension().unwrap() == "json").unwrap();
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(value["estimate"], 0);
  }
}
