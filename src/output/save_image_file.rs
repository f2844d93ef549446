// 该文件是 Renshu （人数） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::Path;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  count::FrameReport,
  frame::Frame,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

/// 每帧覆盖写入同一个图像文件，文件内容始终是最新一帧的标注结果
pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      draw: Draw::from_url_query(uri)?,
    })
  }
}

impl SaveImageFileOutput {
  pub fn path(&self) -> &str {
    &self.path
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    debug!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<Frame, FrameReport> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    let image = self.draw.draw_frame(&frame.image, result);
    self.save_image(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Rect;
  use image::RgbImage;
  use std::time::Duration;

  #[test]
  fn overwrites_latest_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("latest.png");
    let mut url = Url::parse("image:///").unwrap();
    url.set_path(path.to_str().unwrap());
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let frame = Frame::new(RgbImage::new(32, 32), 0, Duration::ZERO);
    let report = FrameReport::new(0, vec![Rect::new(4.0, 4.0, 8.0, 8.0)], Vec::new());
    output.render_result(&frame, &report).unwrap();
    output.render_result(&frame, &FrameReport::default()).unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(saved.dimensions(), (32, 32));
    // 第二帧没有检测框
    assert_eq!(saved.get_pixel(4, 4), &image::Rgb([0, 0, 0]));
  }
}
