// 该文件是 Renshu （人数） 项目的一部分。
// src/input/image_folder.rs - 图像序列目录输入
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

use std::{collections::VecDeque, path::PathBuf, time::Duration};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];
const DEFAULT_FPS: f64 = 10.0;

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("读取图像 {path} 失败: {source}")]
  ImageLoadError {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("无效的帧率: {0}")]
  InvalidFps(String),
}

/// 按文件名顺序回放目录中的图像序列，`?fps=` 决定帧时间戳
pub struct ImageFolderInput {
  files: VecDeque<PathBuf>,
  frame_index: u64,
  frame_interval: Duration,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemeMismatch);
    }

    let mut fps = DEFAULT_FPS;
    for (k, v) in url.query_pairs() {
      if k == "fps" {
        fps = v
          .parse::<f64>()
          .ok()
          .filter(|f| *f > 0.0)
          .ok_or_else(|| ImageFolderInputError::InvalidFps(v.to_string()))?;
      }
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();
    info!("图像目录 {} 中共 {} 帧", url.path(), files.len());

    Ok(ImageFolderInput {
      files: files.into(),
      frame_index: 0,
      frame_interval: Duration::from_secs_f64(1.0 / fps),
    })
  }
}

impl Iterator for ImageFolderInput {
  type Item = Result<Frame, ImageFolderInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.pop_front()?;
    debug!("读取帧 {}", path.display());

    let image = ImageReader::open(&path)
      .map_err(ImageFolderInputError::from)
      .and_then(|reader| {
        reader
          .decode()
          .map_err(|source| ImageFolderInputError::ImageLoadError {
            path: path.clone(),
            source,
          })
      });

    let result = image.map(|image| {
      Frame::new(
        image.into_rgb8(),
        self.frame_index,
        frame_timestamp(self.frame_interval, self.frame_index),
      )
    });
    self.frame_index += 1;
    // 读取失败后不再继续
    if result.is_err() {
      self.files.clear();
    }
    Some(result)
  }
}

/// 第 `index` 帧相对第一帧的时间
fn frame_timestamp(interval: Duration, index: u64) -> Duration {
  interval.mul_f64(index as f64)
}
