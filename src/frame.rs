// 该文件是 Renshu （人数） 项目的一部分。
// src/frame.rs - 视频帧定义
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

use std::time::Duration;

use image::{GrayImage, RgbImage, imageops::FilterType};

/// 一帧 RGB 图像及其在输入流中的位置
#[derive(Debug, Clone)]
pub struct Frame {
  pub image: RgbImage,
  pub index: u64,
  /// 相对输入源打开时刻的时间
  pub timestamp: Duration,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp: Duration) -> Self {
    Self {
      image,
      index,
      timestamp,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 灰度图，供人脸级联检测器使用
  pub fn gray(&self) -> GrayImage {
    image::imageops::grayscale(&self.image)
  }

  /// 等比缩放到指定宽度；宽度已相同或为 0 时原样返回
  pub fn resized_to_width(self, width: u32) -> Frame {
    if width == 0 || self.image.width() == width || self.image.width() == 0 {
      return self;
    }
    let scale = width as f32 / self.image.width() as f32;
    let height = ((self.image.height() as f32 * scale).round() as u32).max(1);
    let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
    Frame { image, ..self }
  }
}

/// 将 YUYV (YUV 4:2:2) 数据转换为 RGB
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}
