// 该文件是 Renshu （人数） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use thiserror::Error;
use url::Url;

use crate::{count::FrameReport, count::overlay_text, geometry::Rect};

const PERSON_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const FACE_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BANNER_COLOR: [u8; 3] = [255, 255, 0]; // 黄色
const BOX_THICKNESS: u32 = 2;
const TAG_FONT_SIZE: f32 = 16.0;
const BANNER_FONT_SIZE: f32 = 24.0;
const TAG_OFFSET: i32 = 18;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 在帧上绘制人体框（绿色）、人脸框（蓝色）以及人数横幅
///
/// 没有字体时只绘制边框，不绘制文字。
#[derive(Default)]
pub struct Draw {
  font: Option<FontVec>,
}

impl Draw {
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)?;
    Ok(Self { font: Some(font) })
  }

  /// 读取输出 URL 中的 `font=` 参数
  pub fn from_url_query(url: &Url) -> Result<Self, DrawError> {
    match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => Self::with_font_file(path.as_ref()),
      None => Ok(Self::default()),
    }
  }

  pub fn draw_report(&self, image: &mut RgbImage, report: &FrameReport) {
    for rect in &report.persons {
      self.draw_box(image, rect, PERSON_COLOR, "Person");
    }
    for rect in &report.faces {
      self.draw_box(image, rect, FACE_COLOR, "Face");
    }

    if let Some(font) = &self.font {
      let y = image.height() as i32 - BANNER_FONT_SIZE as i32 - 10;
      draw_text_mut(
        image,
        Rgb(BANNER_COLOR),
        10,
        y.max(0),
        PxScale::from(BANNER_FONT_SIZE),
        font,
        &overlay_text(report.estimate),
      );
    }
  }

  pub fn draw_frame(&self, image: &RgbImage, report: &FrameReport) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_report(&mut canvas, report);
    canvas
  }

  fn draw_box(&self, image: &mut RgbImage, rect: &Rect, color: [u8; 3], tag: &str) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (rect.x.floor() as i32).clamp(0, w - 1);
    let y_min = (rect.y.floor() as i32).clamp(0, h - 1);
    let x_max = (rect.right().ceil() as i32).clamp(0, w - 1);
    let y_max = (rect.bottom().ceil() as i32).clamp(0, h - 1);

    for t in 0..BOX_THICKNESS as i32 {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let inner = imageproc::rect::Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, inner, Rgb(color));
    }

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(color),
        x_min,
        (y_min - TAG_OFFSET).max(0),
        PxScale::from(TAG_FONT_SIZE),
        font,
        tag,
      );
    }
  }
}
