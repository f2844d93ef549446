// 该文件是 Renshu （人数） 项目的一部分。
// src/geometry.rs - 矩形与 IoU 计算
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

use serde::Serialize;

/// 单帧中的一个检测区域，坐标以像素为单位，(x, y) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 由两个角点构造，角点顺序无关
  pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
    let (x_min, x_max) = (x0.min(x1), x0.max(x1));
    let (y_min, y_max) = (y0.min(y1), y0.max(y1));
    Self::new(x_min, y_min, x_max - x_min, y_max - y_min)
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  pub fn contains(&self, other: &Rect) -> bool {
    self.x <= other.x
      && self.y <= other.y
      && self.right() >= other.right()
      && self.bottom() >= other.bottom()
  }

  /// 包含两个矩形的最小外接矩形
  pub fn union(&self, other: &Rect) -> Rect {
    Rect::from_corners(
      self.x.min(other.x),
      self.y.min(other.y),
      self.right().max(other.right()),
      self.bottom().max(other.bottom()),
    )
  }

  pub fn intersection_area(&self, other: &Rect) -> f32 {
    let w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
    let h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
    w * h
  }
}

impl From<[f32; 4]> for Rect {
  fn from([x, y, width, height]: [f32; 4]) -> Self {
    Rect::new(x, y, width, height)
  }
}

/// 交并比，结果位于 [0, 1]；并集面积为 0 时返回 0
pub fn iou(a: &Rect, b: &Rect) -> f32 {
  let inter = a.intersection_area(b);
  let union = a.area() + b.area() - inter;
  if union > 0.0 { inter / union } else { 0.0 }
}
