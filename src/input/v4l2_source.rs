// 该文件是 Renshu （人数） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
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

use std::pin::Pin;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, yuyv_to_rgb},
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2InputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无法打开设备 {device}: {source}")]
  OpenDevice {
    device: String,
    source: std::io::Error,
  },
  #[error("V4L2 错误: {0}")]
  V4l(#[from] std::io::Error),
  #[error("设备不支持 YUYV 格式，实际格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("无效的参数 {0}={1}")]
  InvalidParameter(String, String),
  #[error("帧数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

/// V4L2 摄像头输入源
///
/// 捕获流需要引用设备，设备放在 `Pin<Box>` 中保证地址稳定。
/// 设备在创建时打开一次，读取失败后流即结束，不做重连。
pub struct V4l2Input {
  device: Pin<Box<Device>>,
  stream: Option<Stream<'static>>,
  frame_index: u64,
  width: u32,
  height: u32,
  start_time: Instant,
}

impl FromUrlWithScheme for V4l2Input {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4l2Input {
  type Error = V4l2InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4l2InputError::SchemeMismatch);
    }

    // v4l:///dev/video0?width=640&height=480
    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };

    let mut width = DEFAULT_WIDTH;
    let mut height = DEFAULT_HEIGHT;
    for (k, v) in url.query_pairs() {
      let parse = |v: &str| {
        v.parse::<u32>()
          .map_err(|_| V4l2InputError::InvalidParameter(k.to_string(), v.to_string()))
      };
      match k.as_ref() {
        "width" => width = parse(v.as_ref())?,
        "height" => height = parse(v.as_ref())?,
        _ => {}
      }
    }

    Self::open(&device_path, width, height)
  }
}

impl V4l2Input {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, V4l2InputError> {
    let device = Box::pin(Device::with_path(device_path).map_err(|source| {
      V4l2InputError::OpenDevice {
        device: device_path.to_string(),
        source,
      }
    })?);

    let mut format = device.format()?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;
    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4l2InputError::UnsupportedPixelFormat(
        format.fourcc.to_string(),
      ));
    }
    info!(
      "摄像头已打开: {} {}x{}",
      device_path, format.width, format.height
    );

    let mut source = Self {
      device,
      stream: None,
      frame_index: 0,
      width: format.width,
      height: format.height,
      start_time: Instant::now(),
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上不会移动；stream 与 device 存放在
    // 同一个结构体中，并在 Drop 中先于 device 释放
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, BUFFER_COUNT)?
    };

    source.stream = Some(stream);
    Ok(source)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  fn capture(&mut self) -> Option<Result<Frame, V4l2InputError>> {
    let stream = self.stream.as_mut()?;

    let rgb = match stream.next() {
      Ok((buffer, _meta)) => yuyv_to_rgb(buffer, self.width, self.height),
      Err(e) => return Some(Err(V4l2InputError::V4l(e))),
    };

    let expected = (self.width * self.height * 3) as usize;
    let actual = rgb.len();
    let Some(image) = RgbImage::from_raw(self.width, self.height, rgb) else {
      return Some(Err(V4l2InputError::BufferSizeMismatch { expected, actual }));
    };

    let frame = Frame::new(image, self.frame_index, self.start_time.elapsed());
    self.frame_index += 1;
    Some(Ok(frame))
  }
}

impl Drop for V4l2Input {
  fn drop(&mut self) {
    // stream 必须先于 device 释放
    self.stream.take();
  }
}

impl Iterator for V4l2Input {
  type Item = Result<Frame, V4l2InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let result = self.capture()?;
    if result.is_err() {
      // 摄像头读取失败视为终止，关闭流
      self.stream.take();
    }
    Some(result)
  }
}
