// 该文件是 Renshu （人数） 项目的一部分。
// src/input.rs - 视频/图像输入
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

//! 输入源统一产生 `Result<Frame, InputError>`：`None` 表示正常结束，
//! `Some(Err(_))` 表示读取失败，调用方应当结束处理循环。

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod image_folder;
mod read_image_file;
pub use self::image_folder::{ImageFolderInput, ImageFolderInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "v4l_input")]
mod v4l2_source;
#[cfg(feature = "v4l_input")]
pub use self::v4l2_source::{V4l2Input, V4l2InputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("图像目录输入错误: {0}")]
  ImageFolderInputError(#[from] ImageFolderInputError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L2 输入错误: {0}")]
  V4l2InputError(#[from] V4l2InputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageFolder(ImageFolderInput),
  #[cfg(feature = "v4l_input")]
  V4l2(V4l2Input),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      ImageFolderInput::SCHEME => Ok(InputWrapper::ImageFolder(ImageFolderInput::from_url(url)?)),
      #[cfg(feature = "v4l_input")]
      V4l2Input::SCHEME => Ok(InputWrapper::V4l2(V4l2Input::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next().map(|r| r.map_err(InputError::from)),
      InputWrapper::ImageFolder(input) => input.next().map(|r| r.map_err(InputError::from)),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2(input) => input.next().map(|r| r.map_err(InputError::from)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(s)) if s == "rtsp"
    ));
  }
}
