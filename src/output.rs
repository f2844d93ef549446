// 该文件是 Renshu （人数） 项目的一部分。
// src/output.rs - 输出定义
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
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, count::FrameReport, frame::Frame};

/// 显示面：接收带检测结果的帧并展示
pub trait Render<Frame, Output> {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

impl<F, O, R: Render<F, O> + ?Sized> Render<F, O> for Box<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &O) -> Result<(), Self::Error> {
    (**self).render_result(frame, result)
  }
}

#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 只把每帧的计数写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(LogOutput)
  }
}

impl Render<Frame, FrameReport> for LogOutput {
  type Error = std::convert::Infallible;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    info!(
      "帧 {} ({:.2?}): 人脸 {}, 人体 {}, 估计人数 {}",
      frame.index,
      frame.timestamp,
      result.faces.len(),
      result.persons.len(),
      result.estimate
    );
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Log(LogOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<Frame, FrameReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output
        .render_result(frame, result)
        .map_err(|never| match never {}),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_output_checks_scheme() {
    assert!(LogOutput::from_url(&Url::parse("log://").unwrap()).is_ok());
    assert!(matches!(
      LogOutput::from_url(&Url::parse("image:///tmp/out.png").unwrap()),
      Err(OutputError::SchemeMismatch(s)) if s == "image"
    ));
  }

  #[test]
  fn log_output_from_url() {
    let url = Url::parse("log://").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::Log(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("window://main").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(s)) if s == "window"
    ));
  }
}
