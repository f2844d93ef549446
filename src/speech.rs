// 该文件是 Renshu （人数） 项目的一部分。
// src/speech.rs - 语音播报输出
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

use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod worker;
pub use self::worker::SpeechWorker;

#[derive(Error, Debug)]
pub enum SpeechError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("缺少语音程序名称")]
  MissingProgram,
  #[error("无法启动语音程序 {program}: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("语音程序 {program} 退出状态异常: {status}")]
  Failed {
    program: String,
    status: std::process::ExitStatus,
  },
  #[error("语音后台线程已停止")]
  WorkerStopped,
}

/// 语音输出：给定文本，最终产生可听见的输出
pub trait Speaker {
  fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

impl<S: Speaker + ?Sized> Speaker for Box<S> {
  fn speak(&self, text: &str) -> Result<(), SpeechError> {
    (**self).speak(text)
  }
}

/// 只把播报内容写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl FromUrlWithScheme for LogSpeaker {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogSpeaker {
  type Error = SpeechError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SpeechError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(LogSpeaker)
  }
}

impl Speaker for LogSpeaker {
  fn speak(&self, text: &str) -> Result<(), SpeechError> {
    info!("播报: {}", text);
    Ok(())
  }
}

/// 调用外部语音程序（espeak、say 等），文本作为最后一个参数，阻塞到程序退出
///
/// `command://espeak?rate=150` 展开为 `espeak -s 150 <text>`；
/// `command://say` 展开为 `say <text>`；`arg=` 可重复追加原样参数。
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
  program: String,
  args: Vec<String>,
}

impl FromUrlWithScheme for CommandSpeaker {
  const SCHEME: &'static str = "command";
}

impl FromUrl for CommandSpeaker {
  type Error = SpeechError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SpeechError::SchemeMismatch(url.scheme().to_string()));
    }

    let program = match url.host_str() {
      Some(host) if !host.is_empty() => host.to_string(),
      _ => url.path().to_string(),
    };
    if program.is_empty() || program == "/" {
      return Err(SpeechError::MissingProgram);
    }

    let mut args = Vec::new();
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        // espeak 与 say 的语速参数不同
        "rate" if program == "say" => args.extend(["-r".to_string(), v.to_string()]),
        "rate" => args.extend(["-s".to_string(), v.to_string()]),
        "arg" => args.push(v.to_string()),
        _ => {}
      }
    }

    Ok(Self::new(program, args))
  }
}

impl CommandSpeaker {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn args(&self) -> &[String] {
    &self.args
  }
}

impl Speaker for CommandSpeaker {
  fn speak(&self, text: &str) -> Result<(), SpeechError> {
    debug!("执行 {} {:?} {:?}", self.program, self.args, text);
    let status = Command::new(&self.program)
      .args(&self.args)
      .arg(text)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .status()
      .map_err(|source| SpeechError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    if status.success() {
      Ok(())
    } else {
      Err(SpeechError::Failed {
        program: self.program.clone(),
        status,
      })
    }
  }
}

pub enum SpeakerWrapper {
  Log(LogSpeaker),
  Command(CommandSpeaker),
}

impl FromUrl for SpeakerWrapper {
  type Error = SpeechError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogSpeaker::SCHEME => Ok(SpeakerWrapper::Log(LogSpeaker::from_url(url)?)),
      CommandSpeaker::SCHEME => Ok(SpeakerWrapper::Command(CommandSpeaker::from_url(url)?)),
      other => Err(SpeechError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Speaker for SpeakerWrapper {
  fn speak(&self, text: &str) -> Result<(), SpeechError> {
    match self {
      SpeakerWrapper::Log(speaker) => speaker.speak(text),
      SpeakerWrapper::Command(speaker) => speaker.speak(text),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_speaker_checks_scheme() {
    assert!(LogSpeaker::from_url(&Url::parse("log://").unwrap()).is_ok());
    assert!(matches!(
      LogSpeaker::from_url(&Url::parse("command://espeak").unwrap()),
      Err(SpeechError::SchemeMismatch(s)) if s == "command"
    ));
    assert!(matches!(
      SpeakerWrapper::from_url(&Url::parse("log://").unwrap()),
      Ok(SpeakerWrapper::Log(_))
    ));
  }

  #[test]
  fn parses_espeak_url() {
    let url = Url::parse("command://espeak?rate=150&arg=-v&arg=en").unwrap();
    let speaker = CommandSpeaker::from_url(&url).unwrap();
    assert_eq!(speaker.program(), "espeak");
    assert_eq!(speaker.args(), ["-s", "150", "-v", "en"]);
  }

  #[test]
  fn parses_say_rate() {
    let url = Url::parse("command://say?rate=180").unwrap();
    let speaker = CommandSpeaker::from_url(&url).unwrap();
    assert_eq!(speaker.args(), ["-r", "180"]);
  }

  #[test]
  fn program_may_be_an_absolute_path() {
    let url = Url::parse("command:///usr/bin/espeak-ng").unwrap();
    let speaker = CommandSpeaker::from_url(&url).unwrap();
    assert_eq!(speaker.program(), "/usr/bin/espeak-ng");
  }

  #[test]
  fn missing_program_is_an_error() {
    let url = Url::parse("command://").unwrap();
    assert!(matches!(
      CommandSpeaker::from_url(&url),
      Err(SpeechError::MissingProgram)
    ));
  }

  #[test]
  fn spawn_failure_is_reported() {
    let speaker = CommandSpeaker::new("renshu-no-such-speech-program", Vec::new());
    assert!(matches!(
      speaker.speak("hello"),
      Err(SpeechError::Spawn { .. })
    ));
  }

  #[test]
  fn log_speaker_never_fails() {
    let url = Url::parse("log://").unwrap();
    let speaker = SpeakerWrapper::from_url(&url).unwrap();
    assert!(speaker.speak("One person is present in the room.").is_ok());
  }
}
