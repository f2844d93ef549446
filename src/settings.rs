// 该文件是 Renshu （人数） 项目的一部分。
// src/settings.rs - 计数参数
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

use thiserror::Error;

use crate::{count::AnnouncePolicy, merge::MergeStrategy};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.4;
pub const DEFAULT_RESIZE_WIDTH: u32 = 640;

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
  #[error("IoU 阈值必须在 (0, 1] 区间内，实际为 {0}")]
  InvalidThreshold(f32),
  #[error("无效的时间间隔: {0} 秒")]
  InvalidDuration(f32),
  #[error("冷却时间 {cooldown:?} 不应大于心跳间隔 {heartbeat:?}")]
  CooldownExceedsHeartbeat {
    cooldown: Duration,
    heartbeat: Duration,
  },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountSettings {
  /// 人体框合并的 IoU 阈值，严格大于该值才合并
  pub iou_threshold: f32,
  pub merge_strategy: MergeStrategy,
  pub announce: AnnouncePolicy,
  /// 检测前将帧缩放到的宽度，0 表示不缩放
  pub resize_width: u32,
}

impl Default for CountSettings {
  fn default() -> Self {
    Self {
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      merge_strategy: MergeStrategy::default(),
      announce: AnnouncePolicy::default(),
      resize_width: DEFAULT_RESIZE_WIDTH,
    }
  }
}

impl CountSettings {
  pub fn validate(self) -> Result<Self, SettingsError> {
    if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
      return Err(SettingsError::InvalidThreshold(self.iou_threshold));
    }
    if let Some(heartbeat) = self.announce.heartbeat
      && self.announce.cooldown > heartbeat
    {
      return Err(SettingsError::CooldownExceedsHeartbeat {
        cooldown: self.announce.cooldown,
        heartbeat,
      });
    }
    Ok(self)
  }
}

/// 秒数转换为时间间隔，拒绝负数与非有限值
pub fn seconds(value: f32) -> Result<Duration, SettingsError> {
  Duration::try_from_secs_f32(value).map_err(|_| SettingsError::InvalidDuration(value))
}

/// 心跳间隔，0 表示关闭
pub fn heartbeat_seconds(value: f32) -> Result<Option<Duration>, SettingsError> {
  let duration = seconds(value)?;
  Ok((!duration.is_zero()).then_some(duration))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let settings = CountSettings::default().validate().unwrap();
    assert_eq!(settings.iou_threshold, 0.4);
    assert_eq!(settings.resize_width, 640);
  }

  #[test]
  fn threshold_must_be_in_range() {
    for bad in [0.0, -0.1, 1.5, f32::NAN] {
      let settings = CountSettings {
        iou_threshold: bad,
        ..Default::default()
      };
      assert!(settings.validate().is_err());
    }
    let settings = CountSettings {
      iou_threshold: 1.0,
      ..Default::default()
    };
    assert!(settings.validate().is_ok());
  }

  #[test]
  fn cooldown_longer_than_heartbeat_is_rejected() {
    let settings = CountSettings {
      announce: AnnouncePolicy::default()
        .with_cooldown(Duration::from_secs(10))
        .with_heartbeat(Some(Duration::from_secs(5))),
      ..Default::default()
    };
    assert!(matches!(
      settings.validate(),
      Err(SettingsError::CooldownExceedsHeartbeat { .. })
    ));
  }

  #[test]
  fn parses_seconds() {
    assert_eq!(seconds(0.8).unwrap(), Duration::from_secs_f32(0.8));
    assert!(seconds(-1.0).is_err());
    assert_eq!(heartbeat_seconds(0.0).unwrap(), None);
    assert_eq!(heartbeat_seconds(5.0).unwrap(), Some(Duration::from_secs(5)));
  }
}
