// 该文件是 Renshu （人数） 项目的一部分。
// src/count.rs - 人数估计与播报去抖
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

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::geometry::Rect;

/// 人脸更适合坐着的人，人体检测更适合站立的人，取两者较大值
pub fn reconcile(face_count: usize, cluster_count: usize) -> usize {
  face_count.max(cluster_count)
}

pub fn announcement_phrase(count: usize) -> String {
  match count {
    0 => "No people detected in the room.".to_string(),
    1 => "One person is present in the room.".to_string(),
    n => format!("{n} people are present in the room."),
  }
}

pub fn overlay_text(count: usize) -> String {
  format!("Estimated people: {count}")
}

/// 单帧的检测与计数结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
  pub index: u64,
  pub faces: Vec<Rect>,
  /// 合并后的人体框
  pub persons: Vec<Rect>,
  pub estimate: usize,
}

impl FrameReport {
  pub fn new(index: u64, faces: Vec<Rect>, persons: Vec<Rect>) -> Self {
    let estimate = reconcile(faces.len(), persons.len());
    Self {
      index,
      faces,
      persons,
      estimate,
    }
  }
}

/// 播报时间策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncePolicy {
  /// 人数变化后两次播报之间的最短间隔
  pub cooldown: Duration,
  /// 人数不变时的周期性播报间隔，`None` 表示只在变化时播报
  pub heartbeat: Option<Duration>,
}

impl Default for AnnouncePolicy {
  fn default() -> Self {
    Self {
      cooldown: Duration::from_secs_f32(1.0),
      heartbeat: Some(Duration::from_secs_f32(5.0)),
    }
  }
}

impl AnnouncePolicy {
  pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
    self.cooldown = cooldown;
    self
  }

  pub fn with_heartbeat(mut self, heartbeat: Option<Duration>) -> Self {
    self.heartbeat = heartbeat;
    self
  }
}

/// 播报去抖状态
///
/// 只保存上一次播报的人数与时间。一旦决定播报就立即更新状态，
/// 后续语音输出是否成功不影响它，因此语音后端持续失败时
/// 也只会按心跳间隔重试，不会每帧都尝试。
#[derive(Debug, Clone, Default)]
pub struct Announcer {
  policy: AnnouncePolicy,
  last_count: Option<usize>,
  last_time: Option<Instant>,
}

impl Announcer {
  pub fn new(policy: AnnouncePolicy) -> Self {
    Self {
      policy,
      last_count: None,
      last_time: None,
    }
  }

  pub fn last_count(&self) -> Option<usize> {
    self.last_count
  }

  pub fn last_time(&self) -> Option<Instant> {
    self.last_time
  }

  /// 判断当前估计值是否需要播报
  pub fn should_announce(&self, estimate: usize, now: Instant) -> bool {
    // 从未播报过时视为已经过去无限长时间
    let Some(last_time) = self.last_time else {
      return true;
    };
    let elapsed = now.saturating_duration_since(last_time);

    let changed = self.last_count != Some(estimate);
    if changed && elapsed > self.policy.cooldown {
      return true;
    }
    self.policy.heartbeat.is_some_and(|hb| elapsed > hb)
  }

  /// 判断并在需要播报时更新状态
  pub fn observe(&mut self, estimate: usize, now: Instant) -> bool {
    let announce = self.should_announce(estimate, now);
    if announce {
      debug!(
        "播报人数 {} (上次: {:?})",
        estimate, self.last_count
      );
      self.last_count = Some(estimate);
      self.last_time = Some(now);
    }
    announce
  }
}
