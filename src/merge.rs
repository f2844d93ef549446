// 该文件是 Renshu （人数） 项目的一部分。
// src/merge.rs - 重叠检测框合并
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

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::geometry::{Rect, iou};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的合并策略: {0}（可选: greedy, connected）")]
pub struct ParseMergeStrategyError(String);

/// 合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
  /// 贪心聚类，结果依赖输入顺序
  #[default]
  Greedy,
  /// 重叠图上的连通分量，结果与输入顺序无关
  Connected,
}

impl MergeStrategy {
  pub fn merge(self, boxes: &[Rect], threshold: f32) -> Vec<Rect> {
    match self {
      MergeStrategy::Greedy => merge_boxes(boxes, threshold),
      MergeStrategy::Connected => merge_connected(boxes, threshold),
    }
  }
}

impl FromStr for MergeStrategy {
  type Err = ParseMergeStrategyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "greedy" => Ok(MergeStrategy::Greedy),
      "connected" => Ok(MergeStrategy::Connected),
      other => Err(ParseMergeStrategyError(other.to_string())),
    }
  }
}

impl fmt::Display for MergeStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MergeStrategy::Greedy => f.write_str("greedy"),
      MergeStrategy::Connected => f.write_str("connected"),
    }
  }
}

/// 贪心合并：依次取出剩余列表的第一个框作为基准。每轮扫描都与本轮开始时
/// 的基准比较，收集 IoU 超过阈值的框，扫描结束后再并入基准，
/// 然后用更新后的基准重新扫描，直到一轮扫描不再吸收任何框。
///
/// 结果依赖输入顺序：A、B 各自与 C 重叠而彼此不重叠时，
/// 是否落入同一簇取决于谁先被取出。
pub fn merge_boxes(boxes: &[Rect], threshold: f32) -> Vec<Rect> {
  let mut remaining: Vec<Rect> = boxes.to_vec();
  let mut merged = Vec::with_capacity(remaining.len());

  while !remaining.is_empty() {
    let mut base = remaining.remove(0);
    loop {
      let (absorbed, rest): (Vec<Rect>, Vec<Rect>) = remaining
        .into_iter()
        .partition(|rect| iou(&base, rect) > threshold);
      remaining = rest;
      if absorbed.is_empty() {
        break;
      }
      base = absorbed.iter().fold(base, |acc, rect| acc.union(rect));
    }
    merged.push(base);
  }

  merged
}

/// 连通分量合并：任意两个输入框 IoU 超过阈值即连边，每个连通分量输出
/// 一个外接矩形，按分量中最小的输入下标排序。
pub fn merge_connected(boxes: &[Rect], threshold: f32) -> Vec<Rect> {
  let mut sets = DisjointSet::new(boxes.len());
  for i in 0..boxes.len() {
    for j in (i + 1)..boxes.len() {
      if iou(&boxes[i], &boxes[j]) > threshold {
        sets.union(i, j);
      }
    }
  }

  // 根节点 -> 输出位置
  let mut slots: Vec<Option<usize>> = vec![None; boxes.len()];
  let mut merged: Vec<Rect> = Vec::new();
  for (i, rect) in boxes.iter().enumerate() {
    let root = sets.find(i);
    match slots[root] {
      Some(slot) => merged[slot] = merged[slot].union(rect),
      None => {
        slots[root] = Some(merged.len());
        merged.push(*rect);
      }
    }
  }
  merged
}

struct DisjointSet {
  parent: Vec<usize>,
  rank: Vec<u8>,
}

impl DisjointSet {
  fn new(n: usize) -> Self {
    Self {
      parent: (0..n).collect(),
      rank: vec![0; n],
    }
  }

  fn find(&mut self, mut x: usize) -> usize {
    while self.parent[x] != x {
      self.parent[x] = self.parent[self.parent[x]];
      x = self.parent[x];
    }
    x
  }

  fn union(&mut self, a: usize, b: usize) {
    let (ra, rb) = (self.find(a), self.find(b));
    if ra == rb {
      return;
    }
    match self.rank[ra].cmp(&self.rank[rb]) {
      std::cmp::Ordering::Less => self.parent[ra] = rb,
      std::cmp::Ordering::Greater => self.parent[rb] = ra,
      std::cmp::Ordering::Equal => {
        self.parent[rb] = ra;
        self.rank[ra] += 1;
      }
    }
  }
}
