// 该文件是 Renshu （人数） 项目的一部分。
// src/speech/worker.rs - 单槽后台语音播报
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

use std::{
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
  thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use super::{Speaker, SpeechError};

#[derive(Default)]
struct Slot {
  pending: Option<String>,
  busy: bool,
  closed: bool,
}

#[derive(Default)]
struct Shared {
  slot: Mutex<Slot>,
  changed: Condvar,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, Slot> {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// 在后台线程中播报，处理循环不会被语音阻塞
///
/// 只有一个待播报槽位：新的播报会替换尚未开始的旧播报，
/// 过时的人数不会堆积。播报失败只记录日志。
/// 释放时关闭槽位并等待正在进行的播报结束，未开始的播报被丢弃。
pub struct SpeechWorker {
  shared: Arc<Shared>,
  handle: Option<JoinHandle<()>>,
}

impl SpeechWorker {
  pub fn spawn<S>(speaker: S) -> Result<Self, SpeechError>
  where
    S: Speaker + Send + 'static,
  {
    let shared = Arc::new(Shared::default());
    let worker_shared = Arc::clone(&shared);
    let handle = thread::Builder::new()
      .name("renshu-speech".to_string())
      .spawn(move || drain(&worker_shared, speaker))
      .map_err(|source| SpeechError::Spawn {
        program: "renshu-speech".to_string(),
        source,
      })?;
    info!("语音后台线程已启动");

    Ok(Self {
      shared,
      handle: Some(handle),
    })
  }

  /// 放入待播报槽位，返回被替换掉的旧播报
  pub fn submit(&self, text: &str) -> Result<Option<String>, SpeechError> {
    let mut slot = self.shared.lock();
    if slot.closed {
      return Err(SpeechError::WorkerStopped);
    }
    let replaced = slot.pending.replace(text.to_string());
    if let Some(stale) = &replaced {
      debug!("丢弃未播报的内容: {}", stale);
    }
    self.shared.changed.notify_all();
    Ok(replaced)
  }

  /// 等待槽位清空且没有正在进行的播报
  pub fn flush(&self) {
    let mut slot = self.shared.lock();
    while (slot.pending.is_some() || slot.busy) && !slot.closed {
      slot = self
        .shared
        .changed
        .wait(slot)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }
}

impl Speaker for SpeechWorker {
  fn speak(&self, text: &str) -> Result<(), SpeechError> {
    self.submit(text).map(|_| ())
  }
}

impl Drop for SpeechWorker {
  fn drop(&mut self) {
    {
      let mut slot = self.shared.lock();
      slot.closed = true;
      slot.pending = None;
      self.shared.changed.notify_all();
    }
    if let Some(handle) = self.handle.take()
      && handle.join().is_err()
    {
      warn!("语音后台线程异常退出");
    }
  }
}

fn drain<S: Speaker>(shared: &Shared, speaker: S) {
  loop {
    let text = {
      let mut slot = shared.lock();
      loop {
        if slot.closed {
          debug!("语音后台线程退出");
          return;
        }
        if let Some(text) = slot.pending.take() {
          slot.busy = true;
          break text;
        }
        slot = shared
          .changed
          .wait(slot)
          .unwrap_or_else(PoisonError::into_inner);
      }
    };

    if let Err(e) = speaker.speak(&text) {
      warn!("语音播报失败: {}，内容: {}", e, text);
    }

    let mut slot = shared.lock();
    slot.busy = false;
    shared.changed.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc::{Receiver, Sender, channel};

  #[derive(Clone, Default)]
  struct Recorder(Arc<Mutex<Vec<String>>>);

  impl Speaker for Recorder {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
      self.0.lock().unwrap().push(text.to_string());
      Ok(())
    }
  }

  /// 开始播报时通知测试，并等待测试放行
  struct Gate {
    started: Mutex<Sender<String>>,
    release: Mutex<Receiver<()>>,
  }

  impl Speaker for Gate {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
      self.started.lock().unwrap().send(text.to_string()).unwrap();
      self.release.lock().unwrap().recv().unwrap();
      Ok(())
    }
  }

  struct Broken;

  impl Speaker for Broken {
    fn speak(&self, _text: &str) -> Result<(), SpeechError> {
      Err(SpeechError::WorkerStopped)
    }
  }

  #[test]
  fn speaks_submitted_text() {
    let recorder = Recorder::default();
    let worker = SpeechWorker::spawn(recorder.clone()).unwrap();
    worker.speak("One person is present in the room.").unwrap();
    worker.flush();
    assert_eq!(
      *recorder.0.lock().unwrap(),
      vec!["One person is present in the room.".to_string()]
    );
  }

  #[test]
  fn pending_announcement_is_replaced_not_queued() {
    let (started_tx, started_rx) = channel();
    let (release_tx, release_rx) = channel();
    let worker = SpeechWorker::spawn(Gate {
      started: Mutex::new(started_tx),
      release: Mutex::new(release_rx),
    })
    .unwrap();

    worker.submit("a").unwrap();
    assert_eq!(started_rx.recv().unwrap(), "a");

    assert_eq!(worker.submit("b").unwrap(), None);
    assert_eq!(worker.submit("c").unwrap(), Some("b".to_string()));

    release_tx.send(()).unwrap();
    assert_eq!(started_rx.recv().unwrap(), "c");
    release_tx.send(()).unwrap();
    worker.flush();
    assert!(started_rx.try_recv().is_err());
  }

  #[test]
  fn failures_do_not_stop_the_worker() {
    let worker = SpeechWorker::spawn(Broken).unwrap();
    worker.speak("first").unwrap();
    worker.flush();
    worker.speak("second").unwrap();
    worker.flush();
  }
}
