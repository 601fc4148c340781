// 该文件是 SSDetect 项目的一部分。
// src/input/prefetch.rs - 预取批数据
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
  sync::mpsc::{self, Receiver},
  thread::{self, JoinHandle},
};

use tracing::{debug, warn};

use super::{Batch, BatchSource, InputError};

pub const DEFAULT_PREFETCH_DEPTH: usize = 1;

/// 在后台线程中准备下一批，与当前批的推理重叠
pub struct Prefetcher {
  shape: [usize; 4],
  receiver: Option<Receiver<Result<Batch, InputError>>>,
  worker: Option<JoinHandle<()>>,
}

impl Prefetcher {
  pub fn new<S: BatchSource + 'static>(source: S) -> Self {
    Self::with_depth(source, DEFAULT_PREFETCH_DEPTH)
  }

  pub fn with_depth<S: BatchSource + 'static>(source: S, depth: usize) -> Self {
    let shape = source.batch_shape();
    let (tx, rx) = mpsc::sync_channel(depth.max(1));

    let worker = thread::spawn(move || {
      for (index, item) in source.enumerate() {
        let failed = item.is_err();
        if tx.send(item).is_err() {
          debug!("预取接收端已关闭，停止于第 {} 批", index);
          break;
        }
        if failed {
          break;
        }
      }
    });

    Prefetcher {
      shape,
      receiver: Some(rx),
      worker: Some(worker),
    }
  }
}

impl Iterator for Prefetcher {
  type Item = Result<Batch, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.receiver.as_ref()?.recv().ok()
  }
}

impl BatchSource for Prefetcher {
  fn batch_shape(&self) -> [usize; 4] {
    self.shape
  }

  fn is_prefetching(&self) -> bool {
    true
  }
}

impl Drop for Prefetcher {
  fn drop(&mut self) {
    // 先关闭接收端，阻塞在发送上的线程才能退出
    drop(self.receiver.take());
    if let Some(worker) = self.worker.take()
      && worker.join().is_err()
    {
      warn!("预取线程异常退出");
    }
  }
}
