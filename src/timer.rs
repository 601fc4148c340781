// 该文件是 SSDetect 项目的一部分。
// src/timer.rs - 检测计时
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

use tracing::debug;

/// 低于该阈值的分段不输出
const LAP_REPORT_THRESHOLD: Duration = Duration::from_micros(500);

/// 单次检测调用内的计时器，每次调用各自创建
#[derive(Debug)]
pub struct DetectTimer {
  started: Instant,
  last_mark: Instant,
  laps: Vec<(String, Duration)>,
}

impl Default for DetectTimer {
  fn default() -> Self {
    Self::new()
  }
}

impl DetectTimer {
  pub fn new() -> Self {
    let now = Instant::now();
    Self {
      started: now,
      last_mark: now,
      laps: Vec::new(),
    }
  }

  /// 记录自上一次标记以来的耗时
  pub fn lap(&mut self, name: impl Into<String>) -> Duration {
    let now = Instant::now();
    let elapsed = now - self.last_mark;
    self.last_mark = now;
    self.laps.push((name.into(), elapsed));
    elapsed
  }

  pub fn elapsed(&self) -> Duration {
    self.started.elapsed()
  }

  pub fn laps(&self) -> &[(String, Duration)] {
    &self.laps
  }

  pub fn report(&self) {
    for (name, elapsed) in self.laps.iter() {
      if *elapsed > LAP_REPORT_THRESHOLD {
        debug!("{} 耗时 {:.1}ms", name, elapsed.as_secs_f64() * 1000.0);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn laps_are_recorded_in_order() {
    let mut timer = DetectTimer::new();
    timer.lap("batch 0");
    std::thread::sleep(Duration::from_millis(2));
    let second = timer.lap("batch 1");

    let names: Vec<&str> = timer.laps().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["batch 0", "batch 1"]);
    assert!(second >= Duration::from_millis(2));
    assert!(timer.elapsed() >= second);
  }

  #[test]
  fn separate_timers_do_not_share_state() {
    let mut a = DetectTimer::new();
    a.lap("a");
    let b = DetectTimer::new();
    assert!(b.laps().is_empty());
    assert_eq!(a.laps().len(), 1);
  }
}
