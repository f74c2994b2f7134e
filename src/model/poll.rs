// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/model/poll.rs - 状态轮询节奏
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

use std::{thread, time::Duration};

use tracing::warn;

use crate::model::DetectError;

pub trait PollSchedule {
  /// 第 `polls` 次查询仍未到达终态后调用，返回前完成等待
  fn wait(&self, polls: u32) -> Result<(), DetectError>;
}

/// 固定间隔阻塞等待，可选最大查询次数
#[derive(Debug, Clone)]
pub struct FixedInterval {
  interval: Duration,
  max_polls: Option<u32>,
}

impl Default for FixedInterval {
  fn default() -> Self {
    Self::new(Self::DEFAULT_INTERVAL)
  }
}

impl FixedInterval {
  pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      max_polls: None,
    }
  }

  pub fn with_max_polls(mut self, max_polls: Option<u32>) -> Self {
    self.max_polls = max_polls;
    self
  }
}

impl PollSchedule for FixedInterval {
  fn wait(&self, polls: u32) -> Result<(), DetectError> {
    if let Some(max_polls) = self.max_polls
      && polls >= max_polls
    {
      warn!("已查询 {} 次仍未完成，放弃等待", polls);
      return Err(DetectError::DetectionTimeout(polls));
    }
    thread::sleep(self.interval);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unbounded_by_default() {
    let schedule = FixedInterval::new(Duration::ZERO);
    assert!(schedule.wait(1).is_ok());
    assert!(schedule.wait(100_000).is_ok());
  }

  #[test]
  fn cap_raises_timeout() {
    let schedule = FixedInterval::new(Duration::ZERO).with_max_polls(Some(3));
    assert!(schedule.wait(2).is_ok());
    assert!(matches!(
      schedule.wait(3),
      Err(DetectError::DetectionTimeout(3))
    ));
  }

  #[test]
  fn default_interval_is_two_seconds() {
    assert_eq!(FixedInterval::default().interval, Duration::from_secs(2));
  }
}
