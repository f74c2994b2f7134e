// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/model.rs - 检测模型
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

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// 远程检测器：根据图像 URL 与目标描述返回检测框
pub trait Detector {
  fn detect(&self, image_url: &Url, prompt: &str) -> Result<DetectResult, DetectError>;
}

impl<T: Detector + ?Sized> Detector for &T {
  fn detect(&self, image_url: &Url, prompt: &str) -> Result<DetectResult, DetectError> {
    (**self).detect(image_url, prompt)
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("prediction submission failed: {0}")]
  Submission(String),
  #[error("prediction status poll failed: {0}")]
  PollTransport(String),
  #[error("Grounding DINO prediction failed.")]
  DetectionFailed,
  #[error("Grounding DINO prediction still running after {0} polls")]
  DetectionTimeout(u32),
  #[error("malformed prediction payload: {0}")]
  MalformedPayload(String),
}

/// 像素坐标的检测框 [x1, y1, x2, y2]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
  pub x1: i64,
  pub y1: i64,
  pub x2: i64,
  pub y2: i64,
}

impl BoundingBox {
  pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由浮点角点构造，坐标向零截断；非有限值返回 None
  pub fn from_corners(corners: [f64; 4]) -> Option<Self> {
    if corners.iter().any(|c| !c.is_finite()) {
      return None;
    }
    let [x1, y1, x2, y2] = corners.map(|c| c.trunc() as i64);
    Some(Self { x1, y1, x2, y2 })
  }

  pub fn is_degenerate(&self) -> bool {
    self.x1 >= self.x2 || self.y1 >= self.y2
  }

  pub fn fits_within(&self, width: u32, height: u32) -> bool {
    self.x1 >= 0 && self.y1 >= 0 && self.x2 <= width as i64 && self.y2 <= height as i64
  }

  pub fn contains(&self, x: u32, y: u32) -> bool {
    let (x, y) = (x as i64, y as i64);
    x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  boxes: Box<[BoundingBox]>,
}

impl From<Vec<BoundingBox>> for DetectResult {
  fn from(boxes: Vec<BoundingBox>) -> Self {
    Self {
      boxes: boxes.into_boxed_slice(),
    }
  }
}

impl DetectResult {
  pub fn boxes(&self) -> &[BoundingBox] {
    &self.boxes
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }
}

mod grounding_dino;
mod job;
mod poll;
#[cfg(feature = "replicate_predictor")]
mod replicate;

pub use self::grounding_dino::GroundingDino;
pub use self::job::{
  BOX_THRESHOLD, DetectionJob, DetectionRequest, JobCreated, JobState, Prediction, Predictor,
  TEXT_THRESHOLD,
};
pub use self::poll::{FixedInterval, PollSchedule};
#[cfg(feature = "replicate_predictor")]
pub use self::replicate::ReplicatePredictor;
