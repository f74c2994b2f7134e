// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/model/job.rs - 远程检测任务
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

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::model::{BoundingBox, DetectError};

pub const BOX_THRESHOLD: f32 = 0.5;
pub const TEXT_THRESHOLD: f32 = 0.4;

/// 远程预测服务：提交任务与查询状态
pub trait Predictor {
  fn submit(&self, request: &DetectionRequest) -> Result<DetectionJob, DetectError>;
  fn fetch_status(&self, job: &DetectionJob) -> Result<Prediction, DetectError>;
}

impl<T: Predictor + ?Sized> Predictor for &T {
  fn submit(&self, request: &DetectionRequest) -> Result<DetectionJob, DetectError> {
    (**self).submit(request)
  }

  fn fetch_status(&self, job: &DetectionJob) -> Result<Prediction, DetectError> {
    (**self).fetch_status(job)
  }
}

/// 提交给预测服务的 `input` 对象，提交后不可修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRequest {
  #[serde(rename = "image")]
  image_url: Url,
  #[serde(rename = "query")]
  prompt: String,
  box_threshold: f32,
  text_threshold: f32,
}

impl DetectionRequest {
  /// 阈值固定，调用方不可调整
  pub fn new(image_url: Url, prompt: String) -> Self {
    Self {
      image_url,
      prompt,
      box_threshold: BOX_THRESHOLD,
      text_threshold: TEXT_THRESHOLD,
    }
  }

  pub fn image_url(&self) -> &Url {
    &self.image_url
  }

  pub fn prompt(&self) -> &str {
    &self.prompt
  }

  pub fn box_threshold(&self) -> f32 {
    self.box_threshold
  }

  pub fn text_threshold(&self) -> f32 {
    self.text_threshold
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
  Queued,
  Running,
  Succeeded,
  Failed,
}

impl JobState {
  /// 远程状态字符串映射；未知状态视为仍在运行
  pub fn from_remote(status: &str) -> Self {
    match status {
      "starting" => JobState::Queued,
      "processing" => JobState::Running,
      "succeeded" => JobState::Succeeded,
      "failed" | "canceled" => JobState::Failed,
      _ => JobState::Running,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, JobState::Succeeded | JobState::Failed)
  }
}

/// 任务创建响应
#[derive(Debug, Deserialize)]
pub struct JobCreated {
  #[serde(default)]
  id: Option<String>,
  #[serde(default)]
  urls: Option<JobUrls>,
}

#[derive(Debug, Deserialize)]
struct JobUrls {
  #[serde(default)]
  get: Option<Url>,
}

impl JobCreated {
  pub fn into_job(self) -> Result<DetectionJob, DetectError> {
    let status_url = self
      .urls
      .and_then(|urls| urls.get)
      .ok_or_else(|| DetectError::Submission("job payload has no status reference".to_string()))?;
    let id = self.id.unwrap_or_else(|| status_url.to_string());
    Ok(DetectionJob::new(id, status_url))
  }
}

/// 状态查询响应
///
/// `output` 保持原样，只有任务成功后才解析其中的检测框。
#[derive(Debug, Deserialize)]
pub struct Prediction {
  status: String,
  #[serde(default)]
  output: Option<serde_json::Value>,
  #[serde(default)]
  error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionOutput {
  #[serde(default)]
  detections: Vec<serde_json::Value>,
}

// 只有 bbox 参与计算，其余字段仅用于日志
#[derive(Debug, Deserialize)]
struct Detection {
  #[serde(default)]
  bbox: Option<serde_json::Value>,
  #[serde(default)]
  label: Option<serde_json::Value>,
  #[serde(default)]
  confidence: Option<serde_json::Value>,
}

impl Detection {
  fn bounding_box(&self) -> Option<BoundingBox> {
    let corners = self.bbox.clone()?;
    let corners: [f64; 4] = serde_json::from_value(corners).ok()?;
    BoundingBox::from_corners(corners)
  }
}

impl Prediction {
  pub fn parse(body: &str) -> Result<Self, DetectError> {
    serde_json::from_str(body).map_err(|e| DetectError::MalformedPayload(e.to_string()))
  }

  pub fn state(&self) -> JobState {
    JobState::from_remote(&self.status)
  }

  pub fn error(&self) -> Option<&serde_json::Value> {
    self.error.as_ref()
  }

  /// 提取检测框，缺少合法检测框的条目被跳过；任务未成功时为空
  pub fn bounding_boxes(&self) -> Vec<BoundingBox> {
    if self.state() != JobState::Succeeded {
      return Vec::new();
    }
    let Some(output) = &self.output else {
      return Vec::new();
    };
    let output = match PredictionOutput::deserialize(output) {
      Ok(output) => output,
      Err(e) => {
        debug!("输出中没有可用的检测列表: {}", e);
        return Vec::new();
      }
    };
    output
      .detections
      .iter()
      .filter_map(|value| {
        let Ok(detection) = Detection::deserialize(value) else {
          debug!("跳过无法解析的条目: {}", value);
          return None;
        };
        let bbox = detection.bounding_box();
        if bbox.is_none() {
          debug!("跳过无检测框的条目: {:?}", detection.label);
        } else {
          debug!(
            "检测到 {:?} ({:?}): {:?}",
            detection.label, detection.confidence, bbox
          );
        }
        bbox
      })
      .collect()
  }
}

/// 远程检测任务，只通过状态查询推进
#[derive(Debug, Clone)]
pub struct DetectionJob {
  id: String,
  status_url: Url,
  state: JobState,
  result: Option<Vec<BoundingBox>>,
}

impl DetectionJob {
  pub fn new(id: String, status_url: Url) -> Self {
    Self {
      id,
      status_url,
      state: JobState::Queued,
      result: None,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn status_url(&self) -> &Url {
    &self.status_url
  }

  pub fn state(&self) -> JobState {
    self.state
  }

  /// 应用一次状态查询结果；终态之后不再改变
  pub fn update(&mut self, prediction: &Prediction) -> JobState {
    if self.state.is_terminal() {
      return self.state;
    }
    self.state = prediction.state();
    if self.state == JobState::Succeeded {
      self.result = Some(prediction.bounding_boxes());
    }
    self.state
  }

  /// 取出检测结果，只能取一次
  pub fn take_result(&mut self) -> Option<Vec<BoundingBox>> {
    self.result.take()
  }
}
