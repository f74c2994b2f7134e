// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/model/grounding_dino.rs - Grounding DINO 远程检测
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

use tracing::{debug, info, warn};
use url::Url;

use crate::{
  model::{
    DetectError, DetectResult, DetectionRequest, Detector, FixedInterval, JobState, PollSchedule,
    Predictor,
  },
  prompt::expand,
};

/// 通过异步预测服务运行 Grounding DINO
///
/// 提交任务后按 `PollSchedule` 阻塞轮询，直到任务成功或失败。
/// 单次查询的传输错误立即返回，不做重试。
pub struct GroundingDino<P, S = FixedInterval> {
  predictor: P,
  schedule: S,
}

impl<P: Predictor> GroundingDino<P> {
  pub fn new(predictor: P) -> Self {
    Self {
      predictor,
      schedule: FixedInterval::default(),
    }
  }
}

impl<P: Predictor, S: PollSchedule> GroundingDino<P, S> {
  pub fn with_schedule<T: PollSchedule>(self, schedule: T) -> GroundingDino<P, T> {
    GroundingDino {
      predictor: self.predictor,
      schedule,
    }
  }
}

impl<P: Predictor, S: PollSchedule> Detector for GroundingDino<P, S> {
  fn detect(&self, image_url: &Url, prompt: &str) -> Result<DetectResult, DetectError> {
    let query = expand(prompt);
    info!("使用提示词: '{}'", query);

    let request = DetectionRequest::new(image_url.clone(), query);
    let mut job = self.predictor.submit(&request)?;
    info!("检测任务已提交: {}", job.id());

    let mut polls = 0u32;
    loop {
      let prediction = self.predictor.fetch_status(&job)?;
      polls += 1;
      match job.update(&prediction) {
        JobState::Succeeded => break,
        JobState::Failed => {
          warn!("检测任务 {} 失败: {:?}", job.id(), prediction.error());
          return Err(DetectError::DetectionFailed);
        }
        state => debug!("检测任务 {} 状态: {:?}", job.id(), state),
      }
      self.schedule.wait(polls)?;
    }

    let boxes = job.take_result().unwrap_or_default();
    info!("检测任务 {} 完成，共 {} 个检测框", job.id(), boxes.len());
    Ok(DetectResult::from(boxes))
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, collections::VecDeque, time::Duration};

  use super::*;
  use crate::model::{BoundingBox, DetectionJob, Prediction};

  /// 按脚本返回状态的预测服务
  struct Scripted {
    statuses: RefCell<VecDeque<Result<&'static str, DetectError>>>,
    submitted: RefCell<Vec<DetectionRequest>>,
    polls: RefCell<u32>,
  }

  impl Scripted {
    fn new(statuses: Vec<Result<&'static str, DetectError>>) -> Self {
      Self {
        statuses: RefCell::new(statuses.into()),
        submitted: RefCell::new(Vec::new()),
        polls: RefCell::new(0),
      }
    }
  }

  impl Predictor for Scripted {
    fn submit(&self, request: &DetectionRequest) -> Result<DetectionJob, DetectError> {
      self.submitted.borrow_mut().push(request.clone());
      Ok(DetectionJob::new(
        "job-1".to_string(),
        Url::parse("https://predictor.test/p/job-1").unwrap(),
      ))
    }

    fn fetch_status(&self, _job: &DetectionJob) -> Result<Prediction, DetectError> {
      *self.polls.borrow_mut() += 1;
      let next = self
        .statuses
        .borrow_mut()
        .pop_front()
        .expect("script exhausted");
      next.and_then(Prediction::parse)
    }
  }

  fn detector(predictor: &Scripted) -> GroundingDino<&Scripted> {
    GroundingDino::new(predictor).with_schedule(FixedInterval::new(Duration::ZERO))
  }

  fn image_url() -> Url {
    Url::parse("https://i.ibb.co/x/dog.jpg").unwrap()
  }

  #[test]
  fn polls_until_succeeded() {
    let predictor = Scripted::new(vec![
      Ok(r#"{"status": "starting"}"#),
      Ok(r#"{"status": "processing"}"#),
      Ok(r#"{"status": "succeeded", "output": {"detections": [{"bbox": [100, 100, 300, 300]}]}}"#),
    ]);
    let result = detector(&predictor).detect(&image_url(), "dog").unwrap();
    assert_eq!(result.boxes(), &[BoundingBox::new(100, 100, 300, 300)]);
    assert_eq!(*predictor.polls.borrow(), 3);
  }

  #[test]
  fn submits_expanded_prompt_with_fixed_thresholds() {
    let predictor = Scripted::new(vec![Ok(r#"{"status": "succeeded"}"#)]);
    let result = detector(&predictor).detect(&image_url(), "cat").unwrap();
    assert!(result.is_empty());

    let submitted = predictor.submitted.borrow();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].prompt(), expand("cat"));
    assert_eq!(submitted[0].image_url(), &image_url());
    assert_eq!(submitted[0].box_threshold(), 0.5);
    assert_eq!(submitted[0].text_threshold(), 0.4);
  }

  #[test]
  fn failed_job_raises_detection_failed() {
    let predictor = Scripted::new(vec![
      Ok(r#"{"status": "processing"}"#),
      Ok(r#"{"status": "failed", "error": "CUDA out of memory"}"#),
    ]);
    let err = detector(&predictor).detect(&image_url(), "dog").unwrap_err();
    assert!(matches!(err, DetectError::DetectionFailed));
    assert_eq!(err.to_string(), "Grounding DINO prediction failed.");
  }

  #[test]
  fn canceled_job_is_a_failure() {
    let predictor = Scripted::new(vec![Ok(r#"{"status": "canceled"}"#)]);
    assert!(matches!(
      detector(&predictor).detect(&image_url(), "dog"),
      Err(DetectError::DetectionFailed)
    ));
  }

  #[test]
  fn poll_transport_error_is_not_retried() {
    let predictor = Scripted::new(vec![
      Ok(r#"{"status": "processing"}"#),
      Err(DetectError::PollTransport("connection reset".to_string())),
      Ok(r#"{"status": "succeeded"}"#),
    ]);
    let err = detector(&predictor).detect(&image_url(), "dog").unwrap_err();
    assert!(matches!(err, DetectError::PollTransport(_)));
    assert_eq!(*predictor.polls.borrow(), 2);
  }

  #[test]
  fn poll_cap_raises_timeout() {
    let predictor = Scripted::new(vec![
      Ok(r#"{"status": "processing"}"#),
      Ok(r#"{"status": "processing"}"#),
      Ok(r#"{"status": "succeeded"}"#),
    ]);
    let detector = GroundingDino::new(&predictor)
      .with_schedule(FixedInterval::new(Duration::ZERO).with_max_polls(Some(2)));
    assert!(matches!(
      detector.detect(&image_url(), "dog"),
      Err(DetectError::DetectionTimeout(2))
    ));
    assert_eq!(*predictor.polls.borrow(), 2);
  }
}
