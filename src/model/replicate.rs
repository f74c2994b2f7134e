// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/model/replicate.rs - Replicate 预测服务客户端
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

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  config::ReplicateConfig,
  model::{DetectError, DetectionJob, DetectionRequest, JobCreated, Prediction, Predictor},
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct CreatePrediction<'a> {
  version: &'a str,
  input: &'a DetectionRequest,
}

pub struct ReplicatePredictor {
  client: Client,
  config: ReplicateConfig,
}

impl ReplicatePredictor {
  pub fn new(config: ReplicateConfig) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
    info!(
      "预测服务已配置: endpoint={}, version={}",
      config.endpoint, config.version
    );
    Ok(Self { client, config })
  }

  fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
    builder.header(AUTHORIZATION, format!("Token {}", self.config.token))
  }
}

impl Predictor for ReplicatePredictor {
  fn submit(&self, request: &DetectionRequest) -> Result<DetectionJob, DetectError> {
    let body = CreatePrediction {
      version: &self.config.version,
      input: request,
    };
    debug!("提交检测任务: POST {}", self.config.endpoint);

    let response = self
      .authorized(self.client.post(self.config.endpoint.clone()))
      .json(&body)
      .send()
      .map_err(|e| DetectError::Submission(e.to_string()))?;

    let status = response.status();
    let text = response
      .text()
      .map_err(|e| DetectError::Submission(e.to_string()))?;
    if !status.is_success() {
      return Err(DetectError::Submission(format!(
        "predictor returned {}: {}",
        status, text
      )));
    }

    let created: JobCreated = serde_json::from_str(&text)
      .map_err(|e| DetectError::Submission(format!("malformed job payload: {}", e)))?;
    created.into_job()
  }

  fn fetch_status(&self, job: &DetectionJob) -> Result<Prediction, DetectError> {
    let response = self
      .authorized(self.client.get(job.status_url().clone()))
      .send()
      .map_err(|e| DetectError::PollTransport(e.to_string()))?;

    let status = response.status();
    let text = response
      .text()
      .map_err(|e| DetectError::PollTransport(e.to_string()))?;
    if !status.is_success() {
      return Err(DetectError::PollTransport(format!(
        "status endpoint returned {}: {}",
        status, text
      )));
    }

    debug!("检测任务 {} 响应: {}", job.id(), text);
    Prediction::parse(&text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn creation_body_wraps_input_with_version() {
    let request = DetectionRequest::new(
      Url::parse("https://i.ibb.co/x/dog.jpg").unwrap(),
      "dog".to_string(),
    );
    let body = CreatePrediction {
      version: "efef5f0a",
      input: &request,
    };
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value["version"], "efef5f0a");
    assert_eq!(value["input"]["image"], "https://i.ibb.co/x/dog.jpg");
    assert_eq!(value["input"]["query"], "dog");
  }
}
