// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/task.rs - 检测与遮蔽流程编排
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
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  archive::{ArchiveError, LocalArchive},
  frame::ImageArtifact,
  mask::{GaussianMask, MaskError, MaskRegions},
  model::{DetectError, Detector},
  store::{ObjectStore, UploadError},
};

pub const NO_OBJECT_DETECTED: &str = "No object detected.";

/// 单个请求的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Received,
  Published,
  Detecting,
  NoneFound,
  Masking,
  Republished,
  Done,
  Errored,
}

impl Stage {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Stage::NoneFound | Stage::Done | Stage::Errored)
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("{0}")]
  Decode(#[from] image::ImageError),
  #[error("{0}")]
  Archive(#[from] ArchiveError),
  #[error("{0}")]
  Upload(#[from] UploadError),
  #[error("{0}")]
  Detect(#[from] DetectError),
  #[error("{0}")]
  Mask(#[from] MaskError),
}

/// 一次遮蔽请求
#[derive(Debug, Clone)]
pub struct MaskRequest {
  pub image: Vec<u8>,
  pub file_name: String,
  pub prompt: String,
}

#[derive(Debug)]
pub enum MaskOutcome {
  Masked { url: Url, artifact: ImageArtifact },
  NoneFound,
  Failed { stage: Stage, error: PipelineError },
}

/// 对外响应体，`status` 字段区分“未检测到”与错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MaskResponse {
  Done { result_url: String },
  NoneFound { error: String },
  Errored { error: String },
}

/// 请求经过的阶段与最终结果
#[derive(Debug)]
pub struct MaskReport {
  stages: Vec<Stage>,
  outcome: MaskOutcome,
}

impl MaskReport {
  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }

  pub fn outcome(&self) -> &MaskOutcome {
    &self.outcome
  }

  pub fn into_outcome(self) -> MaskOutcome {
    self.outcome
  }

  pub fn final_stage(&self) -> Stage {
    match self.outcome {
      MaskOutcome::Masked { .. } => Stage::Done,
      MaskOutcome::NoneFound => Stage::NoneFound,
      MaskOutcome::Failed { .. } => Stage::Errored,
    }
  }

  pub fn visited(&self, stage: Stage) -> bool {
    self.stages.contains(&stage)
  }

  /// 成功与“未检测到”都是 200，其余 500
  pub fn status_code(&self) -> u16 {
    match self.outcome {
      MaskOutcome::Failed { .. } => 500,
      _ => 200,
    }
  }

  pub fn response(&self) -> MaskResponse {
    match &self.outcome {
      MaskOutcome::Masked { url, .. } => MaskResponse::Done {
        result_url: url.to_string(),
      },
      MaskOutcome::NoneFound => MaskResponse::NoneFound {
        error: NO_OBJECT_DETECTED.to_string(),
      },
      MaskOutcome::Failed { error, .. } => MaskResponse::Errored {
        error: error.to_string(),
      },
    }
  }
}

/// 检测与遮蔽流程
///
/// 发布原图，远程检测，模糊检测区域，再发布结果。任一步失败都会在这里
/// 转换为一条错误信息；检测未成功时不会发布遮蔽结果。
pub struct MaskTask<S, D, M = GaussianMask> {
  store: S,
  detector: D,
  masker: M,
  archive: LocalArchive,
}

impl<S: ObjectStore, D: Detector> MaskTask<S, D> {
  pub fn new(store: S, detector: D, archive: LocalArchive) -> Self {
    Self {
      store,
      detector,
      masker: GaussianMask::default(),
      archive,
    }
  }
}

impl<S: ObjectStore, D: Detector, M: MaskRegions> MaskTask<S, D, M> {
  pub fn with_masker<T: MaskRegions>(self, masker: T) -> MaskTask<S, D, T> {
    MaskTask {
      store: self.store,
      detector: self.detector,
      masker,
      archive: self.archive,
    }
  }

  pub fn run(&self, request: &MaskRequest) -> MaskReport {
    info!("收到提示词: {}", request.prompt);
    let mut stages = vec![Stage::Received];
    let now = std::time::Instant::now();

    let outcome = match self.execute(request, &mut stages) {
      Ok(Some((url, artifact))) => MaskOutcome::Masked { url, artifact },
      Ok(None) => MaskOutcome::NoneFound,
      Err(error) => {
        let stage = stages.last().copied().unwrap_or(Stage::Received);
        error!("{:?} 阶段出错: {}", stage, error);
        stages.push(Stage::Errored);
        MaskOutcome::Failed { stage, error }
      }
    };

    let report = MaskReport { stages, outcome };
    info!(
      "请求结束于 {:?}，耗时: {:.2?}",
      report.final_stage(),
      now.elapsed()
    );
    report
  }

  fn execute(
    &self,
    request: &MaskRequest,
    stages: &mut Vec<Stage>,
  ) -> Result<Option<(Url, ImageArtifact)>, PipelineError> {
    let original_path = self
      .archive
      .store_original(&request.image, &request.file_name)?;
    info!("原图已保存: {}", original_path.display());
    let original = ImageArtifact::decode(&request.image)?.with_path(original_path);

    let image_url = self.store.publish(&request.image, &request.file_name)?;
    stages.push(Stage::Published);

    stages.push(Stage::Detecting);
    let result = self.detector.detect(&image_url, &request.prompt)?;
    if result.is_empty() {
      warn!("未检测到目标: {}", request.prompt);
      stages.push(Stage::NoneFound);
      return Ok(None);
    }
    info!("检测到 {} 个区域: {:?}", result.len(), result.boxes());

    stages.push(Stage::Masking);
    let masked = self.masker.mask_regions(&original, result.boxes())?;
    let bytes = masked.encode_jpeg()?;
    let masked_path = self.archive.store_masked(&bytes)?;
    let masked = masked.with_path(masked_path);

    let file_name = masked
      .path()
      .and_then(|path| path.file_name())
      .and_then(|name| name.to_str())
      .unwrap_or("masked.jpg")
      .to_string();
    let url = self.store.publish(&bytes, &file_name)?;
    stages.push(Stage::Republished);
    stages.push(Stage::Done);
    info!("遮蔽结果已发布: {}", url);

    Ok(Some((url, masked)))
  }
}
