// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/config.rs - 服务配置
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

use clap::Args;
use url::Url;

use crate::model::FixedInterval;

/// 预测服务配置
#[derive(Args, Debug, Clone)]
pub struct ReplicateConfig {
  /// 预测任务创建地址
  #[arg(
    id = "replicate_endpoint",
    long = "replicate-endpoint",
    env = "REPLICATE_ENDPOINT",
    default_value = "https://api.replicate.com/v1/predictions",
    value_name = "URL"
  )]
  pub endpoint: Url,

  /// 预测服务访问令牌
  #[arg(
    long = "replicate-token",
    env = "REPLICATE_API_TOKEN",
    hide_env_values = true,
    value_name = "TOKEN"
  )]
  pub token: String,

  /// Grounding DINO 模型版本
  #[arg(long = "dino-version", env = "GROUNDING_DINO_VERSION", value_name = "VERSION")]
  pub version: String,

  /// 状态查询间隔（秒）
  #[arg(
    long = "poll-interval",
    env = "ZHEBI_POLL_INTERVAL_SECS",
    default_value_t = 2,
    value_name = "SECONDS"
  )]
  pub poll_interval_secs: u64,

  /// 最大查询次数，不设置表示一直等待
  #[arg(long = "max-polls", env = "ZHEBI_MAX_POLLS", value_name = "COUNT")]
  pub max_polls: Option<u32>,
}

impl ReplicateConfig {
  pub fn schedule(&self) -> FixedInterval {
    FixedInterval::new(Duration::from_secs(self.poll_interval_secs)).with_max_polls(self.max_polls)
  }
}

/// 图床配置
#[derive(Args, Debug, Clone)]
pub struct ImgbbConfig {
  /// 上传地址
  #[arg(
    id = "imgbb_endpoint",
    long = "imgbb-endpoint",
    env = "IMGBB_ENDPOINT",
    default_value = "https://api.imgbb.com/1/upload",
    value_name = "URL"
  )]
  pub endpoint: Url,

  /// 图床访问密钥
  #[arg(
    long = "imgbb-key",
    env = "IMGBB_API_KEY",
    hide_env_values = true,
    value_name = "KEY"
  )]
  pub api_key: String,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
  #[command(flatten)]
  pub replicate: ReplicateConfig,

  #[command(flatten)]
  pub imgbb: ImgbbConfig,

  /// 本地存档目录，例如 folder:uploads 或 folder:///var/lib/zhebi
  #[arg(
    long = "archive",
    env = "ZHEBI_ARCHIVE",
    default_value = "folder:uploads",
    value_name = "URL"
  )]
  pub archive: Url,
}

#[cfg(all(feature = "imgbb_store", feature = "replicate_predictor"))]
mod build {
  use thiserror::Error;

  use super::Config;
  use crate::{
    FromUrl,
    archive::{ArchiveError, LocalArchive},
    model::{FixedInterval, GroundingDino, ReplicatePredictor},
    store::ImgbbStore,
    task::MaskTask,
  };

  pub type DefaultMaskTask = MaskTask<ImgbbStore, GroundingDino<ReplicatePredictor, FixedInterval>>;

  #[derive(Error, Debug)]
  pub enum BuildError {
    #[error("存档目录错误: {0}")]
    Archive(#[from] ArchiveError),
    #[error("HTTP 客户端错误: {0}")]
    Http(#[from] reqwest::Error),
  }

  impl Config {
    /// 按配置组装完整的遮蔽流程
    pub fn build_task(&self) -> Result<DefaultMaskTask, BuildError> {
      let store = ImgbbStore::new(self.imgbb.clone())?;
      let predictor = ReplicatePredictor::new(self.replicate.clone())?;
      let detector = GroundingDino::new(predictor).with_schedule(self.replicate.schedule());
      let archive = LocalArchive::from_url(&self.archive)?;
      Ok(MaskTask::new(store, detector, archive))
    }
  }
}

#[cfg(all(feature = "imgbb_store", feature = "replicate_predictor"))]
pub use self::build::{BuildError, DefaultMaskTask};
