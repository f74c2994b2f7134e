// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/archive.rs - 本地图像存档
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

use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ArchiveError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 在本地目录保留上传的原图和遮蔽结果
///
/// 文件按日期分目录存放，文件名带 UUID，并发请求之间不会冲突。
#[derive(Debug, Clone)]
pub struct LocalArchive {
  directory: PathBuf,
}

impl FromUrlWithScheme for LocalArchive {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for LocalArchive {
  type Error = ArchiveError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ArchiveError::SchemeMismatch(format!(
        "期望存档方式 '{}', 实际存档方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(LocalArchive::new(uri.path()))
  }
}

impl LocalArchive {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn dated_directory(&self) -> Result<PathBuf, ArchiveError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;
    Ok(directory)
  }

  fn write(&self, file_name: String, bytes: &[u8]) -> Result<PathBuf, ArchiveError> {
    let path = self.dated_directory()?.join(file_name);
    std::fs::write(&path, bytes)?;
    debug!("已存档: {}", path.display());
    Ok(path)
  }

  /// 保存上传的原图，文件名为 `{uuid}_{原文件名}`
  pub fn store_original(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, ArchiveError> {
    self.write(
      format!("{}_{}", Uuid::new_v4(), sanitize_file_name(file_name)),
      bytes,
    )
  }

  /// 保存遮蔽后的 JPEG，文件名为 `masked_{uuid}.jpg`
  pub fn store_masked(&self, bytes: &[u8]) -> Result<PathBuf, ArchiveError> {
    self.write(format!("masked_{}.jpg", Uuid::new_v4().simple()), bytes)
  }
}

/// 只保留最后一段文件名，去掉客户端传来的目录部分
fn sanitize_file_name(file_name: &str) -> String {
  Path::new(file_name)
    .file_name()
    .and_then(|name| name.to_str())
    .filter(|name| !name.is_empty())
    .unwrap_or("upload")
    .to_string()
}
