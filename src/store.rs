// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/store.rs - 公开图像存储
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

use thiserror::Error;
use url::Url;

/// 上传图像并返回可公开访问的 URL
///
/// 返回后 URL 立即可用，之后的有效期不作保证。
pub trait ObjectStore {
  fn publish(&self, bytes: &[u8], file_name: &str) -> Result<Url, UploadError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
  fn publish(&self, bytes: &[u8], file_name: &str) -> Result<Url, UploadError> {
    (**self).publish(bytes, file_name)
  }
}

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("object store unreachable: {0}")]
  Unreachable(String),
  #[error("object store rejected upload ({status}): {message}")]
  Rejected { status: u16, message: String },
  #[error("malformed object store response: {0}")]
  MalformedResponse(String),
}

#[cfg(feature = "imgbb_store")]
mod imgbb;
#[cfg(feature = "imgbb_store")]
pub use self::imgbb::ImgbbStore;
