// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/frame.rs - 图像制品定义
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

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

/// 一张图像及其（可选的）本地存档路径
///
/// 遮蔽操作总是产生新的 `ImageArtifact`，不会修改输入。
#[derive(Debug, Clone)]
pub struct ImageArtifact {
  path: Option<PathBuf>,
  image: RgbImage,
}

impl From<RgbImage> for ImageArtifact {
  fn from(image: RgbImage) -> Self {
    Self { path: None, image }
  }
}

impl ImageArtifact {
  /// 从编码后的字节（JPEG、PNG）解码
  pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    Ok(Self::from(image))
  }

  pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 编码为 JPEG 字节，用于存档和上传
  pub fn encode_jpeg(&self) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    self.image.write_to(&mut buffer, ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn jpeg_bytes_decode_back_to_same_shape() {
    let image = RgbImage::from_pixel(32, 16, Rgb([10, 200, 30]));
    let artifact = ImageArtifact::from(image);
    let bytes = artifact.encode_jpeg().unwrap();
    let decoded = ImageArtifact::decode(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 16));
    assert!(decoded.path().is_none());
  }

  #[test]
  fn garbage_bytes_fail_to_decode() {
    assert!(ImageArtifact::decode(b"definitely not an image").is_err());
  }
}
