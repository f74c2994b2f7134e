// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/mask.rs - 检测区域模糊遮蔽
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

use image::imageops;
use imageproc::filter::gaussian_blur_f32;
use thiserror::Error;
use tracing::debug;

use crate::{frame::ImageArtifact, model::BoundingBox};

// 模糊核尺寸，足以让原内容不可恢复
const MASK_KERNEL_SIZE: u32 = 131;

/// 由核尺寸推出的高斯 sigma，131 对应 20.0
fn kernel_sigma(kernel_size: u32) -> f32 {
  0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
  #[error("invalid region {region:?} for {width}x{height} image")]
  InvalidRegion {
    region: BoundingBox,
    width: u32,
    height: u32,
  },
}

pub trait MaskRegions {
  /// 返回新的图像，输入保持不变
  fn mask_regions(
    &self,
    artifact: &ImageArtifact,
    boxes: &[BoundingBox],
  ) -> Result<ImageArtifact, MaskError>;
}

/// 校验后的矩形区域
#[derive(Debug, Clone, Copy)]
struct Region {
  x: u32,
  y: u32,
  width: u32,
  height: u32,
}

impl Region {
  fn validate(bbox: &BoundingBox, width: u32, height: u32) -> Result<Self, MaskError> {
    if bbox.is_degenerate() || !bbox.fits_within(width, height) {
      return Err(MaskError::InvalidRegion {
        region: *bbox,
        width,
        height,
      });
    }
    Ok(Region {
      x: bbox.x1 as u32,
      y: bbox.y1 as u32,
      width: (bbox.x2 - bbox.x1) as u32,
      height: (bbox.y2 - bbox.y1) as u32,
    })
  }
}

/// 对每个区域单独做高斯模糊
///
/// 区域重叠时，后处理的区域会读入已经模糊过的像素，结果与顺序有关。
#[derive(Debug, Clone)]
pub struct GaussianMask {
  sigma: f32,
}

impl Default for GaussianMask {
  fn default() -> Self {
    Self {
      sigma: kernel_sigma(MASK_KERNEL_SIZE),
    }
  }
}

impl GaussianMask {
  pub fn sigma(&self) -> f32 {
    self.sigma
  }
}

impl MaskRegions for GaussianMask {
  fn mask_regions(
    &self,
    artifact: &ImageArtifact,
    boxes: &[BoundingBox],
  ) -> Result<ImageArtifact, MaskError> {
    let (width, height) = (artifact.width(), artifact.height());

    // 先校验全部区域，任一非法则整体放弃
    let regions = boxes
      .iter()
      .map(|bbox| Region::validate(bbox, width, height))
      .collect::<Result<Vec<_>, _>>()?;

    let mut image = artifact.image().clone();
    for region in regions {
      debug!("模糊区域: {:?}", region);
      let patch = imageops::crop_imm(&image, region.x, region.y, region.width, region.height)
        .to_image();
      let blurred = gaussian_blur_f32(&patch, self.sigma);
      imageops::replace(&mut image, &blurred, region.x as i64, region.y as i64);
    }

    Ok(ImageArtifact::from(image))
  }
}
