// 该文件是 Guanlan （观澜） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{DynamicImage, ImageReader, imageops::FilterType};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameError, TensorFrame},
  input::FrameSource,
};

pub const DEFAULT_RESIZE_WIDTH: u32 = 152;
pub const DEFAULT_RESIZE_HEIGHT: u32 = 200;
pub const DEFAULT_RESIZE_DEPTH: usize = 3;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Invalid query parameter: {0}")]
  InvalidQuery(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
}

/// 把一张静态图片当作相机：解码并缩放一次，之后每个节拍都给出同一帧
pub struct ImageFileInput {
  frame: TensorFrame,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

fn query_number<T: std::str::FromStr>(
  url: &Url,
  key: &str,
  default: T,
) -> Result<T, ImageFileInputError> {
  match url.query_pairs().find(|(k, _)| k == key) {
    Some((_, v)) => v
      .parse::<T>()
      .map_err(|_| ImageFileInputError::InvalidQuery(format!("{}={}", key, v))),
    None => Ok(default),
  }
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let width = query_number(url, "width", DEFAULT_RESIZE_WIDTH)?;
    let height = query_number(url, "height", DEFAULT_RESIZE_HEIGHT)?;
    let depth = query_number(url, "depth", DEFAULT_RESIZE_DEPTH)?;

    let path = url.path();
    info!("读取图像文件: {}", path);
    let image = ImageReader::open(path)?.decode()?;

    Self::from_image(image, width, height, depth)
  }
}

impl ImageFileInput {
  pub fn from_image(
    image: DynamicImage,
    width: u32,
    height: u32,
    depth: usize,
  ) -> Result<Self, ImageFileInputError> {
    let resized = if image.width() == width && image.height() == height {
      image
    } else {
      image.resize_exact(width, height, FilterType::Triangle)
    };

    let data = match depth {
      1 => resized.into_luma8().into_raw(),
      3 => resized.into_rgb8().into_raw(),
      4 => resized.into_rgba8().into_raw(),
      other => return Err(FrameError::InvalidChannels(other).into()),
    };

    let frame = TensorFrame::new(width as usize, height as usize, depth, data)?;
    info!("输入帧形状: {:?}", frame.shape());
    Ok(Self { frame })
  }
}

impl FrameSource for ImageFileInput {
  fn next_frame(&mut self) -> Option<TensorFrame> {
    Some(self.frame.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn resizes_to_requested_shape() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
    let mut input = ImageFileInput::from_image(image, 152, 200, 3).unwrap();
    let frame = input.next_frame().unwrap();
    assert_eq!(frame.shape(), [200, 152, 3]);
    // 静态图片每次都能取到帧
    assert!(input.next_frame().is_some());
  }

  #[test]
  fn rejects_unsupported_depth() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
    assert!(matches!(
      ImageFileInput::from_image(image, 4, 4, 2),
      Err(ImageFileInputError::FrameError(FrameError::InvalidChannels(2)))
    ));
  }

  #[test]
  fn reads_file_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::new(16, 8).save(&path).unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&format!("image://{}?width=8&height=4", url.path())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.next_frame().unwrap().shape(), [4, 8, 3]);
  }
}
