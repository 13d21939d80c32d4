// 该文件是 Guanlan （观澜） 项目的一部分。
// src/frame.rs - 图像张量帧定义
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

use std::sync::Arc;

use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("通道数无效: {0}")]
  InvalidChannels(usize),
}

/// 帧的原生分辨率，按张量形状 `[height, width, channels]` 报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
  pub width: usize,
  pub height: usize,
}

impl FrameSize {
  pub fn new(width: usize, height: usize) -> Self {
    Self { width, height }
  }

  pub fn is_degenerate(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

/// HWC 排布的 u8 图像张量
///
/// 数据以 `Arc` 共享，克隆一帧不会复制像素，帧可以随检测任务一起移动。
#[derive(Debug, Clone)]
pub struct TensorFrame {
  shape: [usize; 3],
  data: Arc<[u8]>,
}

impl TensorFrame {
  pub fn new(
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if channels == 0 || channels > 4 {
      return Err(FrameError::InvalidChannels(channels));
    }
    let expected = width * height * channels;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      shape: [height, width, channels],
      data: data.into(),
    })
  }

  /// 全零的 RGB 帧
  pub fn blank(width: usize, height: usize) -> Self {
    Self {
      shape: [height, width, RGB_CHANNELS],
      data: vec![0u8; width * height * RGB_CHANNELS].into(),
    }
  }

  /// `[height, width, channels]`
  pub fn shape(&self) -> [usize; 3] {
    self.shape
  }

  pub fn height(&self) -> usize {
    self.shape[0]
  }

  pub fn width(&self) -> usize {
    self.shape[1]
  }

  pub fn channels(&self) -> usize {
    self.shape[2]
  }

  pub fn size(&self) -> FrameSize {
    FrameSize::new(self.width(), self.height())
  }

  pub fn as_hwc(&self) -> &[u8] {
    &self.data
  }
}
