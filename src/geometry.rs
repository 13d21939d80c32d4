// 该文件是 Guanlan （观澜） 项目的一部分。
// src/geometry.rs - 模型坐标到屏幕坐标的变换
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

use std::str::FromStr;

use thiserror::Error;

use crate::{frame::FrameSize, model::BoundingBox};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("宽高比格式无效: '{0}', 期望形如 3:4")]
pub struct AspectRatioError(String);

/// 预览画面的宽高比，`3:4` 表示宽 3 高 4
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
  pub width: f32,
  pub height: f32,
}

impl AspectRatio {
  pub const PORTRAIT_9_16: Self = Self {
    width: 9.0,
    height: 16.0,
  };
  pub const PORTRAIT_3_4: Self = Self {
    width: 3.0,
    height: 4.0,
  };

  pub fn ratio(&self) -> f32 {
    self.width / self.height
  }
}

impl FromStr for AspectRatio {
  type Err = AspectRatioError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || AspectRatioError(s.to_string());
    let (w, h) = s.split_once(':').ok_or_else(invalid)?;
    let width = w.trim().parse::<f32>().map_err(|_| invalid())?;
    let height = h.trim().parse::<f32>().map_err(|_| invalid())?;
    if !(width > 0.0 && height > 0.0) {
      return Err(invalid());
    }
    Ok(Self { width, height })
  }
}

/// 屏幕坐标系下的矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
  pub x: f32,
  pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
  pub display_width: f32,
  pub display_height: f32,
  pub model_input_width: usize,
  pub model_input_height: usize,
  /// 前置摄像头预览为镜像时需要水平翻转
  pub mirror_horizontally: bool,
}

impl ViewportGeometry {
  /// 由窗口宽度和预览宽高比推出显示区域
  pub fn from_window(
    window_width: f32,
    aspect: AspectRatio,
    model_input: FrameSize,
    mirror_horizontally: bool,
  ) -> Self {
    Self {
      display_width: window_width,
      display_height: window_width / aspect.ratio(),
      model_input_width: model_input.width,
      model_input_height: model_input.height,
      mirror_horizontally,
    }
  }

  /// 每帧按帧的实际形状重新计算缩放；形状退化时退回模型输入尺寸
  pub fn scale_for(&self, frame: FrameSize) -> Scale {
    let frame = if frame.is_degenerate() {
      FrameSize::new(self.model_input_width, self.model_input_height)
    } else {
      frame
    };
    Scale {
      x: self.display_width / frame.width.max(1) as f32,
      y: self.display_height / frame.height.max(1) as f32,
    }
  }

  /// 缩放后的框，尚未镜像
  pub fn scale_box(&self, scale: Scale, bbox: &BoundingBox) -> ScreenRect {
    ScreenRect {
      x: bbox.x * scale.x,
      y: bbox.y * scale.y,
      width: bbox.width * scale.x,
      height: bbox.height * scale.y,
    }
  }

  /// 按需水平翻转
  pub fn mirror(&self, rect: ScreenRect, surface_width: f32) -> ScreenRect {
    if self.mirror_horizontally {
      ScreenRect {
        x: surface_width - rect.x - rect.width,
        ..rect
      }
    } else {
      rect
    }
  }

  pub fn to_screen(&self, scale: Scale, bbox: &BoundingBox, surface_width: f32) -> ScreenRect {
    self.mirror(self.scale_box(scale, bbox), surface_width)
  }
}
