// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output.rs - 绘制表面与输出定义
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
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
  pub const GREEN: Color = Color([0, 128, 0, 255]);
  pub const TRANSPARENT: Color = Color([0, 0, 0, 0]);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
  pub family: String,
  pub size_px: f32,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("字体描述无效: '{0}', 期望形如 30px Arial")]
pub struct FontError(String);

impl FromStr for Font {
  type Err = FontError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || FontError(s.to_string());
    let (size, family) = s.trim().split_once(' ').ok_or_else(invalid)?;
    let size_px = size
      .strip_suffix("px")
      .and_then(|v| v.parse::<f32>().ok())
      .filter(|v| *v > 0.0)
      .ok_or_else(invalid)?;
    Ok(Font {
      family: family.trim().to_string(),
      size_px,
    })
  }
}

/// 绘制状态，在表面挂载时设置一次，之后每帧复用
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStyle {
  pub stroke_color: Color,
  pub fill_color: Color,
  pub line_width: f32,
  pub font: Font,
}

impl Default for DrawStyle {
  fn default() -> Self {
    Self {
      stroke_color: Color::GREEN,
      fill_color: Color::GREEN,
      line_width: 3.0,
      font: Font {
        family: "Arial".to_string(),
        size_px: 30.0,
      },
    }
  }
}

/// 二维绘制表面
pub trait RenderSurface: Send + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn width(&self) -> f32;
  fn height(&self) -> f32;
  fn set_size(&mut self, width: f32, height: f32);

  fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
  fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
  fn stroke_text(&mut self, text: &str, x: f32, y: f32);

  fn set_stroke_color(&mut self, color: Color);
  fn set_fill_color(&mut self, color: Color);
  fn set_line_width(&mut self, width: f32);
  fn set_font(&mut self, font: &Font);

  /// 一帧叠加层绘制完毕后调用
  fn present(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// 检测结果的绘制顺序规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayOrdering {
  /// 只有最近一次派发的检测才能绘制
  #[default]
  LatestDispatched,
  /// 比已绘制的检测更新即可绘制
  NewerThanDrawn,
}

impl OverlayOrdering {
  pub fn accepts(&self, sequence: u64, latest_dispatched: u64, last_drawn: u64) -> bool {
    match self {
      OverlayOrdering::LatestDispatched => sequence == latest_dispatched && sequence > last_drawn,
      OverlayOrdering::NewerThanDrawn => sequence > last_drawn,
    }
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("绘制顺序规则无效: '{0}', 可选 latest / newer")]
pub struct OverlayOrderingError(String);

impl FromStr for OverlayOrdering {
  type Err = OverlayOrderingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "latest" => Ok(OverlayOrdering::LatestDispatched),
      "newer" => Ok(OverlayOrdering::NewerThanDrawn),
      other => Err(OverlayOrderingError(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
  Drawn,
  Stale,
  Detached,
}

struct TargetState<S> {
  surface: Option<S>,
  last_drawn: u64,
}

/// 可注入的绘制目标句柄
///
/// 句柄可以克隆并在检测任务之间传递；表面挂载之前所有绘制都是空操作。
pub struct RenderTarget<S> {
  inner: Arc<Mutex<TargetState<S>>>,
}

impl<S> Clone for RenderTarget<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<S: RenderSurface> Default for RenderTarget<S> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: RenderSurface> RenderTarget<S> {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(TargetState {
        surface: None,
        last_drawn: 0,
      })),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, TargetState<S>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 设置表面尺寸和绘制状态，然后挂载
  pub fn attach(&self, mut surface: S, width: f32, height: f32, style: &DrawStyle) {
    surface.set_size(width, height);
    surface.set_stroke_color(style.stroke_color);
    surface.set_fill_color(style.fill_color);
    surface.set_line_width(style.line_width);
    surface.set_font(&style.font);
    info!("绘制表面已挂载: {}x{}", width, height);
    self.lock().surface = Some(surface);
  }

  pub fn detach(&self) -> Option<S> {
    self.lock().surface.take()
  }

  pub fn is_attached(&self) -> bool {
    self.lock().surface.is_some()
  }

  pub fn last_drawn(&self) -> u64 {
    self.lock().last_drawn
  }

  pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
    self.lock().surface.as_mut().map(f)
  }

  /// 在顺序规则允许时绘制序号为 `sequence` 的一帧
  pub fn draw_sequenced(
    &self,
    sequence: u64,
    latest_dispatched: u64,
    ordering: OverlayOrdering,
    f: impl FnOnce(&mut S),
  ) -> DrawOutcome {
    let mut state = self.lock();
    let last_drawn = state.last_drawn;
    let Some(surface) = state.surface.as_mut() else {
      return DrawOutcome::Detached;
    };
    if !ordering.accepts(sequence, latest_dispatched, last_drawn) {
      debug!(
        "丢弃过期的检测结果: #{} (最新派发 #{}, 已绘制 #{})",
        sequence, latest_dispatched, last_drawn
      );
      return DrawOutcome::Stale;
    }
    f(surface);
    state.last_drawn = sequence;
    DrawOutcome::Drawn
  }
}

pub mod overlay;
pub mod recording;

#[cfg(feature = "image_canvas")]
mod image_canvas;
#[cfg(feature = "image_canvas")]
pub use self::image_canvas::{ImageCanvas, ImageCanvasError};

#[cfg(feature = "image_canvas")]
mod save_image_file;
#[cfg(feature = "image_canvas")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[cfg(feature = "image_canvas")]
pub use self::wrapper::{OutputError, OutputWrapper};

#[cfg(feature = "image_canvas")]
mod wrapper {
  use image::RgbaImage;
  use thiserror::Error;
  use url::Url;

  use super::*;
  use crate::{FromUrl, FromUrlWithScheme};

  #[derive(Error, Debug)]
  pub enum OutputError {
    #[error("保存图像文件错误: {0}")]
    SaveImageFileError(#[from] SaveImageFileError),
    #[cfg(feature = "directory_record")]
    #[error("目录记录输出错误: {0}")]
    DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
    #[error("URI 方案不匹配: {0}")]
    SchemeMismatch(String),
  }

  /// 叠加层画布的落盘方式
  pub enum OutputWrapper {
    SaveImageFileOutput(SaveImageFileOutput),
    #[cfg(feature = "directory_record")]
    DirectoryRecordOutput(DirectoryRecordOutput),
  }

  impl FromUrl for OutputWrapper {
    type Error = OutputError;

    fn from_url(url: &Url) -> Result<Self, Self::Error> {
      match url.scheme() {
        SaveImageFileOutput::SCHEME => {
          let output = SaveImageFileOutput::from_url(url)?;
          Ok(OutputWrapper::SaveImageFileOutput(output))
        }
        #[cfg(feature = "directory_record")]
        DirectoryRecordOutput::SCHEME => {
          let output = DirectoryRecordOutput::from_url(url)?;
          Ok(OutputWrapper::DirectoryRecordOutput(output))
        }
        other => Err(OutputError::SchemeMismatch(other.to_string())),
      }
    }
  }

  impl OutputWrapper {
    /// `boxes` 为本帧绘制的边框数量
    pub fn save(&self, image: &RgbaImage, boxes: usize) -> Result<(), OutputError> {
      match self {
        OutputWrapper::SaveImageFileOutput(output) => output.save(image).map_err(OutputError::from),
        #[cfg(feature = "directory_record")]
        OutputWrapper::DirectoryRecordOutput(output) => {
          output.save(image, boxes).map_err(OutputError::from)
        }
      }
    }
  }
}
