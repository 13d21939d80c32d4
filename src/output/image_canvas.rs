// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output/image_canvas.rs - 基于 imageproc 的 RGBA 画布
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

//! # 图像画布
//!
//! 透明背景的叠加层画布，按预览区域大小分配像素，
//! 每帧绘制完毕后交给 [`OutputWrapper`] 落盘。
//!
//! ## 落盘方式
//!
//! - `image:///overlay.png`：每帧覆盖同一个文件
//! - `folder:///records`：按日期目录逐帧保存，`?always` 时空帧也保存
//!
//! ## 字体
//!
//! 标签文字需要 TTF 字体，未提供字体时只绘制边框。

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::{drawing::draw_hollow_rect_mut, drawing::draw_text_mut, rect::Rect};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{info, trace, warn};

use crate::output::{Color, Font, OutputError, OutputWrapper, RenderSurface};

#[derive(Error, Debug)]
pub enum ImageCanvasError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
  #[error("输出错误: {0}")]
  OutputError(#[from] OutputError),
}

pub struct ImageCanvas {
  width: f32,
  height: f32,
  image: RgbaImage,
  stroke_color: Color,
  line_width: f32,
  font_size: f32,
  font: Option<FontArc>,
  missing_font_reported: bool,
  output: Option<OutputWrapper>,
  boxes: usize,
}

impl Default for ImageCanvas {
  fn default() -> Self {
    Self::new()
  }
}

impl ImageCanvas {
  pub fn new() -> Self {
    Self {
      width: 0.0,
      height: 0.0,
      image: RgbaImage::new(0, 0),
      stroke_color: Color::GREEN,
      line_width: 1.0,
      font_size: 10.0,
      font: None,
      missing_font_reported: false,
      output: None,
      boxes: 0,
    }
  }

  pub fn with_output(mut self, output: OutputWrapper) -> Self {
    self.output = Some(output);
    self
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, ImageCanvasError> {
    let path = path.as_ref();
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(self.with_font(font))
  }

  pub fn image(&self) -> &RgbaImage {
    &self.image
  }
}

/// 把 `[start, start + len)` 裁剪到画布两侧各留一个像素的范围内
///
/// 画布外的边留在画布外，整段落在画布外时返回 `None`。
fn clip_span(start: f32, len: f32, limit: u32) -> Option<(i32, u32)> {
  let limit = limit as f32;
  let end = start + len;
  if !(len > 0.0 && end > 0.0 && start < limit) {
    return None;
  }
  let start = start.max(-1.0);
  let end = end.min(limit + 1.0);
  Some((start as i32, (end - start) as u32))
}

/// 多线程运行时中让出工作线程再执行阻塞的落盘
fn blocking<R>(f: impl FnOnce() -> R) -> R {
  match Handle::try_current() {
    Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
      tokio::task::block_in_place(f)
    }
    _ => f(),
  }
}

impl RenderSurface for ImageCanvas {
  type Error = ImageCanvasError;

  fn width(&self) -> f32 {
    self.width
  }

  fn height(&self) -> f32 {
    self.height
  }

  fn set_size(&mut self, width: f32, height: f32) {
    self.width = width;
    self.height = height;
    self.image = RgbaImage::new(width.round().max(0.0) as u32, height.round().max(0.0) as u32);
    self.boxes = 0;
  }

  fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
    let (w, h) = self.image.dimensions();
    let x_min = (x.floor().max(0.0) as u32).min(w);
    let y_min = (y.floor().max(0.0) as u32).min(h);
    let x_max = ((x + width).ceil().max(0.0) as u32).min(w);
    let y_max = ((y + height).ceil().max(0.0) as u32).min(h);

    for py in y_min..y_max {
      for px in x_min..x_max {
        self.image.put_pixel(px, py, Rgba(Color::TRANSPARENT.0));
      }
    }

    if x_min == 0 && y_min == 0 && x_max == w && y_max == h {
      self.boxes = 0;
    }
  }

  fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
    self.boxes += 1;
    let color = Rgba(self.stroke_color.0);
    let (image_width, image_height) = self.image.dimensions();
    let (x, y) = (x.round(), y.round());
    let (width, height) = (width.round(), height.round());

    // 线宽向内加粗
    let thickness = self.line_width.round().clamp(1.0, 64.0) as u32;
    for t in (0..thickness).map(|t| t as f32) {
      let (w, h) = (width - 2.0 * t, height - 2.0 * t);
      if !(w > 0.0 && h > 0.0) {
        break;
      }
      let (Some((left, w)), Some((top, h))) = (
        clip_span(x + t, w, image_width),
        clip_span(y + t, h, image_height),
      ) else {
        trace!("边框完全在画布之外: ({}, {}, {}, {})", x, y, width, height);
        break;
      };
      draw_hollow_rect_mut(&mut self.image, Rect::at(left, top).of_size(w, h), color);
    }
  }

  fn stroke_text(&mut self, text: &str, x: f32, y: f32) {
    let (image_width, image_height) = (self.width, self.height);
    let Some(font) = self.font.as_ref() else {
      if !self.missing_font_reported {
        warn!("未加载字体, 跳过标签文字绘制");
        self.missing_font_reported = true;
      }
      return;
    };

    // 文字从锚点向右下延伸
    let reach = self.font_size * (text.chars().count() as f32 + 1.0);
    if !(x < image_width && y < image_height && x + reach > 0.0 && y + reach > 0.0) {
      trace!("标签完全在画布之外: ({}, {})", x, y);
      return;
    }

    draw_text_mut(
      &mut self.image,
      Rgba(self.stroke_color.0),
      x.round() as i32,
      y.round() as i32,
      PxScale::from(self.font_size),
      font,
      text,
    );
  }

  fn set_stroke_color(&mut self, color: Color) {
    self.stroke_color = color;
  }

  // 只描边，不使用填充色
  fn set_fill_color(&mut self, _color: Color) {}

  fn set_line_width(&mut self, width: f32) {
    self.line_width = width;
  }

  fn set_font(&mut self, font: &Font) {
    self.font_size = font.size_px;
  }

  fn present(&mut self) -> Result<(), Self::Error> {
    if let Some(output) = self.output.as_ref() {
      let (image, boxes) = (&self.image, self.boxes);
      blocking(|| output.save(image, boxes))?;
    }
    Ok(())
  }
}
