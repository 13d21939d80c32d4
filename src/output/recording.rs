// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output/recording.rs - 记录绘制命令的内存表面
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

use std::convert::Infallible;

use crate::output::{Color, DrawStyle, Font, RenderSurface};

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
  Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
  },
  Text {
    text: String,
    x: f32,
    y: f32,
  },
}

impl Shape {
  fn anchor(&self) -> (f32, f32) {
    match self {
      Shape::Rect { x, y, .. } | Shape::Text { x, y, .. } => (*x, *y),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
  Clear {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
  },
  Draw(Shape),
  Present,
}

/// 不产生像素的表面，保存当前可见的图形和完整的命令历史
///
/// 用于测试。命令历史随每帧增长，长时间运行时用 [`RecordingSurface::take_history`] 取走。
#[derive(Debug, Clone)]
pub struct RecordingSurface {
  width: f32,
  height: f32,
  style: DrawStyle,
  visible: Vec<Shape>,
  history: Vec<DrawCommand>,
}

impl Default for RecordingSurface {
  fn default() -> Self {
    Self::new()
  }
}

impl RecordingSurface {
  pub fn new() -> Self {
    Self {
      width: 0.0,
      height: 0.0,
      style: DrawStyle::default(),
      visible: Vec::new(),
      history: Vec::new(),
    }
  }

  pub fn style(&self) -> &DrawStyle {
    &self.style
  }

  /// 当前可见的图形
  pub fn shapes(&self) -> &[Shape] {
    &self.visible
  }

  pub fn rects(&self) -> impl Iterator<Item = &Shape> {
    self
      .visible
      .iter()
      .filter(|s| matches!(s, Shape::Rect { .. }))
  }

  pub fn texts(&self) -> impl Iterator<Item = &str> {
    self.visible.iter().filter_map(|s| match s {
      Shape::Text { text, .. } => Some(text.as_str()),
      _ => None,
    })
  }

  pub fn history(&self) -> &[DrawCommand] {
    &self.history
  }

  /// 取走已记录的命令，可见图形保持不变
  pub fn take_history(&mut self) -> Vec<DrawCommand> {
    std::mem::take(&mut self.history)
  }

  pub fn presents(&self) -> usize {
    self
      .history
      .iter()
      .filter(|c| matches!(c, DrawCommand::Present))
      .count()
  }
}

impl RenderSurface for RecordingSurface {
  type Error = Infallible;

  fn width(&self) -> f32 {
    self.width
  }

  fn height(&self) -> f32 {
    self.height
  }

  fn set_size(&mut self, width: f32, height: f32) {
    self.width = width;
    self.height = height;
  }

  fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
    let covers_surface =
      x <= 0.0 && y <= 0.0 && x + width >= self.width && y + height >= self.height;
    if covers_surface {
      // 超出表面的部分本来就不可见，一并清除
      self.visible.clear();
    } else {
      self.visible.retain(|shape| {
        let (sx, sy) = shape.anchor();
        !(sx >= x && sx < x + width && sy >= y && sy < y + height)
      });
    }
    self.history.push(DrawCommand::Clear {
      x,
      y,
      width,
      height,
    });
  }

  fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
    let shape = Shape::Rect {
      x,
      y,
      width,
      height,
    };
    self.visible.push(shape.clone());
    self.history.push(DrawCommand::Draw(shape));
  }

  fn stroke_text(&mut self, text: &str, x: f32, y: f32) {
    let shape = Shape::Text {
      text: text.to_string(),
      x,
      y,
    };
    self.visible.push(shape.clone());
    self.history.push(DrawCommand::Draw(shape));
  }

  fn set_stroke_color(&mut self, color: Color) {
    self.style.stroke_color = color;
  }

  fn set_fill_color(&mut self, color: Color) {
    self.style.fill_color = color;
  }

  fn set_line_width(&mut self, width: f32) {
    self.style.line_width = width;
  }

  fn set_font(&mut self, font: &Font) {
    self.style.font = font.clone();
  }

  fn present(&mut self) -> Result<(), Self::Error> {
    self.history.push(DrawCommand::Present);
    Ok(())
  }
}
