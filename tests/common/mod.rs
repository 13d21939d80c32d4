// 该文件是 Guanlan （观澜） 项目的一部分。
// tests/common/mod.rs - 测试用检测器与输入
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

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use guanlan::{
  frame::TensorFrame,
  geometry::ViewportGeometry,
  input::FrameSource,
  model::{BoundingBox, Detection, Detector},
  output::{
    Color, DrawStyle, Font, RenderSurface, RenderTarget, overlay::OverlayRenderer,
    recording::RecordingSurface,
  },
};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("模拟检测失败 (#{0})")]
pub struct ScriptedError(pub usize);

/// 每次调用的行为
#[derive(Clone)]
pub enum Step {
  Reply(Vec<Detection>),
  Delay(Duration, Vec<Detection>),
  Fail,
  Hang,
}

/// 按脚本依次响应的检测器，脚本用完后重复最后一步
pub struct ScriptedDetector {
  steps: Vec<Step>,
  calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
  pub fn new(steps: Vec<Step>) -> (Self, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
      Self {
        steps,
        calls: calls.clone(),
      },
      calls,
    )
  }
}

impl Detector for ScriptedDetector {
  type Error = ScriptedError;

  async fn detect(&self, _frame: &TensorFrame) -> Result<Vec<Detection>, Self::Error> {
    let index = self.calls.fetch_add(1, Ordering::SeqCst);
    let step = self
      .steps
      .get(index)
      .or(self.steps.last())
      .cloned()
      .unwrap_or(Step::Reply(Vec::new()));
    match step {
      Step::Reply(detections) => Ok(detections),
      Step::Delay(delay, detections) => {
        tokio::time::sleep(delay).await;
        Ok(detections)
      }
      Step::Fail => Err(ScriptedError(index + 1)),
      Step::Hang => std::future::pending().await,
    }
  }
}

/// 每个节拍都有 1600x1200 的帧
pub struct EndlessFrames;

impl FrameSource for EndlessFrames {
  fn next_frame(&mut self) -> Option<TensorFrame> {
    Some(TensorFrame::blank(1600, 1200))
  }
}

pub fn person(confidence: f64) -> Detection {
  Detection::new(
    "person",
    confidence,
    BoundingBox::new(100.0, 100.0, 200.0, 150.0),
  )
}

pub fn labelled(label: &str) -> Vec<Detection> {
  vec![Detection::new(
    label,
    0.9,
    BoundingBox::new(0.0, 0.0, 40.0, 40.0),
  )]
}

pub fn renderer() -> OverlayRenderer {
  OverlayRenderer::new(ViewportGeometry {
    display_width: 400.0,
    display_height: 300.0,
    model_input_width: 152,
    model_input_height: 200,
    mirror_horizontally: false,
  })
}

pub fn attached_target() -> RenderTarget<RecordingSurface> {
  let target = RenderTarget::new();
  target.attach(RecordingSurface::new(), 400.0, 300.0, &DrawStyle::default());
  target
}

pub fn texts(target: &RenderTarget<RecordingSurface>) -> Vec<String> {
  target
    .with_surface(|s| s.texts().map(str::to_string).collect())
    .unwrap_or_default()
}

#[derive(Error, Debug)]
#[error("模拟输出失败 (#{0})")]
pub struct PresentError(pub usize);

/// 绘制照常记录，但每次 `present` 都失败的表面
#[derive(Default)]
pub struct FailingPresent {
  pub inner: RecordingSurface,
  pub attempts: usize,
}

impl RenderSurface for FailingPresent {
  type Error = PresentError;

  fn width(&self) -> f32 {
    self.inner.width()
  }

  fn height(&self) -> f32 {
    self.inner.height()
  }

  fn set_size(&mut self, width: f32, height: f32) {
    self.inner.set_size(width, height);
  }

  fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
    self.inner.clear_rect(x, y, width, height);
  }

  fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
    self.inner.stroke_rect(x, y, width, height);
  }

  fn stroke_text(&mut self, text: &str, x: f32, y: f32) {
    self.inner.stroke_text(text, x, y);
  }

  fn set_stroke_color(&mut self, color: Color) {
    self.inner.set_stroke_color(color);
  }

  fn set_fill_color(&mut self, color: Color) {
    self.inner.set_fill_color(color);
  }

  fn set_line_width(&mut self, width: f32) {
    self.inner.set_line_width(width);
  }

  fn set_font(&mut self, font: &Font) {
    self.inner.set_font(font);
  }

  fn present(&mut self) -> Result<(), Self::Error> {
    self.attempts += 1;
    Err(PresentError(self.attempts))
  }
}
