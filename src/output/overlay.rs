// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output/overlay.rs - 检测结果叠加层绘制
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
use tracing::{trace, warn};

use crate::{
  frame::FrameSize,
  geometry::ViewportGeometry,
  model::Detection,
  output::{DrawOutcome, OverlayOrdering, RenderSurface, RenderTarget},
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.75;
/// 标签相对边框左上角向左、向上的偏移
pub const LABEL_OFFSET: f32 = 15.0;

/// 低置信度检测的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdPolicy {
  /// 遇到第一个低于阈值的检测即停止绘制本批剩余检测
  #[default]
  StopAtFirstBelow,
  /// 逐个跳过低于阈值的检测
  SkipBelow,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("阈值策略无效: '{0}', 可选 stop / skip")]
pub struct ThresholdPolicyError(String);

impl FromStr for ThresholdPolicy {
  type Err = ThresholdPolicyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "stop" => Ok(ThresholdPolicy::StopAtFirstBelow),
      "skip" => Ok(ThresholdPolicy::SkipBelow),
      other => Err(ThresholdPolicyError(other.to_string())),
    }
  }
}

#[derive(Debug, Clone)]
pub struct OverlayRenderer {
  geometry: ViewportGeometry,
  threshold: f64,
  policy: ThresholdPolicy,
}

impl OverlayRenderer {
  pub fn new(geometry: ViewportGeometry) -> Self {
    Self {
      geometry,
      threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      policy: ThresholdPolicy::default(),
    }
  }

  pub fn with_threshold(mut self, threshold: f64) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_policy(mut self, policy: ThresholdPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn geometry(&self) -> &ViewportGeometry {
    &self.geometry
  }

  /// 清空表面并绘制本批检测，返回绘制的边框数量
  pub fn render<S: RenderSurface>(
    &self,
    surface: &mut S,
    detections: &[Detection],
    frame: FrameSize,
  ) -> usize {
    let scale = self.geometry.scale_for(frame);
    let surface_width = surface.width();

    surface.clear_rect(0.0, 0.0, surface_width, surface.height());

    let mut drawn = 0;
    for detection in detections {
      if detection.confidence < self.threshold {
        match self.policy {
          ThresholdPolicy::StopAtFirstBelow => {
            trace!(
              "置信度 {:.2} 低于阈值, 停止绘制本批剩余检测",
              detection.confidence
            );
            break;
          }
          ThresholdPolicy::SkipBelow => continue,
        }
      }

      let rect = self
        .geometry
        .to_screen(scale, &detection.bounding_box, surface_width);
      surface.stroke_rect(rect.x, rect.y, rect.width, rect.height);
      surface.stroke_text(
        &detection.caption(),
        rect.x - LABEL_OFFSET,
        rect.y - LABEL_OFFSET,
      );
      drawn += 1;
    }

    if let Err(e) = surface.present() {
      warn!("叠加层输出失败: {}", e);
    }
    drawn
  }

  /// 通过绘制目标句柄绘制；表面未挂载时什么也不做
  pub fn render_to<S: RenderSurface>(
    &self,
    target: &RenderTarget<S>,
    detections: &[Detection],
    frame: FrameSize,
  ) -> bool {
    target
      .with_surface(|surface| self.render(surface, detections, frame))
      .is_some()
  }

  /// 带序号的绘制，过期结果被丢弃
  pub fn render_sequenced<S: RenderSurface>(
    &self,
    target: &RenderTarget<S>,
    sequence: u64,
    latest_dispatched: u64,
    ordering: OverlayOrdering,
    detections: &[Detection],
    frame: FrameSize,
  ) -> DrawOutcome {
    target.draw_sequenced(sequence, latest_dispatched, ordering, |surface| {
      self.render(surface, detections, frame);
    })
  }
}
