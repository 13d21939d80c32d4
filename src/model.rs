// 该文件是 Guanlan （观澜） 项目的一部分。
// src/model.rs - 检测模型
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

use std::future::Future;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;

use crate::frame::TensorFrame;

/// 模型输出坐标系下的边界框，左上角加宽高
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }
}

impl From<[f32; 4]> for BoundingBox {
  fn from([x, y, width, height]: [f32; 4]) -> Self {
    Self::new(x, y, width, height)
  }
}

/// 一次模型输出
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
  #[serde(alias = "class")]
  pub label: String,
  #[serde(alias = "score")]
  pub confidence: f64,
  #[serde(rename = "bbox")]
  pub bounding_box: BoundingBox,
}

impl Detection {
  pub fn new(label: impl Into<String>, confidence: f64, bounding_box: BoundingBox) -> Self {
    Self {
      label: label.into(),
      confidence,
      bounding_box,
    }
  }

  /// 形如 `person: 84%` 的标签文本，百分比向下取整
  pub fn caption(&self) -> String {
    format!("{}: {}%", self.label, (self.confidence * 100.0).floor() as i64)
  }
}

/// 检测器：一帧图像到检测列表的异步映射
pub trait Detector: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(
    &self,
    frame: &TensorFrame,
  ) -> impl Future<Output = Result<Vec<Detection>, Self::Error>> + Send;
}

/// 初始化推理运行时并加载模型
pub trait DetectorLoader: Send {
  type Detector: Detector;
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(self) -> impl Future<Output = Result<Self::Detector, Self::Error>> + Send;
}

/// 已加载模型的共享槽位，只会被填充一次
pub struct DetectorSlot<D> {
  inner: Arc<OnceLock<Arc<D>>>,
}

impl<D> Clone for DetectorSlot<D> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<D> Default for DetectorSlot<D> {
  fn default() -> Self {
    Self {
      inner: Arc::new(OnceLock::new()),
    }
  }
}

impl<D> DetectorSlot<D> {
  pub fn new() -> Self {
    Self::default()
  }

  /// 填充槽位；已经填充过时返回 `false` 并丢弃传入的检测器
  pub fn install(&self, detector: D) -> bool {
    self.inner.set(Arc::new(detector)).is_ok()
  }

  pub fn get(&self) -> Option<Arc<D>> {
    self.inner.get().cloned()
  }

  pub fn is_loaded(&self) -> bool {
    self.inner.get().is_some()
  }
}

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::{ReplayDetector, ReplayDetectorBuilder, ReplayDetectorError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn caption_floors_percentage() {
    let det = Detection::new("person", 0.8421, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(det.caption(), "person: 84%");

    let det = Detection::new("cup", 0.999, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(det.caption(), "cup: 99%");
  }

  #[test]
  fn caption_uses_double_precision_score() {
    // 单精度下 0.53 * 100 为 52.99...
    for (score, caption) in [(0.53, "a: 53%"), (0.59, "a: 59%")] {
      let det = Detection::new("a", score, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
      assert_eq!(det.caption(), caption);
    }
  }

  #[test]
  fn parses_coco_ssd_prediction() {
    let det: Detection =
      serde_json::from_str(r#"{"class": "dog", "score": 0.9, "bbox": [1, 2, 3, 4]}"#).unwrap();
    assert_eq!(det.label, "dog");
    assert_eq!(det.bounding_box, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
  }

  #[test]
  fn slot_is_filled_once() {
    let slot: DetectorSlot<u32> = DetectorSlot::new();
    assert!(!slot.is_loaded());
    assert!(slot.install(7));
    assert!(!slot.install(8));
    assert_eq!(slot.get().as_deref(), Some(&7));
  }
}
