// 该文件是 Guanlan （观澜） 项目的一部分。
// src/model/replay.rs - 回放检测结果的检测器
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

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::TensorFrame,
  model::{Detection, Detector, DetectorLoader},
};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("查询参数无效: {0}")]
  InvalidQuery(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测结果文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("检测结果文件为空")]
  Empty,
}

/// 文件内容既可以是单个批次，也可以是批次列表
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
  Batches(Vec<Vec<Detection>>),
  Batch(Vec<Detection>),
}

/// 按顺序循环返回预先记录的检测批次
#[derive(Debug)]
pub struct ReplayDetector {
  batches: Box<[Vec<Detection>]>,
  delay: Option<Duration>,
  cursor: AtomicUsize,
}

impl ReplayDetector {
  pub fn new(batches: Vec<Vec<Detection>>, delay: Option<Duration>) -> Result<Self, ReplayDetectorError> {
    if batches.is_empty() {
      return Err(ReplayDetectorError::Empty);
    }
    Ok(Self {
      batches: batches.into_boxed_slice(),
      delay,
      cursor: AtomicUsize::new(0),
    })
  }

  pub fn from_json(text: &str, delay: Option<Duration>) -> Result<Self, ReplayDetectorError> {
    let batches = match serde_json::from_str::<ReplayFile>(text)? {
      ReplayFile::Batches(batches) => batches,
      ReplayFile::Batch(batch) => vec![batch],
    };
    Self::new(batches, delay)
  }

  pub fn batch_count(&self) -> usize {
    self.batches.len()
  }
}

impl Detector for ReplayDetector {
  type Error = ReplayDetectorError;

  async fn detect(&self, frame: &TensorFrame) -> Result<Vec<Detection>, Self::Error> {
    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.batches.len();
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    debug!(
      "回放第 {} 批检测结果, 输入形状 {:?}",
      index,
      frame.shape()
    );
    Ok(self.batches[index].clone())
  }
}

pub struct ReplayDetectorBuilder {
  path: PathBuf,
  delay: Option<Duration>,
}

impl FromUrlWithScheme for ReplayDetectorBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetectorBuilder {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let mut delay = None;
    for (k, v) in url.query_pairs() {
      if k == "delay_ms" {
        let ms = v
          .parse::<u64>()
          .map_err(|_| ReplayDetectorError::InvalidQuery(format!("delay_ms={}", v)))?;
        delay = Some(Duration::from_millis(ms));
      }
    }

    Ok(ReplayDetectorBuilder {
      path: PathBuf::from(url.path()),
      delay,
    })
  }
}

impl DetectorLoader for ReplayDetectorBuilder {
  type Detector = ReplayDetector;
  type Error = ReplayDetectorError;

  async fn load(self) -> Result<Self::Detector, Self::Error> {
    info!("加载检测结果文件: {}", self.path.display());
    let text = tokio::fs::read_to_string(&self.path).await?;
    let detector = ReplayDetector::from_json(&text, self.delay)?;
    info!("检测结果加载完成, 共 {} 批", detector.batch_count());
    Ok(detector)
  }
}
