// 该文件是 Guanlan （观澜） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

use guanlan::{
  geometry::AspectRatio,
  output::{OverlayOrdering, overlay::ThresholdPolicy},
};

/// Guanlan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型
  /// - 回放: replay:///detections.json?delay_ms=30
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// - 图片: image:///frame.png?width=152&height=200&depth=3
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 叠加层输出
  /// - 单个文件: image:///overlay.png
  /// - 按日期记录: folder:///records?always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 预览窗口宽度
  #[arg(long, default_value = "360", value_name = "PIXELS")]
  pub window_width: f32,

  /// 预览宽高比，9:16 或 3:4
  #[arg(long, default_value = "3:4", value_name = "W:H")]
  pub aspect: AspectRatio,

  /// 模型输入宽度，帧形状无效时用于计算缩放
  #[arg(long, default_value = "152", value_name = "PIXELS")]
  pub model_width: usize,

  /// 模型输入高度
  #[arg(long, default_value = "200", value_name = "PIXELS")]
  pub model_height: usize,

  /// 水平镜像（前置摄像头）
  #[arg(long)]
  pub mirror: bool,

  /// 渲染帧率
  #[arg(long, default_value = "60", value_name = "FPS")]
  pub fps: f64,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.75", value_name = "THRESHOLD")]
  pub threshold: f64,

  /// 低置信度处理: stop 截断本批剩余检测, skip 逐个过滤
  #[arg(long, default_value = "stop", value_name = "POLICY")]
  pub threshold_policy: ThresholdPolicy,

  /// 绘制顺序: latest 只绘制最新派发, newer 绘制比已绘制更新的结果
  #[arg(long, default_value = "latest", value_name = "ORDERING")]
  pub ordering: OverlayOrdering,

  /// 最大节拍数，缺省时一直运行直到 Ctrl-C
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<u64>,

  /// 标签字体 (TTF)
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_defaults() {
    let args = Args::try_parse_from([
      "guanlan",
      "--model",
      "replay:///dets.json",
      "--input",
      "image:///frame.png",
      "--output",
      "image:///overlay.png",
    ])
    .unwrap();

    assert_eq!(args.aspect, AspectRatio::PORTRAIT_3_4);
    assert_eq!(args.threshold, 0.75);
    assert_eq!(args.threshold_policy, ThresholdPolicy::StopAtFirstBelow);
    assert_eq!(args.ordering, OverlayOrdering::LatestDispatched);
    assert!(!args.mirror);
    assert!(args.frame_number.is_none());
  }

  #[test]
  fn rejects_unknown_policy() {
    let parsed = Args::try_parse_from([
      "guanlan",
      "--model",
      "replay:///dets.json",
      "--input",
      "image:///frame.png",
      "--output",
      "image:///overlay.png",
      "--threshold-policy",
      "maybe",
    ]);
    assert!(parsed.is_err());
  }
}
