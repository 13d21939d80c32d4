// 该文件是 Guanlan （观澜） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guanlan::{
  FromUrl,
  frame::FrameSize,
  geometry::ViewportGeometry,
  input::InputWrapper,
  model::{ReplayDetector, ReplayDetectorBuilder},
  output::{DrawStyle, ImageCanvas, OutputWrapper, RenderTarget, overlay::OverlayRenderer},
  startup::{AssumeGranted, Startup},
  task::{RenderLoop, stop_signal},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("叠加层输出: {}", args.output);
  info!("置信度阈值: {} ({:?})", args.threshold, args.threshold_policy);

  let geometry = ViewportGeometry::from_window(
    args.window_width,
    args.aspect,
    FrameSize::new(args.model_width, args.model_height),
    args.mirror,
  );
  info!(
    "显示区域: {}x{}, 镜像: {}",
    geometry.display_width, geometry.display_height, geometry.mirror_horizontally
  );

  let input = InputWrapper::from_url(&args.input)?;
  let loader = ReplayDetectorBuilder::from_url(&args.model)?;

  let mut canvas = ImageCanvas::new().with_output(OutputWrapper::from_url(&args.output)?);
  if let Some(font) = args.font.as_ref() {
    canvas = canvas.with_font_file(font)?;
  }
  let target = RenderTarget::new();
  target.attach(
    canvas,
    geometry.display_width,
    geometry.display_height,
    &DrawStyle::default(),
  );

  let renderer = OverlayRenderer::new(geometry)
    .with_threshold(args.threshold)
    .with_policy(args.threshold_policy);

  let (stop, signal) = stop_signal();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.stop();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let startup: Startup<ReplayDetector> = Startup::new();
  let render_loop = tokio::spawn(
    RenderLoop::default()
      .with_fps(args.fps)
      .with_tick_limit(args.frame_number)
      .with_ordering(args.ordering)
      .run(input, startup.slot(), renderer, target, signal),
  );

  let state = startup.run(AssumeGranted, loader).await;
  info!("启动流程结束, 状态: {:?}", state);

  let stats = render_loop.await?;
  info!(
    "处理完成! 节拍 {}, 检测 {}, 绘制 {}, 失败 {}",
    stats.ticks, stats.dispatched, stats.drawn, stats.failures
  );

  Ok(())
}
