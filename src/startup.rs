// 该文件是 Guanlan （观澜） 项目的一部分。
// src/startup.rs - 启动流程
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
use std::time::Instant;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::model::{DetectorLoader, DetectorSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
  Uninitialized,
  PermissionRequested,
  ModelLoading,
  /// 终态
  Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
  Granted,
  Denied,
  Undetermined,
}

/// 相机权限请求，结果只记录日志，不影响后续流程
pub trait CameraPermission: Send {
  fn request(&self) -> impl Future<Output = PermissionStatus> + Send;
}

/// 没有权限弹窗的平台
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeGranted;

impl CameraPermission for AssumeGranted {
  async fn request(&self) -> PermissionStatus {
    PermissionStatus::Granted
  }
}

/// 启动状态机：请求权限，然后加载模型
///
/// 权限被拒绝或模型加载失败都不会重试，状态停在原处，
/// 渲染循环的每个节拍保持空转。
pub struct Startup<D> {
  state: watch::Sender<StartupState>,
  slot: DetectorSlot<D>,
}

impl<D> Default for Startup<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D> Startup<D> {
  pub fn new() -> Self {
    Self::with_slot(DetectorSlot::new())
  }

  pub fn with_slot(slot: DetectorSlot<D>) -> Self {
    let (state, _) = watch::channel(StartupState::Uninitialized);
    Self { state, slot }
  }

  pub fn slot(&self) -> DetectorSlot<D> {
    self.slot.clone()
  }

  pub fn state(&self) -> StartupState {
    *self.state.borrow()
  }

  pub fn subscribe(&self) -> watch::Receiver<StartupState> {
    self.state.subscribe()
  }

  fn transition(&self, next: StartupState) {
    let previous = self.state.send_replace(next);
    info!("启动状态: {:?} -> {:?}", previous, next);
  }

  pub async fn run<P, L>(&self, permission: P, loader: L) -> StartupState
  where
    P: CameraPermission,
    L: DetectorLoader<Detector = D>,
  {
    let current = self.state();
    if current != StartupState::Uninitialized {
      warn!("启动流程已执行过, 当前状态 {:?}", current);
      return current;
    }

    self.transition(StartupState::PermissionRequested);
    let status = permission.request().await;
    info!("相机权限状态: {:?}", status);

    self.transition(StartupState::ModelLoading);
    let now = Instant::now();
    match loader.load().await {
      Ok(detector) => {
        info!("模型加载完成, 耗时: {:.2?}", now.elapsed());
        if !self.slot.install(detector) {
          warn!("检测器槽位已被占用, 保留原有模型");
        }
        self.transition(StartupState::Ready);
      }
      Err(e) => {
        error!("模型加载失败: {}", e);
      }
    }

    self.state()
  }
}
