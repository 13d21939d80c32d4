// 该文件是 Guanlan （观澜） 项目的一部分。
// tests/startup.rs - 启动流程测试
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

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use guanlan::{
  model::DetectorLoader,
  startup::{CameraPermission, PermissionStatus, Startup, StartupState},
  task::{RenderLoop, stop_signal},
};
use thiserror::Error;
use tokio::sync::watch;

struct ObservedPermission {
  status: PermissionStatus,
  state: watch::Receiver<StartupState>,
  seen: Arc<std::sync::Mutex<Vec<StartupState>>>,
  requests: Arc<AtomicUsize>,
}

impl CameraPermission for ObservedPermission {
  async fn request(&self) -> PermissionStatus {
    self.requests.fetch_add(1, Ordering::SeqCst);
    self.seen.lock().unwrap().push(*self.state.borrow());
    self.status
  }
}

#[derive(Error, Debug)]
#[error("模型文件损坏")]
struct CorruptModel;

struct TestLoader {
  delay: Duration,
  fail: bool,
  state: watch::Receiver<StartupState>,
  seen: Arc<std::sync::Mutex<Vec<StartupState>>>,
}

impl DetectorLoader for TestLoader {
  type Detector = ScriptedDetector;
  type Error = CorruptModel;

  async fn load(self) -> Result<Self::Detector, Self::Error> {
    self.seen.lock().unwrap().push(*self.state.borrow());
    tokio::time::sleep(self.delay).await;
    if self.fail {
      return Err(CorruptModel);
    }
    let (detector, _) = ScriptedDetector::new(vec![Step::Reply(vec![person(0.9)])]);
    Ok(detector)
  }
}

struct Fixture {
  startup: Startup<ScriptedDetector>,
  seen: Arc<std::sync::Mutex<Vec<StartupState>>>,
  requests: Arc<AtomicUsize>,
}

impl Fixture {
  fn new() -> Self {
    Self {
      startup: Startup::new(),
      seen: Arc::default(),
      requests: Arc::default(),
    }
  }

  fn permission(&self, status: PermissionStatus) -> ObservedPermission {
    ObservedPermission {
      status,
      state: self.startup.subscribe(),
      seen: self.seen.clone(),
      requests: self.requests.clone(),
    }
  }

  fn loader(&self, delay: Duration, fail: bool) -> TestLoader {
    TestLoader {
      delay,
      fail,
      state: self.startup.subscribe(),
      seen: self.seen.clone(),
    }
  }
}

#[tokio::test(start_paused = true)]
async fn walks_through_every_state() {
  let fx = Fixture::new();
  assert_eq!(fx.startup.state(), StartupState::Uninitialized);

  let state = fx
    .startup
    .run(
      fx.permission(PermissionStatus::Granted),
      fx.loader(Duration::from_millis(10), false),
    )
    .await;

  assert_eq!(state, StartupState::Ready);
  assert_eq!(
    *fx.seen.lock().unwrap(),
    vec![StartupState::PermissionRequested, StartupState::ModelLoading]
  );
  assert!(fx.startup.slot().is_loaded());
}

#[tokio::test(start_paused = true)]
async fn denied_permission_still_loads_the_model() {
  let fx = Fixture::new();
  let state = fx
    .startup
    .run(
      fx.permission(PermissionStatus::Denied),
      fx.loader(Duration::ZERO, false),
    )
    .await;
  assert_eq!(state, StartupState::Ready);
}

#[tokio::test(start_paused = true)]
async fn load_failure_stalls_in_model_loading() {
  let fx = Fixture::new();
  let state = fx
    .startup
    .run(
      fx.permission(PermissionStatus::Granted),
      fx.loader(Duration::ZERO, true),
    )
    .await;

  assert_eq!(state, StartupState::ModelLoading);
  assert!(!fx.startup.slot().is_loaded());

  let (_stop, signal) = stop_signal();
  let stats = RenderLoop::default()
    .with_tick_limit(Some(4))
    .run(EndlessFrames, fx.startup.slot(), renderer(), attached_target(), signal)
    .await;
  assert_eq!(stats.skipped_not_ready, 4);
  assert_eq!(stats.dispatched, 0);
}

#[tokio::test(start_paused = true)]
async fn ready_is_terminal() {
  let fx = Fixture::new();
  fx.startup
    .run(
      fx.permission(PermissionStatus::Granted),
      fx.loader(Duration::ZERO, false),
    )
    .await;

  let state = fx
    .startup
    .run(
      fx.permission(PermissionStatus::Granted),
      fx.loader(Duration::ZERO, true),
    )
    .await;
  assert_eq!(state, StartupState::Ready);
  assert_eq!(fx.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn loop_starts_detecting_once_the_model_arrives() {
  let fx = Fixture::new();
  let target = attached_target();
  let (_stop, signal) = stop_signal();

  let render_loop = tokio::spawn(
    RenderLoop::default()
      .with_tick_limit(Some(6))
      .run(EndlessFrames, fx.startup.slot(), renderer(), target.clone(), signal),
  );

  let state = fx
    .startup
    .run(
      fx.permission(PermissionStatus::Granted),
      fx.loader(Duration::from_millis(40), false),
    )
    .await;
  assert_eq!(state, StartupState::Ready);

  let stats = render_loop.await.unwrap();
  assert_eq!(stats.ticks, 6);
  assert!(stats.skipped_not_ready >= 1);
  assert!(stats.dispatched >= 1);
  assert_eq!(stats.skipped_not_ready + stats.dispatched, 6);
  assert_eq!(texts(&target), vec!["person: 90%"]);
}
