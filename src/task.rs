// 该文件是 Guanlan （观澜） 项目的一部分。
// src/task.rs - 渲染循环
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

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::{
  input::FrameSource,
  model::{Detector, DetectorSlot},
  output::{DrawOutcome, OverlayOrdering, RenderSurface, RenderTarget, overlay::OverlayRenderer},
};

pub const DEFAULT_FPS: f64 = 60.0;

/// 停止渲染循环
#[derive(Clone)]
pub struct StopHandle {
  tx: Arc<watch::Sender<bool>>,
}

pub struct StopSignal {
  rx: watch::Receiver<bool>,
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
  let (tx, rx) = watch::channel(false);
  (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

impl StopHandle {
  pub fn stop(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_stopped(&self) -> bool {
    *self.tx.borrow()
  }
}

impl StopSignal {
  pub fn is_stopped(&self) -> bool {
    *self.rx.borrow()
  }

  async fn wait(&mut self) {
    if self.rx.wait_for(|stopped| *stopped).await.is_err() {
      // 所有句柄都已释放，循环再也不会被停止
      std::future::pending::<()>().await;
    }
  }
}

#[derive(Default)]
struct Counters {
  ticks: AtomicU64,
  frames: AtomicU64,
  skipped_no_frame: AtomicU64,
  skipped_not_ready: AtomicU64,
  dispatched: AtomicU64,
  failures: AtomicU64,
  drawn: AtomicU64,
  stale: AtomicU64,
  detached: AtomicU64,
}

fn bump(counter: &AtomicU64) -> u64 {
  counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl Counters {
  fn snapshot(&self) -> LoopStats {
    let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
    LoopStats {
      ticks: get(&self.ticks),
      frames: get(&self.frames),
      skipped_no_frame: get(&self.skipped_no_frame),
      skipped_not_ready: get(&self.skipped_not_ready),
      dispatched: get(&self.dispatched),
      failures: get(&self.failures),
      drawn: get(&self.drawn),
      stale: get(&self.stale),
      detached: get(&self.detached),
    }
  }
}

/// 循环结束时的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
  pub ticks: u64,
  /// 成功拉取到的帧
  pub frames: u64,
  pub skipped_no_frame: u64,
  pub skipped_not_ready: u64,
  pub dispatched: u64,
  pub failures: u64,
  pub drawn: u64,
  pub stale: u64,
  /// 完成时表面尚未挂载
  pub detached: u64,
}

/// 按显示刷新节奏驱动“取帧-检测-绘制”的循环
///
/// 每个节拍最多派发一次检测，派发后不等待结果就进入下一个节拍；
/// 检测结果按序号决定是否绘制，过期结果被丢弃。
#[derive(Debug, Clone)]
pub struct RenderLoop {
  tick_interval: Duration,
  tick_limit: Option<u64>,
  ordering: OverlayOrdering,
}

impl Default for RenderLoop {
  fn default() -> Self {
    Self {
      tick_interval: Duration::from_secs_f64(1.0 / DEFAULT_FPS),
      tick_limit: None,
      ordering: OverlayOrdering::default(),
    }
  }
}

struct TickContext<D, S> {
  slot: DetectorSlot<D>,
  renderer: Arc<OverlayRenderer>,
  target: RenderTarget<S>,
  sequencer: Arc<AtomicU64>,
  counters: Arc<Counters>,
  ordering: OverlayOrdering,
}

impl RenderLoop {
  pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
    self.tick_interval = tick_interval;
    self
  }

  /// 非正数的帧率保持默认节拍
  pub fn with_fps(self, fps: f64) -> Self {
    if fps > 0.0 && fps.is_finite() {
      self.with_tick_interval(Duration::from_secs_f64(1.0 / fps))
    } else {
      self
    }
  }

  pub fn with_tick_limit(mut self, tick_limit: Option<u64>) -> Self {
    self.tick_limit = tick_limit;
    self
  }

  pub fn with_ordering(mut self, ordering: OverlayOrdering) -> Self {
    self.ordering = ordering;
    self
  }

  pub fn tick_interval(&self) -> Duration {
    self.tick_interval
  }

  /// 运行直到收到停止信号或达到节拍上限
  ///
  /// 停止信号会中止尚未完成的检测；达到节拍上限时等待它们完成并按规则绘制，
  /// 等待期间收到停止信号同样中止。
  pub async fn run<F, D, S>(
    self,
    mut source: F,
    slot: DetectorSlot<D>,
    renderer: OverlayRenderer,
    target: RenderTarget<S>,
    mut stop: StopSignal,
  ) -> LoopStats
  where
    F: FrameSource,
    D: Detector,
    S: RenderSurface,
  {
    let context = TickContext {
      slot,
      renderer: Arc::new(renderer),
      target,
      sequencer: Arc::new(AtomicU64::new(0)),
      counters: Arc::new(Counters::default()),
      ordering: self.ordering,
    };
    let mut in_flight = JoinSet::new();

    let mut ticker = tokio::time::interval(self.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("开始渲染循环, 节拍间隔: {:.2?}", self.tick_interval);

    let mut interrupted = loop {
      if stop.is_stopped() {
        break true;
      }
      tokio::select! {
        biased;
        _ = stop.wait() => break true,
        _ = ticker.tick() => {}
      }

      while in_flight.try_join_next().is_some() {}

      let tick = bump(&context.counters.ticks);
      Self::tick(&context, &mut source, &mut in_flight);

      if self.tick_limit.map(|n| tick >= n).unwrap_or(false) {
        info!("达到指定节拍数 {}, 退出渲染循环", tick);
        break false;
      }
    };

    if interrupted {
      warn!("停止信号接收, 中止 {} 个进行中的检测", in_flight.len());
      in_flight.abort_all();
    }
    loop {
      tokio::select! {
        biased;
        _ = stop.wait(), if !interrupted => {
          warn!("等待检测完成时收到停止信号, 中止 {} 个进行中的检测", in_flight.len());
          in_flight.abort_all();
          interrupted = true;
        }
        joined = in_flight.join_next() => match joined {
          Some(Err(e)) if e.is_panic() => warn!("检测任务异常退出: {}", e),
          Some(_) => {}
          None => break,
        },
      }
    }

    let stats = context.counters.snapshot();
    info!("渲染循环结束: {:?}", stats);
    stats
  }

  fn tick<F, D, S>(context: &TickContext<D, S>, source: &mut F, in_flight: &mut JoinSet<()>)
  where
    F: FrameSource,
    D: Detector,
    S: RenderSurface,
  {
    let counters = &context.counters;

    let Some(frame) = source.next_frame() else {
      bump(&counters.skipped_no_frame);
      trace!("没有可用的帧, 跳过本节拍");
      return;
    };
    bump(&counters.frames);

    let Some(detector) = context.slot.get() else {
      bump(&counters.skipped_not_ready);
      trace!("模型尚未就绪, 跳过本节拍");
      return;
    };

    let sequence = context.sequencer.fetch_add(1, Ordering::SeqCst) + 1;
    bump(&counters.dispatched);
    trace!("派发第 {} 帧检测, 形状 {:?}", sequence, frame.shape());

    let renderer = context.renderer.clone();
    let target = context.target.clone();
    let sequencer = context.sequencer.clone();
    let counters = context.counters.clone();
    let ordering = context.ordering;

    in_flight.spawn(async move {
      let now = Instant::now();
      match detector.detect(&frame).await {
        Ok(detections) => {
          debug!(
            "第 {} 帧检测完成, {} 个结果, 耗时: {:.2?}",
            sequence,
            detections.len(),
            now.elapsed()
          );
          let latest = sequencer.load(Ordering::SeqCst);
          let outcome = renderer.render_sequenced(
            &target,
            sequence,
            latest,
            ordering,
            &detections,
            frame.size(),
          );
          match outcome {
            DrawOutcome::Drawn => bump(&counters.drawn),
            DrawOutcome::Stale => bump(&counters.stale),
            DrawOutcome::Detached => {
              trace!("绘制表面尚未挂载, 丢弃第 {} 帧结果", sequence);
              bump(&counters.detached)
            }
          };
        }
        Err(e) => {
          bump(&counters.failures);
          warn!("第 {} 帧检测失败: {}", sequence, e);
        }
      }
    });
  }
}
