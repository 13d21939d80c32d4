// 该文件是 Guanlan （观澜） 项目的一部分。
// src/input/latest_frame.rs - 只保留最新一帧的相机输入
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

use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::{frame::TensorFrame, input::FrameSource};

type Slot = Arc<Mutex<Option<TensorFrame>>>;

/// 相机回调一侧，发布新帧会覆盖尚未被取走的旧帧
#[derive(Clone)]
pub struct FrameSender {
  slot: Slot,
}

/// 渲染循环一侧
pub struct LatestFrameSource {
  slot: Slot,
}

pub fn latest_frame() -> (FrameSender, LatestFrameSource) {
  let slot: Slot = Arc::new(Mutex::new(None));
  (
    FrameSender { slot: slot.clone() },
    LatestFrameSource { slot },
  )
}

impl FrameSender {
  /// 返回 `true` 表示覆盖了一帧尚未处理的旧帧
  pub fn publish(&self, frame: TensorFrame) -> bool {
    let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
    let replaced = slot.replace(frame).is_some();
    if replaced {
      trace!("丢弃未处理的旧帧");
    }
    replaced
  }
}

impl FrameSource for LatestFrameSource {
  fn next_frame(&mut self) -> Option<TensorFrame> {
    self
      .slot
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_latest_frame_is_delivered() {
    let (sender, mut source) = latest_frame();
    assert!(source.next_frame().is_none());

    assert!(!sender.publish(TensorFrame::blank(1, 1)));
    assert!(sender.publish(TensorFrame::blank(2, 2)));

    let frame = source.next_frame().unwrap();
    assert_eq!(frame.width(), 2);
    assert!(source.next_frame().is_none());
  }
}
