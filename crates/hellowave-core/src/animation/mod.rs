//! 动画驱动
//!
//! `AngleCell` 是渲染端每帧读取的共享角度；`AnimationEngine` 负责把它
//! 在给定时长内过渡到目标值。完成回调在动画时间线上执行，调用方需要
//! 自己把结果投递回 UI 上下文。

mod timeline;

pub use timeline::{DEFAULT_FRAME_INTERVAL, TimelineEngine};

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// 动画错误
#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("No async runtime available for the animation timeline")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// 完成回调: `(finished, value)`
///
/// 被新的过渡打断时 `finished` 为 false。
pub type OnComplete = Box<dyn FnOnce(bool, f64) + Send + 'static>;

#[derive(Debug, Default)]
struct CellState {
    value: f64,
    generation: u64,
}

/// 共享角度（度）
///
/// 不做归一化，可以超过 360 或为负数。每次开始过渡或直接赋值都会
/// 推进代数，旧的过渡据此发现自己已被取代。
#[derive(Debug, Clone, Default)]
pub struct AngleCell {
    inner: Arc<Mutex<CellState>>,
}

impl AngleCell {
    pub fn new(value: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CellState {
                value,
                generation: 0,
            })),
        }
    }

    pub fn get(&self) -> f64 {
        self.lock().value
    }

    /// 直接赋值，同时取消进行中的过渡
    pub fn set(&self, value: f64) {
        let mut state = self.lock();
        state.generation += 1;
        state.value = value;
    }

    /// 开始新的过渡，返回 `(起始值, 代数)`
    pub fn begin_transition(&self) -> (f64, u64) {
        let mut state = self.lock();
        state.generation += 1;
        (state.value, state.generation)
    }

    /// 仅当代数仍然有效时写入，返回是否写入成功
    pub fn advance(&self, generation: u64, value: f64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.value = value;
        true
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CellState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 缓动曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    #[default]
    EaseInOutQuad,
}

impl Easing {
    /// `t` 在 [0, 1] 内
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub duration: Duration,
    pub easing: Easing,
}

impl Timing {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            easing: Easing::default(),
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

pub trait AnimationEngine: Send + Sync {
    /// 从当前值过渡到 `target`
    ///
    /// 进行中的过渡会被取代，新的过渡从当前（中间）值开始。
    fn transition_to(
        &self,
        cell: &AngleCell,
        target: f64,
        timing: Timing,
        on_complete: Option<OnComplete>,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::EaseInOutQuad] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(2.0), 1.0);
        }
        assert!((Easing::EaseInOutQuad.apply(0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_easing_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=100 {
            let v = Easing::EaseInOutQuad.apply(f64::from(i) / 100.0);
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let cell = AngleCell::new(10.0);
        let (from, first) = cell.begin_transition();
        assert_eq!(from, 10.0);

        let (_, second) = cell.begin_transition();
        assert!(!cell.advance(first, 99.0));
        assert!(cell.advance(second, 20.0));
        assert_eq!(cell.get(), 20.0);
        assert!(!cell.is_current(first));
    }

    #[test]
    fn test_set_cancels_transition() {
        let cell = AngleCell::default();
        let (_, generation) = cell.begin_transition();
        cell.set(-30.0);
        assert!(!cell.is_current(generation));
        assert_eq!(cell.get(), -30.0);
    }
}
