//! 基于 tokio 的动画时间线
//!
//! 终端里没有原生动画引擎，这里用一个按帧推进的任务实现
//! `AnimationEngine`。每个过渡一个任务，被取代后自行退出。

use super::{AngleCell, AnimationEngine, AnimationError, OnComplete, Timing};
use log::trace;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// 约 60 FPS
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct TimelineEngine {
    runtime: Handle,
    frame_interval: Duration,
}

impl TimelineEngine {
    /// 绑定到当前 tokio 运行时
    pub fn new() -> Result<Self, AnimationError> {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_frame_interval(frame_interval: Duration) -> Result<Self, AnimationError> {
        Ok(Self::on_runtime(Handle::try_current()?, frame_interval))
    }

    pub fn on_runtime(runtime: Handle, frame_interval: Duration) -> Self {
        Self {
            runtime,
            frame_interval: frame_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }
}

impl AnimationEngine for TimelineEngine {
    fn transition_to(
        &self,
        cell: &AngleCell,
        target: f64,
        timing: Timing,
        on_complete: Option<OnComplete>,
    ) {
        let (from, generation) = cell.begin_transition();
        let cell = cell.clone();
        let frame_interval = self.frame_interval;

        trace!(
            "Transition #{} {:.2} -> {:.2} over {:?}",
            generation, from, target, timing.duration
        );

        self.runtime.spawn(async move {
            let start = Instant::now();
            let mut ticker = time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let progress = if timing.duration.is_zero() {
                    1.0
                } else {
                    start.elapsed().as_secs_f64() / timing.duration.as_secs_f64()
                };
                let finished = progress >= 1.0;
                let value = if finished {
                    target
                } else {
                    from + (target - from) * timing.easing.apply(progress)
                };

                if !cell.advance(generation, value) {
                    trace!("Transition #{} superseded", generation);
                    if let Some(on_complete) = on_complete {
                        on_complete(false, cell.get());
                    }
                    return;
                }

                if finished {
                    if let Some(on_complete) = on_complete {
                        on_complete(true, value);
                    }
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Easing;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<(bool, f64)>>>, OnComplete) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let on_complete: OnComplete = Box::new(move |finished, value| {
            sink.lock().unwrap().push((finished, value));
        });
        (calls, on_complete)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_reaches_target() {
        let engine = TimelineEngine::new().unwrap();
        let cell = AngleCell::new(0.0);
        let (calls, on_complete) = recorder();

        engine.transition_to(
            &cell,
            90.0,
            Timing::new(Duration::from_millis(1000)),
            Some(on_complete),
        );

        time::sleep(Duration::from_millis(500)).await;
        let midway = cell.get();
        assert!(midway > 0.0 && midway < 90.0, "midway = {midway}");
        assert!(calls.lock().unwrap().is_empty());

        time::sleep(Duration::from_millis(600)).await;
        assert_eq!(cell.get(), 90.0);
        assert_eq!(*calls.lock().unwrap(), vec![(true, 90.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retarget_starts_from_current_value() {
        let engine = TimelineEngine::new().unwrap();
        let cell = AngleCell::new(0.0);
        let (first_calls, first) = recorder();
        let (second_calls, second) = recorder();
        let timing = Timing::new(Duration::from_millis(1000)).with_easing(Easing::Linear);

        engine.transition_to(&cell, 100.0, timing, Some(first));
        time::sleep(Duration::from_millis(400)).await;

        let in_flight = cell.get();
        engine.transition_to(&cell, in_flight - 50.0, timing, Some(second));

        time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cell.get(), in_flight - 50.0);

        let first_calls = first_calls.lock().unwrap();
        assert_eq!(first_calls.len(), 1);
        assert!(!first_calls[0].0);
        assert_eq!(*second_calls.lock().unwrap(), vec![(true, in_flight - 50.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_jumps() {
        let engine = TimelineEngine::new().unwrap();
        let cell = AngleCell::new(5.0);

        engine.transition_to(&cell, -720.0, Timing::new(Duration::ZERO), None);
        time::sleep(DEFAULT_FRAME_INTERVAL).await;
        assert_eq!(cell.get(), -720.0);
    }

    #[test]
    fn test_new_requires_runtime() {
        assert!(matches!(
            TimelineEngine::new(),
            Err(AnimationError::NoRuntime(_))
        ));
    }
}
