//! UI 上下文
//!
//! 所有屏幕状态的修改都经过这里：后台任务（动画时间线、扫描回调、
//! 权限请求）只持有 `UiHandle`，通过 `post` 投递事件；渲染循环持有
//! `UiContext`，在自己的线程上调用 `drain_into` 应用事件。

use crate::ble::DeviceEntry;
use crate::logging::LogEntry;
use crate::screen::ScreenState;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// 追加一行蓝牙日志
    Log(String),
    /// 新发现的设备
    DeviceDiscovered(DeviceEntry),
    /// 动画完成后的角度
    RotationSettled(f64),
    /// 诊断日志（来自 tracing）
    Diagnostic(LogEntry),
}

/// 投递到 UI 上下文的句柄，可跨线程克隆
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiHandle {
    /// 投递事件，UI 已关闭时返回 false
    pub fn post(&self, event: UiEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn log(&self, message: impl Into<String>) -> bool {
        self.post(UiEvent::Log(message.into()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct UiContext {
    rx: mpsc::UnboundedReceiver<UiEvent>,
}

impl UiContext {
    /// 应用所有已排队的事件，返回处理的数量
    pub fn drain_into(&mut self, state: &mut ScreenState) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            state.apply(event);
            applied += 1;
        }
        applied
    }

    pub fn try_next(&mut self) -> Option<UiEvent> {
        self.rx.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<UiEvent> {
        self.rx.recv().await
    }

    /// 关闭上下文，之后的 `post` 都会失败
    pub fn close(&mut self) {
        self.rx.close();
    }
}

pub fn channel() -> (UiHandle, UiContext) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, UiContext { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_after_close_fails() {
        let (ui, mut ctx) = channel();
        assert!(ui.log("before"));

        ctx.close();
        assert!(!ui.log("after"));
        assert!(ui.is_closed());

        // 关闭前排队的事件仍然可以取出
        assert_eq!(ctx.try_next(), Some(UiEvent::Log("before".to_string())));
        assert_eq!(ctx.try_next(), None);
    }

    #[test]
    fn test_drain_applies_in_order() {
        let (ui, mut ctx) = channel();
        let mut state = ScreenState::new();

        ui.log("one");
        ui.log("two");
        ui.post(UiEvent::RotationSettled(45.0));

        assert_eq!(ctx.drain_into(&mut state), 3);
        assert_eq!(state.bt_log.as_str(), "one\ntwo");
        assert_eq!(state.rotation_text(), "45.00°");
        assert_eq!(ctx.drain_into(&mut state), 0);
    }
}
