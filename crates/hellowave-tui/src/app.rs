//! Application state

use std::sync::Arc;

use anyhow::Result;
use hellowave_core::{
    AngleCell, AppSettings, BleAdapter, DiscoveryPhase, HostPermissions, LogLevel, Platform,
    RotationControl, Screen, ScreenState, TimelineEngine, UiContext, UiHandle,
};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Screen,
    Diagnostics,
}

/// 键盘焦点
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Input,
    Devices,
}

pub struct App {
    pub state: ScreenState,
    pub tab: Tab,
    pub focus: Focus,
    pub selected_device: usize,
    pub phase: DiscoveryPhase,
    pub log_level: LogLevel,
    ui: UiHandle,
    ctx: UiContext,
    rotation: RotationControl<TimelineEngine>,
    screen: Option<Screen<dyn BleAdapter>>,
    phase_rx: Option<watch::Receiver<DiscoveryPhase>>,
}

impl App {
    pub fn new(settings: &AppSettings, ui: UiHandle, ctx: UiContext) -> Result<Self> {
        let engine = TimelineEngine::with_frame_interval(settings.frame_interval())?;
        let rotation = RotationControl::new(
            AngleCell::default(),
            engine,
            settings.rotation.clone(),
            ui.clone(),
        );

        Ok(Self {
            state: ScreenState::new(),
            tab: Tab::Screen,
            focus: Focus::Input,
            selected_device: 0,
            phase: DiscoveryPhase::Idle,
            log_level: if settings.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            },
            ui,
            ctx,
            rotation,
            screen: None,
            phase_rx: None,
        })
    }

    /// 挂载屏幕：权限请求 + 设备发现
    pub fn mount(&mut self, adapter: Arc<dyn BleAdapter>, settings: &AppSettings) {
        let screen = Screen::mount(
            adapter,
            Arc::new(HostPermissions),
            Platform::detect(),
            settings,
            self.ui.clone(),
        );
        self.phase_rx = Some(screen.watch_phase());
        self.screen = Some(screen);
    }

    /// 没有可用的蓝牙适配器时只显示原因
    pub fn mount_failed(&mut self, reason: &str) {
        self.ui.log(format!("Bluetooth unavailable: {reason}"));
    }

    pub async fn unmount(mut self) {
        self.rotation.unmount();
        if let Some(screen) = self.screen.take() {
            screen.unmount().await;
        }
        self.ctx.close();
    }

    /// 每帧读取，驱动图片旋转
    pub fn angle(&self) -> f64 {
        self.rotation.angle().get()
    }

    pub fn is_scanning(&self) -> bool {
        self.phase.is_scanning()
    }

    pub fn push_char(&mut self, c: char) {
        self.state.rotate_input.push(c);
    }

    pub fn backspace(&mut self) {
        self.state.rotate_input.pop();
    }

    pub fn rotate(&mut self) {
        let target = self.rotation.activate(&self.state.rotate_input);
        tracing::debug!("Rotate requested: target {:.2}°", target);
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Input => Focus::Devices,
            Focus::Devices => Focus::Input,
        };
    }

    pub fn next_tab(&mut self) {
        self.tab = match self.tab {
            Tab::Screen => Tab::Diagnostics,
            Tab::Diagnostics => Tab::Screen,
        };
    }

    pub fn toggle_log_level(&mut self) {
        self.log_level = match self.log_level {
            LogLevel::Debug | LogLevel::Trace => LogLevel::Info,
            _ => LogLevel::Debug,
        };
    }

    pub fn next_device(&mut self) {
        if !self.state.devices.is_empty() {
            self.selected_device = (self.selected_device + 1) % self.state.devices.len();
        }
    }

    pub fn previous_device(&mut self) {
        if !self.state.devices.is_empty() {
            self.selected_device = self
                .selected_device
                .checked_sub(1)
                .unwrap_or(self.state.devices.len() - 1);
        }
    }

    /// 连接选中的设备，结果写入蓝牙日志
    pub fn connect_selected(&mut self) {
        let Some(device) = self.state.devices.get(self.selected_device).cloned() else {
            return;
        };
        match &mut self.screen {
            Some(screen) => screen.connect(device),
            None => {
                self.ui.log("Connection error: no Bluetooth adapter");
            }
        }
    }

    /// 应用后台事件
    pub fn tick(&mut self) {
        self.ctx.drain_into(&mut self.state);
        if let Some(rx) = &self.phase_rx {
            self.phase = *rx.borrow();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hellowave_core::{DeviceEntry, UiEvent, ui_context};

    fn app() -> App {
        let (ui, ctx) = ui_context::channel();
        App::new(&AppSettings::default(), ui, ctx).unwrap()
    }

    #[tokio::test]
    async fn test_device_selection_wraps() {
        let mut app = app();
        app.previous_device();
        assert_eq!(app.selected_device, 0);

        for id in ["A", "B", "C"] {
            app.ui.post(UiEvent::DeviceDiscovered(DeviceEntry {
                id: id.to_string(),
                name: None,
            }));
        }
        app.tick();

        app.previous_device();
        assert_eq!(app.selected_device, 2);
        app.next_device();
        assert_eq!(app.selected_device, 0);
    }

    #[tokio::test]
    async fn test_input_editing() {
        let mut app = app();
        app.backspace();
        assert_eq!(app.state.rotate_input, "");
        for c in "-45".chars() {
            app.push_char(c);
        }
        assert_eq!(app.state.rotate_input, "-45");
    }

    #[tokio::test]
    async fn test_connect_without_adapter_is_logged() {
        let mut app = app();
        app.ui.post(UiEvent::DeviceDiscovered(DeviceEntry {
            id: "A".to_string(),
            name: None,
        }));
        app.tick();

        app.connect_selected();
        app.tick();
        assert_eq!(
            app.state.bt_log.as_str(),
            "Connection error: no Bluetooth adapter"
        );
    }

    #[tokio::test]
    async fn test_focus_and_tabs_cycle() {
        let mut app = app();
        app.toggle_focus();
        assert_eq!(app.focus, Focus::Devices);
        app.toggle_focus();
        assert_eq!(app.focus, Focus::Input);

        app.next_tab();
        assert_eq!(app.tab, Tab::Diagnostics);
        app.next_tab();
        assert_eq!(app.tab, Tab::Screen);
        assert!(!app.is_scanning());
        app.toggle_log_level();
        assert_eq!(app.log_level, LogLevel::Debug);
    }
}
