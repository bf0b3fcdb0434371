//! 屏幕状态与生命周期
//!
//! `ScreenState` 是渲染函数的唯一输入，只在 UI 上下文中修改。
//! `Screen` 负责挂载时启动权限请求和设备发现，卸载时收回它们。

use crate::ble::{
    self, BleAdapter, DeviceEntry, DiscoveryConfig, DiscoveryHandle, DiscoveryPhase,
};
use crate::config::AppSettings;
use crate::logging::{BtLog, LogEntry};
use crate::permissions::{self, PermissionService, Platform};
use crate::ui_context::{UiEvent, UiHandle};
use log::debug;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 诊断日志最多保留的条数
pub const MAX_DIAGNOSTICS: usize = 500;

#[derive(Debug, Clone)]
pub struct ScreenState {
    /// 输入框中的原始文本，可以不是数字
    pub rotate_input: String,
    /// 最近一次完成的旋转角度
    pub display_rotation: f64,
    pub devices: Vec<DeviceEntry>,
    pub bt_log: BtLog,
    pub diagnostics: VecDeque<LogEntry>,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenState {
    pub fn new() -> Self {
        Self {
            rotate_input: "0".to_string(),
            display_rotation: 0.0,
            devices: Vec::new(),
            bt_log: BtLog::new(),
            diagnostics: VecDeque::with_capacity(MAX_DIAGNOSTICS),
        }
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(line) => self.bt_log.append(&line),
            UiEvent::DeviceDiscovered(entry) => {
                // 跨扫描会话也保持 id 唯一
                if !self.devices.iter().any(|d| d.id == entry.id) {
                    self.devices.push(entry);
                }
            }
            UiEvent::RotationSettled(angle) => self.display_rotation = angle,
            UiEvent::Diagnostic(entry) => {
                if self.diagnostics.len() >= MAX_DIAGNOSTICS {
                    self.diagnostics.pop_front();
                }
                self.diagnostics.push_back(entry);
            }
        }
    }

    /// `90.00°`
    pub fn rotation_text(&self) -> String {
        format!("{:.2}°", self.display_rotation)
    }

    pub fn device_labels(&self) -> Vec<String> {
        self.devices.iter().map(DeviceEntry::label).collect()
    }
}

/// 已挂载的屏幕
pub struct Screen<A: BleAdapter + ?Sized> {
    adapter: Arc<A>,
    ui: UiHandle,
    discovery: DiscoveryHandle,
    permission_task: Option<JoinHandle<()>>,
    connect_tasks: Vec<JoinHandle<()>>,
}

impl<A: BleAdapter + ?Sized> Screen<A> {
    /// 挂载：请求权限（不阻塞扫描）并开始设备发现
    pub fn mount(
        adapter: Arc<A>,
        permission_service: Arc<dyn PermissionService>,
        platform: Platform,
        settings: &AppSettings,
        ui: UiHandle,
    ) -> Self {
        let permission_task = settings.request_permissions.then(|| {
            let ui = ui.clone();
            tokio::spawn(async move {
                permissions::request_on_mount(permission_service, platform, ui).await;
            })
        });

        let discovery = ble::mount(
            adapter.clone(),
            ui.clone(),
            DiscoveryConfig::from(settings),
        );
        debug!("Screen mounted on {}", platform);

        Self {
            adapter,
            ui,
            discovery,
            permission_task,
            connect_tasks: Vec::new(),
        }
    }

    pub fn phase(&self) -> DiscoveryPhase {
        self.discovery.phase()
    }

    pub fn watch_phase(&self) -> watch::Receiver<DiscoveryPhase> {
        self.discovery.watch_phase()
    }

    /// 点击设备：后台连接，结果写入日志
    pub fn connect(&mut self, device: DeviceEntry) {
        self.connect_tasks.retain(|task| !task.is_finished());
        self.connect_tasks.push(ble::connect_device(
            self.adapter.clone(),
            device,
            self.ui.clone(),
        ));
    }

    /// 尚未完成的连接数
    pub fn pending_connects(&self) -> usize {
        self.connect_tasks
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// 卸载：停止扫描、注销订阅、放弃未完成的权限请求和连接
    ///
    /// 返回后不会再有事件投递到 UI 上下文。
    pub async fn unmount(self) -> DiscoveryPhase {
        let mut tasks = self.connect_tasks;
        tasks.extend(self.permission_task);
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            // 等待中止生效，已完成的任务直接返回
            let _ = task.await;
        }
        let phase = self.discovery.unmount().await;
        debug!("Screen unmounted");
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    fn entry(id: &str, name: Option<&str>) -> DeviceEntry {
        DeviceEntry {
            id: id.to_string(),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_initial_state() {
        let state = ScreenState::new();
        assert_eq!(state.rotate_input, "0");
        assert_eq!(state.rotation_text(), "0.00°");
        assert!(state.devices.is_empty());
        assert!(state.bt_log.is_empty());
    }

    #[test]
    fn test_devices_stay_unique_across_sessions() {
        let mut state = ScreenState::new();
        state.apply(UiEvent::DeviceDiscovered(entry("A", Some("Foo"))));
        state.apply(UiEvent::DeviceDiscovered(entry("B", None)));
        // 第二次扫描会话再次上报 A
        state.apply(UiEvent::DeviceDiscovered(entry("A", Some("Bar"))));

        assert_eq!(state.device_labels(), vec!["Foo (A)", "Unnamed (B)"]);
    }

    #[test]
    fn test_rotation_text_is_not_normalised() {
        let mut state = ScreenState::new();
        state.apply(UiEvent::RotationSettled(450.0));
        assert_eq!(state.rotation_text(), "450.00°");
        state.apply(UiEvent::RotationSettled(-12.346));
        assert_eq!(state.rotation_text(), "-12.35°");
    }

    #[test]
    fn test_diagnostics_are_bounded() {
        let mut state = ScreenState::new();
        for i in 0..MAX_DIAGNOSTICS + 10 {
            state.apply(UiEvent::Diagnostic(LogEntry::new(
                LogLevel::Debug,
                format!("line {i}"),
            )));
        }
        assert_eq!(state.diagnostics.len(), MAX_DIAGNOSTICS);
        assert_eq!(state.diagnostics[0].message, "line 10");
        assert_eq!(
            state.diagnostics.back().map(|e| e.message.as_str()),
            Some(format!("line {}", MAX_DIAGNOSTICS + 9).as_str())
        );
    }
}
