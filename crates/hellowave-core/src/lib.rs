//! Hellowave Core Library
//!
//! 一个可旋转图片 + 附近 BLE 设备列表的交互屏幕的核心实现，
//! 与具体 UI（TUI / CLI）无关。
//!
//! # 模块
//!
//! - **ble**: 适配器绑定、扫描会话、发现状态机、点击连接
//! - **animation**: 共享角度与过渡引擎
//! - **rotation**: 输入解析与旋转控制
//! - **permissions**: 平台蓝牙权限请求
//! - **screen**: 屏幕状态与挂载/卸载
//! - **ui_context**: 投递到 UI 线程的事件通道
//!
//! # 使用示例
//!
//! ```ignore
//! use hellowave_core::{AppSettings, BtleplugAdapter, HostPermissions, Platform, Screen};
//!
//! let settings = AppSettings::load();
//! let (ui, mut ctx) = hellowave_core::ui_context::channel();
//! let adapter = Arc::new(BtleplugAdapter::new().await?);
//!
//! // 1. 挂载：订阅电源状态，上电后扫描 5 秒
//! let screen = Screen::mount(adapter, Arc::new(HostPermissions), Platform::detect(), &settings, ui);
//!
//! // 2. 渲染循环中应用事件
//! ctx.drain_into(&mut state);
//!
//! // 3. 卸载
//! screen.unmount().await;
//! ```

pub mod animation;
pub mod ble;
pub mod config;
pub mod logging;
pub mod permissions;
pub mod rotation;
pub mod screen;
pub mod ui_context;

// BLE re-exports
pub use ble::{
    AdapterState, BleAdapter, BleError, BtleplugAdapter, DeviceEntry, DiscoveryConfig,
    DiscoveryHandle, DiscoveryPhase, DiscoverySession, ScannedDevice, Subscription,
};

// Animation re-exports
pub use animation::{AngleCell, AnimationEngine, AnimationError, Easing, TimelineEngine, Timing};
pub use rotation::{RotationControl, RotationMode, RotationSettings, parse_degrees};

// Screen re-exports
pub use config::{AppSettings, ConfigError};
pub use logging::{BtLog, LogEntry, LogLevel};
pub use permissions::{
    HostPermissions, Permission, PermissionError, PermissionService, PermissionStatus, Platform,
};
pub use screen::{Screen, ScreenState};
pub use ui_context::{UiContext, UiEvent, UiHandle};
