//! BLE 适配层
//!
//! - **adapter**: `BleAdapter` trait 与 btleplug 实现
//! - **session**: 单次扫描的去重会话
//! - **discovery**: 挂载/卸载驱动的扫描状态机
//! - **client**: 点击连接设备

pub mod adapter;
pub mod client;
pub mod discovery;
pub mod session;

use std::fmt;

pub use adapter::{BleAdapter, BtleplugAdapter, ScanSink, StateSink, Subscription};
pub use client::connect_device;
pub use discovery::{DiscoveryConfig, DiscoveryHandle, DiscoveryPhase, mount};
pub use session::DiscoverySession;

/// BLE 错误
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    #[error("No Bluetooth adapters found")]
    NoAdapter,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] btleplug::Error),
}

/// 适配器电源状态
///
/// 与移动端 BLE 库的状态枚举一致；btleplug 只会上报其中三种。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn name(&self) -> &'static str {
        match self {
            AdapterState::Unknown => "Unknown",
            AdapterState::Resetting => "Resetting",
            AdapterState::Unsupported => "Unsupported",
            AdapterState::Unauthorized => "Unauthorized",
            AdapterState::PoweredOff => "PoweredOff",
            AdapterState::PoweredOn => "PoweredOn",
        }
    }

    pub fn is_powered_on(&self) -> bool {
        matches!(self, AdapterState::PoweredOn)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<btleplug::api::CentralState> for AdapterState {
    fn from(state: btleplug::api::CentralState) -> Self {
        use btleplug::api::CentralState;

        #[allow(unreachable_patterns)]
        match state {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            _ => AdapterState::Unknown,
        }
    }
}

/// 扫描回调中上报的原始设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    pub id: String,
    pub name: Option<String>,
}

impl ScannedDevice {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }
}

/// 设备列表中的一项
///
/// 首次发现时的名称会被保留，之后同一 id 的上报不会覆盖它。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: String,
    pub name: Option<String>,
}

impl DeviceEntry {
    /// 显示名称，缺失或为空时为 `Unnamed`
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Unnamed",
        }
    }

    /// 列表标签: `Foo (A)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.display_name(), self.id)
    }
}

impl From<ScannedDevice> for DeviceEntry {
    fn from(device: ScannedDevice) -> Self {
        Self {
            id: device.id,
            name: device.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_label() {
        let named: DeviceEntry = ScannedDevice::new("A", Some("Foo")).into();
        assert_eq!(named.label(), "Foo (A)");

        let unnamed: DeviceEntry = ScannedDevice::new("B", None).into();
        assert_eq!(unnamed.label(), "Unnamed (B)");

        // 空名称与缺失名称一样处理
        let empty: DeviceEntry = ScannedDevice::new("C", Some("")).into();
        assert_eq!(empty.label(), "Unnamed (C)");
    }

    #[test]
    fn test_adapter_state_display() {
        assert_eq!(AdapterState::PoweredOn.to_string(), "PoweredOn");
        assert!(AdapterState::PoweredOn.is_powered_on());
        assert!(!AdapterState::PoweredOff.is_powered_on());
    }
}
