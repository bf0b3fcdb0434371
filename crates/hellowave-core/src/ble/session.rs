//! Discovery Session - 单次扫描的去重与累积
//!
//! 每次开始扫描都会创建新的会话，去重集合不会跨挂载残留。

use super::{DeviceEntry, ScannedDevice};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DiscoverySession {
    seen: HashSet<String>,
    devices: Vec<DeviceEntry>,
}

impl DiscoverySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次发现事件
    ///
    /// 首次出现的 id 返回新条目，重复 id 返回 `None`。
    pub fn record(&mut self, device: ScannedDevice) -> Option<DeviceEntry> {
        if !self.seen.insert(device.id.clone()) {
            return None;
        }

        let entry = DeviceEntry::from(device);
        self.devices.push(entry.clone());
        Some(entry)
    }

    /// 按发现顺序排列的设备
    pub fn devices(&self) -> &[DeviceEntry] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
