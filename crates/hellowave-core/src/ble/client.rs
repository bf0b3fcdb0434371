//! 点击列表项连接设备
//!
//! 连接在后台任务中进行，结果只写入蓝牙日志：
//! 没有重试、没有超时、也没有断开入口。

use super::DeviceEntry;
use super::adapter::BleAdapter;
use crate::ui_context::UiHandle;
use log::{info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub fn connect_device<A>(adapter: Arc<A>, device: DeviceEntry, ui: UiHandle) -> JoinHandle<()>
where
    A: BleAdapter + ?Sized,
{
    tokio::spawn(async move {
        match adapter.connect(&device.id).await {
            Ok(()) => {
                info!("Connected to {}", device.id);
                ui.log(format!("Connected to {}", device.label()));
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", device.id, e);
                ui.log(format!("Connection error: {e}"));
            }
        }
    })
}
