//! BLE Adapter - 主机蓝牙栈的绑定
//!
//! `BleAdapter` 是发现流程依赖的唯一接口，`BtleplugAdapter` 将它绑定到
//! btleplug 的第一个适配器上。测试中可以替换为记录调用的实现。

use super::{AdapterState, BleError, ScannedDevice};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures_util::StreamExt;
use log::{debug, info, trace};
use std::collections::HashSet;
use std::hash::Hash;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// 电源状态推送通道
pub type StateSink = mpsc::UnboundedSender<AdapterState>;

/// 扫描结果推送通道，每个发现事件一条，错误不会终止扫描
pub type ScanSink = mpsc::UnboundedSender<Result<ScannedDevice, BleError>>;

/// 电源状态订阅句柄
///
/// `remove` 与 `Drop` 共用同一个回调，保证只注销一次。
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn remove(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
pub trait BleAdapter: Send + Sync + 'static {
    /// 订阅电源状态变化，`emit_current` 为 true 时立即推送当前状态
    async fn subscribe_state(
        &self,
        sink: StateSink,
        emit_current: bool,
    ) -> Result<Subscription, BleError>;

    /// 开始无过滤扫描（无服务 UUID、无扫描选项）
    async fn start_scan(&self, sink: ScanSink) -> Result<(), BleError>;

    /// 停止扫描；未在扫描时为空操作
    async fn stop_scan(&self) -> Result<(), BleError>;

    /// 连接设备，无超时也无重试
    async fn connect(&self, device_id: &str) -> Result<(), BleError>;
}

pub struct BtleplugAdapter {
    central: Adapter,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugAdapter {
    pub async fn new() -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let central = adapters.into_iter().next().ok_or(BleError::NoAdapter)?;

        if let Ok(info) = central.adapter_info().await {
            debug!("Using Bluetooth adapter: {}", info);
        }

        Ok(Self {
            central,
            scan_task: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl BleAdapter for BtleplugAdapter {
    async fn subscribe_state(
        &self,
        sink: StateSink,
        emit_current: bool,
    ) -> Result<Subscription, BleError> {
        let mut events = self.central.events().await?;

        if emit_current {
            let state: AdapterState = self.central.adapter_state().await?.into();
            debug!("Current adapter state: {}", state);
            let _ = sink.send(state);
        }

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::StateUpdate(state) = event {
                    if sink.send(state.into()).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(move || {
            trace!("Removing adapter state subscription");
            task.abort();
        }))
    }

    async fn start_scan(&self, sink: ScanSink) -> Result<(), BleError> {
        let mut guard = self.scan_task.lock().await;
        if let Some(previous) = guard.take() {
            previous.abort();
        }

        let mut events = self.central.events().await?;
        self.central.start_scan(ScanFilter::default()).await?;
        info!("Started unfiltered BLE scan");

        let central = self.central.clone();
        *guard = Some(tokio::spawn(async move {
            let mut reported = ReportedPeripherals::default();
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                if reported.contains(&id) {
                    continue;
                }

                let result = match scanned_device(&central, &id).await {
                    Ok(Some(device)) => {
                        reported.insert(id);
                        Ok(device)
                    }
                    // 属性尚未就绪，等待后续的 DeviceUpdated
                    Ok(None) => continue,
                    Err(e) => Err(e),
                };

                if sink.send(result).is_err() {
                    break;
                }
            }
        }));

        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        let Some(task) = self.scan_task.lock().await.take() else {
            trace!("stop_scan called while idle");
            return Ok(());
        };

        task.abort();
        self.central.stop_scan().await?;
        info!("Stopped BLE scan");
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<(), BleError> {
        let peripherals = self.central.peripherals().await?;

        for peripheral in peripherals {
            if let Some(props) = peripheral.properties().await? {
                if props.address.to_string().eq_ignore_ascii_case(device_id) {
                    info!("Connecting to {}", device_id);
                    peripheral
                        .connect()
                        .await
                        .map_err(|e| BleError::ConnectionFailed(e.to_string()))?;
                    return Ok(());
                }
            }
        }

        Err(BleError::DeviceNotFound(device_id.to_string()))
    }
}

async fn scanned_device(
    central: &Adapter,
    id: &PeripheralId,
) -> Result<Option<ScannedDevice>, BleError> {
    let peripheral = central.peripheral(id).await?;
    Ok(peripheral.properties().await?.map(|props| ScannedDevice {
        id: props.address.to_string(),
        name: props.local_name,
    }))
}

/// 一次扫描中已经上报过的外设
///
/// 属性未就绪的外设不记录，之后的更新事件还会再查询一次。
#[derive(Debug)]
struct ReportedPeripherals<K> {
    seen: HashSet<K>,
}

impl<K> Default for ReportedPeripherals<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> ReportedPeripherals<K> {
    fn contains(&self, id: &K) -> bool {
        self.seen.contains(id)
    }

    fn insert(&mut self, id: K) {
        self.seen.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_removes_once() {
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = removed.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.remove();
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_removes_on_drop() {
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = removed.clone();
        {
            let _subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unready_peripheral_is_queried_again() {
        let mut reported = ReportedPeripherals::default();

        // DeviceDiscovered 时属性为空，不记录，后续更新仍会查询
        assert!(!reported.contains(&"hci0/dev_A"));

        // DeviceUpdated 带来了属性，之后的更新跳过
        reported.insert("hci0/dev_A");
        assert!(reported.contains(&"hci0/dev_A"));
        assert!(!reported.contains(&"hci0/dev_B"));
    }
}
