//! 设备发现流程
//!
//! 挂载时订阅适配器电源状态；收到 `PoweredOn` 后开始一次无过滤扫描，
//! 固定时长后无条件停止；卸载时停止仍在进行的扫描并注销订阅。
//!
//! ```text
//! Idle → Subscribed → Scanning → StoppedButSubscribed
//!          └───────────────┴──────────────┴──→ Unsubscribed (unmount)
//! ```
//!
//! 所有适配器回调都汇入同一个任务，屏幕状态只通过 `UiHandle` 修改。

use super::adapter::BleAdapter;
use super::session::DiscoverySession;
use super::{AdapterState, BleError, ScannedDevice};
use crate::config::AppSettings;
use crate::ui_context::{UiEvent, UiHandle};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// 默认扫描时长
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Idle,
    Subscribed,
    Scanning,
    StoppedButSubscribed,
    Unsubscribed,
}

impl DiscoveryPhase {
    pub fn is_scanning(&self) -> bool {
        matches!(self, DiscoveryPhase::Scanning)
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// 扫描开始后多久停止
    pub scan_duration: Duration,
    /// 订阅时是否立即推送当前电源状态
    pub emit_current_state: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_duration: DEFAULT_SCAN_DURATION,
            emit_current_state: true,
        }
    }
}

impl From<&AppSettings> for DiscoveryConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            scan_duration: settings.scan_duration(),
            emit_current_state: settings.emit_current_state,
        }
    }
}

/// 已挂载的发现任务
///
/// 直接丢弃句柄等同于卸载，但不会等待清理完成。
pub struct DiscoveryHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<DiscoveryPhase>,
    phase: watch::Receiver<DiscoveryPhase>,
}

impl DiscoveryHandle {
    pub fn phase(&self) -> DiscoveryPhase {
        *self.phase.borrow()
    }

    /// 订阅阶段变化
    pub fn watch_phase(&self) -> watch::Receiver<DiscoveryPhase> {
        self.phase.clone()
    }

    /// 卸载：停止扫描、注销订阅，返回最终阶段
    pub async fn unmount(mut self) -> DiscoveryPhase {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match (&mut self.task).await {
            Ok(phase) => phase,
            Err(e) => {
                warn!("Discovery task ended abnormally: {}", e);
                DiscoveryPhase::Unsubscribed
            }
        }
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// 挂载发现流程，必须在 tokio 运行时中调用
pub fn mount<A>(adapter: Arc<A>, ui: UiHandle, config: DiscoveryConfig) -> DiscoveryHandle
where
    A: BleAdapter + ?Sized,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (phase_tx, phase_rx) = watch::channel(DiscoveryPhase::Idle);

    let task = DiscoveryTask {
        adapter,
        ui,
        config,
        phase: phase_tx,
        session: None,
        scan_rx: None,
        deadline: None,
    };

    DiscoveryHandle {
        shutdown: Some(shutdown_tx),
        task: tokio::spawn(task.run(shutdown_rx)),
        phase: phase_rx,
    }
}

type ScanReceiver = mpsc::UnboundedReceiver<Result<ScannedDevice, BleError>>;

struct DiscoveryTask<A: ?Sized> {
    adapter: Arc<A>,
    ui: UiHandle,
    config: DiscoveryConfig,
    phase: watch::Sender<DiscoveryPhase>,
    session: Option<DiscoverySession>,
    scan_rx: Option<ScanReceiver>,
    deadline: Option<Instant>,
}

impl<A: BleAdapter + ?Sized> DiscoveryTask<A> {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> DiscoveryPhase {
        let (state_tx, mut state_rx) = mpsc::unbounded_channel();

        let subscription = match self
            .adapter
            .subscribe_state(state_tx, self.config.emit_current_state)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Failed to subscribe to adapter state: {}", e);
                self.ui.log(format!("Bluetooth State Error: {e}"));
                return DiscoveryPhase::Idle;
            }
        };
        self.set_phase(DiscoveryPhase::Subscribed);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(state) = state_rx.recv() => self.on_state(state).await,
                Some(result) = next_scan_result(&mut self.scan_rx) => self.on_scan_result(result),
                () = wait_deadline(self.deadline) => self.on_deadline().await,
            }
        }

        // 卸载清理：只停止仍在进行的扫描
        if self.current_phase().is_scanning() {
            debug!("Unmounted during scan, stopping");
            self.stop_scan().await;
        }
        subscription.remove();
        self.set_phase(DiscoveryPhase::Unsubscribed);
        debug!("Discovery unmounted");

        DiscoveryPhase::Unsubscribed
    }

    async fn on_state(&mut self, state: AdapterState) {
        debug!("Adapter state changed: {}", state);
        self.ui.log(format!("Bluetooth State: {state}"));

        if !state.is_powered_on() {
            return;
        }
        if self.current_phase().is_scanning() {
            debug!("Adapter reported PoweredOn while already scanning");
            return;
        }

        let (scan_tx, scan_rx) = mpsc::unbounded_channel();
        match self.adapter.start_scan(scan_tx).await {
            Ok(()) => {
                info!(
                    "Scanning for {} seconds",
                    self.config.scan_duration.as_secs_f32()
                );
                self.session = Some(DiscoverySession::new());
                self.scan_rx = Some(scan_rx);
                self.deadline = Some(Instant::now() + self.config.scan_duration);
                self.set_phase(DiscoveryPhase::Scanning);
            }
            Err(e) => {
                warn!("Failed to start scan: {}", e);
                self.ui.log(format!("Scan Error: {e}"));
            }
        }
    }

    fn on_scan_result(&mut self, result: Result<ScannedDevice, BleError>) {
        let device = match result {
            Ok(device) => device,
            Err(e) => {
                // 单次错误不会终止扫描
                self.ui.log(format!("Scan Error: {e}"));
                return;
            }
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(entry) = session.record(device) {
            debug!("Discovered {}", entry.label());
            self.ui.post(UiEvent::DeviceDiscovered(entry));
        }
    }

    async fn on_deadline(&mut self) {
        self.deadline = None;
        self.stop_scan().await;
        self.set_phase(DiscoveryPhase::StoppedButSubscribed);

        let found = self.session.as_ref().map_or(0, DiscoverySession::len);
        info!("Scan complete: found {} device(s)", found);
    }

    async fn stop_scan(&mut self) {
        self.scan_rx = None;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }

    fn current_phase(&self) -> DiscoveryPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: DiscoveryPhase) {
        self.phase.send_replace(phase);
    }
}

async fn next_scan_result(
    rx: &mut Option<ScanReceiver>,
) -> Option<Result<ScannedDevice, BleError>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = AppSettings {
            scan_duration_secs: 12,
            emit_current_state: false,
            ..Default::default()
        };

        let config = DiscoveryConfig::from(&settings);
        assert_eq!(config.scan_duration, Duration::from_secs(12));
        assert!(!config.emit_current_state);
    }

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.scan_duration, Duration::from_secs(5));
        assert!(config.emit_current_state);
    }
}
