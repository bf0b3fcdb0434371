//! 无界面运行屏幕逻辑
//!
//! 挂载与 TUI 相同的 `Screen`，把 UI 事件直接打印到终端。

use anyhow::{Result, bail};
use hellowave_core::{
    AppSettings, BleAdapter, DeviceEntry, DiscoveryPhase, HostPermissions, Platform, Screen,
    ScreenState, UiContext, UiEvent, ble, permissions, ui_context,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// 等待适配器上电的额外时间
const POWER_ON_GRACE: Duration = Duration::from_secs(10);

/// 扫描一轮，返回最终的屏幕状态
pub async fn scan(adapter: Arc<dyn BleAdapter>, settings: &AppSettings) -> Result<ScreenState> {
    let (ui, mut ctx) = ui_context::channel();
    let screen = Screen::mount(
        adapter,
        Arc::new(HostPermissions),
        Platform::detect(),
        settings,
        ui,
    );
    let mut phase = screen.watch_phase();
    let mut state = ScreenState::new();
    let deadline = Instant::now() + settings.scan_duration() + POWER_ON_GRACE;

    loop {
        tokio::select! {
            Some(event) = ctx.next() => {
                print_event(&event);
                state.apply(event);
            }
            changed = phase.changed() => {
                let finished = *phase.borrow() == DiscoveryPhase::StoppedButSubscribed;
                if changed.is_err() || finished {
                    break;
                }
            }
            _ = sleep_until(deadline) => {
                tracing::warn!("Scan did not finish in time; unmounting");
                break;
            }
        }
    }

    screen.unmount().await;
    drain(&mut ctx, &mut state);
    Ok(state)
}

/// 先扫描，再连接扫描到的设备
pub async fn connect(
    adapter: Arc<dyn BleAdapter>,
    settings: &AppSettings,
    id: &str,
) -> Result<ScreenState> {
    let mut state = scan(adapter.clone(), settings).await?;
    let Some(device) = state.devices.iter().find(|d| d.id == id).cloned() else {
        bail!("Device {} not found after scan", id);
    };

    connect_entry(adapter, device, &mut state).await?;
    Ok(state)
}

async fn connect_entry(
    adapter: Arc<dyn BleAdapter>,
    device: DeviceEntry,
    state: &mut ScreenState,
) -> Result<()> {
    let (ui, mut ctx) = ui_context::channel();
    ble::connect_device(adapter, device, ui).await?;
    drain(&mut ctx, state);
    Ok(())
}

/// 请求指定平台的蓝牙权限
pub async fn request_permissions(platform: Platform) -> ScreenState {
    let (ui, mut ctx) = ui_context::channel();
    let mut state = ScreenState::new();

    let required = permissions::required_permissions(platform);
    if required.is_empty() {
        println!("   {} 无需运行时权限", platform);
    }
    for permission in &required {
        println!("   - {}", permission.as_str());
    }

    permissions::request_on_mount(Arc::new(HostPermissions), platform, ui).await;
    drain(&mut ctx, &mut state);
    state
}

fn drain(ctx: &mut UiContext, state: &mut ScreenState) {
    while let Some(event) = ctx.try_next() {
        print_event(&event);
        state.apply(event);
    }
}

fn print_event(event: &UiEvent) {
    match event {
        UiEvent::Log(line) => println!("   {}", line),
        UiEvent::DeviceDiscovered(device) => println!("   📱 {}", device.label()),
        UiEvent::RotationSettled(_) | UiEvent::Diagnostic(_) => {}
    }
}
