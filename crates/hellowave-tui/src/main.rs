//! Hello Wave TUI - 交互式终端界面
//!
//! 使用 ratatui 绘制可旋转的图片和附近的蓝牙设备列表。
//!
//! # 日志
//!
//! 日志默认显示在 TUI 的"诊断"标签页中。
//! 如需输出到文件进行调试，设置 RUST_LOG 环境变量：
//!
//! ```bash
//! RUST_LOG=debug cargo run -p hellowave-tui 2>> /tmp/hellowave.log
//! ```

mod app;
mod tui_log;
mod ui;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hellowave_core::{AppSettings, BleAdapter, BtleplugAdapter, UiHandle, ui_context};
use ratatui::prelude::*;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, Focus, Tab};
use tui_log::TuiLogLayer;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = AppSettings::load();
    let (ui, ctx) = ui_context::channel();

    // 初始化日志系统，发送到 TUI 诊断面板
    init_logging(ui.clone());

    let mut app = App::new(&settings, ui, ctx)?;
    match BtleplugAdapter::new().await {
        Ok(adapter) => {
            let adapter: Arc<dyn BleAdapter> = Arc::new(adapter);
            app.mount(adapter, &settings);
        }
        Err(e) => {
            tracing::warn!("Bluetooth adapter init failed: {}", e);
            app.mount_failed(&e.to_string());
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let res = run_app(&mut terminal, &mut app, settings.frame_interval()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.unmount().await;
    res
}

/// 初始化日志系统
///
/// - 总是将日志发送到 TUI 诊断面板
/// - 如果设置了 RUST_LOG，同时输出到 stderr（用于调试）
fn init_logging(ui: UiHandle) {
    // 桥接 log crate（hellowave-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let tui_layer = TuiLogLayer::new(ui);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hellowave_core=debug"));

    if std::env::var("RUST_LOG").is_ok() {
        use tracing_subscriber::fmt;

        let stderr_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .compact();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tui_layer)
            .with(stderr_layer)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tui_layer)
            .try_init();
    }
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    frame_interval: Duration,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // 以帧间隔轮询，动画期间保持重绘
        if event::poll(frame_interval)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(());
            }

            match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.toggle_focus(),
                KeyCode::BackTab => app.next_tab(),
                KeyCode::F(1) => app.tab = Tab::Screen,
                KeyCode::F(2) => app.tab = Tab::Diagnostics,
                code => match app.focus {
                    Focus::Input => match code {
                        KeyCode::Enter => app.rotate(),
                        KeyCode::Backspace => app.backspace(),
                        KeyCode::Char(c) => app.push_char(c),
                        _ => {}
                    },
                    Focus::Devices => match code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Up | KeyCode::Char('k') => app.previous_device(),
                        KeyCode::Down | KeyCode::Char('j') => app.next_device(),
                        KeyCode::Enter => app.connect_selected(),
                        KeyCode::Char('d') => app.toggle_log_level(),
                        KeyCode::Char('1') => app.tab = Tab::Screen,
                        KeyCode::Char('2') => app.tab = Tab::Diagnostics,
                        _ => {}
                    },
                },
            }
        }

        // 处理后台事件
        app.tick();
    }
}
