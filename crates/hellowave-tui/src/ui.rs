//! UI rendering module

use ratatui::{
    prelude::*,
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Tabs, Wrap,
        canvas::{Canvas, Circle, Line as CanvasLine},
    },
};

use crate::app::{App, Focus, Tab};
use hellowave_core::DiscoveryPhase;

/// 车辆侧视图轮廓，单位坐标，宽高比约 2:1
pub const VAN_OUTLINE: &[(f64, f64)] = &[
    (-0.9, -0.25),
    (0.9, -0.25),
    (0.92, 0.0),
    (0.7, 0.1),
    (0.55, 0.4),
    (-0.9, 0.4),
];

const VAN_WINDOW: &[(f64, f64)] = &[(0.3, 0.15), (0.62, 0.15), (0.5, 0.35), (0.3, 0.35)];

const VAN_WHEELS: &[(f64, f64)] = &[(-0.55, -0.25), (0.55, -0.25)];

const WHEEL_RADIUS: f64 = 0.12;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    match app.tab {
        Tab::Screen => draw_screen_tab(frame, app, chunks[1]),
        Tab::Diagnostics => draw_diagnostics_tab(frame, app, chunks[1]),
    }
    draw_status_bar(frame, app, chunks[2]);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let titles = vec!["屏幕 [F1]", "诊断 [F2]"];
    let selected = match app.tab {
        Tab::Screen => 0,
        Tab::Diagnostics => 1,
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Hello Wave "),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow).bold());

    frame.render_widget(tabs, area);
}

fn draw_screen_tab(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // Image
            Constraint::Length(1), // Settled rotation
            Constraint::Length(8), // Devices
            Constraint::Length(6), // Bluetooth log
            Constraint::Length(3), // Input
        ])
        .split(area);

    draw_van(frame, app.angle(), chunks[0]);

    let rotation = Paragraph::new(app.state.rotation_text())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White).bold());
    frame.render_widget(rotation, chunks[1]);

    draw_devices(frame, app, chunks[2]);
    draw_bt_log(frame, app, chunks[3]);
    draw_input(frame, app, chunks[4]);
}

/// 按当前角度绘制车辆，每帧重新计算
fn draw_van(frame: &mut Frame, degrees: f64, area: Rect) {
    let (x_half, scale) = canvas_geometry(area);

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(" 🚐 "))
        .marker(symbols::Marker::Braille)
        .x_bounds([-x_half, x_half])
        .y_bounds([-1.0, 1.0])
        .paint(move |ctx| {
            for line in outline_lines(VAN_OUTLINE, degrees, scale) {
                ctx.draw(&line);
            }
            for line in outline_lines(VAN_WINDOW, degrees, scale) {
                ctx.draw(&line);
            }
            for &(x, y) in VAN_WHEELS {
                let (x, y) = rotate_point((x * scale, y * scale), degrees);
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: WHEEL_RADIUS * scale,
                    color: Color::Gray,
                });
            }
        });

    frame.render_widget(canvas, area);
}

/// 盲文点阵近似正方形，按区域宽高比调整 x 范围，避免旋转后变形
fn canvas_geometry(area: Rect) -> (f64, f64) {
    let width = f64::from(area.width.saturating_sub(2).max(1));
    let height = f64::from(area.height.saturating_sub(2).max(1));
    let x_half = width / (2.0 * height);
    let scale = x_half.min(1.0) * 0.9;
    (x_half, scale)
}

/// 顺时针旋转（与屏幕上的 `rotate(deg)` 一致），画布 y 轴向上
pub fn rotate_point((x, y): (f64, f64), degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos + y * sin, -x * sin + y * cos)
}

fn outline_lines(points: &[(f64, f64)], degrees: f64, scale: f64) -> Vec<CanvasLine> {
    let rotated: Vec<(f64, f64)> = points
        .iter()
        .map(|&(x, y)| rotate_point((x * scale, y * scale), degrees))
        .collect();

    rotated
        .iter()
        .zip(rotated.iter().cycle().skip(1))
        .map(|(&(x1, y1), &(x2, y2))| CanvasLine::new(x1, y1, x2, y2, Color::White))
        .collect()
}

fn draw_devices(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.is_scanning() {
        " 🔍 扫描中... "
    } else {
        " 📱 附近蓝牙设备 "
    };
    let border_style = focus_style(app.focus == Focus::Devices);

    if app.state.devices.is_empty() {
        let empty = Paragraph::new("No devices found")
            .style(Style::default().fg(Color::Gray))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(title),
            );
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .state
        .devices
        .iter()
        .enumerate()
        .map(|(i, dev)| {
            let style = if i == app.selected_device && app.focus == Focus::Devices {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(dev.label()).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );

    frame.render_widget(list, area);
}

fn draw_bt_log(frame: &mut Frame, app: &App, area: Rect) {
    // 始终显示最新的几行
    let visible = usize::from(area.height.saturating_sub(2));
    let scroll = app.state.bt_log.line_count().saturating_sub(visible);

    let log = Paragraph::new(app.state.bt_log.as_str())
        .block(Block::default().borders(Borders::ALL).title(" 📋 蓝牙日志 "))
        .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));

    frame.render_widget(log, area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Input;
    let cursor = if focused { "▏" } else { "" };

    let input = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{}{}", app.state.rotate_input, cursor),
            Style::default().fg(Color::White).bold(),
        ),
        Span::raw("   "),
        Span::styled("[Enter] Rotate", Style::default().fg(Color::Cyan)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(focused))
            .title(" Degrees "),
    );

    frame.render_widget(input, area);
}

fn draw_diagnostics_tab(frame: &mut Frame, app: &App, area: Rect) {
    let visible = usize::from(area.height.saturating_sub(2));
    let items: Vec<ListItem> = app
        .state
        .diagnostics
        .iter()
        .rev()
        .filter(|entry| entry.level <= app.log_level)
        .take(visible)
        .map(|entry| ListItem::new(entry.to_string()))
        .collect();

    let title = format!(" 🩺 诊断日志 ({}) ", app.log_level);
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));

    frame.render_widget(list, area);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let phase_text = match app.phase {
        DiscoveryPhase::Idle => " ⏸️  空闲 ",
        DiscoveryPhase::Subscribed => " 📡 等待蓝牙 ",
        DiscoveryPhase::Scanning => " 🔍 扫描中 ",
        DiscoveryPhase::StoppedButSubscribed => " ✅ 扫描结束 ",
        DiscoveryPhase::Unsubscribed => " ⏹️  已卸载 ",
    };

    let status = Paragraph::new(format!(
        "{}│ 设备: {} │ [Tab]焦点 [Shift+Tab]标签 [Enter]旋转/连接 [d]级别 [Esc]退出",
        phase_text,
        app.state.devices.len()
    ))
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL));

    frame.render_widget(status, area);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_rotate_point_is_clockwise() {
        assert!(close(rotate_point((1.0, 0.0), 90.0), (0.0, -1.0)));
        assert!(close(rotate_point((0.0, 1.0), 90.0), (1.0, 0.0)));
        assert!(close(rotate_point((1.0, 0.0), -90.0), (0.0, 1.0)));
        // 不归一化，450° 与 90° 等价
        assert!(close(rotate_point((1.0, 0.0), 450.0), (0.0, -1.0)));
    }

    #[test]
    fn test_outline_is_closed() {
        let lines = outline_lines(VAN_OUTLINE, 0.0, 1.0);
        assert_eq!(lines.len(), VAN_OUTLINE.len());

        let last = lines.last().unwrap();
        assert!(close((last.x2, last.y2), VAN_OUTLINE[0]));
    }

    #[test]
    fn test_van_fits_canvas_when_rotated() {
        let (x_half, scale) = canvas_geometry(Rect::new(0, 0, 80, 20));
        for degrees in [0.0, 45.0, 90.0, 180.0, 270.0] {
            for &point in VAN_OUTLINE {
                let (x, y) = rotate_point((point.0 * scale, point.1 * scale), degrees);
                assert!(x.abs() <= x_half && y.abs() <= 1.0, "{degrees}: ({x}, {y})");
            }
        }
    }
}
