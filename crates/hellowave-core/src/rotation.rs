//! 旋转控制
//!
//! 读取输入框中的角度文本，驱动共享角度过渡，并在过渡完成后把结果
//! 投递回 UI 上下文。

use crate::animation::{AngleCell, AnimationEngine, Easing, Timing};
use crate::ui_context::{UiEvent, UiHandle};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 默认过渡时长
pub const DEFAULT_ROTATION_DURATION: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationMode {
    /// 目标 = 当前角度 + 输入值
    #[default]
    Relative,
    /// 目标 = 输入值
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub mode: RotationMode,
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            mode: RotationMode::Relative,
            duration_ms: u64::try_from(DEFAULT_ROTATION_DURATION.as_millis()).unwrap_or(1000),
            easing: Easing::default(),
        }
    }
}

impl RotationSettings {
    pub fn timing(&self) -> Timing {
        Timing::new(Duration::from_millis(self.duration_ms)).with_easing(self.easing)
    }
}

/// 解析角度文本
///
/// 取最长的数字前缀（`"12abc"` → 12）。没有数字前缀、结果为 0 或
/// 非有限值时都返回 0，调用方不会看到解析错误。
pub fn parse_degrees(text: &str) -> f64 {
    let text = text.trim_start();
    let prefix = &text[..numeric_prefix_len(text)];
    match prefix.parse::<f64>() {
        Ok(value) if value.is_finite() && value != 0.0 => value,
        _ => 0.0,
    }
}

/// `[+-]digits[.digits][e[+-]digits]`，整数部分和小数部分至少有一个
fn numeric_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    end
}

/// 旋转控制器
///
/// 没有取消接口：再次触发会从当前的中间值重新定向。
pub struct RotationControl<E: AnimationEngine> {
    angle: AngleCell,
    engine: E,
    settings: RotationSettings,
    ui: UiHandle,
    mounted: Arc<AtomicBool>,
}

impl<E: AnimationEngine> RotationControl<E> {
    pub fn new(angle: AngleCell, engine: E, settings: RotationSettings, ui: UiHandle) -> Self {
        Self {
            angle,
            engine,
            settings,
            ui,
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn angle(&self) -> &AngleCell {
        &self.angle
    }

    pub fn settings(&self) -> &RotationSettings {
        &self.settings
    }

    pub fn target_for(&self, input: &str) -> f64 {
        let value = parse_degrees(input);
        match self.settings.mode {
            RotationMode::Relative => self.angle.get() + value,
            RotationMode::Absolute => value,
        }
    }

    /// 按输入文本开始过渡，返回目标角度
    pub fn activate(&self, input: &str) -> f64 {
        let target = self.target_for(input);
        debug!("Rotating to {:.2}° ({:?})", target, self.settings.mode);

        // 回调在动画时间线上运行，只能通过 UiHandle 修改显示状态
        let ui = self.ui.clone();
        let mounted = self.mounted.clone();
        self.engine.transition_to(
            &self.angle,
            target,
            self.settings.timing(),
            Some(Box::new(move |finished, value| {
                if finished && mounted.load(Ordering::SeqCst) {
                    ui.post(UiEvent::RotationSettled(value));
                }
            })),
        );

        target
    }

    /// 卸载：停在当前的中间值，进行中的过渡不再上报
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        self.angle.set(self.angle.get());
        debug!("Rotation unmounted at {:.2}°", self.angle.get());
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}
