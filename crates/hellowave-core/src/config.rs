//! 应用配置和持久化
//!
//! 扫描时长、旋转动画参数等设置的存储和读取。

use crate::rotation::RotationSettings;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 应用设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 扫描持续时间（秒），到时无条件停止
    pub scan_duration_secs: u64,
    /// 订阅电源状态时是否立即收到当前状态
    pub emit_current_state: bool,
    /// 挂载时是否请求蓝牙权限
    pub request_permissions: bool,
    /// 动画帧间隔（毫秒）
    pub frame_interval_ms: u64,
    /// 旋转动画
    pub rotation: RotationSettings,
    /// 详细日志模式
    pub verbose: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            scan_duration_secs: 5,
            emit_current_state: true,
            request_permissions: true,
            frame_interval_ms: 16,
            rotation: RotationSettings::default(),
            verbose: false,
        }
    }
}

impl AppSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hellowave");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Easing;
    use crate::rotation::RotationMode;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.scan_duration(), Duration::from_secs(5));
        assert!(settings.emit_current_state);
        assert!(settings.request_permissions);
        assert_eq!(settings.rotation.duration_ms, 1000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: AppSettings = toml::from_str(
            r#"
            scan_duration_secs = 8

            [rotation]
            mode = "absolute"
            easing = "linear"
            "#,
        )
        .unwrap();

        assert_eq!(settings.scan_duration_secs, 8);
        assert_eq!(settings.rotation.mode, RotationMode::Absolute);
        assert_eq!(settings.rotation.easing, Easing::Linear);
        assert_eq!(settings.rotation.duration_ms, 1000);
        assert!(settings.emit_current_state);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = AppSettings {
            scan_duration_secs: 3,
            verbose: true,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "scan_duration_secs = \"soon\"").unwrap();

        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
        assert_eq!(
            AppSettings::load_from(&dir.path().join("missing.toml")),
            AppSettings::default()
        );
    }
}
