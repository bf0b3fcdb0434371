//! 蓝牙权限请求
//!
//! 挂载时按平台请求一次权限，结果只写入蓝牙日志，不会阻止扫描。
//! 被拒绝时扫描照常进行，可能什么也找不到。

use crate::ui_context::UiHandle;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Android 12 起蓝牙扫描/连接需要独立的运行时权限
pub const ANDROID_BLUETOOTH_RUNTIME_API: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android { api_level: u32 },
    Ios,
    Desktop,
}

impl Platform {
    /// 检测当前平台
    ///
    /// Android 的 API 级别从 `ANDROID_API_LEVEL` 读取，缺省按 31 处理。
    pub fn detect() -> Self {
        if cfg!(target_os = "android") {
            let api_level = std::env::var("ANDROID_API_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(ANDROID_BLUETOOTH_RUNTIME_API);
            Platform::Android { api_level }
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Desktop
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android { api_level } => write!(f, "Android (API {api_level})"),
            Platform::Ios => f.write_str("iOS"),
            Platform::Desktop => f.write_str("Desktop"),
        }
    }
}

/// 运行时权限，序列化为平台权限名
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Permission {
    BluetoothScan,
    BluetoothConnect,
    AccessFineLocation,
    BluetoothPeripheral,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::BluetoothScan,
        Permission::BluetoothConnect,
        Permission::AccessFineLocation,
        Permission::BluetoothPeripheral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::BluetoothScan => "android.permission.BLUETOOTH_SCAN",
            Permission::BluetoothConnect => "android.permission.BLUETOOTH_CONNECT",
            Permission::AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Permission::BluetoothPeripheral => "ios.permission.BLUETOOTH_PERIPHERAL",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| format!("unknown permission: {name}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Blocked,
    Limited,
    NeverAskAgain,
    Unavailable,
}

impl PermissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Blocked => "blocked",
            PermissionStatus::Limited => "limited",
            PermissionStatus::NeverAskAgain => "never_ask_again",
            PermissionStatus::Unavailable => "unavailable",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted | PermissionStatus::Limited)
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type PermissionStatuses = BTreeMap<Permission, PermissionStatus>;

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("{0}")]
    Request(String),

    #[error("Permission requests are not supported on {0}")]
    Unsupported(Platform),
}

#[async_trait::async_trait]
pub trait PermissionService: Send + Sync {
    async fn request(
        &self,
        permissions: &[Permission],
    ) -> Result<PermissionStatuses, PermissionError>;
}

/// 桌面平台的权限服务
///
/// BlueZ / CoreBluetooth 的访问控制不在进程内，所有权限都报告为
/// `unavailable`。
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPermissions;

#[async_trait::async_trait]
impl PermissionService for HostPermissions {
    async fn request(
        &self,
        permissions: &[Permission],
    ) -> Result<PermissionStatuses, PermissionError> {
        Ok(permissions
            .iter()
            .map(|p| (*p, PermissionStatus::Unavailable))
            .collect())
    }
}

/// 平台需要请求的权限集合
pub fn required_permissions(platform: Platform) -> Vec<Permission> {
    match platform {
        Platform::Android { api_level } if api_level >= ANDROID_BLUETOOTH_RUNTIME_API => vec![
            Permission::BluetoothScan,
            Permission::BluetoothConnect,
            Permission::AccessFineLocation,
        ],
        Platform::Android { .. } => vec![Permission::AccessFineLocation],
        Platform::Ios => vec![Permission::BluetoothPeripheral],
        Platform::Desktop => Vec::new(),
    }
}

/// 挂载时的权限请求
///
/// 结果写入蓝牙日志后返回；失败同样只记录日志。
pub async fn request_on_mount(
    service: Arc<dyn PermissionService>,
    platform: Platform,
    ui: UiHandle,
) -> Option<PermissionStatuses> {
    let permissions = required_permissions(platform);
    if permissions.is_empty() {
        debug!("No runtime Bluetooth permissions on {}", platform);
        return None;
    }

    let statuses = match service.request(&permissions).await {
        Ok(statuses) => statuses,
        Err(e) => {
            warn!("Permission request failed: {}", e);
            ui.log(format!("Permission request error: {e}"));
            return None;
        }
    };

    let line = match platform {
        Platform::Android { api_level } if api_level >= ANDROID_BLUETOOTH_RUNTIME_API => {
            format!("Permission statuses: {}", statuses_json(&statuses))
        }
        Platform::Android { .. } => {
            let status = statuses
                .get(&Permission::AccessFineLocation)
                .copied()
                .unwrap_or(PermissionStatus::Unavailable);
            format!("ACCESS_FINE_LOCATION: {status}")
        }
        Platform::Ios => format!("iOS permission statuses: {}", statuses_json(&statuses)),
        Platform::Desktop => return Some(statuses),
    };
    ui.log(line);

    if statuses.values().any(|s| !s.is_granted()) {
        warn!("Not all Bluetooth permissions granted; scanning anyway");
    }

    Some(statuses)
}

fn statuses_json(statuses: &PermissionStatuses) -> String {
    serde_json::to_string(statuses).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_context::{self, UiEvent};

    struct FixedPermissions(PermissionStatus);

    #[async_trait::async_trait]
    impl PermissionService for FixedPermissions {
        async fn request(
            &self,
            permissions: &[Permission],
        ) -> Result<PermissionStatuses, PermissionError> {
            Ok(permissions.iter().map(|p| (*p, self.0)).collect())
        }
    }

    struct FailingPermissions;

    #[async_trait::async_trait]
    impl PermissionService for FailingPermissions {
        async fn request(
            &self,
            _permissions: &[Permission],
        ) -> Result<PermissionStatuses, PermissionError> {
            Err(PermissionError::Request("activity not attached".to_string()))
        }
    }

    #[test]
    fn test_permission_names_match_serde() {
        for permission in Permission::ALL {
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
            assert_eq!(serde_json::from_str::<Permission>(&json).unwrap(), permission);
        }
        assert!(serde_json::from_str::<Permission>("\"android.permission.CAMERA\"").is_err());
    }

    #[test]
    fn test_required_permissions() {
        assert_eq!(
            required_permissions(Platform::Android { api_level: 33 }),
            vec![
                Permission::BluetoothScan,
                Permission::BluetoothConnect,
                Permission::AccessFineLocation
            ]
        );
        assert_eq!(
            required_permissions(Platform::Android { api_level: 30 }),
            vec![Permission::AccessFineLocation]
        );
        assert_eq!(
            required_permissions(Platform::Ios),
            vec![Permission::BluetoothPeripheral]
        );
        assert!(required_permissions(Platform::Desktop).is_empty());
    }

    #[tokio::test]
    async fn test_android_statuses_logged_as_json() {
        let (ui, mut ctx) = ui_context::channel();
        let service = Arc::new(FixedPermissions(PermissionStatus::Granted));

        let statuses = request_on_mount(service, Platform::Android { api_level: 31 }, ui)
            .await
            .unwrap();
        assert_eq!(statuses.len(), 3);

        let Some(UiEvent::Log(line)) = ctx.try_next() else {
            panic!("expected a log line");
        };
        assert!(line.starts_with("Permission statuses: {"), "{line}");
        assert!(line.contains("\"android.permission.BLUETOOTH_SCAN\":\"granted\""));
    }

    #[tokio::test]
    async fn test_legacy_android_logs_location_only() {
        let (ui, mut ctx) = ui_context::channel();
        let service = Arc::new(FixedPermissions(PermissionStatus::NeverAskAgain));

        request_on_mount(service, Platform::Android { api_level: 29 }, ui).await;
        assert_eq!(
            ctx.try_next(),
            Some(UiEvent::Log(
                "ACCESS_FINE_LOCATION: never_ask_again".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_ios_and_errors() {
        let (ui, mut ctx) = ui_context::channel();

        request_on_mount(
            Arc::new(FixedPermissions(PermissionStatus::Denied)),
            Platform::Ios,
            ui.clone(),
        )
        .await;
        assert_eq!(
            ctx.try_next(),
            Some(UiEvent::Log(
                "iOS permission statuses: {\"ios.permission.BLUETOOTH_PERIPHERAL\":\"denied\"}"
                    .to_string()
            ))
        );

        let result = request_on_mount(Arc::new(FailingPermissions), Platform::Ios, ui).await;
        assert!(result.is_none());
        assert_eq!(
            ctx.try_next(),
            Some(UiEvent::Log(
                "Permission request error: activity not attached".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_desktop_requests_nothing() {
        let (ui, mut ctx) = ui_context::channel();
        let result = request_on_mount(Arc::new(HostPermissions), Platform::Desktop, ui).await;
        assert!(result.is_none());
        assert_eq!(ctx.try_next(), None);
    }

    #[tokio::test]
    async fn test_host_permissions_are_unavailable() {
        let statuses = HostPermissions
            .request(&[Permission::BluetoothScan])
            .await
            .unwrap();
        assert_eq!(
            statuses.get(&Permission::BluetoothScan),
            Some(&PermissionStatus::Unavailable)
        );
    }
}
