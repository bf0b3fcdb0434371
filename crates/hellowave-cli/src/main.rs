//! Hello Wave CLI
//!
//! 无界面的扫描、连接与权限检查

mod runner;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hellowave_core::{AppSettings, BleAdapter, BtleplugAdapter, Platform};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hellowave", version, about = "Hello Wave - 蓝牙设备扫描")]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 扫描附近设备
    Scan {
        /// 扫描时长 (秒)，默认使用配置文件
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// 扫描后连接指定设备
    Connect {
        /// 设备标识 (扫描列表中括号内的部分)
        id: String,
        /// 连接前的扫描时长 (秒)
        #[arg(short, long)]
        scan_secs: Option<u64>,
    },
    /// 查看平台需要的蓝牙权限
    Permissions {
        /// 按 Android API 级别检查
        #[arg(long, conflicts_with = "ios")]
        android: Option<u32>,
        /// 按 iOS 检查
        #[arg(long)]
        ios: bool,
    },
    /// 显示当前配置
    Config {
        /// 写入默认配置文件
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut settings = AppSettings::load();

    match cli.command {
        Commands::Scan { timeout } => {
            if let Some(secs) = timeout {
                settings.scan_duration_secs = secs;
            }
            println!("🔍 扫描设备 ({}s)...", settings.scan_duration_secs);

            let state = runner::scan(open_adapter().await?, &settings).await?;
            if state.devices.is_empty() {
                println!("   No devices found");
            } else {
                println!();
                for (i, label) in state.device_labels().iter().enumerate() {
                    println!("   [{}] {}", i, label);
                }
            }
        }
        Commands::Connect { id, scan_secs } => {
            if let Some(secs) = scan_secs {
                settings.scan_duration_secs = secs;
            }
            println!("🔗 连接设备: {}", id);
            runner::connect(open_adapter().await?, &settings, &id).await?;
        }
        Commands::Permissions { android, ios } => {
            let platform = match (android, ios) {
                (Some(api_level), _) => Platform::Android { api_level },
                (None, true) => Platform::Ios,
                (None, false) => Platform::detect(),
            };
            println!("🔐 {} 蓝牙权限:", platform);
            runner::request_permissions(platform).await;
        }
        Commands::Config { init } => {
            let path = AppSettings::config_path();
            if init {
                AppSettings::default().save()?;
                println!("✅ 已写入默认配置: {}", path.display());
            } else {
                println!("📄 {}", path.display());
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
        }
    }

    Ok(())
}

async fn open_adapter() -> Result<Arc<dyn BleAdapter>> {
    let adapter = BtleplugAdapter::new().await?;
    Ok(Arc::new(adapter))
}

fn init_logging(verbose: bool) {
    // 桥接 log crate（hellowave-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let default = if verbose {
        "info,hellowave_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
