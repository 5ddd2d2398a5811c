//! CXR QC 服务器主程序

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use qc_core::{MemoryStore, RecordStore};
use qc_database::{DatabasePool, DatabaseQueries, PgRecordStore};
use qc_report::{FontResolver, ImageStore, QcReportService};
use qc_web::{AppState, WebServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;

/// CXR QC 服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "qc-server")]
#[command(about = "胸片质控仪表盘与报告服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听地址
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// PostgreSQL连接串，不指定时使用内存存储
    #[arg(long)]
    database_url: Option<String>,

    /// 影像存储根目录
    #[arg(long)]
    image_root: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// 命令行参数覆盖配置文件
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.database_url {
            config.database.url = Some(url);
        }
        if let Some(root) = self.image_root {
            config.storage.image_root = root;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    match &config.database.url {
        Some(url) => {
            let pool = DatabasePool::connect(url, config.database.max_connections)
                .await
                .context("Failed to connect to database")?;
            DatabaseQueries::new(&pool)
                .create_tables()
                .await
                .context("Failed to create database tables")?;
            Ok(Arc::new(PgRecordStore::new(pool)))
        }
        None => {
            warn!("No database configured, using in-memory record store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    config.validate().context("Invalid configuration")?;

    info!("启动CXR QC服务器...");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  影像目录: {}", config.storage.image_root.display());
    info!(
        "  报告语言: {:?} / {:?}",
        config.report.primary_locale, config.report.secondary_locale
    );

    let store = open_store(&config).await?;
    let fonts = FontResolver::system(&config.report.font_dirs, config.report.font_families.clone());
    let service = QcReportService::new(
        store,
        ImageStore::new(config.storage.image_root.clone()),
        fonts,
        config.report_config(),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    if let Err(e) = WebServer::new(addr, AppState::new(service)).run().await {
        error!("服务器运行失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}
