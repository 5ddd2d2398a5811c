//! 配置管理
//!
//! 加载顺序：内置默认值 → 可选的配置文件 → `CXRQC__SECTION__KEY` 环境变量。

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use qc_report::{Locale, LocalePair, ReportConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

const ENV_PREFIX: &str = "CXRQC";
const ENV_SEPARATOR: &str = "__";

/// 系统完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub report: ReportSettings,
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 数据库配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 未配置时使用内存存储
    pub url: Option<String>,
    pub max_connections: u32,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 影像相对路径的根目录
    pub image_root: PathBuf,
}

/// 报告配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub primary_locale: Locale,
    pub secondary_locale: Locale,
    pub comparison_metric: String,
    /// 额外的字体目录
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
    /// 候选字体族，为空时使用内置列表
    #[serde(default)]
    pub font_families: Vec<String>,
    pub chart_days: usize,
    pub top_k: usize,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let report = ReportConfig::default();
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
            },
            storage: StorageConfig {
                image_root: PathBuf::from("./data/images"),
            },
            report: ReportSettings {
                primary_locale: report.locales.primary,
                secondary_locale: report.locales.secondary,
                comparison_metric: report.comparison_metric,
                font_dirs: Vec::new(),
                font_families: Vec::new(),
                chart_days: report.chart_days,
                top_k: report.top_k,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 从默认值、配置文件和进程环境变量加载
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// `env` 为 `None` 时读取进程环境变量
    fn load_from(path: Option<&str>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&AppConfig::default()).context("Failed to build default configuration")?,
        );
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("report.font_dirs")
                .with_list_parse_key("report.font_families")
                .source(env),
        );

        let config: AppConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!("Configuration loaded from {}", path.unwrap_or("defaults and environment"));
        Ok(config)
    }

    /// 配置校验
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must not be 0");
        }
        if self.report.comparison_metric.trim().is_empty() {
            bail!("report.comparison_metric must not be empty");
        }
        if self.report.chart_days == 0 {
            bail!("report.chart_days must be positive");
        }
        if self.report.primary_locale == self.report.secondary_locale {
            bail!("report.primary_locale and report.secondary_locale must differ");
        }
        if self.database.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            bail!("database.url must not be empty when set");
        }
        Ok(())
    }

    /// 报告组装参数
    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            locales: LocalePair::new(self.report.primary_locale, self.report.secondary_locale),
            comparison_metric: self.report.comparison_metric.trim().to_string(),
            chart_days: self.report.chart_days,
            top_k: self.report.top_k,
            ..ReportConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::load_from(None, env(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        config.validate().unwrap();
        assert_eq!(config.report_config().comparison_metric, "rotation");
    }

    #[test]
    fn test_file_then_environment_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[report]\nsecondary_locale = \"en\"\ncomparison_metric = \"noise\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = AppConfig::load_from(
            Some(&path),
            env(&[
                ("CXRQC__SERVER__PORT", "9200"),
                ("CXRQC__DATABASE__URL", "postgres://qc@localhost/qc"),
            ]),
        )
        .unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.report.secondary_locale, Locale::En);
        assert_eq!(config.report.comparison_metric, "noise");
        assert_eq!(config.database.url.as_deref(), Some("postgres://qc@localhost/qc"));
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.report.comparison_metric = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.report.chart_days = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.report.secondary_locale = Locale::Ru;
        assert!(config.validate().is_err());
    }
}
