//! # CXR QC Web模块
//!
//! 仪表盘统计与检查报告下载的HTTP接口。

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, AppState};
pub use server::WebServer;
