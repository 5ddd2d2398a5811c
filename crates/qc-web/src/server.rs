//! Web服务器

use axum::{routing::get, Router};
use qc_core::{QcError, Result};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{dashboard_summary, exam_dashboard, exam_report, health, patient_dashboard, AppState};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = create_app(state);
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| QcError::Internal(format!("web server stopped: {e}")))?;

        Ok(())
    }
}

/// 构建路由
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health))
        // 仪表盘
        .nest("/dashboard", dashboard_routes())
        // 报告下载
        .route("/qc/:exam_id/report", get(exam_report))
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(dashboard_summary))
        .route("/patient/:patient_id", get(patient_dashboard))
        .route("/exam/:exam_id", get(exam_dashboard))
}
