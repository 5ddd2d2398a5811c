//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use qc_analytics::Statistics;
use qc_core::{QcError, SummaryFilter};
use qc_report::QcReportService;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 处理器共享状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<QcReportService>,
}

impl AppState {
    pub fn new(service: QcReportService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// 错误响应包装
#[derive(Debug)]
pub struct ApiError(pub QcError);

impl From<QcError> for ApiError {
    fn from(err: QcError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            QcError::NotFound(_) => StatusCode::NOT_FOUND,
            QcError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 仪表盘统计查询参数
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub patient_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub flag: Option<String>,
    pub metric: Option<String>,
}

impl SummaryQuery {
    pub fn to_filter(&self) -> qc_core::Result<SummaryFilter> {
        Ok(SummaryFilter {
            patient_code: non_empty(&self.patient_id),
            exam_id: None,
            date_from: parse_bound(self.date_from.as_deref(), NaiveTime::MIN)?,
            date_to: parse_bound(
                self.date_to.as_deref(),
                NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
            )?,
            flag: non_empty(&self.flag),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 支持RFC 3339时间或 `YYYY-MM-DD` 日期（按 `day_time` 补全时刻）
fn parse_bound(raw: Option<&str>, day_time: NaiveTime) -> qc_core::Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| Some(Utc.from_utc_datetime(&date.and_time(day_time))))
        .map_err(|_| QcError::Validation(format!("invalid date: {raw}")))
}

/// 全局仪表盘统计
pub async fn dashboard_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryQuery>,
) -> ApiResult<Json<Statistics>> {
    info!("Dashboard summary with query: {:?}", params);
    let filter = params.to_filter()?;
    let stats = state
        .service
        .compute_summary(&filter, params.metric.as_deref())
        .await?;
    Ok(Json(stats))
}

/// 患者仪表盘
pub async fn patient_dashboard(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let records = state.service.patient_dashboard(&patient_id).await?;
    Ok(Json(json!({
        "patient_id": patient_id,
        "total": records.len(),
        "records": records
    })))
}

/// 检查仪表盘
pub async fn exam_dashboard(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let records = state.service.exam_dashboard(exam_id).await?;
    Ok(Json(json!({
        "exam_id": exam_id,
        "total": records.len(),
        "records": records
    })))
}

/// 检查报告下载
pub async fn exam_report(State(state): State<AppState>, Path(exam_id): Path<i64>) -> ApiResult<Response> {
    let report = state.service.render_exam_report(exam_id).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", report.filename))
        .map_err(|e| QcError::Internal(e.to_string()))?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(report.mime)),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, report.bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_only_bounds_cover_whole_day() {
        let query = SummaryQuery {
            date_from: Some("2024-03-01".to_string()),
            date_to: Some("2024-03-02".to_string()),
            flag: Some("  ".to_string()),
            ..SummaryQuery::default()
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.date_from.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(filter.date_to.unwrap().to_rfc3339(), "2024-03-02T23:59:59.999+00:00");
        assert_eq!(filter.flag, None);
    }

    #[test]
    fn test_rfc3339_bound_and_invalid_date() {
        let query = SummaryQuery {
            date_from: Some("2024-03-01T10:00:00+05:00".to_string()),
            ..SummaryQuery::default()
        };
        assert_eq!(
            query.to_filter().unwrap().date_from.unwrap().to_rfc3339(),
            "2024-03-01T05:00:00+00:00"
        );

        let bad = SummaryQuery {
            date_to: Some("01.03.2024".to_string()),
            ..SummaryQuery::default()
        };
        assert!(matches!(bad.to_filter(), Err(QcError::Validation(_))));
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |err: QcError| ApiError(err).into_response().status();
        assert_eq!(status(QcError::NotFound("exam 1".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(QcError::Validation("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(QcError::Render("pdf".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
