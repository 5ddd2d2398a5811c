//! 报告服务
//!
//! 对外提供仪表盘统计和检查报告两个核心操作。数据读取走 [`RecordStore`]，
//! 影像预取是异步的，图表、字体、排版和PDF写出放在阻塞线程池中执行。

use crate::compositor::{compose_pdf, report_charts, HistoryEntry, ReportConfig, ReportInput};
use crate::fonts::FontResolver;
use crate::images::{ImageStore, ImageVariant};
use chrono::{DateTime, Utc};
use qc_analytics::{Aggregator, AggregatorConfig, RecordSummary, Statistics};
use qc_core::utils::report_filename;
use qc_core::{Patient, QcEntry, QcError, RecordStore, Result, SummaryFilter};
use std::sync::Arc;

pub const PDF_MIME: &str = "application/pdf";

/// 生成好的报告文件
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub filename: String,
}

/// QC报告服务
pub struct QcReportService {
    store: Arc<dyn RecordStore>,
    images: ImageStore,
    fonts: FontResolver,
    config: ReportConfig,
    aggregator: Aggregator,
}

impl std::fmt::Debug for QcReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QcReportService")
            .field("images", &self.images)
            .field("fonts", &self.fonts)
            .field("config", &self.config)
            .finish()
    }
}

impl QcReportService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        images: ImageStore,
        fonts: FontResolver,
        config: ReportConfig,
    ) -> Self {
        let aggregator = Aggregator::new(AggregatorConfig {
            comparison_metric: config.comparison_metric.clone(),
        });
        Self {
            store,
            images,
            fonts,
            config,
            aggregator,
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// 仪表盘统计；`metric` 覆盖本次请求的对比指标
    pub async fn compute_summary(&self, filter: &SummaryFilter, metric: Option<&str>) -> Result<Statistics> {
        tracing::info!("Computing QC summary for filter {:?}", filter);
        let entries = self.store.list_entries(filter).await?;

        let stats = match metric.map(str::trim).filter(|m| !m.is_empty()) {
            Some(metric) => self.aggregator.with_metric(metric).aggregate(&entries, Some(filter)),
            None => self.aggregator.aggregate(&entries, Some(filter)),
        };
        tracing::debug!("Summary covers {} records", stats.total);
        Ok(stats)
    }

    /// 患者的全部QC记录
    pub async fn patient_dashboard(&self, patient_code: &str) -> Result<Vec<RecordSummary>> {
        let entries = self
            .store
            .list_entries(&SummaryFilter::for_patient(patient_code))
            .await?;
        Ok(entries.iter().map(RecordSummary::from_entry).collect())
    }

    /// 某次检查的全部QC记录；检查不存在时返回 `NotFound`
    pub async fn exam_dashboard(&self, exam_id: i64) -> Result<Vec<RecordSummary>> {
        if self.store.get_exam(exam_id).await?.is_none() {
            return Err(QcError::NotFound(format!("exam {exam_id}")));
        }
        let entries = self.store.list_entries(&SummaryFilter::for_exam(exam_id)).await?;
        Ok(entries.iter().map(RecordSummary::from_entry).collect())
    }

    /// 生成检查报告PDF
    pub async fn render_exam_report(&self, exam_id: i64) -> Result<RenderedReport> {
        self.render_exam_report_at(exam_id, Utc::now()).await
    }

    /// 以给定的生成时间生成检查报告
    pub async fn render_exam_report_at(
        &self,
        exam_id: i64,
        generated_at: DateTime<Utc>,
    ) -> Result<RenderedReport> {
        tracing::info!("Rendering QC report for exam {}", exam_id);

        let exam = self
            .store
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| QcError::NotFound(format!("exam {exam_id}")))?;
        let patient = self.lookup_patient(&exam.patient_code).await;

        let all = self.store.list_entries(&SummaryFilter::default()).await?;
        let exam_entries: Vec<QcEntry> = all
            .iter()
            .filter(|entry| entry.record.exam_id == exam_id)
            .cloned()
            .collect();
        let global = self.aggregator.aggregate(&all, None);
        let exam_stats = self.aggregator.aggregate(&exam_entries, None);

        let mut history = Vec::with_capacity(exam_entries.len());
        for entry in &exam_entries {
            history.push(HistoryEntry {
                thumbnail: self.images.fetch_preferred(&entry.record).await,
                record: entry.record.clone(),
            });
        }
        let (latest_original, latest_corrected) = self.latest_images(&exam_entries).await;

        let config = self.config.clone();
        let fonts = self.fonts.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            let charts = report_charts(&global, &config);
            let input = ReportInput {
                exam,
                patient,
                global,
                exam_stats,
                charts,
                history,
                latest_original,
                latest_corrected,
                generated_at,
            };
            compose_pdf(&input, &config, &fonts.resolve())
        })
        .await
        .map_err(|e| QcError::Internal(format!("report rendering task failed: {e}")))??;

        tracing::info!(
            "Rendered QC report for exam {} ({} records, {} bytes)",
            exam_id,
            exam_entries.len(),
            bytes.len()
        );
        Ok(RenderedReport {
            bytes,
            mime: PDF_MIME,
            filename: report_filename(exam_id),
        })
    }

    /// 患者信息是可选的：查询失败或不存在都只跳过患者块
    async fn lookup_patient(&self, patient_code: &str) -> Option<Patient> {
        match self.store.get_patient(patient_code).await {
            Ok(Some(patient)) => Some(patient),
            Ok(None) => {
                tracing::debug!("Patient {} not found, skipping patient block", patient_code);
                None
            }
            Err(e) => {
                tracing::warn!("Patient lookup for {} failed: {}", patient_code, e);
                None
            }
        }
    }

    /// 最新一条记录的 (原始, 校正后) 影像，两者来自同一条记录，缺哪一侧就留空
    async fn latest_images(&self, entries: &[QcEntry]) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        let Some(latest) = entries.last() else {
            return (None, None);
        };
        (
            self.images.fetch(&latest.record, ImageVariant::Original).await,
            self.images.fetch(&latest.record, ImageVariant::Corrected).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::{NaiveDate, TimeZone};
    use qc_analytics::QcStatus;
    use qc_core::{Exam, MemoryStore, QcRecord, Sex, User};
    use std::io::Cursor;

    fn exam(id: i64, patient_code: &str) -> Exam {
        Exam {
            id,
            patient_code: patient_code.to_string(),
            accession_number: format!("ACC-{id}"),
            exam_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            modality: "DX".to_string(),
            view_type: "PA".to_string(),
            device: "Room 3".to_string(),
            technician: "Omarova".to_string(),
            notes: None,
        }
    }

    fn png_base64() -> String {
        let img = image::DynamicImage::new_rgb8(32, 48);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        STANDARD.encode(out.into_inner())
    }

    fn record(id: i64, exam_id: i64, payload: &str) -> QcRecord {
        QcRecord {
            id,
            exam_id,
            original_image_path: None,
            corrected_image_path: None,
            ml_results_json: Some(payload.to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, id as u32, 0).unwrap(),
            created_by: 1,
            author: None,
        }
    }

    async fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .add_user(User {
                id: 1,
                username: "tech".to_string(),
                full_name: Some("Dana Tech".to_string()),
            })
            .await;
        store
            .add_patient(Patient {
                id: 1,
                patient_code: "P-1".to_string(),
                first_name: "Асель".to_string(),
                last_name: "Ким".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1988, 8, 8).unwrap(),
                sex: Some(Sex::Female),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            })
            .await;
        store.add_exam(exam(10, "P-1")).await;
        store.add_exam(exam(11, "P-1")).await;
        store.add_exam(exam(12, "P-404")).await;

        let corrected = format!(
            r#"{{"status":"FIX","qc_probs":{{"rotation":0.8}},"applied_fixes":["rotate"],"qc_probs_before":{{"rotation":0.8}},"qc_probs_after":{{"rotation":0.1}},"processed_image_base64":"{}"}}"#,
            png_base64()
        );
        store.add_record(record(1, 10, &corrected)).await;
        store.add_record(record(2, 10, r#"{"status":"PASS"}"#)).await;
        store.add_record(record(3, 12, "not json")).await;
        store
    }

    fn service(store: Arc<MemoryStore>) -> QcReportService {
        QcReportService::new(
            store,
            ImageStore::new("/nonexistent"),
            FontResolver::builtin_only(),
            ReportConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_missing_exam_is_not_found() {
        let service = service(store().await);
        let err = service.render_exam_report(999).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(service.exam_dashboard(999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_exam_without_records_still_renders() {
        let service = service(store().await);
        let report = service.render_exam_report(11).await.unwrap();
        assert_eq!(report.mime, "application/pdf");
        assert_eq!(report.filename, "qc_report_exam_11.pdf");
        assert!(report.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_report_with_images_and_missing_patient() {
        let service = service(store().await);
        assert!(service.render_exam_report(10).await.unwrap().bytes.starts_with(b"%PDF"));
        // 患者 P-404 不存在，报告照常生成
        assert!(service.render_exam_report(12).await.unwrap().bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_compute_summary_counts_malformed_payloads() {
        let service = service(store().await);
        let stats = service.compute_summary(&SummaryFilter::default(), None).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.status_count(QcStatus::Unknown), 1);
        assert_eq!(
            QcStatus::ALL.iter().map(|s| stats.status_count(*s)).sum::<usize>(),
            stats.total
        );
        assert_eq!(stats.comparison.metric, "rotation");
        assert_eq!(stats.comparison.both(), Some((0.8, 0.1)));
    }

    #[tokio::test]
    async fn test_compute_summary_metric_override() {
        let service = service(store().await);
        let stats = service
            .compute_summary(&SummaryFilter::for_patient("P-1"), Some("noise"))
            .await
            .unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.comparison.metric, "noise");
        assert_eq!(stats.comparison.both(), None);
    }

    #[tokio::test]
    async fn test_flag_filter_ignores_probability_keys() {
        let store = store().await;
        store
            .add_record(record(4, 11, r#"{"status":"FLAG","major_flags":{"rotation":true}}"#))
            .await;
        store
            .add_record(record(5, 11, r#"{"status":"PASS","major_flags":{"rotation":false}}"#))
            .await;
        let service = service(store);

        let filter = SummaryFilter {
            flag: Some("rotation".to_string()),
            ..SummaryFilter::default()
        };
        let stats = service.compute_summary(&filter, None).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.status_count(QcStatus::Flag), 1);
    }

    #[tokio::test]
    async fn test_footer_images_come_from_latest_record_only() {
        let store = Arc::new(MemoryStore::new());
        store.add_exam(exam(20, "P-1")).await;
        store
            .add_record(record(1, 20, r#"{"status":"FIX","corrected_image_base64":"T0xELWNvcnJlY3RlZA=="}"#))
            .await;
        store
            .add_record(record(2, 20, r#"{"status":"PASS","original_image_base64":"TkVXLW9yaWdpbmFs"}"#))
            .await;
        let service = service(store.clone());

        let entries = store.list_entries(&SummaryFilter::for_exam(20)).await.unwrap();
        let (original, corrected) = service.latest_images(&entries).await;
        assert_eq!(original.as_deref(), Some(&b"NEW-original"[..]));
        assert_eq!(corrected, None);

        assert_eq!(service.latest_images(&[]).await, (None, None));
    }

    #[tokio::test]
    async fn test_dashboards() {
        let service = service(store().await);
        let rows = service.patient_dashboard("P-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, QcStatus::Fix);
        assert_eq!(rows[0].applied_fixes, vec!["rotate".to_string()]);

        let rows = service.exam_dashboard(11).await.unwrap();
        assert!(rows.is_empty());
    }
}
