//! 单条记录的仪表盘视图

use crate::parser::{MlResult, QcStatus};
use chrono::{DateTime, Utc};
use qc_core::QcEntry;
use serde::Serialize;
use std::collections::BTreeMap;

/// 患者/检查仪表盘中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub record_id: i64,
    pub exam_id: i64,
    pub created_at: DateTime<Utc>,
    pub status: QcStatus,
    pub applied_fixes: Vec<String>,
    pub major_flags: BTreeMap<String, bool>,
    pub critical_flags: BTreeMap<String, bool>,
    pub needs_fix: bool,
}

impl RecordSummary {
    pub fn from_entry(entry: &QcEntry) -> Self {
        let result = MlResult::parse(entry.record.ml_results_json.as_deref());
        Self {
            record_id: entry.record.id,
            exam_id: entry.record.exam_id,
            created_at: entry.record.created_at,
            status: result.status,
            applied_fixes: result.applied_fixes,
            major_flags: result.major_flags,
            critical_flags: result.critical_flags,
            needs_fix: result.needs_fix,
        }
    }
}
