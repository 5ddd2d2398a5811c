//! QC记录过滤条件

use crate::models::QcEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 仪表盘/汇总查询的过滤条件
///
/// 所有条件均为可选，未设置的条件不参与过滤。时间范围作用于 `QcRecord::created_at`，两端均包含。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryFilter {
    /// 按患者编号（经由记录所属检查）
    pub patient_code: Option<String>,
    /// 按检查ID
    pub exam_id: Option<i64>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// 标志名：保留该标志被判定为真（主要/严重标志为true，或列在严重标志中）的记录。
    /// 需要解析结果JSON，由分析层在聚合前判断，[`SummaryFilter::matches`] 不处理。
    pub flag: Option<String>,
}

impl SummaryFilter {
    pub fn for_patient(patient_code: impl Into<String>) -> Self {
        Self {
            patient_code: Some(patient_code.into()),
            ..Self::default()
        }
    }

    pub fn for_exam(exam_id: i64) -> Self {
        Self {
            exam_id: Some(exam_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// 去掉空白后的标志名
    pub fn flag_name(&self) -> Option<&str> {
        self.flag.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    /// 判断记录是否满足患者、检查和时间条件
    pub fn matches(&self, entry: &QcEntry) -> bool {
        if let Some(code) = &self.patient_code {
            if &entry.exam.patient_code != code {
                return false;
            }
        }
        if let Some(exam_id) = self.exam_id {
            if entry.record.exam_id != exam_id {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if entry.record.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if entry.record.created_at > to {
                return false;
            }
        }
        true
    }
}
