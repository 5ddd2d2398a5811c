//! 记录存储接口
//!
//! 聚合与报告核心只通过 [`RecordStore`] 读取数据；持久化实现位于 `qc-database`，
//! 这里另外提供一个进程内实现，供测试和未配置数据库时使用。

use crate::error::Result;
use crate::filter::SummaryFilter;
use crate::models::{Exam, Patient, QcEntry, QcRecord, User};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// 只读记录访问接口
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 按ID获取检查
    async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>>;

    /// 按外部患者编号获取患者
    async fn get_patient(&self, patient_code: &str) -> Result<Option<Patient>>;

    /// 列出满足过滤条件的QC记录（附带所属检查），按创建时间和ID升序
    async fn list_entries(&self, filter: &SummaryFilter) -> Result<Vec<QcEntry>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    patients: BTreeMap<String, Patient>,
    exams: BTreeMap<i64, Exam>,
    records: BTreeMap<i64, QcRecord>,
    users: BTreeMap<i64, User>,
}

/// 内存记录存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn add_patient(&self, patient: Patient) {
        let mut state = self.state.write().await;
        state.patients.insert(patient.patient_code.clone(), patient);
    }

    pub async fn add_exam(&self, exam: Exam) {
        self.state.write().await.exams.insert(exam.id, exam);
    }

    /// 追加一条QC记录；未填写作者时按用户表补全
    pub async fn add_record(&self, mut record: QcRecord) {
        let mut state = self.state.write().await;
        if record.author.is_none() {
            record.author = state
                .users
                .get(&record.created_by)
                .map(|user| user.display_name().to_string());
        }
        state.records.insert(record.id, record);
    }

    /// 删除患者及其全部检查和QC记录
    pub async fn delete_patient(&self, patient_code: &str) -> bool {
        let mut state = self.state.write().await;
        if state.patients.remove(patient_code).is_none() {
            return false;
        }

        let exam_ids: Vec<i64> = state
            .exams
            .values()
            .filter(|exam| exam.patient_code == patient_code)
            .map(|exam| exam.id)
            .collect();
        state.exams.retain(|_, exam| exam.patient_code != patient_code);
        state
            .records
            .retain(|_, record| !exam_ids.contains(&record.exam_id));

        tracing::info!(
            "Deleted patient {} with {} exams",
            patient_code,
            exam_ids.len()
        );
        true
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>> {
        Ok(self.state.read().await.exams.get(&exam_id).cloned())
    }

    async fn get_patient(&self, patient_code: &str) -> Result<Option<Patient>> {
        Ok(self.state.read().await.patients.get(patient_code).cloned())
    }

    async fn list_entries(&self, filter: &SummaryFilter) -> Result<Vec<QcEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<QcEntry> = state
            .records
            .values()
            .filter_map(|record| {
                let exam = state.exams.get(&record.exam_id)?;
                Some(QcEntry {
                    record: record.clone(),
                    exam: exam.clone(),
                })
            })
            .filter(|entry| filter.matches(entry))
            .collect();

        entries.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then(a.record.id.cmp(&b.record.id))
        });
        Ok(entries)
    }
}
