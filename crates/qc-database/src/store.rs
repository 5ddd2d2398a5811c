//! `RecordStore` 的PostgreSQL实现

use crate::connection::DatabasePool;
use crate::queries::DatabaseQueries;
use async_trait::async_trait;
use qc_core::{Exam, Patient, QcEntry, RecordStore, Result, SummaryFilter};

/// 基于数据库的记录存储
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: DatabasePool,
}

impl PgRecordStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.pool)
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>> {
        self.queries().get_exam(exam_id).await
    }

    async fn get_patient(&self, patient_code: &str) -> Result<Option<Patient>> {
        self.queries().get_patient(patient_code).await
    }

    async fn list_entries(&self, filter: &SummaryFilter) -> Result<Vec<QcEntry>> {
        self.queries().list_entries(filter).await
    }
}
