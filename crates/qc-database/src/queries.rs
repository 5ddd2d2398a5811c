//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use qc_core::{Exam, Patient, QcEntry, QcError, Result, SummaryFilter, User};
use sqlx::{Postgres, QueryBuilder, Row};

/// QC记录联表查询，列名与 [`DbQcEntryRow`] 对应
const ENTRY_SELECT: &str = r#"
    SELECT r.id AS record_id, r.exam_id, r.original_image_path, r.corrected_image_path,
           r.ml_results_json, r.created_at, r.created_by,
           u.username AS author_username, u.full_name AS author_full_name,
           e.patient_code, e.accession_number, e.exam_date, e.modality, e.view_type,
           e.device, e.technician, e.notes
    FROM qc_records r
    JOIN exams e ON e.id = r.exam_id
    LEFT JOIN users u ON u.id = r.created_by
"#;

fn db_err(e: sqlx::Error) -> QcError {
    QcError::Database(e.to_string())
}

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表（幂等）
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(64) UNIQUE NOT NULL,
                full_name VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id BIGSERIAL PRIMARY KEY,
                patient_code VARCHAR(64) UNIQUE NOT NULL,
                first_name VARCHAR(255) NOT NULL,
                last_name VARCHAR(255) NOT NULL,
                birth_date DATE NOT NULL,
                sex VARCHAR(1),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建检查表，随患者级联删除
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS exams (
                id BIGSERIAL PRIMARY KEY,
                patient_code VARCHAR(64) NOT NULL REFERENCES patients(patient_code) ON DELETE CASCADE,
                accession_number VARCHAR(64) UNIQUE NOT NULL,
                exam_date TIMESTAMP WITH TIME ZONE NOT NULL,
                modality VARCHAR(16) NOT NULL,
                view_type VARCHAR(16) NOT NULL,
                device VARCHAR(128) NOT NULL,
                technician VARCHAR(255) NOT NULL,
                notes TEXT
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建QC记录表，随检查级联删除
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS qc_records (
                id BIGSERIAL PRIMARY KEY,
                exam_id BIGINT NOT NULL REFERENCES exams(id) ON DELETE CASCADE,
                original_image_path VARCHAR(512),
                corrected_image_path VARCHAR(512),
                ml_results_json TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                created_by BIGINT NOT NULL REFERENCES users(id)
            )
        "#).execute(pool).await.map_err(db_err)?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_exams_patient_code ON exams(patient_code)",
            "CREATE INDEX IF NOT EXISTS idx_exams_exam_date ON exams(exam_date)",
            "CREATE INDEX IF NOT EXISTS idx_qc_records_exam_id ON qc_records(exam_id)",
            "CREATE INDEX IF NOT EXISTS idx_qc_records_created_at ON qc_records(created_at)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await.map_err(db_err)?;
        }

        tracing::debug!("Database indexes created successfully");
        Ok(())
    }

    // ========== 用户相关操作 ==========

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, DbUser>(
            "INSERT INTO users (username, full_name) VALUES ($1, $2) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.full_name)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(User::from(result))
    }

    // ========== 患者相关操作 ==========

    /// 创建新患者
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Patient> {
        let result = sqlx::query_as::<_, DbPatient>(r#"
            INSERT INTO patients (patient_code, first_name, last_name, birth_date, sex)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        "#)
        .bind(&patient.patient_code)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.birth_date)
        .bind(patient.sex.map(|s| s.code()))
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)?;

        tracing::info!("Created patient {}", result.patient_code);
        Ok(Patient::from(result))
    }

    /// 根据外部患者编号查找患者
    pub async fn get_patient(&self, patient_code: &str) -> Result<Option<Patient>> {
        let result = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE patient_code = $1")
            .bind(patient_code)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)?;

        Ok(result.map(Patient::from))
    }

    /// 删除患者，其检查和QC记录级联删除；返回是否存在
    pub async fn delete_patient(&self, patient_code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM patients WHERE patient_code = $1")
            .bind(patient_code)
            .execute(self.pool.pool())
            .await
            .map_err(db_err)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!("Deleted patient {} with all exams and QC records", patient_code);
        }
        Ok(deleted)
    }

    // ========== 检查相关操作 ==========

    /// 创建新检查
    pub async fn create_exam(&self, exam: &NewExam) -> Result<Exam> {
        let result = sqlx::query_as::<_, DbExam>(r#"
            INSERT INTO exams (patient_code, accession_number, exam_date, modality, view_type, device, technician, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
        "#)
        .bind(&exam.patient_code)
        .bind(&exam.accession_number)
        .bind(exam.exam_date)
        .bind(&exam.modality)
        .bind(&exam.view_type)
        .bind(&exam.device)
        .bind(&exam.technician)
        .bind(&exam.notes)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)?;

        tracing::info!("Created exam {} ({})", result.id, result.accession_number);
        Ok(Exam::from(result))
    }

    pub async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>> {
        let result = sqlx::query_as::<_, DbExam>("SELECT * FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)?;

        Ok(result.map(Exam::from))
    }

    // ========== QC记录相关操作 ==========

    /// 写入一条QC记录，返回记录ID
    pub async fn insert_qc_record(&self, record: &NewQcRecord) -> Result<i64> {
        let row = sqlx::query(r#"
            INSERT INTO qc_records (exam_id, original_image_path, corrected_image_path, ml_results_json, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
            RETURNING id
        "#)
        .bind(record.exam_id)
        .bind(&record.original_image_path)
        .bind(&record.corrected_image_path)
        .bind(&record.ml_results_json)
        .bind(record.created_by)
        .bind(record.created_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)?;

        let id: i64 = row.get("id");
        tracing::debug!("Inserted QC record {} for exam {}", id, record.exam_id);
        Ok(id)
    }

    /// 按患者、检查和时间条件列出QC记录，按创建时间和ID升序；标志条件由聚合层按解析结果判断
    pub async fn list_entries(&self, filter: &SummaryFilter) -> Result<Vec<QcEntry>> {
        let mut query = entries_query(filter);
        let rows = query
            .build_query_as::<DbQcEntryRow>()
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(QcEntry::from).collect())
    }
}

fn entries_query(filter: &SummaryFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(ENTRY_SELECT);
    query.push(" WHERE TRUE");

    if let Some(code) = &filter.patient_code {
        query.push(" AND e.patient_code = ").push_bind(code.clone());
    }
    if let Some(exam_id) = filter.exam_id {
        query.push(" AND r.exam_id = ").push_bind(exam_id);
    }
    if let Some(from) = filter.date_from {
        query.push(" AND r.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        query.push(" AND r.created_at <= ").push_bind(to);
    }
    query.push(" ORDER BY r.created_at ASC, r.id ASC");
    query
}
