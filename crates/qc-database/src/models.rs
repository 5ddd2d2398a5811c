//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use qc_core::models::*;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db_user: DbUser) -> Self {
        User {
            id: db_user.id,
            username: db_user.username,
            full_name: db_user.full_name,
        }
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: i64,
    pub patient_code: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<String>, // 存储为单字符，转换为Sex枚举
    pub created_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            patient_code: db_patient.patient_code,
            first_name: db_patient.first_name,
            last_name: db_patient.last_name,
            birth_date: db_patient.birth_date,
            sex: db_patient.sex.as_deref().and_then(Sex::from_code),
            created_at: db_patient.created_at,
        }
    }
}

/// 数据库检查表
#[derive(Debug, FromRow)]
pub struct DbExam {
    pub id: i64,
    pub patient_code: String,
    pub accession_number: String,
    pub exam_date: DateTime<Utc>,
    pub modality: String,
    pub view_type: String,
    pub device: String,
    pub technician: String,
    pub notes: Option<String>,
}

impl From<DbExam> for Exam {
    fn from(db_exam: DbExam) -> Self {
        Exam {
            id: db_exam.id,
            patient_code: db_exam.patient_code,
            accession_number: db_exam.accession_number,
            exam_date: db_exam.exam_date,
            modality: db_exam.modality,
            view_type: db_exam.view_type,
            device: db_exam.device,
            technician: db_exam.technician,
            notes: db_exam.notes,
        }
    }
}

/// QC记录与所属检查、作者的联表行
#[derive(Debug, FromRow)]
pub struct DbQcEntryRow {
    pub record_id: i64,
    pub exam_id: i64,
    pub original_image_path: Option<String>,
    pub corrected_image_path: Option<String>,
    pub ml_results_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
    pub author_username: Option<String>,
    pub author_full_name: Option<String>,
    pub patient_code: String,
    pub accession_number: String,
    pub exam_date: DateTime<Utc>,
    pub modality: String,
    pub view_type: String,
    pub device: String,
    pub technician: String,
    pub notes: Option<String>,
}

impl From<DbQcEntryRow> for QcEntry {
    fn from(row: DbQcEntryRow) -> Self {
        let author = match (row.author_username, row.author_full_name) {
            (Some(username), full_name) => Some(
                User {
                    id: row.created_by,
                    username,
                    full_name,
                }
                .display_name()
                .to_string(),
            ),
            (None, full_name) => full_name,
        };

        QcEntry {
            record: QcRecord {
                id: row.record_id,
                exam_id: row.exam_id,
                original_image_path: row.original_image_path,
                corrected_image_path: row.corrected_image_path,
                ml_results_json: row.ml_results_json,
                created_at: row.created_at,
                created_by: row.created_by,
                author,
            },
            exam: Exam {
                id: row.exam_id,
                patient_code: row.patient_code,
                accession_number: row.accession_number,
                exam_date: row.exam_date,
                modality: row.modality,
                view_type: row.view_type,
                device: row.device,
                technician: row.technician,
                notes: row.notes,
            },
        }
    }
}

// 插入用的模型

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub patient_code: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<Sex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExam {
    pub patient_code: String,
    pub accession_number: String,
    pub exam_date: DateTime<Utc>,
    pub modality: String,
    pub view_type: String,
    pub device: String,
    pub technician: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQcRecord {
    pub exam_id: i64,
    pub original_image_path: Option<String>,
    pub corrected_image_path: Option<String>,
    pub ml_results_json: Option<String>,
    pub created_by: i64,
    /// 为空时使用数据库当前时间
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row() -> DbQcEntryRow {
        DbQcEntryRow {
            record_id: 9,
            exam_id: 3,
            original_image_path: Some("a/orig.png".to_string()),
            corrected_image_path: None,
            ml_results_json: Some(r#"{"status":"PASS"}"#.to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            created_by: 2,
            author_username: Some("tech".to_string()),
            author_full_name: Some("Dana Tech".to_string()),
            patient_code: "P-3".to_string(),
            accession_number: "ACC-3".to_string(),
            exam_date: Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap(),
            modality: "DX".to_string(),
            view_type: "AP".to_string(),
            device: "Mobile".to_string(),
            technician: "Ivanova".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_entry_row_conversion() {
        let entry = QcEntry::from(row());
        assert_eq!(entry.record.id, 9);
        assert_eq!(entry.record.exam_id, entry.exam.id);
        assert_eq!(entry.record.author.as_deref(), Some("Dana Tech"));
        assert_eq!(entry.exam.view_type, "AP");
    }

    #[test]
    fn test_author_falls_back_to_username() {
        let mut r = row();
        r.author_full_name = Some("  ".to_string());
        assert_eq!(QcEntry::from(r).record.author.as_deref(), Some("tech"));

        let mut r = row();
        r.author_username = None;
        r.author_full_name = None;
        assert_eq!(QcEntry::from(r).record.author_label(), "#2");
    }

    #[test]
    fn test_patient_sex_code_conversion() {
        let patient = Patient::from(DbPatient {
            id: 1,
            patient_code: "P-1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            sex: Some("f".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });
        assert_eq!(patient.sex, Some(Sex::Female));
    }
}
