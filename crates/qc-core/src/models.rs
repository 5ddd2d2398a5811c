//! 核心数据模型定义
//!
//! 所有权链为 Patient → Exam → QcRecord，删除患者会级联删除其检查和QC记录。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 患者基本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub patient_code: String, // 外部患者编号（唯一）
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<Sex>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// 姓 + 名
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name).trim().to_string()
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    /// 数据库中的单字符编码
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Other => "O",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            "O" => Some(Sex::Other),
            _ => None,
        }
    }
}

/// 胸片检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub patient_code: String,
    pub accession_number: String, // 检查号（唯一）
    pub exam_date: DateTime<Utc>,
    pub modality: String,
    pub view_type: String, // PA, AP, LAT ...
    pub device: String,
    pub technician: String,
    pub notes: Option<String>,
}

/// 一次自动质控评估
///
/// 创建后只追加不修改；`ml_results_json` 保存影像分析服务返回的原始JSON。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRecord {
    pub id: i64,
    pub exam_id: i64,
    pub original_image_path: Option<String>,
    pub corrected_image_path: Option<String>,
    pub ml_results_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
    /// 创建者显示名（由记录存储联表填充）
    pub author: Option<String>,
}

impl QcRecord {
    /// 原始影像路径，空字符串视为缺失
    pub fn original_path(&self) -> Option<&str> {
        non_empty(self.original_image_path.as_deref())
    }

    /// 校正后影像路径，空字符串视为缺失
    pub fn corrected_path(&self) -> Option<&str> {
        non_empty(self.corrected_image_path.as_deref())
    }

    /// 报告中展示的作者
    pub fn author_label(&self) -> String {
        match non_empty(self.author.as_deref()) {
            Some(author) => author.to_string(),
            None => format!("#{}", self.created_by),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// QC记录及其所属检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcEntry {
    pub record: QcRecord,
    pub exam: Exam,
}

/// 系统用户（仅用于展示作者）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
