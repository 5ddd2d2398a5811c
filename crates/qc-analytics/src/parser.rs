//! 质控结果解析
//!
//! 把QC记录上附带的原始JSON规范化为 [`MlResult`]。解析是全函数：
//! 缺失、空串、非JSON、根不是对象时都返回 `MlResult::default()`，永不报错。

use crate::aliases::{self, FieldAliases};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// 质控结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum QcStatus {
    Pass,
    Fix,
    Flag,
    #[default]
    Unknown,
}

impl QcStatus {
    pub const ALL: [QcStatus; 4] = [QcStatus::Pass, QcStatus::Fix, QcStatus::Flag, QcStatus::Unknown];

    /// 大小写不敏感；无法识别的值归为 UNKNOWN
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PASS" => QcStatus::Pass,
            "FIX" => QcStatus::Fix,
            "FLAG" => QcStatus::Flag,
            _ => QcStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Pass => "PASS",
            QcStatus::Fix => "FIX",
            QcStatus::Flag => "FLAG",
            QcStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规范化后的影像分析结果（不持久化）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlResult {
    pub status: QcStatus,
    /// 指标名 → 概率，取值范围 [0,1]
    pub qc_probs: BTreeMap<String, f64>,
    pub major_flags: BTreeMap<String, bool>,
    pub critical_flags: BTreeMap<String, bool>,
    pub applied_fixes: Vec<String>,
    pub severe_flags: Vec<String>,
    /// 校正前概率，键与 `qc_probs` 相同
    pub probs_before: Option<BTreeMap<String, f64>>,
    /// 校正后概率，键与 `qc_probs` 相同
    pub probs_after: Option<BTreeMap<String, f64>>,
    pub needs_fix: bool,
}

impl MlResult {
    /// 解析原始结果；任何输入都得到有效结果
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => Self::from_object(&object),
            Ok(_) => {
                tracing::debug!("QC payload root is not an object, treating as UNKNOWN");
                Self::default()
            }
            Err(e) => {
                tracing::debug!("Unparsable QC payload ({}), treating as UNKNOWN", e);
                Self::default()
            }
        }
    }

    /// 从已解析的JSON对象提取字段，未知键忽略
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let status = aliases::lookup(object, &aliases::STATUS)
            .and_then(Value::as_str)
            .map(QcStatus::parse)
            .unwrap_or_default();

        let (probs_before, probs_after) = comparison_probs(object);

        Self {
            status,
            qc_probs: prob_map(object, &aliases::QC_PROBS).unwrap_or_default(),
            major_flags: flag_map(object, &aliases::MAJOR_FLAGS),
            critical_flags: flag_map(object, &aliases::CRITICAL_FLAGS),
            applied_fixes: string_list(object, &aliases::APPLIED_FIXES),
            severe_flags: string_list(object, &aliases::SEVERE_FLAGS),
            probs_before,
            probs_after,
            needs_fix: aliases::lookup(object, &aliases::NEEDS_FIX)
                .map(truthy)
                .unwrap_or(false),
        }
    }

    /// 值为true的主要标志名
    /// 标志是否被判定为真：主要/严重标志为true，或出现在严重标志列表中
    pub fn raises(&self, flag: &str) -> bool {
        self.major_flags.get(flag).copied().unwrap_or(false)
            || self.critical_flags.get(flag).copied().unwrap_or(false)
            || self.severe_flags.iter().any(|name| name == flag)
    }

    pub fn active_major_flags(&self) -> impl Iterator<Item = &str> {
        self.major_flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    /// 值为true的危急标志名
    pub fn active_critical_flags(&self) -> impl Iterator<Item = &str> {
        self.critical_flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    /// 概率最高的前n个指标，同值按名称排序
    pub fn top_probs(&self, n: usize) -> Vec<(&str, f64)> {
        let mut probs: Vec<(&str, f64)> = self
            .qc_probs
            .iter()
            .map(|(name, p)| (name.as_str(), *p))
            .collect();
        probs.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
        probs.truncate(n);
        probs
    }
}

/// 先查顶层前后概率键，再查嵌套对比容器
fn comparison_probs(
    object: &Map<String, Value>,
) -> (Option<BTreeMap<String, f64>>, Option<BTreeMap<String, f64>>) {
    let mut before = prob_map(object, &aliases::PROBS_BEFORE);
    let mut after = prob_map(object, &aliases::PROBS_AFTER);

    if let Some(Value::Object(container)) = aliases::lookup(object, &aliases::COMPARISON) {
        if before.is_none() {
            before = prob_map(container, &aliases::COMPARISON_ORIGINAL);
        }
        if after.is_none() {
            after = prob_map(container, &aliases::COMPARISON_PROCESSED);
        }
    }

    (before, after)
}

fn prob_map(object: &Map<String, Value>, aliases: &FieldAliases) -> Option<BTreeMap<String, f64>> {
    let Value::Object(values) = aliases::lookup(object, aliases)? else {
        return None;
    };

    Some(
        values
            .iter()
            .filter_map(|(name, value)| probability(value).map(|p| (name.clone(), p)))
            .collect(),
    )
}

fn probability(value: &Value) -> Option<f64> {
    let p = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    p.is_finite().then(|| p.clamp(0.0, 1.0))
}

fn flag_map(object: &Map<String, Value>, aliases: &FieldAliases) -> BTreeMap<String, bool> {
    match aliases::lookup(object, aliases) {
        Some(Value::Object(flags)) => flags
            .iter()
            .map(|(name, value)| (name.clone(), truthy(value)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn string_list(object: &Map<String, Value>, aliases: &FieldAliases) -> Vec<String> {
    match aliases::lookup(object, aliases) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// 与分析服务一致的真值判断
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
