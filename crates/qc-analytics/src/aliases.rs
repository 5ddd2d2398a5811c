//! 结果JSON字段别名表
//!
//! 影像分析服务的不同版本会用不同的键名输出同一字段。每个逻辑字段对应一个有序键列表，
//! 查找时取第一个存在的键。

use serde_json::{Map, Value};

/// 逻辑字段及其可接受的键名（按优先级排列）
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

pub const STATUS: FieldAliases = FieldAliases {
    field: "status",
    keys: &["status", "qc_status", "result"],
};

pub const QC_PROBS: FieldAliases = FieldAliases {
    field: "qc_probs",
    keys: &["qc_probs", "probs", "probabilities"],
};

pub const MAJOR_FLAGS: FieldAliases = FieldAliases {
    field: "major_flags",
    keys: &["major_flags", "majorFlags"],
};

pub const CRITICAL_FLAGS: FieldAliases = FieldAliases {
    field: "critical_flags",
    keys: &["critical_flags", "criticalFlags"],
};

pub const APPLIED_FIXES: FieldAliases = FieldAliases {
    field: "applied_fixes",
    keys: &["applied_fixes", "fixes", "appliedFixes"],
};

pub const SEVERE_FLAGS: FieldAliases = FieldAliases {
    field: "severe_flags",
    keys: &["severe_flags", "severeFlags"],
};

pub const NEEDS_FIX: FieldAliases = FieldAliases {
    field: "needs_fix",
    keys: &["needs_fix", "needsFix"],
};

/// 校正前概率（顶层键）
pub const PROBS_BEFORE: FieldAliases = FieldAliases {
    field: "probs_before",
    keys: &[
        "qc_probs_before",
        "probs_before",
        "qc_probs_original",
        "original_probs",
    ],
};

/// 校正后概率（顶层键）
pub const PROBS_AFTER: FieldAliases = FieldAliases {
    field: "probs_after",
    keys: &[
        "qc_probs_after",
        "probs_after",
        "qc_probs_processed",
        "processed_probs",
        "corrected_probs",
    ],
};

/// 嵌套的前后对比容器
pub const COMPARISON: FieldAliases = FieldAliases {
    field: "comparison",
    keys: &["qc_probs_compare", "comparison", "before_after"],
};

/// 对比容器内“原始影像”一侧
pub const COMPARISON_ORIGINAL: FieldAliases = FieldAliases {
    field: "comparison.original",
    keys: &["original", "before", "orig"],
};

/// 对比容器内“处理后影像”一侧
pub const COMPARISON_PROCESSED: FieldAliases = FieldAliases {
    field: "comparison.processed",
    keys: &["processed", "after", "corrected"],
};

/// 内嵌的原始影像（base64）
pub const ORIGINAL_IMAGE: FieldAliases = FieldAliases {
    field: "original_image",
    keys: &["original_image_base64", "original_image", "original_b64"],
};

/// 内嵌的校正后影像（base64）
pub const CORRECTED_IMAGE: FieldAliases = FieldAliases {
    field: "corrected_image",
    keys: &[
        "processed_image_base64",
        "corrected_image_base64",
        "processed_image",
        "corrected_image",
    ],
};

/// 解析器使用的全部别名表
pub const ALL: &[FieldAliases] = &[
    STATUS,
    QC_PROBS,
    MAJOR_FLAGS,
    CRITICAL_FLAGS,
    APPLIED_FIXES,
    SEVERE_FLAGS,
    NEEDS_FIX,
    PROBS_BEFORE,
    PROBS_AFTER,
    COMPARISON,
    COMPARISON_ORIGINAL,
    COMPARISON_PROCESSED,
    ORIGINAL_IMAGE,
    CORRECTED_IMAGE,
];

/// 返回第一个存在且不为null的键对应的值
pub fn lookup<'a>(object: &'a Map<String, Value>, aliases: &FieldAliases) -> Option<&'a Value> {
    aliases
        .keys
        .iter()
        .find_map(|key| object.get(*key).filter(|value| !value.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_takes_first_present_key() {
        let value = json!({"probs": {"a": 0.1}, "probabilities": {"b": 0.2}});
        let object = value.as_object().unwrap();
        assert_eq!(lookup(object, &QC_PROBS), Some(&json!({"a": 0.1})));
    }

    #[test]
    fn test_lookup_skips_null_values() {
        let value = json!({"status": null, "qc_status": "PASS"});
        let object = value.as_object().unwrap();
        assert_eq!(lookup(object, &STATUS), Some(&json!("PASS")));
    }

    #[test]
    fn test_alias_tables_have_no_duplicate_keys() {
        for aliases in ALL {
            assert!(!aliases.keys.is_empty(), "{} has no keys", aliases.field);
            let mut keys = aliases.keys.to_vec();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), aliases.keys.len(), "{} repeats a key", aliases.field);
        }
    }
}
