//! 质控指标聚合
//!
//! 把一组QC记录归约为 [`Statistics`] 快照。过滤是前置步骤，归约本身与过滤无关；
//! 相同输入总是得到完全相同的结果。

use crate::parser::{MlResult, QcStatus};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use qc_core::utils::percent;
use qc_core::{QcEntry, SummaryFilter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 默认的前后对比指标
pub const DEFAULT_COMPARISON_METRIC: &str = "rotation";

/// 聚合配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// 用于校正前后对比的指标名
    pub comparison_metric: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            comparison_metric: DEFAULT_COMPARISON_METRIC.to_string(),
        }
    }
}

/// 分布统计的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Status,
    MajorFlag,
    CriticalFlag,
    AppliedFix,
    SevereFlag,
    Device,
    ViewType,
}

/// 单个指标校正前后的平均值
///
/// 没有任何记录提供该指标时对应的平均值为 `None`，而不是0。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub before: Option<f64>,
    pub after: Option<f64>,
    pub before_samples: usize,
    pub after_samples: usize,
}

impl MetricComparison {
    fn empty(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            before: None,
            after: None,
            before_samples: 0,
            after_samples: 0,
        }
    }

    /// 前后均有定义时返回 (before, after)
    pub fn both(&self) -> Option<(f64, f64)> {
        Some((self.before?, self.after?))
    }

    /// after - before
    pub fn delta(&self) -> Option<f64> {
        self.both().map(|(before, after)| after - before)
    }
}

/// 聚合结果快照
///
/// 不变式：`statuses` 各项之和等于 `total`；所有百分比在分母为0时取0。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub statuses: BTreeMap<QcStatus, usize>,
    /// 只统计值为true的标志
    pub major_flags: BTreeMap<String, usize>,
    pub critical_flags: BTreeMap<String, usize>,
    pub applied_fixes: BTreeMap<String, usize>,
    pub severe_flags: BTreeMap<String, usize>,
    pub devices: BTreeMap<String, usize>,
    pub view_types: BTreeMap<String, usize>,
    /// 有校正影像或至少应用过一次修正的记录数
    pub corrected: usize,
    pub exams: usize,
    pub patients: usize,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
    pub daily_counts: BTreeMap<NaiveDate, usize>,
    /// 行为星期（周一为0），列为UTC小时
    pub weekday_hour: [[usize; 24]; 7],
    pub comparison: MetricComparison,
}

impl Statistics {
    pub fn empty(metric: &str) -> Self {
        Self {
            total: 0,
            statuses: BTreeMap::new(),
            major_flags: BTreeMap::new(),
            critical_flags: BTreeMap::new(),
            applied_fixes: BTreeMap::new(),
            severe_flags: BTreeMap::new(),
            devices: BTreeMap::new(),
            view_types: BTreeMap::new(),
            corrected: 0,
            exams: 0,
            patients: 0,
            first_at: None,
            last_at: None,
            daily_counts: BTreeMap::new(),
            weekday_hour: [[0; 24]; 7],
            comparison: MetricComparison::empty(metric),
        }
    }

    pub fn status_count(&self, status: QcStatus) -> usize {
        self.statuses.get(&status).copied().unwrap_or(0)
    }

    /// 校正影像占比（0–100）
    pub fn corrected_percent(&self) -> f64 {
        percent(self.corrected, self.total)
    }

    /// 以记录总数为分母的百分比
    pub fn percent_of_total(&self, count: usize) -> f64 {
        percent(count, self.total)
    }

    /// 某一类别的完整分布，按数量降序、名称升序
    pub fn distribution(&self, category: Category) -> Vec<(String, usize)> {
        let mut rows: Vec<(String, usize)> = match category {
            Category::Status => self
                .statuses
                .iter()
                .map(|(status, count)| (status.as_str().to_string(), *count))
                .collect(),
            Category::MajorFlag => to_rows(&self.major_flags),
            Category::CriticalFlag => to_rows(&self.critical_flags),
            Category::AppliedFix => to_rows(&self.applied_fixes),
            Category::SevereFlag => to_rows(&self.severe_flags),
            Category::Device => to_rows(&self.devices),
            Category::ViewType => to_rows(&self.view_types),
        };
        rows.retain(|(_, count)| *count > 0);
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows
    }

    /// 分布中数量最多的前k项
    pub fn top(&self, category: Category, k: usize) -> Vec<(String, usize)> {
        let mut rows = self.distribution(category);
        rows.truncate(k);
        rows
    }

    /// 有记录的天数
    pub fn active_days(&self) -> usize {
        self.daily_counts.len()
    }
}

fn to_rows(map: &BTreeMap<String, usize>) -> Vec<(String, usize)> {
    map.iter().map(|(name, count)| (name.clone(), *count)).collect()
}

/// 指标聚合器
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// 使用另一对比指标的聚合器（单次请求覆盖）
    pub fn with_metric(&self, metric: &str) -> Self {
        Self {
            config: AggregatorConfig {
                comparison_metric: metric.to_string(),
            },
        }
    }

    pub fn comparison_metric(&self) -> &str {
        &self.config.comparison_metric
    }

    /// 过滤并归约QC记录
    pub fn aggregate(&self, entries: &[QcEntry], filter: Option<&SummaryFilter>) -> Statistics {
        let selected: Vec<&QcEntry> = match filter {
            Some(filter) => entries
                .iter()
                .filter(|entry| filter.matches(entry))
                .filter(|entry| match filter.flag_name() {
                    Some(flag) => MlResult::parse(entry.record.ml_results_json.as_deref()).raises(flag),
                    None => true,
                })
                .collect(),
            None => entries.iter().collect(),
        };
        self.reduce(&selected)
    }

    fn reduce(&self, entries: &[&QcEntry]) -> Statistics {
        let metric = self.config.comparison_metric.as_str();
        let mut stats = Statistics::empty(metric);
        let mut exams = BTreeSet::new();
        let mut patients = BTreeSet::new();
        let mut before = MeanAccumulator::default();
        let mut after = MeanAccumulator::default();

        for entry in entries {
            let record = &entry.record;
            let result = MlResult::parse(record.ml_results_json.as_deref());

            stats.total += 1;
            *stats.statuses.entry(result.status).or_insert(0) += 1;

            for flag in result.active_major_flags() {
                *stats.major_flags.entry(flag.to_string()).or_insert(0) += 1;
            }
            for flag in result.active_critical_flags() {
                *stats.critical_flags.entry(flag.to_string()).or_insert(0) += 1;
            }
            for fix in &result.applied_fixes {
                *stats.applied_fixes.entry(fix.clone()).or_insert(0) += 1;
            }
            for flag in &result.severe_flags {
                *stats.severe_flags.entry(flag.clone()).or_insert(0) += 1;
            }

            bump_label(&mut stats.devices, &entry.exam.device);
            bump_label(&mut stats.view_types, &entry.exam.view_type);

            if record.corrected_path().is_some() || !result.applied_fixes.is_empty() {
                stats.corrected += 1;
            }

            exams.insert(record.exam_id);
            patients.insert(entry.exam.patient_code.as_str());

            let at = record.created_at;
            stats.first_at = Some(stats.first_at.map_or(at, |first| first.min(at)));
            stats.last_at = Some(stats.last_at.map_or(at, |last| last.max(at)));
            *stats.daily_counts.entry(at.date_naive()).or_insert(0) += 1;
            let weekday = at.weekday().num_days_from_monday() as usize;
            stats.weekday_hour[weekday][at.hour() as usize] += 1;

            if let Some(value) = result.probs_before.as_ref().and_then(|p| p.get(metric)) {
                before.push(*value);
            }
            if let Some(value) = result.probs_after.as_ref().and_then(|p| p.get(metric)) {
                after.push(*value);
            }
        }

        stats.exams = exams.len();
        stats.patients = patients.len();
        stats.comparison = MetricComparison {
            metric: metric.to_string(),
            before: before.mean(),
            after: after.mean(),
            before_samples: before.count,
            after_samples: after.count,
        };

        tracing::debug!(
            "Aggregated {} QC records across {} exams",
            stats.total,
            stats.exams
        );
        stats
    }
}

fn bump_label(map: &mut BTreeMap<String, usize>, label: &str) {
    let label = label.trim();
    if !label.is_empty() {
        *map.entry(label.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use qc_core::{Exam, QcRecord};

    fn entry(id: i64, exam_id: i64, patient: &str, payload: Option<&str>) -> QcEntry {
        // 2024-03-04 是周一
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap() + chrono::Duration::hours(id * 5);
        QcEntry {
            record: QcRecord {
                id,
                exam_id,
                original_image_path: None,
                corrected_image_path: None,
                ml_results_json: payload.map(str::to_string),
                created_at: at,
                created_by: 1,
                author: None,
            },
            exam: Exam {
                id: exam_id,
                patient_code: patient.to_string(),
                accession_number: format!("ACC{exam_id}"),
                exam_date: at,
                modality: "DX".to_string(),
                view_type: "PA".to_string(),
                device: if exam_id % 2 == 0 { "GE Discovery" } else { "Siemens Multix" }.to_string(),
                technician: "tech".to_string(),
                notes: None,
            },
        }
    }

    fn status_payload(status: &str) -> String {
        format!(r#"{{"status":"{status}"}}"#)
    }

    #[test]
    fn test_status_counts_scenario() {
        let payloads = ["PASS", "PASS", "FIX", "FLAG"].map(status_payload);
        let mut entries: Vec<QcEntry> = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| entry(i as i64, 1, "P1", Some(p)))
            .collect();
        entries.push(entry(9, 1, "P1", None));

        let stats = Aggregator::default().aggregate(&entries, None);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.status_count(QcStatus::Pass), 2);
        assert_eq!(stats.status_count(QcStatus::Fix), 1);
        assert_eq!(stats.status_count(QcStatus::Flag), 1);
        assert_eq!(stats.status_count(QcStatus::Unknown), 1);
        assert_eq!(stats.statuses.values().sum::<usize>(), stats.total);
    }

    #[test]
    fn test_major_flags_count_true_only() {
        let entries: Vec<QcEntry> = (0..5)
            .map(|i| {
                let on = i < 3;
                let payload = format!(r#"{{"status":"FLAG","major_flags":{{"rotation":{on}}}}}"#);
                entry(i, 1, "P1", Some(&payload))
            })
            .collect();

        let stats = Aggregator::default().aggregate(&entries, None);
        assert_eq!(stats.major_flags.len(), 1);
        assert_eq!(stats.major_flags["rotation"], 3);
        assert!(stats.critical_flags.is_empty());
    }

    #[test]
    fn test_malformed_payloads_are_counted_not_dropped() {
        let entries = vec![
            entry(1, 1, "P1", Some("garbage")),
            entry(2, 1, "P1", Some("")),
            entry(3, 1, "P1", Some(r#"{"status":"PASS","major_flags":"oops"}"#)),
        ];
        let stats = Aggregator::default().aggregate(&entries, None);
        assert_eq!(stats.total, entries.len());
        assert_eq!(stats.status_count(QcStatus::Unknown), 2);
        assert_eq!(stats.statuses.values().sum::<usize>(), stats.total);
    }

    #[test]
    fn test_empty_input() {
        let stats = Aggregator::default().aggregate(&[], None);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.corrected_percent(), 0.0);
        assert!(stats.comparison.before.is_none());
        assert!(stats.comparison.after.is_none());
        assert!(stats.first_at.is_none());
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let entries = vec![
            entry(1, 1, "P1", Some(r#"{"status":"FIX","applied_fixes":["rotate"],"qc_probs_before":{"rotation":0.9},"qc_probs_after":{"rotation":0.2}}"#)),
            entry(2, 2, "P2", Some(r#"{"status":"PASS"}"#)),
        ];
        let aggregator = Aggregator::default();
        assert_eq!(aggregator.aggregate(&entries, None), aggregator.aggregate(&entries, None));
    }

    #[test]
    fn test_before_after_means_skip_absent_values() {
        let entries = vec![
            entry(1, 1, "P1", Some(r#"{"qc_probs_before":{"rotation":0.8},"qc_probs_after":{"rotation":0.2}}"#)),
            entry(2, 1, "P1", Some(r#"{"qc_probs_before":{"rotation":0.6}}"#)),
            entry(3, 1, "P1", Some(r#"{"qc_probs_before":{"noise":0.6},"qc_probs_after":{"rotation":0.4}}"#)),
        ];
        let stats = Aggregator::default().aggregate(&entries, None);
        let cmp = &stats.comparison;
        assert_eq!(cmp.metric, "rotation");
        assert_eq!(cmp.before_samples, 2);
        assert_eq!(cmp.after_samples, 2);
        assert!((cmp.before.unwrap() - 0.7).abs() < 1e-9);
        assert!((cmp.after.unwrap() - 0.3).abs() < 1e-9);
        assert!((cmp.delta().unwrap() + 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_comparison_metric_is_configurable() {
        let entries = vec![entry(1, 1, "P1", Some(r#"{"qc_probs_before":{"noise":0.5}}"#))];
        let stats = Aggregator::default().with_metric("noise").aggregate(&entries, None);
        assert_eq!(stats.comparison.before, Some(0.5));
        assert_eq!(stats.comparison.after, None);
        assert!(stats.comparison.both().is_none());
    }

    #[test]
    fn test_corrected_percent_and_filter_prestep() {
        let mut entries = vec![
            entry(1, 1, "P1", Some(r#"{"status":"FIX","applied_fixes":["crop"]}"#)),
            entry(2, 2, "P1", Some(r#"{"status":"PASS"}"#)),
            entry(3, 3, "P2", Some(r#"{"status":"PASS"}"#)),
            entry(4, 4, "P2", Some(r#"{"status":"PASS"}"#)),
        ];
        entries[2].record.corrected_image_path = Some("c/3.png".to_string());

        let aggregator = Aggregator::default();
        let all = aggregator.aggregate(&entries, None);
        assert_eq!(all.corrected, 2);
        assert_eq!(all.corrected_percent(), 50.0);
        assert_eq!(all.patients, 2);
        assert_eq!(all.exams, 4);

        let p1 = aggregator.aggregate(&entries, Some(&SummaryFilter::for_patient("P1")));
        assert_eq!(p1.total, 2);
        assert_eq!(p1.corrected_percent(), 50.0);
        assert!(p1.corrected_percent() >= 0.0 && p1.corrected_percent() <= 100.0);
    }

    #[test]
    fn test_flag_filter_keeps_only_raised_flags() {
        let entries = vec![
            entry(1, 1, "P1", Some(r#"{"qc_probs":{"rotation":0.02},"major_flags":{"rotation":false}}"#)),
            entry(2, 1, "P1", Some(r#"{"qc_probs":{"rotation":0.91},"major_flags":{"rotation":true}}"#)),
            entry(3, 1, "P1", Some(r#"{"critical_flags":{"rotation":1}}"#)),
            entry(4, 1, "P1", Some(r#"{"severe_flags":["rotation"]}"#)),
            entry(5, 1, "P1", Some(r#"{"qc_probs":{"rotation":0.5}}"#)),
            entry(6, 1, "P1", None),
        ];
        let filter = SummaryFilter {
            flag: Some("rotation".to_string()),
            ..SummaryFilter::default()
        };

        let stats = Aggregator::default().aggregate(&entries, Some(&filter));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.major_flags["rotation"], 1);
        assert_eq!(stats.critical_flags["rotation"], 1);
        assert_eq!(stats.severe_flags["rotation"], 1);
    }

    #[test]
    fn test_time_buckets() {
        let entries = vec![entry(0, 1, "P1", None), entry(1, 1, "P1", None), entry(3, 1, "P1", None)];
        let stats = Aggregator::default().aggregate(&entries, None);
        // 09:00, 14:00 周一；次日 00:00 周二
        assert_eq!(stats.weekday_hour[0][9], 1);
        assert_eq!(stats.weekday_hour[0][14], 1);
        assert_eq!(stats.weekday_hour[1][0], 1);
        assert_eq!(stats.active_days(), 2);
        assert_eq!(stats.first_at, Some(entries[0].record.created_at));
        assert_eq!(stats.last_at, Some(entries[2].record.created_at));
    }

    #[test]
    fn test_distribution_sorted_and_truncated() {
        let entries = vec![
            entry(1, 1, "P1", Some(r#"{"major_flags":{"b":true,"a":true,"c":true}}"#)),
            entry(2, 1, "P1", Some(r#"{"major_flags":{"c":true}}"#)),
        ];
        let stats = Aggregator::default().aggregate(&entries, None);
        assert_eq!(
            stats.top(Category::MajorFlag, 2),
            vec![("c".to_string(), 2), ("a".to_string(), 1)]
        );
        assert_eq!(stats.distribution(Category::Device), vec![("Siemens Multix".to_string(), 2)]);
    }
}
