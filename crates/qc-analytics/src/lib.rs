//! # CXR QC 分析模块
//!
//! 提供质控结果的解析与聚合：
//! - 结果解析：按别名表容错地把原始JSON规范化为 `MlResult`
//! - 指标聚合：把QC记录集合归约为仪表盘和报告使用的 `Statistics`

pub mod aggregator;
pub mod aliases;
pub mod parser;
pub mod records;

// 重新导出主要类型
pub use aggregator::{
    Aggregator, AggregatorConfig, Category, MetricComparison, Statistics,
    DEFAULT_COMPARISON_METRIC,
};
pub use parser::{MlResult, QcStatus};
pub use records::RecordSummary;
