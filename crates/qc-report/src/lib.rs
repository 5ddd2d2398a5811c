//! # CXR QC 报告模块
//!
//! 生成单次检查的双语（俄语/哈萨克语）质控报告PDF：
//! - 字体选择：优先能绘制西里尔字母的系统字体，找不到时退回内置字体
//! - 图表渲染：按天柱状图、分类环形图、星期×小时热力图
//! - 影像获取：存储路径优先，其次结果JSON中的内嵌影像
//! - 文档排版：自动分页的块式布局，输出PDF

pub mod blocks;
pub mod charts;
pub mod compositor;
pub mod fonts;
pub mod i18n;
pub mod images;
pub mod layout;
pub mod pdf;
pub mod service;

// 重新导出主要类型
pub use charts::{ChartImage, ChartKind, ChartSize, LegendEntry};
pub use compositor::{compose, compose_pdf, document_id, HistoryEntry, ReportConfig, ReportInput};
pub use fonts::{FontFace, FontResolver, ResolvedFonts, DEFAULT_FONT_FAMILIES};
pub use i18n::{Label, Locale, LocalePair};
pub use images::{ImageStore, ImageVariant};
pub use layout::{Document, PageGeometry};
pub use service::{QcReportService, RenderedReport, PDF_MIME};
