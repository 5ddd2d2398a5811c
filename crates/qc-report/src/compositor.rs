//! 报告组装
//!
//! 按固定顺序排版各内容块：标题、患者、检查、活动概况、分布、图表、校正分析、历史、识别信息。
//! 相同输入总是得到相同的 [`Document`]。

use crate::blocks::{self, Block, BlockKind, Row, HISTORY_COLUMNS, SWATCH_MM};
use crate::charts::{self, ChartImage, ChartKind, ChartSize};
use crate::fonts::ResolvedFonts;
use crate::i18n::{Label, LocalePair};
use crate::layout::{Document, Layout, PageGeometry, TextStyle};
use crate::pdf;
use chrono::{DateTime, Utc};
use qc_analytics::{Category, Statistics, DEFAULT_COMPARISON_METRIC};
use qc_core::{Exam, Patient, QcRecord, Result};
use uuid::Uuid;

const BLOCK_GAP: f32 = 4.0;
const FIGURE_GAP: f32 = 4.0;

/// 报告参数
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub locales: LocalePair,
    pub comparison_metric: String,
    pub geometry: PageGeometry,
    /// 按天柱状图覆盖的天数
    pub chart_days: usize,
    /// 环形图最多展示的类别数
    pub top_k: usize,
    /// 分布列表最多行数
    pub list_limit: usize,
    /// 历史表中展示的概率项数
    pub history_probs: usize,
    pub chart_px: ChartSize,
    pub chart_height_mm: f32,
    pub thumbnail_mm: f32,
    pub thumbnail_px: u32,
    pub footer_image_mm: f32,
    pub footer_image_px: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            locales: LocalePair::default(),
            comparison_metric: DEFAULT_COMPARISON_METRIC.to_string(),
            geometry: PageGeometry::default(),
            chart_days: 14,
            top_k: 6,
            list_limit: 10,
            history_probs: 3,
            chart_px: ChartSize::new(800, 400),
            chart_height_mm: 60.0,
            thumbnail_mm: 18.0,
            thumbnail_px: 256,
            footer_image_mm: 90.0,
            footer_image_px: 1024,
        }
    }
}

/// 历史表中的一条记录及其缩略图原始字节
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub record: QcRecord,
    pub thumbnail: Option<Vec<u8>>,
}

/// 组装一份检查报告所需的全部数据
#[derive(Debug, Clone, PartialEq)]
pub struct ReportInput {
    pub exam: Exam,
    pub patient: Option<Patient>,
    /// 全部记录的统计
    pub global: Statistics,
    /// 本检查记录的统计
    pub exam_stats: Statistics,
    pub charts: Vec<ChartImage>,
    pub history: Vec<HistoryEntry>,
    pub latest_original: Option<Vec<u8>>,
    pub latest_corrected: Option<Vec<u8>>,
    pub generated_at: DateTime<Utc>,
}

/// 报告中的图表，依次渲染；无法渲染的直接略过
pub fn report_charts(stats: &Statistics, config: &ReportConfig) -> Vec<ChartImage> {
    let kinds = [
        ChartKind::DailyBar {
            days: config.chart_days,
        },
        ChartKind::Distribution {
            category: Category::Status,
            top_k: config.top_k,
        },
        ChartKind::Distribution {
            category: Category::MajorFlag,
            top_k: config.top_k,
        },
        ChartKind::Distribution {
            category: Category::AppliedFix,
            top_k: config.top_k,
        },
        ChartKind::WeekdayHeatmap,
    ];
    kinds
        .iter()
        .filter_map(|kind| charts::render(stats, kind, config.chart_px))
        .collect()
}

/// 由检查ID派生的稳定文档ID
pub fn document_id(exam_id: i64) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("cxr-qc/report/exam/{exam_id}").as_bytes())
}

/// 排版报告
pub fn compose(input: &ReportInput, config: &ReportConfig) -> Document {
    let mut produced: Vec<(BlockKind, Option<Block>)> = vec![
        (BlockKind::Header, blocks::header_block(input, config)),
        (BlockKind::Patient, blocks::patient_block(input.patient.as_ref(), config)),
        (BlockKind::Exam, blocks::exam_block(&input.exam, config)),
        (BlockKind::Activity, blocks::activity_block(&input.global, config)),
    ];
    produced.extend(blocks::distribution_blocks(&input.global, config));
    produced.extend([
        (BlockKind::Charts, blocks::charts_block(input, config)),
        (BlockKind::Corrections, blocks::corrections_block(input, config)),
        (BlockKind::History, blocks::history_block(input, config)),
        (BlockKind::Footer, blocks::footer_block(input, config)),
    ]);

    let mut layout = Layout::new(config.geometry);
    for (kind, block) in produced {
        match block {
            Some(block) => layout_block(&mut layout, &block, config),
            None => tracing::debug!("Report block {:?} skipped for exam {}", kind, input.exam.id),
        }
    }

    let (title, _) = config.locales.label(Label::ReportTitle);
    let document = layout.finish(
        document_id(input.exam.id).to_string(),
        format!("{title} {}", input.exam.accession_number),
    );
    tracing::debug!(
        "Composed report for exam {} with {} pages",
        input.exam.id,
        document.page_count()
    );
    document
}

/// 排版并写出PDF
pub fn compose_pdf(input: &ReportInput, config: &ReportConfig, fonts: &ResolvedFonts) -> Result<Vec<u8>> {
    let document = compose(input, config);
    pdf::write(&document, fonts)
}

fn layout_block(layout: &mut Layout, block: &Block, config: &ReportConfig) {
    for (i, row) in block.rows.iter().enumerate() {
        // 标题行与其后第一行放在同一页
        let needed = match (row, block.rows.get(i + 1)) {
            (Row::Heading(_), Some(next)) => row.height() + next.height(),
            _ => row.height(),
        };
        layout.ensure_space(needed);
        draw_row(layout, row, config);
    }
    layout.advance(BLOCK_GAP);
}

fn draw_row(layout: &mut Layout, row: &Row, config: &ReportConfig) {
    let half = config.geometry.content_width() / 2.0;
    match row {
        Row::Title(text) => {
            layout.place_text(0.0, text.as_str(), TextStyle::Title);
        }
        Row::Heading(text) => {
            layout.place_text(0.0, text.as_str(), TextStyle::Heading);
        }
        Row::Line(text) => {
            let chars = TextStyle::Body.chars_for_width(config.geometry.content_width());
            layout.place_text(0.0, qc_core::utils::truncate_chars(text, chars), TextStyle::Body);
        }
        Row::Pair { left, right } => {
            let chars = TextStyle::Body.chars_for_width(half - 2.0);
            layout.place_text(0.0, qc_core::utils::truncate_chars(left, chars), TextStyle::Body);
            layout.place_text(half, qc_core::utils::truncate_chars(right, chars), TextStyle::Body);
        }
        Row::History(history) => {
            let cells = [
                &history.timestamp,
                &history.author,
                &history.status,
                &history.probs,
            ];
            for (x, text) in HISTORY_COLUMNS.iter().zip(cells) {
                layout.place_text(*x, text.as_str(), TextStyle::Small);
            }
            if let Some(thumb) = &history.thumbnail {
                let x = config.geometry.content_width() - thumb.width;
                layout.place_image(x, &thumb.raster, thumb.width, thumb.height);
            }
        }
        Row::Figures(figures) => {
            let mut x = 0.0;
            for figure in figures {
                layout.place_image(x, &figure.raster, figure.width, figure.height);
                x += figure.width + FIGURE_GAP;
            }
            let image_height = figures.iter().map(|f| f.height).fold(0.0, f32::max);
            layout.advance(image_height);

            // 标题与图例逐行排在各自图片下方
            let style = TextStyle::Small;
            let lines = figures.iter().map(|f| f.text_lines()).max().unwrap_or(0);
            for line in 0..lines {
                let mut x = 0.0;
                for figure in figures {
                    let width = figure.width.max(half - 2.0);
                    if let Some(caption) = figure.caption.get(line) {
                        let chars = style.chars_for_width(width);
                        layout.place_text(x, qc_core::utils::truncate_chars(caption, chars), style);
                    } else if let Some(item) = figure.legend.get(line - figure.caption.len()) {
                        let text_x = SWATCH_MM + 1.0;
                        let chars = style.chars_for_width(width - text_x);
                        layout.place_image(x, &item.swatch, SWATCH_MM, SWATCH_MM);
                        layout.place_text(x + text_x, qc_core::utils::truncate_chars(&item.text, chars), style);
                    }
                    x += figure.width + FIGURE_GAP;
                }
                layout.advance(style.line_height());
            }
            layout.advance(row.height() - image_height - lines as f32 * style.line_height());
            return;
        }
    }
    layout.advance(row.height());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Element;
    use chrono::{NaiveDate, TimeZone};
    use qc_analytics::Aggregator;
    use qc_core::{QcEntry, Sex};
    use std::io::Cursor;

    fn exam() -> Exam {
        Exam {
            id: 42,
            patient_code: "P-100".to_string(),
            accession_number: "ACC-42".to_string(),
            exam_date: Utc.with_ymd_and_hms(2024, 4, 10, 8, 0, 0).unwrap(),
            modality: "DX".to_string(),
            view_type: "PA".to_string(),
            device: "Room 1".to_string(),
            technician: "Akhmetov".to_string(),
            notes: Some("Repeat after rotation correction".to_string()),
        }
    }

    fn patient() -> Patient {
        Patient {
            id: 1,
            patient_code: "P-100".to_string(),
            first_name: "Ерлан".to_string(),
            last_name: "Садыков".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1975, 1, 20).unwrap(),
            sex: Some(Sex::Male),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(w, h);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn record(id: i64, hour: u32) -> QcRecord {
        QcRecord {
            id,
            exam_id: 42,
            original_image_path: None,
            corrected_image_path: None,
            ml_results_json: Some(format!(
                r#"{{"status":"{}","qc_probs":{{"rotation":0.{id}}},"applied_fixes":["rotate"],"major_flags":{{"rotation":true}}}}"#,
                if id % 2 == 0 { "FIX" } else { "PASS" }
            )),
            created_at: Utc.with_ymd_and_hms(2024, 4, 10, hour % 24, 0, 0).unwrap(),
            created_by: 1,
            author: Some("technician".to_string()),
        }
    }

    fn input(records: usize) -> ReportInput {
        let entries: Vec<QcEntry> = (1..=records as i64)
            .map(|id| QcEntry {
                record: record(id, id as u32),
                exam: exam(),
            })
            .collect();
        let stats = Aggregator::default().aggregate(&entries, None);
        let config = ReportConfig::default();
        ReportInput {
            exam: exam(),
            patient: Some(patient()),
            charts: report_charts(&stats, &config),
            global: stats.clone(),
            exam_stats: stats,
            history: entries
                .iter()
                .map(|e| HistoryEntry {
                    record: e.record.clone(),
                    thumbnail: Some(png(64, 64)),
                })
                .collect(),
            latest_original: Some(png(200, 300)),
            latest_corrected: Some(png(200, 300)),
            generated_at: Utc.with_ymd_and_hms(2024, 4, 11, 12, 0, 0).unwrap(),
        }
    }

    fn empty_input() -> ReportInput {
        ReportInput {
            exam: exam(),
            patient: None,
            global: Statistics::empty(DEFAULT_COMPARISON_METRIC),
            exam_stats: Statistics::empty(DEFAULT_COMPARISON_METRIC),
            charts: Vec::new(),
            history: Vec::new(),
            latest_original: None,
            latest_corrected: None,
            generated_at: Utc.with_ymd_and_hms(2024, 4, 11, 12, 0, 0).unwrap(),
        }
    }

    fn assert_within_margins(doc: &Document) {
        let g = doc.geometry;
        for element in doc.elements() {
            assert!(element.top() >= g.top() - 1e-3, "{:?}", element);
            assert!(element.bottom() <= g.bottom() + 1e-3, "{:?}", element);
        }
    }

    #[test]
    fn test_empty_exam_still_produces_report() {
        let doc = compose(&empty_input(), &ReportConfig::default());
        assert_eq!(doc.page_count(), 1);
        let texts: Vec<&str> = doc.texts().collect();
        assert!(texts.contains(&"Нет записей / Жазбалар жоқ"));
        assert!(texts.contains(&"Доля исправленных (всего): 0.0% (0/0)"));
        // 没有患者时不出现患者块
        assert!(!texts.contains(&"Пациент"));
    }

    #[test]
    fn test_large_history_paginates_within_margins() {
        let data = input(120);
        let doc = compose(&data, &ReportConfig::default());
        assert!(doc.page_count() > 3);
        assert_within_margins(&doc);

        let thumbnails = doc
            .elements()
            .filter(|e| matches!(e, Element::Image { width, .. } if (*width - 18.0).abs() < 1e-3))
            .count();
        assert_eq!(thumbnails, 120);
    }

    #[test]
    fn test_composition_is_deterministic() {
        let data = input(12);
        let config = ReportConfig::default();
        let a = compose(&data, &config);
        let b = compose(&data, &config);
        assert_eq!(a, b);
        assert_eq!(a.id, document_id(42).to_string());
    }

    #[test]
    fn test_document_id_is_stable_per_exam() {
        assert_eq!(document_id(42), document_id(42));
        assert_ne!(document_id(42), document_id(43));
    }

    #[test]
    fn test_charts_rendered_for_populated_statistics() {
        let data = input(6);
        // 状态分布有PASS/FIX两类；主要标记与修复各只有一类
        let kinds: Vec<ChartKind> = data.charts.iter().map(|c| c.kind).collect();
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], ChartKind::DailyBar { .. }));
        assert_eq!(kinds[2], ChartKind::WeekdayHeatmap);
    }

    #[test]
    fn test_pdf_output_with_builtin_fonts() {
        let data = input(4);
        let bytes = compose_pdf(&data, &ReportConfig::default(), &ResolvedFonts::builtin()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_pdf_output_with_embedded_system_font() {
        // 环境相关：没有可用的候选字体时跳过
        let fonts = crate::fonts::FontResolver::system(&[], Vec::new()).resolve();
        if fonts.is_builtin() {
            return;
        }
        let data = input(4);
        let config = ReportConfig::default();
        let embedded = compose_pdf(&data, &config, &fonts).unwrap();
        assert!(embedded.starts_with(b"%PDF"));

        let builtin = compose_pdf(&data, &config, &ResolvedFonts::builtin()).unwrap();
        assert!(embedded.len() > builtin.len());
    }

    #[test]
    fn test_chart_legends_are_drawn_under_donuts() {
        let data = input(6);
        let doc = compose(&data, &ReportConfig::default());
        assert_within_margins(&doc);

        let texts: Vec<&str> = doc.texts().collect();
        assert!(texts.contains(&"PASS: 3"));
        assert!(texts.contains(&"FIX: 3"));
        assert!(texts.contains(&"Распределение статусов"));
        assert!(texts.contains(&"Проверки по дням"));

        let swatches = doc
            .elements()
            .filter(|e| matches!(e, Element::Image { width, .. } if (*width - blocks::SWATCH_MM).abs() < 1e-3))
            .count();
        assert_eq!(swatches, 2);
    }

    #[test]
    fn test_long_distribution_names_are_truncated() {
        let mut data = empty_input();
        let long = "Very long device name ".repeat(20);
        data.global.total = 1;
        data.global.devices.insert(long.clone(), 1);

        let config = ReportConfig::default();
        let doc = compose(&data, &config);
        let max_chars = TextStyle::Body.chars_for_width(config.geometry.content_width());
        let line = doc
            .texts()
            .find(|t| t.starts_with("Very long device name"))
            .unwrap();
        assert!(line.chars().count() <= max_chars);
        assert!(line.ends_with('…'));
    }
}
