//! 报告内容块
//!
//! 每个生产函数独立地从 [`ReportInput`] 生成一个块；返回 `None` 表示该块没有可展示的内容，
//! 排版时直接跳过，不影响其他块。

use crate::charts::{ChartImage, ChartKind};
use crate::compositor::{ReportConfig, ReportInput};
use crate::i18n::{Label, LocalePair};
use crate::layout::{Raster, TextStyle};
use chrono::{DateTime, Utc};
use image::{GenericImageView, Rgb, RgbImage};
use qc_analytics::{Category, MlResult, Statistics};
use qc_core::utils::truncate_chars;
use qc_core::{Exam, Patient};

const HEADING_GAP: f32 = 1.5;
const ROW_GAP: f32 = 1.0;
const FIGURE_GAP: f32 = 2.0;
const COLUMN_GAP: f32 = 4.0;
/// 图例色块边长（毫米）
pub(crate) const SWATCH_MM: f32 = 2.4;

/// 块类型，用于日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Header,
    Patient,
    Exam,
    Activity,
    Distribution(Category),
    Charts,
    Corrections,
    History,
    Footer,
}

/// 块中的一行
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Title(String),
    Heading(String),
    /// 整行文本
    Line(String),
    /// 左栏主语言、右栏副语言
    Pair { left: String, right: String },
    History(HistoryRow),
    /// 并排的若干图片
    Figures(Vec<Figure>),
}

/// 已确定尺寸（毫米）的图片，下方依次是标题行和图例行
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub raster: Raster,
    pub width: f32,
    pub height: f32,
    pub caption: Vec<String>,
    pub legend: Vec<LegendItem>,
}

impl Figure {
    /// 图片下方的文本行数
    pub fn text_lines(&self) -> usize {
        self.caption.len() + self.legend.len()
    }
}

/// 图例的一行：色块与 “类别: 数量”
#[derive(Debug, Clone, PartialEq)]
pub struct LegendItem {
    pub swatch: Raster,
    pub text: String,
}

/// 历史表的一行
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: String,
    pub author: String,
    pub status: String,
    pub probs: String,
    pub thumbnail: Option<Figure>,
}

/// 历史表各列的横向偏移（毫米）
pub(crate) const HISTORY_COLUMNS: [f32; 4] = [0.0, 30.0, 72.0, 90.0];

impl Row {
    /// 该行在页面上占用的最大高度
    pub fn height(&self) -> f32 {
        match self {
            Row::Title(_) => TextStyle::Title.line_height(),
            Row::Heading(_) => TextStyle::Heading.line_height() + HEADING_GAP,
            Row::Line(_) | Row::Pair { .. } => TextStyle::Body.line_height(),
            Row::History(row) => {
                let thumb = row.thumbnail.as_ref().map_or(0.0, |f| f.height);
                TextStyle::Small.line_height().max(thumb) + ROW_GAP
            }
            Row::Figures(figures) => {
                let image = figures.iter().map(|f| f.height).fold(0.0, f32::max);
                let lines = figures.iter().map(Figure::text_lines).max().unwrap_or(0);
                image + lines as f32 * TextStyle::Small.line_height() + FIGURE_GAP
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub rows: Vec<Row>,
}

impl Block {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Row) -> &mut Self {
        self.rows.push(row);
        self
    }

    fn heading(&mut self, locales: &LocalePair, label: Label) -> &mut Self {
        self.push(Row::Heading(locales.heading(label)))
    }

    /// “标签: 值”，两种语言共用同一个值
    fn field(&mut self, locales: &LocalePair, label: Label, value: &str) -> &mut Self {
        let (left, right) = locales.label(label);
        self.push(Row::Pair {
            left: format!("{left}: {value}"),
            right: format!("{right}: {value}"),
        })
    }

    /// 值本身也需要翻译的字段
    fn translated_field(&mut self, locales: &LocalePair, label: Label, value: Label) -> &mut Self {
        let (left, right) = locales.label(label);
        let (v_left, v_right) = locales.label(value);
        self.push(Row::Pair {
            left: format!("{left}: {v_left}"),
            right: format!("{right}: {v_right}"),
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// 解码影像并限制最大像素边长；无法解码时返回 `None`
pub fn decode_raster(bytes: &[u8], max_px: u32) -> Option<Raster> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image,
        Err(e) => {
            tracing::debug!("Skipping undecodable image ({} bytes): {}", bytes.len(), e);
            return None;
        }
    };
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let image = if w > max_px || h > max_px {
        image.thumbnail(max_px, max_px)
    } else {
        image
    };
    // PDF中不嵌入透明通道
    Some(Raster::new(image.to_rgb8()))
}

fn figure(bytes: &[u8], max_px: u32, max_w: f32, max_h: f32, caption: Vec<String>) -> Option<Figure> {
    let raster = decode_raster(bytes, max_px)?;
    let (width, height) = raster.fit(max_w, max_h);
    Some(Figure {
        raster,
        width,
        height,
        caption,
        legend: Vec::new(),
    })
}

/// 纯色图例块
fn swatch((r, g, b): (u8, u8, u8)) -> Raster {
    Raster::new(RgbImage::from_pixel(4, 4, Rgb([r, g, b])))
}

/// 主语言与副语言各占一行，相同时只保留一行
fn caption_lines(locales: &LocalePair, label: Label) -> Vec<String> {
    let (primary, secondary) = locales.label(label);
    let mut lines = vec![primary.to_string()];
    if secondary != primary {
        lines.push(secondary.to_string());
    }
    lines
}

fn category_label(category: Category) -> Option<Label> {
    DISTRIBUTIONS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, label)| *label)
}

/// 图表标题：种类名称（双语），柱状图另附日期范围
fn chart_caption(chart: &ChartImage, locales: &LocalePair) -> Vec<String> {
    let label = match chart.kind {
        ChartKind::DailyBar { .. } => Label::DailyActivity,
        ChartKind::Distribution { category, .. } => category_label(category).unwrap_or(Label::ChartsSection),
        ChartKind::WeekdayHeatmap => Label::WeekdayHourActivity,
    };
    let mut lines = caption_lines(locales, label);
    if let Some((first, last)) = chart.span {
        lines.push(format!("{} - {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")));
    }
    lines
}

pub fn header_block(input: &ReportInput, config: &ReportConfig) -> Option<Block> {
    let locales = &config.locales;
    let (primary, secondary) = locales.label(Label::ReportTitle);
    let mut block = Block::new(BlockKind::Header);
    block.push(Row::Title(primary.to_string()));
    if secondary != primary {
        block.push(Row::Title(secondary.to_string()));
    }
    block.field(locales, Label::GeneratedAt, &format_timestamp(&input.generated_at));
    Some(block)
}

/// 找不到患者时跳过
pub fn patient_block(patient: Option<&Patient>, config: &ReportConfig) -> Option<Block> {
    let patient = patient?;
    let locales = &config.locales;
    let mut block = Block::new(BlockKind::Patient);
    block
        .heading(locales, Label::PatientSection)
        .field(locales, Label::PatientCode, &patient.patient_code)
        .field(locales, Label::FullName, &patient.full_name())
        .field(locales, Label::BirthDate, &patient.birth_date.format("%Y-%m-%d").to_string())
        .translated_field(locales, Label::PatientSex, Label::for_sex(patient.sex));
    Some(block)
}

pub fn exam_block(exam: &Exam, config: &ReportConfig) -> Option<Block> {
    let locales = &config.locales;
    let mut block = Block::new(BlockKind::Exam);
    block
        .heading(locales, Label::ExamSection)
        .field(locales, Label::Accession, &exam.accession_number)
        .field(locales, Label::ExamDate, &format_timestamp(&exam.exam_date))
        .field(locales, Label::Modality, &exam.modality)
        .field(locales, Label::ViewType, &exam.view_type)
        .field(locales, Label::Device, &exam.device)
        .field(locales, Label::Technician, &exam.technician);

    if let Some(notes) = exam.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let (left, right) = locales.label(Label::Notes);
        block.push(Row::Pair {
            left: format!("{left}:"),
            right: format!("{right}:"),
        });
        let width = config.geometry.content_width();
        for line in crate::layout::wrap_text(notes, TextStyle::Body.chars_for_width(width)) {
            block.push(Row::Line(line));
        }
    }
    Some(block)
}

pub fn activity_block(stats: &Statistics, config: &ReportConfig) -> Option<Block> {
    let locales = &config.locales;
    let mut block = Block::new(BlockKind::Activity);
    block
        .heading(locales, Label::ActivitySection)
        .field(locales, Label::TotalRecords, &stats.total.to_string())
        .field(locales, Label::ExamsCovered, &stats.exams.to_string())
        .field(locales, Label::PatientsCovered, &stats.patients.to_string())
        .field(locales, Label::ActiveDays, &stats.active_days().to_string());

    match (&stats.first_at, &stats.last_at) {
        (Some(first), Some(last)) => {
            let period = format!("{} - {}", format_timestamp(first), format_timestamp(last));
            block.field(locales, Label::Period, &period);
        }
        _ => {
            block.translated_field(locales, Label::Period, Label::NotAvailable);
        }
    }
    Some(block)
}

const DISTRIBUTIONS: [(Category, Label); 6] = [
    (Category::Status, Label::StatusDistribution),
    (Category::MajorFlag, Label::MajorFlags),
    (Category::CriticalFlag, Label::CriticalFlags),
    (Category::AppliedFix, Label::AppliedFixes),
    (Category::SevereFlag, Label::SevereFlags),
    (Category::Device, Label::Devices),
];

/// 分布列表，按数量降序，最多 `list_limit` 行；空分布跳过
pub fn distribution_block(stats: &Statistics, category: Category, config: &ReportConfig) -> Option<Block> {
    let rows = stats.top(category, config.list_limit);
    if rows.is_empty() {
        return None;
    }
    let label = category_label(category)?;

    let mut block = Block::new(BlockKind::Distribution(category));
    block.heading(&config.locales, label);
    for (name, count) in rows {
        block.push(Row::Line(format!(
            "{name}: {count} ({:.1}%)",
            stats.percent_of_total(count)
        )));
    }
    Some(block)
}

pub fn distribution_blocks(stats: &Statistics, config: &ReportConfig) -> Vec<(BlockKind, Option<Block>)> {
    DISTRIBUTIONS
        .iter()
        .map(|(category, _)| {
            (
                BlockKind::Distribution(*category),
                distribution_block(stats, *category, config),
            )
        })
        .collect()
}

/// 图表两两并排，各自带标题，环形图另附图例；没有可解码的图表时跳过
pub fn charts_block(input: &ReportInput, config: &ReportConfig) -> Option<Block> {
    let half = (config.geometry.content_width() - COLUMN_GAP) / 2.0;
    let figures: Vec<Figure> = input
        .charts
        .iter()
        .filter_map(|chart| {
            let caption = chart_caption(chart, &config.locales);
            let mut figure = figure(&chart.png, u32::MAX, half, config.chart_height_mm, caption)?;
            figure.legend = chart
                .legend
                .iter()
                .map(|entry| LegendItem {
                    swatch: swatch(entry.color),
                    text: format!("{}: {}", entry.name, entry.count),
                })
                .collect();
            Some(figure)
        })
        .collect();
    if figures.is_empty() {
        return None;
    }

    let mut block = Block::new(BlockKind::Charts);
    block.heading(&config.locales, Label::ChartsSection);
    for pair in figures.chunks(2) {
        block.push(Row::Figures(pair.to_vec()));
    }
    Some(block)
}

fn comparison_row(stats: &Statistics, locales: &LocalePair) -> Option<Row> {
    let (before, after) = stats.comparison.both()?;
    let metric = &stats.comparison.metric;
    let (left, right) = locales.label(Label::BeforeAfter);
    let value = format!("{metric} {before:.3} → {after:.3}");
    Some(Row::Pair {
        left: format!("{left}: {value}"),
        right: format!("{right}: {value}"),
    })
}

/// 全局与本检查的校正占比；前后对比只在两个平均值都存在时输出
pub fn corrections_block(input: &ReportInput, config: &ReportConfig) -> Option<Block> {
    let locales = &config.locales;
    let mut block = Block::new(BlockKind::Corrections);
    block.heading(locales, Label::CorrectionsSection);

    for (stats, label) in [
        (&input.global, Label::CorrectedGlobal),
        (&input.exam_stats, Label::CorrectedExam),
    ] {
        let value = format!(
            "{:.1}% ({}/{})",
            stats.corrected_percent(),
            stats.corrected,
            stats.total
        );
        block.field(locales, label, &value);
        if let Some(row) = comparison_row(stats, locales) {
            block.push(row);
        }
    }
    Some(block)
}

/// 历史表：时间、作者、状态、前几项概率和可选缩略图
pub fn history_block(input: &ReportInput, config: &ReportConfig) -> Option<Block> {
    let locales = &config.locales;
    let mut block = Block::new(BlockKind::History);
    block.heading(locales, Label::HistorySection);

    if input.history.is_empty() {
        block.push(Row::Line(locales.heading(Label::NoRecords)));
        return Some(block);
    }

    let thumb = config.thumbnail_mm;
    let style = TextStyle::Small;
    let width = config.geometry.content_width();
    let probs_width = width - HISTORY_COLUMNS[3] - thumb - COLUMN_GAP;

    for entry in &input.history {
        let result = MlResult::parse(entry.record.ml_results_json.as_deref());
        let probs = result
            .top_probs(config.history_probs)
            .iter()
            .map(|(name, p)| format!("{name} {p:.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        let author_width = HISTORY_COLUMNS[2] - HISTORY_COLUMNS[1] - 2.0;

        let thumbnail = entry
            .thumbnail
            .as_deref()
            .and_then(|bytes| figure(bytes, config.thumbnail_px, thumb, thumb, Vec::new()));

        block.push(Row::History(HistoryRow {
            timestamp: format_timestamp(&entry.record.created_at),
            author: truncate_chars(&entry.record.author_label(), style.chars_for_width(author_width)),
            status: result.status.to_string(),
            probs: truncate_chars(&probs, style.chars_for_width(probs_width)),
            thumbnail,
        }));
    }
    Some(block)
}

/// 末尾的识别信息与最新的原始/校正影像并排
pub fn footer_block(input: &ReportInput, config: &ReportConfig) -> Option<Block> {
    let locales = &config.locales;
    let mut block = Block::new(BlockKind::Footer);
    block.heading(locales, Label::Identification);
    if let Some(patient) = &input.patient {
        block.field(locales, Label::PatientCode, &patient.patient_code);
    }
    block.field(locales, Label::Accession, &input.exam.accession_number);

    let half = (config.geometry.content_width() - COLUMN_GAP) / 2.0;
    let figures: Vec<Figure> = [
        (input.latest_original.as_deref(), Label::OriginalImage),
        (input.latest_corrected.as_deref(), Label::CorrectedImage),
    ]
    .into_iter()
    .filter_map(|(bytes, label)| {
        figure(
            bytes?,
            config.footer_image_px,
            half,
            config.footer_image_mm,
            vec![locales.heading(label)],
        )
    })
    .collect();
    if !figures.is_empty() {
        block.push(Row::Figures(figures));
    }
    Some(block)
}
