//! 统计图表渲染
//!
//! 把 [`Statistics`] 绘制为PNG：按天柱状图、分类环形图、星期×小时热力图。
//! 数据为空、全零或只有一个类别时返回 `None`，调用方跳过该图继续组装报告。
//! 位图中不绘制文字，图例与日期范围随 [`ChartImage`] 返回，由排版层以文本输出。

use chrono::NaiveDate;
use qc_analytics::{Category, Statistics};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

/// 图表种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// 最近 `days` 个自然日的记录数
    DailyBar { days: usize },
    /// 数量最多的 `top_k` 个类别的占比
    Distribution { category: Category, top_k: usize },
    /// 星期（行）× 小时（列）
    WeekdayHeatmap,
}

impl ChartKind {
    /// 未缩放时的像素尺寸
    fn native_size(&self) -> (u32, u32) {
        match self {
            ChartKind::DailyBar { .. } => (800, 400),
            ChartKind::Distribution { .. } => (400, 400),
            ChartKind::WeekdayHeatmap => (960, 300),
        }
    }
}

/// 调用方允许的最大像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSize {
    pub max_width: u32,
    pub max_height: u32,
}

impl ChartSize {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

/// 环形图的一个扇区
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub name: String,
    pub count: usize,
    pub color: (u8, u8, u8),
}

/// 渲染好的图表
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub kind: ChartKind,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 环形图各扇区，顺序与配色同绘制一致；其他图表为空
    pub legend: Vec<LegendEntry>,
    /// 柱状图覆盖的首末日期
    pub span: Option<(NaiveDate, NaiveDate)>,
}

const BACKGROUND: (u8, u8, u8) = (255, 255, 255);
const AXIS: (u8, u8, u8) = (120, 120, 120);
const BAR: (u8, u8, u8) = (37, 99, 235);
const HEAT: (u8, u8, u8) = (220, 38, 38);

const HEATMAP_LEFT: f32 = 20.0;
const HEATMAP_TOP: f32 = 20.0;
const HEATMAP_CELL: f32 = 38.0;

/// 环形图的类别配色，依次使用
const PALETTE: &[(u8, u8, u8)] = &[
    (34, 197, 94),
    (234, 179, 8),
    (239, 68, 68),
    (59, 130, 246),
    (168, 85, 247),
    (20, 184, 166),
    (249, 115, 22),
    (100, 116, 139),
];

/// 渲染图表；无法渲染时返回 `None`
pub fn render(stats: &Statistics, kind: &ChartKind, size: ChartSize) -> Option<ChartImage> {
    let (native_w, native_h) = kind.native_size();
    let scale = fit_scale(native_w, native_h, size);
    if scale <= 0.0 {
        tracing::debug!("Chart {:?} skipped: zero target size", kind);
        return None;
    }
    let width = ((native_w as f32 * scale).round() as u32).max(1);
    let height = ((native_h as f32 * scale).round() as u32).max(1);

    let mut pixmap = Pixmap::new(width, height)?;
    pixmap.fill(rgb(BACKGROUND));
    let transform = Transform::from_scale(scale, scale);

    let drawn = match kind {
        ChartKind::DailyBar { days } => draw_daily_bars(&mut pixmap, stats, *days, transform),
        ChartKind::Distribution { category, top_k } => {
            draw_donut(&mut pixmap, stats, *category, *top_k, transform)
        }
        ChartKind::WeekdayHeatmap => draw_heatmap(&mut pixmap, stats, transform),
    };
    if drawn.is_none() {
        tracing::debug!("Chart {:?} skipped: no drawable data", kind);
        return None;
    }

    let (legend, span) = match kind {
        ChartKind::Distribution { category, top_k } => (legend(stats, *category, *top_k), None),
        ChartKind::DailyBar { days } => (Vec::new(), daily_span(stats, *days)),
        ChartKind::WeekdayHeatmap => (Vec::new(), None),
    };

    match pixmap.encode_png() {
        Ok(png) => Some(ChartImage {
            kind: *kind,
            png,
            width,
            height,
            legend,
            span,
        }),
        Err(e) => {
            tracing::warn!("Chart {:?} PNG encoding failed: {}", kind, e);
            None
        }
    }
}

/// 等比缩放到目标尺寸内，不放大
fn fit_scale(native_w: u32, native_h: u32, size: ChartSize) -> f32 {
    let sx = size.max_width as f32 / native_w as f32;
    let sy = size.max_height as f32 / native_h as f32;
    sx.min(sy).min(1.0)
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::from_rgba8(r, g, b, 255)
}

fn paint((r, g, b): (u8, u8, u8), alpha: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, alpha);
    paint.anti_alias = true;
    paint
}

fn fill_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, paint: &Paint, ts: Transform) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        pixmap.fill_rect(rect, paint, ts, None);
    }
}

/// 柱状图的首末日期：以最后一个有记录的日期为终点，连续 `days` 天
fn daily_span(stats: &Statistics, days: usize) -> Option<(NaiveDate, NaiveDate)> {
    let (last_day, _) = stats.daily_counts.iter().next_back()?;
    if days == 0 {
        return None;
    }
    Some((*last_day - chrono::Duration::days(days as i64 - 1), *last_day))
}

/// 环形图扇区：数量最多的 `top_k` 个类别，按调色板顺序配色
fn legend(stats: &Statistics, category: Category, top_k: usize) -> Vec<LegendEntry> {
    stats
        .top(category, top_k)
        .into_iter()
        .enumerate()
        .map(|(i, (name, count))| LegendEntry {
            name,
            count,
            color: PALETTE[i % PALETTE.len()],
        })
        .collect()
}

fn draw_daily_bars(pixmap: &mut Pixmap, stats: &Statistics, days: usize, ts: Transform) -> Option<()> {
    let (first_day, _) = daily_span(stats, days)?;

    // 缺失日期计0
    let buckets: Vec<usize> = (0..days)
        .map(|offset| {
            let day = first_day + chrono::Duration::days(offset as i64);
            stats.daily_counts.get(&day).copied().unwrap_or(0)
        })
        .collect();
    let max = *buckets.iter().max()?;
    if max == 0 {
        return None;
    }

    let (left, top, right, bottom) = (40.0, 20.0, 780.0, 370.0);
    let slot = (right - left) / days as f32;
    let bar_paint = paint(BAR, 255);
    for (i, count) in buckets.iter().enumerate() {
        let h = (bottom - top) * (*count as f32 / max as f32);
        if h > 0.0 {
            fill_rect(pixmap, left + slot * i as f32 + slot * 0.15, bottom - h, slot * 0.7, h, &bar_paint, ts);
        }
    }

    let axis = paint(AXIS, 255);
    fill_rect(pixmap, left, bottom, right - left, 2.0, &axis, ts);
    fill_rect(pixmap, left - 2.0, top, 2.0, bottom - top, &axis, ts);
    Some(())
}

fn draw_donut(
    pixmap: &mut Pixmap,
    stats: &Statistics,
    category: Category,
    top_k: usize,
    ts: Transform,
) -> Option<()> {
    let slices = legend(stats, category, top_k);
    if slices.len() < 2 {
        return None;
    }
    let total: usize = slices.iter().map(|slice| slice.count).sum();

    let (cx, cy, outer, inner) = (200.0_f32, 200.0_f32, 180.0_f32, 95.0_f32);
    let mut start = -std::f32::consts::FRAC_PI_2;
    for slice in &slices {
        let sweep = std::f32::consts::TAU * (slice.count as f32 / total as f32);
        if let Some(path) = ring_segment(cx, cy, outer, inner, start, sweep) {
            let p = paint(slice.color, 255);
            pixmap.fill_path(&path, &p, FillRule::Winding, ts, None);
        }
        start += sweep;
    }
    Some(())
}

/// 以折线近似的环形扇区
fn ring_segment(cx: f32, cy: f32, outer: f32, inner: f32, start: f32, sweep: f32) -> Option<tiny_skia::Path> {
    let steps = ((sweep / std::f32::consts::TAU) * 120.0).ceil().max(2.0) as usize;
    let mut pb = PathBuilder::new();
    for i in 0..=steps {
        let a = start + sweep * i as f32 / steps as f32;
        let (x, y) = (cx + outer * a.cos(), cy + outer * a.sin());
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }
    for i in (0..=steps).rev() {
        let a = start + sweep * i as f32 / steps as f32;
        pb.line_to(cx + inner * a.cos(), cy + inner * a.sin());
    }
    pb.close();
    pb.finish()
}

fn draw_heatmap(pixmap: &mut Pixmap, stats: &Statistics, ts: Transform) -> Option<()> {
    let max = stats.weekday_hour.iter().flatten().copied().max()?;
    if max == 0 {
        return None;
    }

    let (left, top, cell) = (HEATMAP_LEFT, HEATMAP_TOP, HEATMAP_CELL);
    let empty = paint((241, 245, 249), 255);
    for (day, hours) in stats.weekday_hour.iter().enumerate() {
        for (hour, count) in hours.iter().enumerate() {
            let x = left + hour as f32 * cell;
            let y = top + day as f32 * cell;
            let p = if *count == 0 {
                empty.clone()
            } else {
                let alpha = 60.0 + 195.0 * (*count as f32 / max as f32);
                paint(HEAT, alpha.round() as u8)
            };
            fill_rect(pixmap, x + 1.0, y + 1.0, cell - 2.0, cell - 2.0, &p, ts);
        }
    }
    Some(())
}
