//! 报告页面布局模型
//!
//! 坐标单位为毫米，原点在页面左上角，`y` 向下增长。绘制任何可变高度内容之前先用
//! [`Layout::ensure_space`] 检查剩余空间，不足则换页，保证所有元素都落在页边距之内。

use image::RgbImage;
use std::sync::Arc;

const PT_TO_MM: f32 = 0.352_8;
const LEADING: f32 = 1.35;

/// 页面尺寸与边距（毫米）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    /// A4，15mm 边距
    fn default() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin: 15.0,
        }
    }
}

impl PageGeometry {
    pub fn top(&self) -> f32 {
        self.margin
    }

    pub fn bottom(&self) -> f32 {
        self.height - self.margin
    }

    pub fn left(&self) -> f32 {
        self.margin
    }

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }
}

/// 文本样式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
    Small,
}

impl TextStyle {
    /// 字号（pt）
    pub fn size(&self) -> f32 {
        match self {
            TextStyle::Title => 15.0,
            TextStyle::Heading => 11.5,
            TextStyle::Body => 9.0,
            TextStyle::Small => 7.5,
        }
    }

    pub fn bold(&self) -> bool {
        matches!(self, TextStyle::Title | TextStyle::Heading)
    }

    /// 行高（毫米）
    pub fn line_height(&self) -> f32 {
        self.size() * PT_TO_MM * LEADING
    }

    /// 给定宽度内大致可容纳的字符数
    pub fn chars_for_width(&self, width_mm: f32) -> usize {
        let avg_char_mm = self.size() * PT_TO_MM * 0.52;
        ((width_mm / avg_char_mm).floor() as usize).max(1)
    }
}

/// 嵌入报告的位图（RGB）
#[derive(Debug, Clone, PartialEq)]
pub struct Raster(Arc<RgbImage>);

impl Raster {
    pub fn new(image: RgbImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn image(&self) -> &RgbImage {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// 在 max_w × max_h 毫米内等比放置后的尺寸
    pub fn fit(&self, max_w: f32, max_h: f32) -> (f32, f32) {
        let (w, h) = (self.width().max(1) as f32, self.height().max(1) as f32);
        let scale = (max_w / w).min(max_h / h);
        (w * scale, h * scale)
    }
}

/// 页面上已定位的元素
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        style: TextStyle,
        text: String,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        raster: Raster,
    },
}

impl Element {
    pub fn top(&self) -> f32 {
        match self {
            Element::Text { y, .. } | Element::Image { y, .. } => *y,
        }
    }

    pub fn bottom(&self) -> f32 {
        match self {
            Element::Text { y, style, .. } => y + style.line_height(),
            Element::Image { y, height, .. } => y + height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub elements: Vec<Element>,
}

/// 排版完成的文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.pages.iter().flat_map(|page| page.elements.iter())
    }

    /// 文档中出现的全部文本，按绘制顺序
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements().filter_map(|element| match element {
            Element::Text { text, .. } => Some(text.as_str()),
            Element::Image { .. } => None,
        })
    }
}

/// 带垂直游标的排版器
#[derive(Debug)]
pub struct Layout {
    geometry: PageGeometry,
    pages: Vec<Page>,
    cursor: f32,
}

impl Layout {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            cursor: geometry.top(),
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn remaining(&self) -> f32 {
        self.geometry.bottom() - self.cursor
    }

    pub fn at_top(&self) -> bool {
        self.cursor <= self.geometry.top()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 另起一页，游标回到上边距
    pub fn page_break(&mut self) {
        self.pages.push(Page::default());
        self.cursor = self.geometry.top();
    }

    /// 剩余空间不足 `height` 时换页；返回是否换页
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if height > self.remaining() && !self.at_top() {
            self.page_break();
            return true;
        }
        false
    }

    /// 游标下移，最多到下边距
    pub fn advance(&mut self, dy: f32) {
        self.cursor = (self.cursor + dy).min(self.geometry.bottom());
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    /// 在当前行的指定横向偏移处放置文本，不移动游标
    pub fn place_text(&mut self, x_offset: f32, text: impl Into<String>, style: TextStyle) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        let element = Element::Text {
            x: self.geometry.left() + x_offset,
            y: self.cursor,
            style,
            text,
        };
        self.push(element);
    }

    /// 单行文本，必要时先换页
    pub fn text_line(&mut self, text: impl Into<String>, style: TextStyle) {
        self.ensure_space(style.line_height());
        self.place_text(0.0, text, style);
        self.advance(style.line_height());
    }

    /// 在当前行放置图片（不移动游标）；高度超出一整页内容区时等比缩小
    pub fn place_image(&mut self, x_offset: f32, raster: &Raster, width: f32, height: f32) {
        let max_h = self.geometry.content_height();
        let (width, height) = if height > max_h {
            (width * max_h / height, max_h)
        } else {
            (width, height)
        };
        let height = height.min(self.remaining());
        let element = Element::Image {
            x: self.geometry.left() + x_offset,
            y: self.cursor,
            width,
            height,
            raster: raster.clone(),
        };
        self.push(element);
    }

    pub fn finish(self, id: impl Into<String>, title: impl Into<String>) -> Document {
        Document {
            id: id.into(),
            title: title.into(),
            geometry: self.geometry,
            pages: self.pages,
        }
    }
}

/// 按字符数折行
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + 1;
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
