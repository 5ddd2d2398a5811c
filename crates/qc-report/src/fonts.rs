//! 报告字体选择
//!
//! 报告同时包含拉丁字母、俄语和哈萨克语西里尔字母，PDF内置的Helvetica无法绘制后两者。
//! [`FontResolver`] 按候选字体族顺序查找常规体与粗体，找不到时退回内置字体（非致命降级）。
//! 解析结果作为值向下传递，不存在进程级的字体注册状态。

use fontdb::{Database, Family, Query, Style, Weight};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// 已知覆盖俄语与哈萨克语字母的字体族
pub const DEFAULT_FONT_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Noto Sans",
    "PT Sans",
    "Liberation Sans",
    "FreeSans",
    "Arial",
];

const BOLD_MIN_WEIGHT: u16 = 600;

/// 一个可用于绘制文本的字体
#[derive(Clone, PartialEq)]
pub enum FontFace {
    /// 从系统或配置目录加载的TrueType/OpenType字体
    External {
        family: String,
        weight: u16,
        data: Arc<Vec<u8>>,
    },
    /// PDF内置字体（Helvetica / Helvetica-Bold），不含西里尔字形
    Builtin { bold: bool },
}

impl FontFace {
    pub fn family(&self) -> &str {
        match self {
            FontFace::External { family, .. } => family,
            FontFace::Builtin { bold: false } => "Helvetica",
            FontFace::Builtin { bold: true } => "Helvetica-Bold",
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, FontFace::Builtin { .. })
    }
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontFace::External { family, weight, data } => f
                .debug_struct("External")
                .field("family", family)
                .field("weight", weight)
                .field("bytes", &data.len())
                .finish(),
            FontFace::Builtin { bold } => f.debug_struct("Builtin").field("bold", bold).finish(),
        }
    }
}

/// 正文与粗体字体
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFonts {
    pub body: FontFace,
    pub bold: FontFace,
}

impl ResolvedFonts {
    pub fn builtin() -> Self {
        Self {
            body: FontFace::Builtin { bold: false },
            bold: FontFace::Builtin { bold: true },
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.body.is_builtin()
    }
}

/// 字体解析器
#[derive(Clone)]
pub struct FontResolver {
    db: Arc<Database>,
    candidates: Vec<String>,
}

impl fmt::Debug for FontResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontResolver")
            .field("faces", &self.db.len())
            .field("candidates", &self.candidates)
            .finish()
    }
}

impl FontResolver {
    /// 使用给定字体库与候选族列表；候选为空时使用默认列表
    pub fn new(db: Database, candidates: Vec<String>) -> Self {
        let candidates = if candidates.is_empty() {
            DEFAULT_FONT_FAMILIES.iter().map(|f| f.to_string()).collect()
        } else {
            candidates
        };
        Self {
            db: Arc::new(db),
            candidates,
        }
    }

    /// 加载系统字体及额外字体目录
    pub fn system(font_dirs: &[PathBuf], candidates: Vec<String>) -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        for dir in font_dirs {
            db.load_fonts_dir(dir);
        }
        tracing::info!("Font database loaded with {} faces", db.len());
        Self::new(db, candidates)
    }

    /// 不加载任何字体，总是解析为内置字体
    pub fn builtin_only() -> Self {
        Self::new(Database::new(), Vec::new())
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// 返回第一个常规体与粗体齐全的组合；都不齐全时取第一个有常规体的族，粗体复用常规体
    pub fn resolve(&self) -> ResolvedFonts {
        for family in &self.candidates {
            if let (Some(body), Some(bold)) = (self.load_face(family, false), self.load_face(family, true)) {
                tracing::debug!("Resolved report font family {}", family);
                return ResolvedFonts { body, bold };
            }
        }

        for family in &self.candidates {
            if let Some(body) = self.load_face(family, false) {
                tracing::debug!("Font family {} has no bold face, reusing regular", family);
                return ResolvedFonts {
                    bold: body.clone(),
                    body,
                };
            }
        }

        tracing::warn!(
            "None of the font families {:?} is available; falling back to built-in Helvetica, Cyrillic text may not render",
            self.candidates
        );
        ResolvedFonts::builtin()
    }

    fn load_face(&self, family: &str, bold: bool) -> Option<FontFace> {
        let families = [Family::Name(family)];
        let query = Query {
            families: &families,
            weight: if bold { Weight::BOLD } else { Weight::NORMAL },
            style: Style::Normal,
            ..Query::default()
        };
        let id = self.db.query(&query)?;
        let info = self.db.face(id)?;

        let weight = info.weight.0;
        if bold != (weight >= BOLD_MIN_WEIGHT) {
            return None;
        }

        // 字体集合中非首个字形表无法直接嵌入PDF
        let data = self
            .db
            .with_face_data(id, |data, index| (index == 0).then(|| data.to_vec()))
            .flatten()?;

        Some(FontFace::External {
            family: family.to_string(),
            weight,
            data: Arc::new(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_database_falls_back_to_builtin() {
        let fonts = FontResolver::builtin_only().resolve();
        assert_eq!(fonts, ResolvedFonts::builtin());
        assert!(fonts.is_builtin());
        assert_eq!(fonts.bold.family(), "Helvetica-Bold");
    }

    #[test]
    fn test_unknown_candidates_fall_back_to_builtin() {
        let resolver = FontResolver::new(Database::new(), vec!["No Such Family".to_string()]);
        assert_eq!(resolver.candidates(), ["No Such Family".to_string()]);
        assert!(resolver.resolve().is_builtin());
    }

    #[test]
    fn test_default_candidates() {
        let resolver = FontResolver::new(Database::new(), Vec::new());
        assert_eq!(resolver.candidates().len(), DEFAULT_FONT_FAMILIES.len());
        assert_eq!(resolver.candidates()[0], "DejaVu Sans");
    }

    fn first_family(face: &fontdb::FaceInfo) -> Option<String> {
        face.families.first().map(|(name, _)| name.clone())
    }

    fn is_regular(face: &fontdb::FaceInfo) -> bool {
        face.index == 0 && face.style == Style::Normal && face.weight.0 < BOLD_MIN_WEIGHT
    }

    fn is_bold(face: &fontdb::FaceInfo) -> bool {
        face.index == 0 && face.style == Style::Normal && face.weight.0 >= BOLD_MIN_WEIGHT
    }

    fn copy_face(from: &Database, face: &fontdb::FaceInfo, to: &mut Database) {
        if let Some(data) = from.with_face_data(face.id, |data, _| data.to_vec()) {
            to.load_font_data(data);
        }
    }

    #[test]
    fn test_complete_pair_wins_over_earlier_regular_only_family() {
        // 环境相关：需要一个常规体+粗体齐全的族和另一个有常规体的族，否则跳过
        let mut system = Database::new();
        system.load_system_fonts();

        let Some(paired) = system.faces().filter(|f| is_bold(f)).filter_map(first_family).find(|name| {
            system
                .faces()
                .any(|f| is_regular(f) && first_family(f).as_deref() == Some(name.as_str()))
        }) else {
            return;
        };
        let Some(single) = system
            .faces()
            .find(|f| is_regular(f) && first_family(f).is_some_and(|name| name != paired))
        else {
            return;
        };
        let single_name = first_family(single).unwrap_or_default();

        let build = || {
            let mut db = Database::new();
            copy_face(&system, single, &mut db);
            for face in system.faces() {
                if first_family(face).as_deref() == Some(paired.as_str()) && (is_regular(face) || is_bold(face)) {
                    copy_face(&system, face, &mut db);
                }
            }
            db
        };

        let only_single = FontResolver::new(build(), vec![single_name.clone()]);
        if only_single.load_face(&single_name, true).is_some() {
            // 该文件本身带粗体，构造不出“只有常规体”的族
            return;
        }
        let fonts = only_single.resolve();
        assert_eq!(fonts.body.family(), single_name);
        assert_eq!(fonts.bold, fonts.body);

        let fonts = FontResolver::new(build(), vec![single_name, paired.clone()]).resolve();
        assert_eq!(fonts.body.family(), paired);
        match &fonts.bold {
            FontFace::External { family, weight, .. } => {
                assert_eq!(family, &paired);
                assert!(*weight >= BOLD_MIN_WEIGHT);
            }
            other => panic!("expected external bold face, got {:?}", other),
        }
    }

    #[test]
    fn test_system_resolution_yields_regular_and_bold() {
        // 环境相关：有无系统字体都必须得到一对可用字体
        let fonts = FontResolver::system(&[], Vec::new()).resolve();
        match (&fonts.body, &fonts.bold) {
            (FontFace::External { family: a, .. }, FontFace::External { family: b, .. }) => {
                assert_eq!(a, b)
            }
            (FontFace::Builtin { bold: false }, FontFace::Builtin { bold: true }) => {}
            other => panic!("mixed font pair {:?}", other),
        }
    }
}
