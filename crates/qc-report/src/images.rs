//! 影像存储适配
//!
//! 为QC记录取回原始/校正后影像字节。解析顺序：磁盘上的存储路径 → 结果JSON中内嵌的base64 → 缺失。
//! 影像缺失是正常情况，不会返回错误。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qc_analytics::aliases::{self, FieldAliases};
use qc_core::QcRecord;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// 影像版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageVariant {
    Original,
    Corrected,
}

impl ImageVariant {
    fn aliases(&self) -> &'static FieldAliases {
        match self {
            ImageVariant::Original => &aliases::ORIGINAL_IMAGE,
            ImageVariant::Corrected => &aliases::CORRECTED_IMAGE,
        }
    }

    fn stored_path<'a>(&self, record: &'a QcRecord) -> Option<&'a str> {
        match self {
            ImageVariant::Original => record.original_path(),
            ImageVariant::Corrected => record.corrected_path(),
        }
    }
}

/// 影像存储
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// 相对路径以 `root` 为基准
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_path(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// 取回影像字节；缺失时返回 `None`
    pub async fn fetch(&self, record: &QcRecord, variant: ImageVariant) -> Option<Vec<u8>> {
        if let Some(stored) = variant.stored_path(record) {
            let path = self.resolve_path(stored);
            match tokio::fs::read(&path).await {
                Ok(bytes) if !bytes.is_empty() => return Some(bytes),
                Ok(_) => tracing::debug!("Stored image {} is empty", path.display()),
                Err(e) => tracing::debug!("Stored image {} unavailable: {}", path.display(), e),
            }
        }

        let inline = inline_image(record.ml_results_json.as_deref(), variant);
        if inline.is_none() {
            tracing::debug!("QC record {} has no {:?} image", record.id, variant);
        }
        inline
    }

    /// 历史表缩略图：优先校正后影像，其次原始影像
    pub async fn fetch_preferred(&self, record: &QcRecord) -> Option<Vec<u8>> {
        match self.fetch(record, ImageVariant::Corrected).await {
            Some(bytes) => Some(bytes),
            None => self.fetch(record, ImageVariant::Original).await,
        }
    }
}

/// 从结果JSON的别名键中解码内嵌影像
pub fn inline_image(payload: Option<&str>, variant: ImageVariant) -> Option<Vec<u8>> {
    let value: Value = serde_json::from_str(payload?).ok()?;
    let encoded = aliases::lookup(value.as_object()?, variant.aliases())?.as_str()?;
    decode_base64(encoded)
}

fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    // 兼容 data:image/png;base64,... 形式
    let body = match encoded.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => encoded,
    };
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::debug!("Inline image is not valid base64: {}", e);
            None
        }
    }
}
