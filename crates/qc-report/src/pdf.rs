//! 将排版好的 [`Document`] 写成PDF

use crate::fonts::{FontFace, ResolvedFonts};
use crate::layout::{Document, Element, Raster};
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use qc_core::{QcError, Result};
use std::io::BufWriter;

/// 基线相对行顶的位置（按行高比例）
const BASELINE: f32 = 0.75;

fn render_err(e: impl std::fmt::Display) -> QcError {
    QcError::Render(e.to_string())
}

fn load_font(doc: &PdfDocumentReference, face: &FontFace) -> Result<IndirectFontRef> {
    match face {
        FontFace::External { data, .. } => doc.add_external_font(data.as_slice()).map_err(render_err),
        FontFace::Builtin { bold: false } => doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err),
        FontFace::Builtin { bold: true } => doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_err),
    }
}

/// 生成PDF字节
pub fn write(document: &Document, fonts: &ResolvedFonts) -> Result<Vec<u8>> {
    let g = document.geometry;
    let (doc, first_page, first_layer) =
        PdfDocument::new(document.title.as_str(), Mm(g.width), Mm(g.height), "Layer 1");
    let doc = doc.with_document_id(document.id.clone());

    let body = load_font(&doc, &fonts.body)?;
    let bold = if fonts.bold == fonts.body {
        body.clone()
    } else {
        load_font(&doc, &fonts.bold)?
    };

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(g.width), Mm(g.height), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        for element in &page.elements {
            match element {
                Element::Text { x, y, style, text } => {
                    let font = if style.bold() { &bold } else { &body };
                    let baseline = y + style.line_height() * BASELINE;
                    layer.use_text(text.as_str(), style.size(), Mm(*x), Mm(g.height - baseline), font);
                }
                Element::Image {
                    x,
                    y,
                    width,
                    height,
                    raster,
                } => place_image(&layer, raster, *x, g.height - y - height, *width, *height),
            }
        }
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer).map_err(render_err)?;
    let bytes = writer.into_inner().map_err(render_err)?;
    tracing::debug!(
        "Wrote PDF {} ({} pages, {} bytes)",
        document.id,
        document.page_count(),
        bytes.len()
    );
    Ok(bytes)
}

/// `bottom` 为PDF坐标系（原点左下）中的图片下边缘
fn place_image(layer: &PdfLayerReference, raster: &Raster, x: f32, bottom: f32, width: f32, height: f32) {
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    let (px_w, px_h) = (raster.width() as f32, raster.height() as f32);
    let dpi = px_w * 25.4 / width;
    let natural_height = px_h * 25.4 / dpi;

    let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(raster.image().clone()));
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(bottom)),
            dpi: Some(dpi),
            scale_y: Some(height / natural_height),
            ..Default::default()
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Layout, PageGeometry, TextStyle};
    use image::RgbImage;

    #[test]
    fn test_multi_page_document_writes_pdf() {
        let mut layout = Layout::new(PageGeometry::default());
        for i in 0..150 {
            layout.text_line(format!("row {i}"), TextStyle::Body);
        }
        let raster = Raster::new(RgbImage::from_pixel(20, 10, image::Rgb([200, 10, 10])));
        layout.place_image(0.0, &raster, 40.0, 20.0);
        let document = layout.finish("test-doc", "Test");

        let bytes = write(&document, &ResolvedFonts::builtin()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 1000);
    }
}
