//! Page rasterization for the VLM fallback (§4.4 step 3), adapted from
//! the pack's `pdfium-render`-based page renderer.

use std::path::Path;

use pdfium_render::prelude::*;

use crate::error::{PdfError, Result};

fn bind_pdfium(library_path: Option<&str>) -> Result<Pdfium> {
    let bindings = match library_path {
        Some(path) => Pdfium::bind_to_library(path).map_err(|e| PdfError::PdfiumLoad(e.to_string()))?,
        None => Pdfium::bind_to_system_library().map_err(|e| PdfError::PdfiumLoad(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Renders one 1-based page of `path` at `dpi` to PNG bytes. `library_path`
/// pins an explicit Pdfium dynamic library; `None` falls back to the
/// system search paths.
pub fn render_page_png(path: &Path, page_number: u32, dpi: u16, library_path: Option<&str>) -> Result<Vec<u8>> {
    let pdfium = bind_pdfium(library_path)?;
    let doc = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PdfError::Parse(e.to_string()))?;

    let index = u16::try_from(page_number.saturating_sub(1)).unwrap_or(u16::MAX);
    let page = doc
        .pages()
        .get(index)
        .map_err(|e| PdfError::Render { page: page_number, source: e.to_string() })?;

    let width_pt = page.width().value.max(1.0);
    let target_width = ((width_pt / 72.0) * f32::from(dpi.max(72))).round().max(256.0) as i32;

    let config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .rotate_if_landscape(PdfPageRenderRotation::None, true);

    let image = page
        .render_with_config(&config)
        .map_err(|e| PdfError::Render { page: page_number, source: e.to_string() })?
        .as_image()
        .into_rgb8();

    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| PdfError::Render { page: page_number, source: e.to_string() })?;
    Ok(png)
}
