//! Local document resolver
//!
//! Renders page 1 of a PDF to PNG on a blocking thread (pdfium is not
//! async-safe) and stores it as an item-owned thumbnail blob.

use super::{bounded, ResolveError, SourceResolver};
use crate::models::{ItemSource, Preview, ResolveRequest, Resolution, ThumbnailBlob};
use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// First page of a document, encoded as PNG
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub page_count: u32,
}

/// Synchronous page renderer; always called from `spawn_blocking`
pub trait PageRenderer: Send + Sync {
    fn render_first_page(&self, path: &Path, width: u32) -> Result<RenderedPage, ResolveError>;
}

/// Renderer backed by the system pdfium library
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRenderer;

impl PageRenderer for PdfiumRenderer {
    fn render_first_page(&self, path: &Path, width: u32) -> Result<RenderedPage, ResolveError> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| ResolveError::Render(format!("pdfium unavailable: {}", e)))?;
        let pdfium = Pdfium::new(bindings);

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| ResolveError::Render(format!("cannot open document: {}", e)))?;
        let pages = document.pages();
        let page_count = pages.len() as u32;

        let page = pages
            .first()
            .map_err(|e| ResolveError::Render(format!("document has no pages: {}", e)))?;
        let config = PdfRenderConfig::new().set_target_width(width as i32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ResolveError::Render(e.to_string()))?;

        let image = RgbaImage::from_raw(
            bitmap.width() as u32,
            bitmap.height() as u32,
            bitmap.as_rgba_bytes(),
        )
        .ok_or_else(|| ResolveError::Render("bitmap size mismatch".to_string()))?;

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ResolveError::Render(format!("PNG encoding failed: {}", e)))?;

        Ok(RenderedPage { png, page_count })
    }
}

pub struct LocalDocumentResolver {
    renderer: Arc<dyn PageRenderer>,
    width: u32,
    timeout: Duration,
}

impl LocalDocumentResolver {
    pub fn new(renderer: Arc<dyn PageRenderer>, width: u32, timeout: Duration) -> Self {
        Self {
            renderer,
            width,
            timeout,
        }
    }

    async fn render(&self, path: &Path) -> Result<RenderedPage, ResolveError> {
        let renderer = Arc::clone(&self.renderer);
        let path = path.to_path_buf();
        let width = self.width;

        bounded(self.timeout, async move {
            tokio::task::spawn_blocking(move || renderer.render_first_page(&path, width))
                .await
                .map_err(|e| ResolveError::Render(format!("render task failed: {}", e)))?
        })
        .await
    }
}

#[async_trait]
impl SourceResolver for LocalDocumentResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Resolution {
        let ItemSource::File { handle } = &request.source else {
            return Resolution::default();
        };
        if !handle.is_document() {
            return Resolution::default();
        }

        let page = match self.render(&handle.path).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(item_id = %request.item_id, file = %handle.file_name, error = %e, "Document preview failed");
                return Resolution::default();
            }
        };

        let page_count = Some(page.page_count).filter(|&n| n > 0);
        match ThumbnailBlob::from_png(&page.png) {
            Ok(blob) => Resolution {
                title: None,
                preview: Some(Preview::Local(blob)),
                page_count,
            },
            Err(e) => {
                tracing::warn!(item_id = %request.item_id, error = %e, "Cannot store document preview");
                Resolution {
                    page_count,
                    ..Resolution::default()
                }
            }
        }
    }
}
