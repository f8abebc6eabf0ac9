use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use pdf_engine::{DocumentHandle, LopdfEngine, PdfEngine, RenderRequest};
use tracing::debug;
use viewer_core::{DeviceClass, PageDisplay, PageRenderer, RenderError};

/// Renders pages into a PNG file that stands in for the drawing surface.
///
/// Each render replaces the file through a rename so a watcher never sees a
/// half-written image.
pub struct PngCanvas {
    engine: Arc<LopdfEngine>,
    handle: DocumentHandle,
    device: DeviceClass,
    path: PathBuf,
}

impl PngCanvas {
    pub fn new(
        engine: Arc<LopdfEngine>,
        handle: DocumentHandle,
        device: DeviceClass,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self { engine, handle, device, path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageRenderer for PngCanvas {
    async fn render(&self, page: u32, scale: f32) -> Result<(), RenderError> {
        let engine = Arc::clone(&self.engine);
        let handle = self.handle;
        let path = self.path.clone();
        let request = RenderRequest { page, scale, extra_height_px: self.device.extra_height_px() };

        tokio::task::spawn_blocking(move || paint(&engine, handle, request, &path))
            .await
            .map_err(|e| RenderError::new(format!("render task failed: {e}")))?
    }
}

fn paint(
    engine: &LopdfEngine,
    handle: DocumentHandle,
    request: RenderRequest,
    path: &Path,
) -> Result<(), RenderError> {
    let image = engine.render_page(handle, request).map_err(|e| RenderError::new(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| RenderError::new(format!("failed to create {}: {e}", parent.display())))?;
    }

    let staging = path.with_extension("png.partial");
    image
        .save_with_format(&staging, ImageFormat::Png)
        .map_err(|e| RenderError::new(format!("failed to write {}: {e}", staging.display())))?;
    fs::rename(&staging, path)
        .map_err(|e| RenderError::new(format!("failed to replace {}: {e}", path.display())))?;

    debug!(page = request.page, width = image.width(), height = image.height(), "canvas written");
    Ok(())
}

/// Page labels on stdout.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    page_count: Cell<Option<u32>>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, page: u32) -> String {
        match self.page_count.get() {
            Some(count) => format!("page {page} / {count}"),
            None => format!("page {page}"),
        }
    }
}

impl PageDisplay for TerminalDisplay {
    fn show_current_page(&self, page: u32) {
        println!("{}", self.label(page));
    }

    fn show_page_count(&self, page_count: u32) {
        self.page_count.set(Some(page_count));
    }
}
