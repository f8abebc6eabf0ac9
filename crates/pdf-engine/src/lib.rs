use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_FRAME: Rgba<u8> = Rgba([220, 220, 220, 255]);
const SURFACE_PADDING: Rgba<u8> = Rgba([0, 0, 0, 0]);
const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };
const MAX_PARENT_DEPTH: usize = 32;
/// Longest surface side in pixels; keeps a bogus MediaBox from allocating gigabytes.
pub const MAX_SURFACE_SIDE_PX: u32 = 8_192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// One page rasterization. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page: u32,
    pub scale: f32,
    /// Transparent rows appended below the page.
    pub extra_height_px: u32,
}

impl RenderRequest {
    /// Pixel size of the surface this request draws, padding included.
    pub fn surface_size(&self, page_size: PageSize) -> Result<(u32, u32), PdfEngineError> {
        let scale = if self.scale <= 0.0 { 1.0 } else { self.scale };
        let width = (page_size.width_pt * scale).round().max(1.0);
        let height = (page_size.height_pt * scale).round().max(1.0) + self.extra_height_px as f32;

        let limit = MAX_SURFACE_SIDE_PX as f32;
        if width > limit || height > limit {
            return Err(PdfEngineError::Backend(format!(
                "page {} needs a {width}x{height} px surface, limit is {MAX_SURFACE_SIDE_PX} px",
                self.page
            )));
        }

        Ok((width as u32, height as u32))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("document is not a readable PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0} (document not open)")]
    InvalidHandle(u64),
    #[error("page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted documents cannot be opened")]
    EncryptedUnsupported,
    #[error("{0}")]
    Backend(String),
}

/// Rasterization engine boundary used by the viewer.
pub trait PdfEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page: u32) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

/// Page geometry from `lopdf`, placeholder raster output.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let sizes: Vec<PageSize> = doc
            .get_pages()
            .into_values()
            .map(|page_id| media_box(&doc, page_id).unwrap_or(DEFAULT_PAGE_SIZE))
            .collect();

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, PdfEngineError> {
        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        debug!(handle = handle.raw(), pages = page_sizes.len(), "document opened");
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page: u32) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        let page_count = record.page_sizes.len() as u32;

        page.checked_sub(1)
            .and_then(|index| record.page_sizes.get(index as usize))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange { page, page_count })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page)?;
        let (width, height) = request.surface_size(page_size)?;
        let page_height = height - request.extra_height_px;

        let mut image = RgbaImage::from_pixel(width, height, SURFACE_PADDING);
        for y in 0..page_height {
            for x in 0..width {
                image.put_pixel(x, y, PAGE_BACKGROUND);
            }
        }

        if width >= 4 && page_height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, PAGE_FRAME);
                image.put_pixel(x, page_height - 1, PAGE_FRAME);
            }
            for y in 0..page_height {
                image.put_pixel(0, y, PAGE_FRAME);
                image.put_pixel(width - 1, y, PAGE_FRAME);
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// MediaBox of a page, inherited from the page tree when the page has none.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut node = Some(page_id);

    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_dictionary(node?).ok()?;

        if let Some(size) = dict.get(b"MediaBox").ok().and_then(|obj| rect_size(doc, obj)) {
            return Some(size);
        }

        node = dict.get(b"Parent").ok().and_then(|obj| obj.as_reference().ok());
    }

    None
}

fn rect_size(doc: &Document, obj: &Object) -> Option<PageSize> {
    let array = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };

    if array.len() != 4 {
        return None;
    }
    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
