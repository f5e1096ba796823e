//! Collaborator contracts consumed by the viewer core.
//!
//! The core does not decode documents or fetch bytes itself. It talks to a
//! rasterization engine and a document source through the traits in this
//! crate, so any backend (pdfium, mupdf, a test double) can sit behind them.
//! Rendering must support cooperative cancellation mid-raster.

use folio_model::{PageNumber, PageSize, PageText, Rotation};
use folio_scheduler::CancellationToken;
use thiserror::Error;

pub mod testing;

/// Fatal document-load failures, categorized for display to the user.
///
/// A load error ends the current load attempt; the only recovery is retrying
/// or opening a different document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document not found")]
    NotFound,

    #[error("invalid document format: {0}")]
    InvalidFormat(String),

    #[error("failed to load document: {0}")]
    Unknown(String),
}

/// Errors from per-page engine operations.
///
/// `Cancelled` is expected control flow, not a failure: callers must check
/// [`EngineError::is_cancelled`] before treating a render result as an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("render cancelled")]
    Cancelled,

    #[error("render failed: {0}")]
    Render(String),

    #[error("text extraction failed: {0}")]
    Text(String),

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: PageNumber, count: u32 },
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A link target inside or into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Page(PageNumber),
    Named(String),
}

/// Pixel buffer a page is rastered into. The viewer reuses one surface per
/// page slot; `prepare` clears it so a new raster never shows ghosting from
/// the previous generation.
#[derive(Debug, Clone, Default)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to the given dimensions and zero every pixel.
    pub fn prepare(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize((width as usize) * (height as usize) * 4, 0);
    }
}

/// An open document inside the rasterization engine.
///
/// Page handles are expensive to produce; callers cache them instead of
/// calling [`DocumentHandle::page`] repeatedly for the same page.
pub trait DocumentHandle: Send {
    fn page_count(&self) -> u32;

    fn page(&self, number: PageNumber) -> EngineResult<Box<dyn PageHandle>>;

    /// Resolve an outline/link destination to the page it points at.
    fn resolve_destination(&self, destination: &Destination) -> Option<PageNumber>;
}

/// One page inside the engine, able to report its geometry, raster itself
/// and extract its text.
///
/// Handles are shared with render jobs that may execute on worker threads.
pub trait PageHandle: Send + Sync {
    /// Unscaled, unrotated page dimensions.
    fn base_size(&self) -> PageSize;

    /// Dimensions of the raster produced for the given scale and rotation.
    fn viewport(&self, scale: f32, rotation: Rotation) -> PageSize {
        self.base_size().scaled(scale).oriented(rotation)
    }

    /// Raster the page into `surface`. Implementations must observe `token`
    /// mid-render and return [`EngineError::Cancelled`] promptly once it
    /// trips.
    fn render(
        &self,
        surface: &mut RasterSurface,
        scale: f32,
        rotation: Rotation,
        token: &CancellationToken,
    ) -> EngineResult<()>;

    /// Extract the page's text runs in reading order.
    fn extract_text(&self) -> EngineResult<PageText>;
}

/// Opens documents from raw bytes.
pub trait RasterEngine: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, LoadError>;
}

/// Supplies document bytes. The core consumes the bytes and forwards the
/// progress callback; the transport (disk, network, archive) is the
/// implementation's business.
pub trait DocumentSource {
    fn fetch(&self, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>, LoadError>;
}

impl DocumentSource for Vec<u8> {
    fn fetch(&self, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>, LoadError> {
        let total = self.len() as u64;
        progress(total, Some(total));
        Ok(self.clone())
    }
}
