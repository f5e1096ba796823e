use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 1-based page number. Page 1 is the first page of every document.
pub type PageNumber = u32;

pub type DocumentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::Deg90,
            180 => Self::Deg180,
            270 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn rotated_cw(self) -> Self {
        Self::from_degrees(self.degrees() as i32 + 90)
    }

    pub fn rotated_ccw(self) -> Self {
        Self::from_degrees(self.degrees() as i32 - 90)
    }

    /// Whether this rotation swaps a page's width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, scale: f32) -> Self {
        Self { width: self.width * scale, height: self.height * scale }
    }

    pub fn oriented(self, rotation: Rotation) -> Self {
        if rotation.swaps_axes() {
            Self { width: self.height, height: self.width }
        } else {
            self
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width: 612.0, height: 792.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Unrendered,
    Rendering,
    Rendered,
}

/// Per-page view state. `ever_rendered` is monotonic for the lifetime of a
/// document load: it survives generation invalidation (scale or rotation
/// changes) so a re-rendering page keeps showing its previous raster instead
/// of flashing blank.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub number: PageNumber,
    pub base_size: PageSize,
    pub render_state: RenderState,
    pub ever_rendered: bool,
}

impl PageRecord {
    pub fn new(number: PageNumber, base_size: PageSize) -> Self {
        Self { number, base_size, render_state: RenderState::Unrendered, ever_rendered: false }
    }
}

/// One run of extracted text with its position transform (a, b, c, d, e, f).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub transform: [f32; 6],
}

impl TextFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), transform: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] }
    }

    pub fn with_transform(mut self, transform: [f32; 6]) -> Self {
        self.transform = transform;
        self
    }
}

pub type PageText = Vec<TextFragment>;

/// One located occurrence of a search query within a page's extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchMatch {
    pub page: PageNumber,
    pub fragment: usize,
    pub offset: usize,
    pub len: usize,
}

/// The contiguous page range materialized in the layout. Inactive means the
/// document is small enough to materialize every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualWindow {
    pub start: PageNumber,
    pub end: PageNumber,
    pub active: bool,
}

impl VirtualWindow {
    pub fn inactive(total: u32) -> Self {
        Self { start: 1, end: total.max(1), active: false }
    }

    pub fn contains(&self, page: PageNumber) -> bool {
        page >= self.start && page <= self.end
    }

    pub fn pages(&self) -> impl Iterator<Item = PageNumber> {
        self.start..=self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl DocumentInfo {
    pub fn new(page_count: u32) -> Self {
        Self { id: Uuid::new_v4(), page_count, title: None, author: None }
    }
}

/// Every tunable of the viewer core. Values are used verbatim; there are no
/// hidden constants elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// A render task older than this is cancelled and reaped by the sweep.
    pub render_timeout: Duration,
    /// Delay between a visibility signal and the current-page recomputation.
    pub visibility_debounce: Duration,
    /// Quiet period after a programmatic scroll before visibility-driven
    /// page changes resume.
    pub settle_delay: Duration,
    /// Delay between a query edit and the search index rebuild.
    pub search_debounce: Duration,
    /// Pixels kept above the target page when scrolling to it.
    pub scroll_top_padding: f32,
    /// Vertical gap between adjacent pages in the layout.
    pub page_spacing: f32,
    /// Page-count threshold below which windowing stays inactive.
    pub window_threshold: u32,
    /// Materialized pages before the current page when windowing is active.
    pub window_before: u32,
    /// Materialized pages after the current page. Larger than `window_before`
    /// because forward reading is the common direction.
    pub window_after: u32,
    /// Raster scale for sidebar thumbnails.
    pub thumbnail_scale: f32,
    /// Pages around the current page thumbnailed immediately.
    pub thumbnail_batch_radius: u32,
    /// Upper bound on thumbnails queued for idle-time rendering.
    pub thumbnail_idle_cap: usize,
    /// Gap between idle thumbnails when the host has no idle signal.
    pub idle_fallback_delay: Duration,
    /// Extra list items mounted above and below the visible thumbnail range.
    pub thumbnail_list_buffer: u32,
    /// Page-count threshold at or below which every thumbnail list item
    /// stays mounted.
    pub thumbnail_list_threshold: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            render_timeout: Duration::from_secs(10),
            visibility_debounce: Duration::from_millis(50),
            settle_delay: Duration::from_millis(100),
            search_debounce: Duration::from_millis(150),
            scroll_top_padding: 20.0,
            page_spacing: 16.0,
            window_threshold: 30,
            window_before: 5,
            window_after: 8,
            thumbnail_scale: 0.2,
            thumbnail_batch_radius: 3,
            thumbnail_idle_cap: 30,
            idle_fallback_delay: Duration::from_millis(32),
            thumbnail_list_buffer: 4,
            thumbnail_list_threshold: 30,
        }
    }
}

impl ViewerConfig {
    /// The sweep runs at half the timeout so a stalled task is reaped at most
    /// 1.5x the timeout after it started.
    pub fn sweep_period(&self) -> Duration {
        self.render_timeout / 2
    }
}
