//! The viewer facade.
//!
//! [`Viewer`] owns one open document and coordinates rendering, visibility,
//! windowing, navigation, search and thumbnails over it. The host forwards
//! input, executes the jobs it is handed, and calls [`Viewer::tick`]
//! regularly with the current instant; everything the host must react to
//! comes back as [`ViewerEvent`]s.

use crate::layout::{PageLayout, WindowPolicy};
use crate::nav::{Navigator, ScrollCommand};
use crate::render::{RenderJob, RenderKind, RenderOutcome, RenderScheduler};
use crate::search::{MatchStatus, SearchIndex};
use crate::thumbs::ThumbnailVirtualizer;
use crate::visibility::VisibilityTracker;
use folio_engine::{
    Destination, DocumentHandle, DocumentSource, EngineResult, LoadError, PageHandle, RasterEngine,
};
use folio_model::{
    DocumentInfo, PageNumber, PageRecord, PageSize, PageText, RenderState, Rotation, SearchMatch,
    ViewerConfig, VirtualWindow,
};
use folio_scheduler::Interval;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Everything the host must react to, in the order it happened.
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    LoadProgress { loaded: u64, total: Option<u64> },
    CurrentPageChanged(PageNumber),
    WindowChanged(VirtualWindow),
    /// Execute this job (typically off-thread) and report the result back
    /// through [`Viewer::complete_render`].
    RenderRequested(RenderJob),
    PageRendered(PageNumber),
    RenderFailed { page: PageNumber, error: String },
    ScrollRequested(ScrollCommand),
    SearchUpdated(MatchStatus),
    ThumbnailRequested(RenderJob),
    ThumbnailRendered(PageNumber),
}

struct OpenDocument {
    info: DocumentInfo,
    handle: Box<dyn DocumentHandle>,
    pages: HashMap<PageNumber, Arc<dyn PageHandle>>,
    base_size: PageSize,
    render: RenderScheduler,
    visibility: VisibilityTracker,
    nav: Navigator,
    policy: WindowPolicy,
    window: VirtualWindow,
    layout: PageLayout,
    search: SearchIndex,
    thumbs: ThumbnailVirtualizer,
    sweep: Interval,
    current: PageNumber,
    scale: f32,
    rotation: Rotation,
}

impl OpenDocument {
    /// Cached page handle lookup; handles are expensive to produce.
    fn page_handle(&mut self, page: PageNumber) -> Option<Arc<dyn PageHandle>> {
        if let Some(handle) = self.pages.get(&page) {
            return Some(Arc::clone(handle));
        }
        match self.handle.page(page) {
            Ok(handle) => {
                let handle: Arc<dyn PageHandle> = Arc::from(handle);
                self.pages.insert(page, Arc::clone(&handle));
                Some(handle)
            }
            Err(err) => {
                log::warn!("page {page} unavailable: {err}");
                None
            }
        }
    }
}

pub struct Viewer {
    engine: Arc<dyn RasterEngine>,
    config: ViewerConfig,
    doc: Option<OpenDocument>,
    events: VecDeque<ViewerEvent>,
}

impl Viewer {
    pub fn new(engine: Arc<dyn RasterEngine>, config: ViewerConfig) -> Self {
        Self { engine, config, doc: None, events: VecDeque::new() }
    }

    /// Open a document, replacing any document already open. Teardown of the
    /// old document happens first, so completions from its in-flight renders
    /// can never land in the new one.
    pub fn open(
        &mut self,
        source: &dyn DocumentSource,
        now: Instant,
    ) -> Result<DocumentInfo, LoadError> {
        self.close();

        let events = &mut self.events;
        let bytes = source.fetch(&mut |loaded, total| {
            events.push_back(ViewerEvent::LoadProgress { loaded, total });
        })?;
        let handle = self.engine.open(&bytes)?;

        let page_count = handle.page_count();
        let info = DocumentInfo::new(page_count);
        let base_size = handle.page(1).map(|page| page.base_size()).unwrap_or_default();

        let scale = 1.0;
        let rotation = Rotation::default();
        let policy = WindowPolicy::new(&self.config);
        let window = policy.compute(1, page_count, None);
        let mut doc = OpenDocument {
            info: info.clone(),
            handle,
            pages: HashMap::new(),
            base_size,
            render: RenderScheduler::new(self.config.render_timeout),
            visibility: VisibilityTracker::new(self.config.visibility_debounce),
            nav: Navigator::new(self.config.settle_delay, self.config.scroll_top_padding),
            policy,
            window,
            layout: PageLayout::uniform(
                base_size,
                scale,
                rotation,
                page_count,
                self.config.page_spacing,
            ),
            search: SearchIndex::new(self.config.search_debounce),
            thumbs: ThumbnailVirtualizer::new(&self.config),
            sweep: Interval::new(self.config.sweep_period()),
            current: 1,
            scale,
            rotation,
        };

        self.events.push_back(ViewerEvent::WindowChanged(window));
        Self::prime_thumbnails(&mut doc, &self.config, &mut self.events, now);
        log::info!("opened document {} with {page_count} pages", info.id);
        self.doc = Some(doc);
        Ok(info)
    }

    /// Tear down the open document, cancelling everything in flight.
    pub fn close(&mut self) {
        if let Some(mut doc) = self.doc.take() {
            doc.render.shutdown();
            doc.thumbs.reset();
            log::info!("closed document {}", doc.info.id);
        }
    }

    /// Navigate to `target` (clamped into the document). The current page
    /// and window update immediately; the scroll is issued on a later tick,
    /// once the target page is materialized.
    pub fn go_to_page(&mut self, target: PageNumber, now: Instant) -> Option<PageNumber> {
        let doc = self.doc.as_mut()?;
        let target = doc.nav.go_to(target, doc.info.page_count);
        Self::set_current(doc, &mut self.events, target);
        Self::prime_thumbnails(doc, &self.config, &mut self.events, now);
        Some(target)
    }

    /// Resolve an outline or link destination and navigate to it.
    pub fn go_to_destination(&mut self, destination: &Destination, now: Instant) -> Option<PageNumber> {
        let page = self.doc.as_ref()?.handle.resolve_destination(destination)?;
        self.go_to_page(page, now)
    }

    /// Forward a page visibility ratio change from the host's observer. A
    /// page becoming visible triggers its render immediately; the current
    /// page only changes after the debounce, on a later tick.
    pub fn observe_visibility(&mut self, page: PageNumber, ratio: f32, now: Instant) {
        let Some(doc) = self.doc.as_mut() else {
            return;
        };
        doc.visibility.observe(page, ratio, now);
        if ratio > 0.0 {
            Self::request_render(doc, &mut self.events, page, now);
        }
    }

    /// Change the render scale. Invalidates every raster and in-flight
    /// render of the old generation.
    pub fn set_scale(&mut self, scale: f32, now: Instant) {
        let Some(doc) = self.doc.as_mut() else {
            return;
        };
        if scale == doc.scale {
            return;
        }
        doc.scale = scale;
        Self::invalidate_geometry(doc, &self.config, &mut self.events, now);
    }

    /// Change the page rotation. Quarter turns swap layout axes; like a
    /// scale change this invalidates every raster.
    pub fn set_rotation(&mut self, rotation: Rotation, now: Instant) {
        let Some(doc) = self.doc.as_mut() else {
            return;
        };
        if rotation == doc.rotation {
            return;
        }
        doc.rotation = rotation;
        Self::invalidate_geometry(doc, &self.config, &mut self.events, now);
    }

    pub fn rotate_clockwise(&mut self, now: Instant) {
        if let Some(rotation) = self.doc.as_ref().map(|doc| doc.rotation.rotated_cw()) {
            self.set_rotation(rotation, now);
        }
    }

    pub fn rotate_counterclockwise(&mut self, now: Instant) {
        if let Some(rotation) = self.doc.as_ref().map(|doc| doc.rotation.rotated_ccw()) {
            self.set_rotation(rotation, now);
        }
    }

    /// Record a search query edit. A cleared query empties the results
    /// immediately; anything else commits after the search debounce.
    pub fn set_search_query(&mut self, query: &str, now: Instant) {
        let Some(doc) = self.doc.as_mut() else {
            return;
        };
        if doc.search.set_query(query, now) {
            self.events.push_back(ViewerEvent::SearchUpdated(doc.search.status()));
        }
    }

    /// Select the next match, wrapping, and navigate to its page.
    pub fn next_match(&mut self, now: Instant) -> Option<SearchMatch> {
        let doc = self.doc.as_mut()?;
        let found = doc.search.next()?;
        self.events.push_back(ViewerEvent::SearchUpdated(doc.search.status()));
        Self::jump_to(doc, &self.config, &mut self.events, found.page, now);
        Some(found)
    }

    /// Select the previous match, wrapping, and navigate to its page.
    pub fn previous_match(&mut self, now: Instant) -> Option<SearchMatch> {
        let doc = self.doc.as_mut()?;
        let found = doc.search.previous()?;
        self.events.push_back(ViewerEvent::SearchUpdated(doc.search.status()));
        Self::jump_to(doc, &self.config, &mut self.events, found.page, now);
        Some(found)
    }

    /// Advance all deadline-driven work: navigation settling, debounced
    /// page selection, deferred scrolls, search commits, the render timeout
    /// sweep and idle thumbnail backfill. Returns the events accumulated
    /// since the last drain.
    pub fn tick(&mut self, now: Instant, host_idle: bool) -> Vec<ViewerEvent> {
        if let Some(doc) = self.doc.as_mut() {
            if doc.nav.poll(now) {
                log::debug!("navigation settled on page {}", doc.current);
            }

            // Mid-navigation visibility selections are discarded, not
            // deferred; the next organic scroll produces fresh ones.
            if let Some(candidate) = doc.visibility.poll(now) {
                if doc.nav.is_idle() && candidate != doc.current {
                    Self::set_current(doc, &mut self.events, candidate);
                    Self::prime_thumbnails(doc, &self.config, &mut self.events, now);
                }
            }

            if let Some(target) = doc.nav.pending_target() {
                if doc.window.contains(target) {
                    let command = doc.nav.begin_scroll(doc.layout.offset_of(target), now);
                    self.events.push_back(ViewerEvent::ScrollRequested(command));
                }
            }

            if doc.search.poll(now, doc.render.text_store()) {
                self.events.push_back(ViewerEvent::SearchUpdated(doc.search.status()));
                if let Some(found) = doc.search.current_match() {
                    Self::jump_to(doc, &self.config, &mut self.events, found.page, now);
                }
            }

            if doc.sweep.tick(now) {
                for page in doc.render.sweep(now) {
                    if doc.visibility.is_visible(page) {
                        Self::request_render(doc, &mut self.events, page, now);
                    }
                }
                doc.thumbs.sweep(now);
            }

            if let Some(page) = doc.thumbs.pop_idle(now, host_idle) {
                if let Some(handle) = doc.page_handle(page) {
                    let ticket = doc.thumbs.begin(page, now);
                    self.events.push_back(ViewerEvent::ThumbnailRequested(RenderJob::new(
                        page,
                        self.config.thumbnail_scale,
                        doc.rotation,
                        RenderKind::Thumbnail,
                        handle,
                        ticket,
                    )));
                }
            }
        }

        self.take_events()
    }

    /// Report a finished job. Stale results (superseded, cancelled, or from
    /// a previous generation or document) are discarded without touching
    /// state.
    pub fn complete_render(&mut self, job: &RenderJob, result: EngineResult<PageText>) {
        let Some(doc) = self.doc.as_mut() else {
            return;
        };
        match job.kind() {
            RenderKind::Page => match doc.render.complete(job, result) {
                RenderOutcome::Rendered => {
                    self.events.push_back(ViewerEvent::PageRendered(job.page()));
                    let spliced = match doc.render.text(job.page()) {
                        Some(text) => doc.search.on_page_rendered(job.page(), text),
                        None => false,
                    };
                    if spliced {
                        self.events.push_back(ViewerEvent::SearchUpdated(doc.search.status()));
                    }
                }
                RenderOutcome::Failed(error) => {
                    self.events.push_back(ViewerEvent::RenderFailed { page: job.page(), error });
                }
                RenderOutcome::Cancelled | RenderOutcome::Stale => {}
            },
            RenderKind::Thumbnail => {
                if doc.thumbs.complete(job.ticket(), result.is_ok()) {
                    self.events.push_back(ViewerEvent::ThumbnailRendered(job.page()));
                }
            }
        }
    }

    /// Drain events accumulated by calls between ticks.
    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        self.doc.as_ref().map(|doc| &doc.info)
    }

    pub fn current_page(&self) -> PageNumber {
        self.doc.as_ref().map_or(1, |doc| doc.current)
    }

    pub fn page_count(&self) -> u32 {
        self.doc.as_ref().map_or(0, |doc| doc.info.page_count)
    }

    pub fn window(&self) -> VirtualWindow {
        self.doc.as_ref().map_or_else(|| VirtualWindow::inactive(0), |doc| doc.window)
    }

    /// Spacer heights above and below the materialized range.
    pub fn window_spacers(&self) -> (f32, f32) {
        self.doc.as_ref().map_or((0.0, 0.0), |doc| doc.layout.spacers(&doc.window))
    }

    /// Distance from the document top to the top edge of `page` at the
    /// current scale and rotation.
    pub fn page_offset(&self, page: PageNumber) -> f32 {
        self.doc.as_ref().map_or(0.0, |doc| doc.layout.offset_of(page))
    }

    pub fn scale(&self) -> f32 {
        self.doc.as_ref().map_or(1.0, |doc| doc.scale)
    }

    pub fn rotation(&self) -> Rotation {
        self.doc.as_ref().map_or_else(Rotation::default, |doc| doc.rotation)
    }

    pub fn render_state(&self, page: PageNumber) -> RenderState {
        self.doc.as_ref().map_or(RenderState::Unrendered, |doc| doc.render.state(page))
    }

    /// Snapshot of one page's view state, `None` for pages outside the
    /// document.
    pub fn page_record(&self, page: PageNumber) -> Option<PageRecord> {
        let doc = self.doc.as_ref()?;
        if page == 0 || page > doc.info.page_count {
            return None;
        }
        let mut record = PageRecord::new(page, doc.base_size);
        record.render_state = doc.render.state(page);
        record.ever_rendered = doc.render.ever_rendered(page);
        Some(record)
    }

    /// Whether `page` has rastered at least once for this document,
    /// regardless of generation invalidations since.
    pub fn ever_rendered(&self, page: PageNumber) -> bool {
        self.doc.as_ref().is_some_and(|doc| doc.render.ever_rendered(page))
    }

    pub fn search_status(&self) -> MatchStatus {
        self.doc.as_ref().map_or_else(MatchStatus::default, |doc| doc.search.status())
    }

    pub fn matches_for_page(&self, page: PageNumber) -> Vec<SearchMatch> {
        self.doc.as_ref().map_or_else(Vec::new, |doc| doc.search.matches_for_page(page))
    }

    pub fn thumbnail_done(&self, page: PageNumber) -> bool {
        self.doc.as_ref().is_some_and(|doc| doc.thumbs.is_done(page))
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    fn set_current(doc: &mut OpenDocument, events: &mut VecDeque<ViewerEvent>, page: PageNumber) {
        if page != doc.current {
            doc.current = page;
            events.push_back(ViewerEvent::CurrentPageChanged(page));
        }
        let window = doc.policy.compute(doc.current, doc.info.page_count, doc.nav.pending_target());
        if window != doc.window {
            doc.window = window;
            events.push_back(ViewerEvent::WindowChanged(window));
        }
    }

    fn jump_to(
        doc: &mut OpenDocument,
        config: &ViewerConfig,
        events: &mut VecDeque<ViewerEvent>,
        page: PageNumber,
        now: Instant,
    ) {
        let target = doc.nav.go_to(page, doc.info.page_count);
        Self::set_current(doc, events, target);
        Self::prime_thumbnails(doc, config, events, now);
    }

    fn request_render(
        doc: &mut OpenDocument,
        events: &mut VecDeque<ViewerEvent>,
        page: PageNumber,
        now: Instant,
    ) {
        let Some(handle) = doc.page_handle(page) else {
            return;
        };
        if let Some(job) = doc.render.request(page, handle, doc.scale, doc.rotation, now) {
            events.push_back(ViewerEvent::RenderRequested(job));
        }
    }

    /// Thumbnail the pages around the current one immediately and queue the
    /// rest for idle-time backfill.
    fn prime_thumbnails(
        doc: &mut OpenDocument,
        config: &ViewerConfig,
        events: &mut VecDeque<ViewerEvent>,
        now: Instant,
    ) {
        for page in doc.thumbs.immediate_batch(doc.current, doc.info.page_count) {
            let Some(handle) = doc.page_handle(page) else {
                continue;
            };
            let ticket = doc.thumbs.begin(page, now);
            events.push_back(ViewerEvent::ThumbnailRequested(RenderJob::new(
                page,
                config.thumbnail_scale,
                doc.rotation,
                RenderKind::Thumbnail,
                handle,
                ticket,
            )));
        }
        doc.thumbs.fill_backlog(doc.current, doc.info.page_count);
    }

    /// Shared tail of scale and rotation changes: new render generation,
    /// rebuilt geometry, and immediate re-requests for visible pages.
    fn invalidate_geometry(
        doc: &mut OpenDocument,
        config: &ViewerConfig,
        events: &mut VecDeque<ViewerEvent>,
        now: Instant,
    ) {
        doc.render.invalidate();
        doc.layout = PageLayout::uniform(
            doc.base_size,
            doc.scale,
            doc.rotation,
            doc.info.page_count,
            config.page_spacing,
        );
        doc.window = doc.policy.compute(doc.current, doc.info.page_count, doc.nav.pending_target());
        events.push_back(ViewerEvent::WindowChanged(doc.window));
        for page in doc.visibility.visible_pages() {
            Self::request_render(doc, events, page, now);
        }
    }
}
