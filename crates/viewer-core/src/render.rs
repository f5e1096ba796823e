//! Render scheduling with single-flight pages and stale-completion discard.
//!
//! Every page render runs under a ticket from a [`TaskTable`]. A completion
//! may only write state if its ticket still matches the table, so output
//! from a render that was cancelled, superseded or outlived a generation
//! change (scale or rotation) is dropped instead of clobbering newer state.

use folio_engine::{EngineResult, PageHandle, RasterSurface};
use folio_model::{PageNumber, PageText, RenderState, Rotation};
use folio_scheduler::{TaskTable, TaskTicket};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a job's raster is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Full-size page raster plus text extraction.
    Page,
    /// Sidebar thumbnail raster, no text extraction.
    Thumbnail,
}

/// One unit of render work handed to the host.
///
/// The job carries everything needed to execute anywhere, including a worker
/// thread: the page handle, the raster parameters and the cancellation token
/// inside its ticket. The host runs it via [`RenderJob::run`] and reports the
/// result back through `Viewer::complete_render`.
#[derive(Clone)]
pub struct RenderJob {
    page: PageNumber,
    scale: f32,
    rotation: Rotation,
    kind: RenderKind,
    handle: Arc<dyn PageHandle>,
    ticket: TaskTicket<PageNumber>,
}

impl RenderJob {
    pub(crate) fn new(
        page: PageNumber,
        scale: f32,
        rotation: Rotation,
        kind: RenderKind,
        handle: Arc<dyn PageHandle>,
        ticket: TaskTicket<PageNumber>,
    ) -> Self {
        Self { page, scale, rotation, kind, handle, ticket }
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn kind(&self) -> RenderKind {
        self.kind
    }

    pub(crate) fn ticket(&self) -> &TaskTicket<PageNumber> {
        &self.ticket
    }

    /// Raster the page into `surface` and, for full-page jobs, extract its
    /// text. Observes the job's cancellation token.
    pub fn run(&self, surface: &mut RasterSurface) -> EngineResult<PageText> {
        self.handle.render(surface, self.scale, self.rotation, self.ticket.token())?;
        match self.kind {
            RenderKind::Page => self.handle.extract_text(),
            RenderKind::Thumbnail => Ok(PageText::new()),
        }
    }
}

impl fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderJob")
            .field("page", &self.page)
            .field("scale", &self.scale)
            .field("rotation", &self.rotation)
            .field("kind", &self.kind)
            .field("generation", &self.ticket.generation())
            .finish()
    }
}

/// Result of routing a completion through the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The raster landed; the page is now rendered.
    Rendered,
    /// The engine stopped early because the token tripped.
    Cancelled,
    /// The engine failed; the page reverts to unrendered.
    Failed(String),
    /// The ticket no longer matches the table; the result was discarded.
    Stale,
}

/// Per-page render bookkeeping for one open document.
///
/// `ever_rendered` is monotonic across generation invalidation: a page that
/// rastered once keeps that flag through scale and rotation changes so the
/// host can keep showing the previous raster while the replacement renders.
pub struct RenderScheduler {
    table: TaskTable<PageNumber>,
    states: HashMap<PageNumber, RenderState>,
    ever_rendered: HashSet<PageNumber>,
    text: HashMap<PageNumber, PageText>,
    timeout: Duration,
}

impl RenderScheduler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: TaskTable::new(),
            states: HashMap::new(),
            ever_rendered: HashSet::new(),
            text: HashMap::new(),
            timeout,
        }
    }

    /// Start a render for `page` unless one is already in flight or the page
    /// is already rendered at the current generation.
    pub fn request(
        &mut self,
        page: PageNumber,
        handle: Arc<dyn PageHandle>,
        scale: f32,
        rotation: Rotation,
        now: Instant,
    ) -> Option<RenderJob> {
        match self.states.get(&page) {
            Some(RenderState::Rendering) | Some(RenderState::Rendered) => return None,
            _ => {}
        }

        self.states.insert(page, RenderState::Rendering);
        let ticket = self.table.begin(page, now);
        log::debug!("render start: page {page} gen {}", ticket.generation());
        Some(RenderJob::new(page, scale, rotation, RenderKind::Page, handle, ticket))
    }

    /// Route a completed job's result. Stale completions leave all state
    /// untouched.
    pub fn complete(&mut self, job: &RenderJob, result: EngineResult<PageText>) -> RenderOutcome {
        if !self.table.try_finish(job.ticket()) {
            log::debug!("render stale: page {} gen {}", job.page(), job.ticket().generation());
            return RenderOutcome::Stale;
        }

        let page = job.page();
        match result {
            Ok(text) => {
                self.states.insert(page, RenderState::Rendered);
                self.ever_rendered.insert(page);
                self.text.insert(page, text);
                RenderOutcome::Rendered
            }
            Err(err) if err.is_cancelled() => {
                self.states.remove(&page);
                RenderOutcome::Cancelled
            }
            Err(err) => {
                self.states.remove(&page);
                log::warn!("render failed: page {page}: {err}");
                RenderOutcome::Failed(err.to_string())
            }
        }
    }

    /// Cancel and forget every render older than the timeout, reverting the
    /// affected pages to unrendered so they are eligible for retry.
    pub fn sweep(&mut self, now: Instant) -> Vec<PageNumber> {
        let reaped = self.table.sweep(now, self.timeout);
        for page in &reaped {
            log::warn!("render timed out: page {page}");
            self.states.remove(page);
        }
        reaped
    }

    /// Cancel everything in flight and forget render states and extracted
    /// text. `ever_rendered` survives; it only resets with the document.
    pub fn invalidate(&mut self) {
        let generation = self.table.bump_generation();
        self.states.clear();
        self.text.clear();
        log::debug!("render generation now {generation}");
    }

    /// Cancel everything in flight on document teardown. Outstanding tickets
    /// can never complete afterwards.
    pub fn shutdown(&mut self) {
        self.table.cancel_all();
    }

    pub fn state(&self, page: PageNumber) -> RenderState {
        self.states.get(&page).copied().unwrap_or_default()
    }

    pub fn ever_rendered(&self, page: PageNumber) -> bool {
        self.ever_rendered.contains(&page)
    }

    pub fn text(&self, page: PageNumber) -> Option<&PageText> {
        self.text.get(&page)
    }

    /// Extracted text for every rendered page, keyed by page number.
    pub fn text_store(&self) -> &HashMap<PageNumber, PageText> {
        &self.text
    }
}
