//! Scriptable in-memory engine for exercising the viewer core in tests.

use crate::{
    Destination, DocumentHandle, EngineError, EngineResult, LoadError, PageHandle, RasterEngine,
    RasterSurface,
};
use folio_model::{PageNumber, PageSize, PageText, Rotation, TextFragment};
use folio_scheduler::CancellationToken;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared behavior script for a [`FakeEngine`] and the handles it produces.
#[derive(Debug, Default)]
struct Script {
    page_count: u32,
    page_size: PageSize,
    text: HashMap<PageNumber, PageText>,
    fail_render: HashSet<PageNumber>,
    stall_render: HashSet<PageNumber>,
    named_destinations: HashMap<String, PageNumber>,
}

/// In-memory [`RasterEngine`] with scriptable behavior:
/// per-page text, render-failure injection and a stall mode in which a
/// render only returns once its token is cancelled.
#[derive(Clone)]
pub struct FakeEngine {
    script: Arc<Mutex<Script>>,
    renders: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub fn new(page_count: u32) -> Self {
        let script = Script {
            page_count,
            page_size: PageSize::default(),
            ..Script::default()
        };
        Self { script: Arc::new(Mutex::new(script)), renders: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn with_page_size(self, size: PageSize) -> Self {
        self.script.lock().unwrap().page_size = size;
        self
    }

    /// Script one text fragment per string for `page`.
    pub fn with_text(self, page: PageNumber, fragments: &[&str]) -> Self {
        let text = fragments.iter().map(|s| TextFragment::new(*s)).collect();
        self.script.lock().unwrap().text.insert(page, text);
        self
    }

    /// Make every render of `page` fail with a render error.
    pub fn with_failing_page(self, page: PageNumber) -> Self {
        self.script.lock().unwrap().fail_render.insert(page);
        self
    }

    /// Make every render of `page` spin until its token is cancelled.
    pub fn with_stalling_page(self, page: PageNumber) -> Self {
        self.script.lock().unwrap().stall_render.insert(page);
        self
    }

    pub fn with_named_destination(self, name: &str, page: PageNumber) -> Self {
        self.script.lock().unwrap().named_destinations.insert(name.to_owned(), page);
        self
    }

    /// Total successful renders across all handles.
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl RasterEngine for FakeEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, LoadError> {
        if bytes.is_empty() {
            return Err(LoadError::InvalidFormat("empty document".into()));
        }
        Ok(Box::new(FakeDocument {
            script: Arc::clone(&self.script),
            renders: Arc::clone(&self.renders),
        }))
    }
}

struct FakeDocument {
    script: Arc<Mutex<Script>>,
    renders: Arc<AtomicUsize>,
}

impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> u32 {
        self.script.lock().unwrap().page_count
    }

    fn page(&self, number: PageNumber) -> EngineResult<Box<dyn PageHandle>> {
        let count = self.page_count();
        if number == 0 || number > count {
            return Err(EngineError::PageOutOfRange { page: number, count });
        }
        Ok(Box::new(FakePage {
            number,
            script: Arc::clone(&self.script),
            renders: Arc::clone(&self.renders),
        }))
    }

    fn resolve_destination(&self, destination: &Destination) -> Option<PageNumber> {
        let script = self.script.lock().unwrap();
        match destination {
            Destination::Page(page) => {
                (*page >= 1 && *page <= script.page_count).then_some(*page)
            }
            Destination::Named(name) => script.named_destinations.get(name).copied(),
        }
    }
}

struct FakePage {
    number: PageNumber,
    script: Arc<Mutex<Script>>,
    renders: Arc<AtomicUsize>,
}

impl PageHandle for FakePage {
    fn base_size(&self) -> PageSize {
        self.script.lock().unwrap().page_size
    }

    fn render(
        &self,
        surface: &mut RasterSurface,
        scale: f32,
        rotation: Rotation,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        let (fails, stalls) = {
            let script = self.script.lock().unwrap();
            (
                script.fail_render.contains(&self.number),
                script.stall_render.contains(&self.number),
            )
        };

        if stalls {
            while !token.is_cancelled() {
                std::thread::yield_now();
            }
            return Err(EngineError::Cancelled);
        }
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if fails {
            return Err(EngineError::Render(format!("scripted failure on page {}", self.number)));
        }

        let size = self.viewport(scale, rotation);
        surface.prepare(size.width.ceil() as u32, size.height.ceil() as u32);
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn extract_text(&self) -> EngineResult<PageText> {
        let script = self.script.lock().unwrap();
        Ok(script.text.get(&self.number).cloned().unwrap_or_default())
    }
}
