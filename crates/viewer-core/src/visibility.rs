//! Visibility tracking and debounced current-page selection.
//!
//! The host observes page intersection ratios (an IntersectionObserver in a
//! web host, viewport math elsewhere) and forwards every change here. The
//! tracker keeps the latest ratio per page and recomputes the current page
//! only after the signals go quiet for the debounce delay, so one scroll
//! gesture produces one page change instead of a burst.

use folio_model::PageNumber;
use folio_scheduler::Debouncer;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Intersection thresholds the host should observe at. Coarser stepping
/// starves the tracker during fast scrolls; finer adds callback noise
/// without improving selection. Hosts should also observe with a lookahead
/// margin so pages start rendering shortly before they enter view.
pub const VISIBILITY_THRESHOLDS: [f32; 6] = [0.0, 0.1, 0.25, 0.5, 0.75, 1.0];

/// Latest visibility ratio per page plus the debounced selection of the most
/// visible one.
#[derive(Debug)]
pub struct VisibilityTracker {
    ratios: HashMap<PageNumber, f32>,
    debounce: Debouncer,
}

impl VisibilityTracker {
    pub fn new(debounce: Duration) -> Self {
        Self { ratios: HashMap::new(), debounce: Debouncer::new(debounce) }
    }

    /// Record a ratio change for `page` and re-arm the debounce. A ratio of
    /// zero removes the page from consideration.
    pub fn observe(&mut self, page: PageNumber, ratio: f32, now: Instant) {
        if ratio > 0.0 {
            self.ratios.insert(page, ratio);
        } else {
            self.ratios.remove(&page);
        }
        self.debounce.trigger(now);
    }

    /// Once per quiet period, yields the page that should become current.
    pub fn poll(&mut self, now: Instant) -> Option<PageNumber> {
        if self.debounce.fire_if_due(now) {
            Some(self.most_visible())
        } else {
            None
        }
    }

    /// The page with the highest ratio; ties break toward the lower page
    /// number so selection is deterministic when two pages split the
    /// viewport evenly. Defaults to page 1 when nothing is visible.
    pub fn most_visible(&self) -> PageNumber {
        let mut best: Option<(PageNumber, f32)> = None;
        for (&page, &ratio) in &self.ratios {
            let better = match best {
                None => true,
                Some((best_page, best_ratio)) => {
                    ratio > best_ratio || (ratio == best_ratio && page < best_page)
                }
            };
            if better {
                best = Some((page, ratio));
            }
        }
        best.map_or(1, |(page, _)| page)
    }

    pub fn is_visible(&self, page: PageNumber) -> bool {
        self.ratios.contains_key(&page)
    }

    /// Pages currently intersecting the viewport, unordered.
    pub fn visible_pages(&self) -> Vec<PageNumber> {
        self.ratios.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.ratios.clear();
        self.debounce.cancel();
    }
}
