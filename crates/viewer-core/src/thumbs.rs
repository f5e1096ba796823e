//! Thumbnail scheduling and sidebar list virtualization.
//!
//! Thumbnails are cheap individually and ruinous in bulk: a 500-page
//! document must not raster 500 thumbnails on open. Pages around the
//! current one are thumbnailed immediately; a bounded backlog fills in the
//! rest one page per idle opportunity. Thumbnail renders run through their
//! own task table so they never cancel or supersede full-page renders of
//! the same page.

use folio_model::{PageNumber, ViewerConfig};
use folio_scheduler::{IdleRunner, TaskTable, TaskTicket};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub struct ThumbnailVirtualizer {
    table: TaskTable<PageNumber>,
    done: HashSet<PageNumber>,
    backlog: IdleRunner<PageNumber>,
    queued: HashSet<PageNumber>,
    batch_radius: u32,
    idle_cap: usize,
    timeout: Duration,
}

impl ThumbnailVirtualizer {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            table: TaskTable::new(),
            done: HashSet::new(),
            backlog: IdleRunner::new(config.idle_fallback_delay),
            queued: HashSet::new(),
            batch_radius: config.thumbnail_batch_radius,
            idle_cap: config.thumbnail_idle_cap,
            timeout: config.render_timeout,
        }
    }

    /// Pages within the batch radius of `current` that still need a
    /// thumbnail, to be requested immediately.
    pub fn immediate_batch(&self, current: PageNumber, total: u32) -> Vec<PageNumber> {
        let start = current.saturating_sub(self.batch_radius).max(1);
        let end = current.saturating_add(self.batch_radius).min(total);
        (start..=end).filter(|page| self.needs_render(*page)).collect()
    }

    /// Queue idle-time backfill outward from `current`, nearest pages
    /// first, up to the backlog cap.
    pub fn fill_backlog(&mut self, current: PageNumber, total: u32) {
        let mut distance = self.batch_radius + 1;
        while self.backlog.len() < self.idle_cap {
            let above = current.checked_sub(distance).filter(|page| *page >= 1);
            let below = Some(current + distance).filter(|page| *page <= total);
            if above.is_none() && below.is_none() {
                break;
            }
            for page in below.into_iter().chain(above) {
                if self.backlog.len() >= self.idle_cap {
                    break;
                }
                if self.needs_render(page) && self.queued.insert(page) {
                    self.backlog.push(page);
                }
            }
            distance += 1;
        }
    }

    /// Next backfill page whose turn has come, if any.
    pub fn pop_idle(&mut self, now: Instant, host_idle: bool) -> Option<PageNumber> {
        loop {
            let page = self.backlog.pop_ready(now, host_idle)?;
            self.queued.remove(&page);
            if self.needs_render(page) {
                return Some(page);
            }
        }
    }

    pub fn begin(&mut self, page: PageNumber, now: Instant) -> TaskTicket<PageNumber> {
        self.table.begin(page, now)
    }

    /// Record a finished thumbnail render. Returns `false` for stale
    /// completions, which leave no trace.
    pub fn complete(&mut self, ticket: &TaskTicket<PageNumber>, ok: bool) -> bool {
        if !self.table.try_finish(ticket) {
            return false;
        }
        if ok {
            self.done.insert(*ticket.key());
        }
        ok
    }

    /// Cancel and forget every thumbnail render older than the timeout,
    /// re-queueing the affected pages for idle-time retry.
    pub fn sweep(&mut self, now: Instant) -> Vec<PageNumber> {
        let reaped = self.table.sweep(now, self.timeout);
        for page in &reaped {
            log::warn!("thumbnail timed out: page {page}");
            if self.queued.insert(*page) {
                self.backlog.push(*page);
            }
        }
        reaped
    }

    pub fn is_done(&self, page: PageNumber) -> bool {
        self.done.contains(&page)
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Cancel in-flight thumbnails and drop all state on document teardown.
    pub fn reset(&mut self) {
        self.table.cancel_all();
        self.done.clear();
        self.backlog.clear();
        self.queued.clear();
    }

    fn needs_render(&self, page: PageNumber) -> bool {
        !self.done.contains(&page) && !self.table.is_live(&page)
    }
}

/// Which thumbnail list items to mount for the current sidebar scroll
/// position, with spacer heights standing in for the rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailListWindow {
    pub first: PageNumber,
    pub last: PageNumber,
    pub top_spacer: f32,
    pub bottom_spacer: f32,
}

/// Pure windowing math for a fixed-item-height thumbnail list. `buffer`
/// extra items are mounted on each side of the visible range; documents at
/// or below `threshold` pages mount every item, mirroring the page window's
/// inactive mode.
pub fn thumbnail_list_window(
    scroll_offset: f32,
    viewport_height: f32,
    item_height: f32,
    total: u32,
    buffer: u32,
    threshold: u32,
) -> ThumbnailListWindow {
    if total == 0 || item_height <= 0.0 {
        return ThumbnailListWindow { first: 1, last: 0, top_spacer: 0.0, bottom_spacer: 0.0 };
    }
    if total <= threshold {
        return ThumbnailListWindow { first: 1, last: total, top_spacer: 0.0, bottom_spacer: 0.0 };
    }

    let first_visible = (scroll_offset / item_height).floor() as u32 + 1;
    let last_visible = ((scroll_offset + viewport_height) / item_height).ceil() as u32;

    let first = first_visible.saturating_sub(buffer).clamp(1, total);
    let last = last_visible.saturating_add(buffer).min(total);

    ThumbnailListWindow {
        first,
        last,
        top_spacer: (first - 1) as f32 * item_height,
        bottom_spacer: (total - last) as f32 * item_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn virtualizer() -> ThumbnailVirtualizer {
        ThumbnailVirtualizer::new(&ViewerConfig::default())
    }

    #[test]
    fn test_immediate_batch_surrounds_current_page() {
        let thumbs = virtualizer();
        assert_eq!(thumbs.immediate_batch(10, 50), vec![7, 8, 9, 10, 11, 12, 13]);
        // Clamped at the document edges.
        assert_eq!(thumbs.immediate_batch(1, 50), vec![1, 2, 3, 4]);
        assert_eq!(thumbs.immediate_batch(50, 50), vec![47, 48, 49, 50]);
    }

    #[test]
    fn test_backlog_is_capped_and_nearest_first() {
        let mut thumbs = virtualizer();
        thumbs.fill_backlog(1, 500);
        assert_eq!(thumbs.backlog_len(), 30);

        let now = Instant::now();
        assert_eq!(thumbs.pop_idle(now, true), Some(5));
        assert_eq!(thumbs.pop_idle(now, true), Some(6));
    }

    #[test]
    fn test_backlog_expands_in_both_directions() {
        let mut thumbs = virtualizer();
        thumbs.fill_backlog(100, 500);

        let now = Instant::now();
        assert_eq!(thumbs.pop_idle(now, true), Some(104));
        assert_eq!(thumbs.pop_idle(now, true), Some(96));
        assert_eq!(thumbs.pop_idle(now, true), Some(105));
        assert_eq!(thumbs.pop_idle(now, true), Some(95));
    }

    #[test]
    fn test_completed_pages_are_skipped() {
        let mut thumbs = virtualizer();
        let now = Instant::now();

        let ticket = thumbs.begin(4, now);
        assert!(thumbs.complete(&ticket, true));
        assert!(thumbs.is_done(4));

        assert!(!thumbs.immediate_batch(1, 50).contains(&4));
        thumbs.fill_backlog(1, 50);
        while let Some(page) = thumbs.pop_idle(now, true) {
            assert_ne!(page, 4);
        }
    }

    #[test]
    fn test_stalled_thumbnail_is_reaped_and_requeued() {
        let mut thumbs = virtualizer();
        let start = Instant::now();

        let stalled = thumbs.begin(5, start);
        assert!(!thumbs.immediate_batch(5, 50).contains(&5));

        assert!(thumbs.sweep(start + Duration::from_secs(5)).is_empty());
        let reaped = thumbs.sweep(start + Duration::from_secs(10));
        assert_eq!(reaped, vec![5]);
        assert!(stalled.token().is_cancelled());

        // The page is eligible again, via the backlog or a fresh batch.
        assert_eq!(thumbs.pop_idle(start + Duration::from_secs(10), true), Some(5));
        assert!(thumbs.immediate_batch(5, 50).contains(&5));

        // The reaped render's late completion is discarded.
        assert!(!thumbs.complete(&stalled, true));
        assert!(!thumbs.is_done(5));
    }

    #[test]
    fn test_stale_completion_leaves_no_trace() {
        let mut thumbs = virtualizer();
        let now = Instant::now();

        let old = thumbs.begin(4, now);
        let _new = thumbs.begin(4, now);
        assert!(!thumbs.complete(&old, true));
        assert!(!thumbs.is_done(4));
    }

    #[test]
    fn test_idle_pacing_without_host_signal() {
        let mut thumbs = virtualizer();
        thumbs.fill_backlog(1, 50);
        let start = Instant::now();

        assert!(thumbs.pop_idle(start, false).is_some());
        assert!(thumbs.pop_idle(start + Duration::from_millis(10), false).is_none());
        assert!(thumbs.pop_idle(start + Duration::from_millis(32), false).is_some());
    }

    #[test]
    fn test_list_window_mounts_visible_plus_buffer() {
        let window = thumbnail_list_window(1000.0, 600.0, 100.0, 500, 4, 30);
        // Visible items 11..=16, plus 4 on each side.
        assert_eq!((window.first, window.last), (7, 20));
        assert_eq!(window.top_spacer, 600.0);
        assert_eq!(window.bottom_spacer, 48_000.0);
    }

    #[test]
    fn test_list_window_clamps_at_edges() {
        let top = thumbnail_list_window(0.0, 600.0, 100.0, 500, 4, 30);
        assert_eq!((top.first, top.last), (1, 10));
        assert_eq!(top.top_spacer, 0.0);

        let bottom = thumbnail_list_window(49_400.0, 600.0, 100.0, 500, 4, 30);
        assert_eq!((bottom.first, bottom.last), (491, 500));
        assert_eq!(bottom.bottom_spacer, 0.0);
    }

    #[test]
    fn test_small_lists_mount_every_item() {
        // 25 items at 100px each, viewport showing only 6: still all mounted.
        let window = thumbnail_list_window(1000.0, 600.0, 100.0, 25, 4, 30);
        assert_eq!((window.first, window.last), (1, 25));
        assert_eq!((window.top_spacer, window.bottom_spacer), (0.0, 0.0));

        // One past the threshold windows again.
        let windowed = thumbnail_list_window(1000.0, 600.0, 100.0, 31, 4, 30);
        assert!(windowed.first > 1);
    }
}
