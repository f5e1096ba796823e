//! Navigation state machine.
//!
//! A programmatic jump cannot scroll immediately: the target page may not be
//! materialized yet, and the scroll itself fires visibility signals that
//! must not be mistaken for the user changing pages. The navigator holds a
//! small state machine (idle, navigating while the target waits to exist in
//! the layout, settling once the scroll is issued), and the viewer only lets
//! visibility drive the current page while it is idle.

use folio_model::PageNumber;
use std::time::{Duration, Instant};

/// Scroll the container to this offset, unanimated. Instant scrolls keep the
/// settle window honest; a smooth scroll would still be emitting visibility
/// signals when it closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCommand {
    pub offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Navigating(PageNumber),
    Settling(Instant),
}

#[derive(Debug)]
pub struct Navigator {
    phase: Phase,
    settle_delay: Duration,
    top_padding: f32,
}

impl Navigator {
    pub fn new(settle_delay: Duration, top_padding: f32) -> Self {
        Self { phase: Phase::Idle, settle_delay, top_padding }
    }

    /// Begin navigating to `target`, clamped into the document. Returns the
    /// clamped target. Supersedes any navigation already in flight.
    pub fn go_to(&mut self, target: PageNumber, total: u32) -> PageNumber {
        let clamped = target.clamp(1, total.max(1));
        self.phase = Phase::Navigating(clamped);
        clamped
    }

    /// Target of the navigation still waiting for its scroll, if any.
    pub fn pending_target(&self) -> Option<PageNumber> {
        match self.phase {
            Phase::Navigating(target) => Some(target),
            _ => None,
        }
    }

    /// Issue the scroll for the pending target, whose top edge sits at
    /// `target_offset` in the materialized layout. Enters the settle window.
    pub fn begin_scroll(&mut self, target_offset: f32, now: Instant) -> ScrollCommand {
        self.phase = Phase::Settling(now + self.settle_delay);
        ScrollCommand { offset: (target_offset - self.top_padding).max(0.0) }
    }

    /// Advance the settle window. Returns `true` on the poll that closes it.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Phase::Settling(until) = self.phase {
            if now >= until {
                self.phase = Phase::Idle;
                return true;
            }
        }
        false
    }

    /// Whether visibility signals may drive the current page.
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn navigator() -> Navigator {
        Navigator::new(Duration::from_millis(100), 20.0)
    }

    #[test]
    fn test_go_to_clamps_target() {
        let mut nav = navigator();
        assert_eq!(nav.go_to(500, 200), 200);
        assert_eq!(nav.go_to(0, 200), 1);
        assert_eq!(nav.go_to(42, 200), 42);
    }

    #[test]
    fn test_full_navigation_cycle() {
        let mut nav = navigator();
        let start = Instant::now();

        assert!(nav.is_idle());
        nav.go_to(42, 200);
        assert!(!nav.is_idle());
        assert_eq!(nav.pending_target(), Some(42));

        let command = nav.begin_scroll(464.0, start);
        assert_eq!(command.offset, 444.0);
        assert_eq!(nav.pending_target(), None);
        assert!(!nav.is_idle());

        assert!(!nav.poll(start + Duration::from_millis(99)));
        assert!(nav.poll(start + Duration::from_millis(100)));
        assert!(nav.is_idle());
        // Settled transition reports once.
        assert!(!nav.poll(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_scroll_offset_clamps_at_document_top() {
        let mut nav = navigator();
        nav.go_to(1, 200);
        let command = nav.begin_scroll(0.0, Instant::now());
        assert_eq!(command.offset, 0.0);
    }

    #[test]
    fn test_new_navigation_supersedes_pending_one() {
        let mut nav = navigator();
        nav.go_to(42, 200);
        nav.go_to(7, 200);
        assert_eq!(nav.pending_target(), Some(7));
    }
}
