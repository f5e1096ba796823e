//! Virtual window computation and page layout geometry.
//!
//! Large documents never materialize every page. The window policy picks the
//! contiguous range around the current page worth keeping in the layout; the
//! page layout turns that range into pixel offsets and spacer heights so the
//! scrollbar still reflects the full document.

use folio_model::{PageNumber, PageSize, Rotation, ViewerConfig, VirtualWindow};

/// When and how wide to window.
#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    threshold: u32,
    before: u32,
    after: u32,
}

impl WindowPolicy {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            threshold: config.window_threshold,
            before: config.window_before,
            after: config.window_after,
        }
    }

    /// The range to materialize for `current` in a `total`-page document.
    ///
    /// Documents at or under the threshold stay fully materialized. An
    /// in-flight navigation target widens the range so the target exists in
    /// the layout before the scroll lands on it.
    pub fn compute(
        &self,
        current: PageNumber,
        total: u32,
        pending_target: Option<PageNumber>,
    ) -> VirtualWindow {
        if total <= self.threshold {
            return VirtualWindow::inactive(total);
        }

        let mut start = current.saturating_sub(self.before).max(1);
        let mut end = current.saturating_add(self.after).min(total);
        if let Some(target) = pending_target {
            let target = target.clamp(1, total);
            start = start.min(target);
            end = end.max(target);
        }

        VirtualWindow { start, end, active: true }
    }
}

/// Vertical geometry of the page stack at the current scale and rotation.
#[derive(Debug, Clone)]
pub struct PageLayout {
    heights: Vec<f32>,
    spacing: f32,
}

impl PageLayout {
    /// Layout for a document whose pages all share one base size.
    pub fn uniform(base: PageSize, scale: f32, rotation: Rotation, total: u32, spacing: f32) -> Self {
        let height = base.scaled(scale).oriented(rotation).height;
        Self { heights: vec![height; total as usize], spacing }
    }

    pub fn page_count(&self) -> u32 {
        self.heights.len() as u32
    }

    pub fn slot_height(&self, page: PageNumber) -> f32 {
        self.heights.get(page.saturating_sub(1) as usize).copied().unwrap_or(0.0)
    }

    /// Distance from the top of the document to the top edge of `page`.
    pub fn offset_of(&self, page: PageNumber) -> f32 {
        let before = page.saturating_sub(1) as usize;
        self.heights
            .iter()
            .take(before)
            .map(|height| height + self.spacing)
            .sum()
    }

    pub fn total_height(&self) -> f32 {
        self.offset_of(self.page_count() + 1)
    }

    /// Heights of the spacers standing in for the pages excluded above and
    /// below the window. Zero for an inactive window.
    pub fn spacers(&self, window: &VirtualWindow) -> (f32, f32) {
        let top = self.offset_of(window.start);
        let bottom = self.total_height() - self.offset_of(window.end + 1);
        (top, bottom.max(0.0))
    }
}

/// Scale that fits the page's oriented width into the container width.
pub fn fit_width_scale(container_width: f32, base: PageSize, rotation: Rotation) -> f32 {
    let oriented = base.oriented(rotation);
    if oriented.width <= 0.0 {
        return 1.0;
    }
    container_width / oriented.width
}

/// Scale that fits the whole oriented page inside the container.
pub fn fit_page_scale(container: PageSize, base: PageSize, rotation: Rotation) -> f32 {
    let oriented = base.oriented(rotation);
    if oriented.width <= 0.0 || oriented.height <= 0.0 {
        return 1.0;
    }
    (container.width / oriented.width).min(container.height / oriented.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> WindowPolicy {
        WindowPolicy::new(&ViewerConfig::default())
    }

    #[test]
    fn test_window_inactive_at_or_under_threshold() {
        let window = policy().compute(10, 25, None);
        assert!(!window.active);
        assert_eq!((window.start, window.end), (1, 25));

        assert!(!policy().compute(10, 30, None).active);
        assert!(policy().compute(10, 31, None).active);
    }

    #[test]
    fn test_window_buffers_around_current() {
        let window = policy().compute(100, 200, None);
        assert!(window.active);
        assert_eq!((window.start, window.end), (95, 108));
    }

    #[test]
    fn test_window_clamps_at_document_edges() {
        let start = policy().compute(2, 200, None);
        assert_eq!((start.start, start.end), (1, 10));

        let end = policy().compute(199, 200, None);
        assert_eq!((end.start, end.end), (194, 200));
    }

    #[test]
    fn test_window_widens_to_pending_target() {
        let window = policy().compute(100, 200, Some(150));
        assert_eq!((window.start, window.end), (95, 150));

        let back = policy().compute(100, 200, Some(3));
        assert_eq!((back.start, back.end), (3, 108));
    }

    #[test]
    fn test_layout_offsets_and_spacers() {
        let layout = PageLayout::uniform(PageSize::new(200.0, 100.0), 1.0, Rotation::Deg0, 10, 16.0);

        assert_eq!(layout.offset_of(1), 0.0);
        assert_eq!(layout.offset_of(5), 4.0 * 116.0);
        assert_eq!(layout.total_height(), 10.0 * 116.0);

        let window = VirtualWindow { start: 3, end: 7, active: true };
        let (top, bottom) = layout.spacers(&window);
        assert_eq!(top, 2.0 * 116.0);
        assert_eq!(bottom, 3.0 * 116.0);
    }

    #[test]
    fn test_inactive_window_has_zero_spacers() {
        let layout = PageLayout::uniform(PageSize::new(200.0, 100.0), 1.0, Rotation::Deg0, 10, 16.0);
        let (top, bottom) = layout.spacers(&VirtualWindow::inactive(10));
        assert_eq!((top, bottom), (0.0, 0.0));
    }

    #[test]
    fn test_rotation_swaps_fit_axes() {
        let base = PageSize::new(612.0, 792.0);
        let upright = fit_width_scale(612.0, base, Rotation::Deg0);
        let turned = fit_width_scale(612.0, base, Rotation::Deg90);

        assert!((upright - 1.0).abs() < 1e-6);
        assert!((turned - 612.0 / 792.0).abs() < 1e-6);

        let container = PageSize::new(612.0, 792.0);
        let fit = fit_page_scale(container, base, Rotation::Deg90);
        assert!((fit - 612.0 / 792.0).abs() < 1e-6);
    }

    #[test]
    fn test_layout_tracks_scale_and_rotation() {
        let base = PageSize::new(200.0, 100.0);
        let upright = PageLayout::uniform(base, 2.0, Rotation::Deg0, 3, 0.0);
        assert_eq!(upright.slot_height(1), 200.0);

        let turned = PageLayout::uniform(base, 2.0, Rotation::Deg90, 3, 0.0);
        assert_eq!(turned.slot_height(1), 400.0);
    }
}
