//! Headless coordination core for a paginated document viewer.
//!
//! This crate owns the decisions a document viewer has to get right under
//! concurrency: which page is current, which pages are materialized, which
//! renders are in flight, and which completions are stale. It owns no threads
//! and draws no pixels. The host drives it by forwarding input (visibility
//! ratios, navigation requests, search queries), executing the [`RenderJob`]s
//! it hands out, and calling [`Viewer::tick`] with the current instant.
//!
//! All outcomes surface as [`ViewerEvent`]s drained from `tick` or
//! [`Viewer::take_events`], so the host's rendering layer stays a pure
//! function of the events it has seen.

pub mod layout;
pub mod nav;
pub mod render;
pub mod search;
pub mod thumbs;
pub mod viewer;
pub mod visibility;

pub use layout::{fit_page_scale, fit_width_scale, PageLayout, WindowPolicy};
pub use nav::{Navigator, ScrollCommand};
pub use render::{RenderJob, RenderKind, RenderOutcome, RenderScheduler};
pub use search::{MatchStatus, SearchIndex};
pub use thumbs::{thumbnail_list_window, ThumbnailListWindow, ThumbnailVirtualizer};
pub use viewer::{Viewer, ViewerEvent};
pub use visibility::{VisibilityTracker, VISIBILITY_THRESHOLDS};
