//! Debounced, case-insensitive search over extracted page text.
//!
//! The index is rebuilt from whatever text has been extracted so far, which
//! means results over a partially rendered document are intentionally
//! best-effort: pages render lazily, and waiting for every page before
//! answering would make search useless on large documents. When a page
//! renders after a query committed, its matches are spliced in without a
//! full rebuild.

use folio_model::{PageNumber, PageText, SearchMatch};
use folio_scheduler::Debouncer;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Match count and position for the host's "n of m" indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchStatus {
    /// Zero-based index of the selected match, `None` with no matches.
    pub current: Option<usize>,
    pub total: usize,
}

#[derive(Debug)]
pub struct SearchIndex {
    query: String,
    /// Lowercased needle of the last committed (debounce-fired) query.
    committed: Option<String>,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
    debounce: Debouncer,
}

impl SearchIndex {
    pub fn new(debounce: Duration) -> Self {
        Self {
            query: String::new(),
            committed: None,
            matches: Vec::new(),
            current: None,
            debounce: Debouncer::new(debounce),
        }
    }

    /// Record a query edit. Non-empty queries commit after the debounce
    /// delay via [`SearchIndex::poll`]; clearing the query takes effect
    /// immediately and returns `true`.
    pub fn set_query(&mut self, query: &str, now: Instant) -> bool {
        self.query = query.to_owned();
        if query.is_empty() {
            self.debounce.cancel();
            self.committed = None;
            self.matches.clear();
            self.current = None;
            true
        } else {
            self.debounce.trigger(now);
            false
        }
    }

    /// Rebuild the index once the debounce fires. Returns `true` when a
    /// rebuild happened.
    pub fn poll(&mut self, now: Instant, text_store: &HashMap<PageNumber, PageText>) -> bool {
        if !self.debounce.fire_if_due(now) {
            return false;
        }

        let needle = self.query.to_lowercase();
        let mut matches = Vec::new();
        for (&page, text) in text_store {
            matches.extend(scan_page(page, text, &needle));
        }
        matches.sort_unstable();

        log::debug!("search committed: {} matches for {:?}", matches.len(), self.query);
        self.current = if matches.is_empty() { None } else { Some(0) };
        self.matches = matches;
        self.committed = Some(needle);
        true
    }

    /// Splice in matches from a page that rendered after the query
    /// committed. Keeps the selected match selected when it survives.
    /// Returns `true` when the match set changed.
    pub fn on_page_rendered(&mut self, page: PageNumber, text: &PageText) -> bool {
        let Some(needle) = self.committed.clone() else {
            return false;
        };

        let selected = self.current.map(|index| self.matches[index]);
        let before = self.matches.len();
        self.matches.retain(|found| found.page != page);
        let removed = before - self.matches.len();

        let added = scan_page(page, text, &needle);
        if removed == 0 && added.is_empty() {
            return false;
        }
        self.matches.extend(added);
        self.matches.sort_unstable();

        self.current = selected
            .and_then(|found| self.matches.binary_search(&found).ok())
            .or_else(|| if self.matches.is_empty() { None } else { Some(0) });
        true
    }

    /// Advance to the next match, wrapping at the end.
    pub fn next(&mut self) -> Option<SearchMatch> {
        let current = self.current?;
        let next = (current + 1) % self.matches.len();
        self.current = Some(next);
        Some(self.matches[next])
    }

    /// Step back to the previous match, wrapping at the start.
    pub fn previous(&mut self) -> Option<SearchMatch> {
        let current = self.current?;
        let previous = (current + self.matches.len() - 1) % self.matches.len();
        self.current = Some(previous);
        Some(self.matches[previous])
    }

    pub fn current_match(&self) -> Option<SearchMatch> {
        self.current.map(|index| self.matches[index])
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus { current: self.current, total: self.matches.len() }
    }

    /// Matches on `page`, in document order, for highlight painting.
    pub fn matches_for_page(&self, page: PageNumber) -> Vec<SearchMatch> {
        self.matches.iter().filter(|found| found.page == page).copied().collect()
    }

    pub fn has_committed_query(&self) -> bool {
        self.committed.is_some()
    }
}

/// Non-overlapping, case-insensitive occurrences of `needle` in one page's
/// fragments. Offsets index into the lowercased fragment text.
fn scan_page(page: PageNumber, text: &PageText, needle: &str) -> Vec<SearchMatch> {
    let mut matches = Vec::new();
    if needle.is_empty() {
        return matches;
    }

    for (fragment, run) in text.iter().enumerate() {
        let haystack = run.text.to_lowercase();
        let mut from = 0;
        while let Some(found) = haystack[from..].find(needle) {
            let offset = from + found;
            matches.push(SearchMatch { page, fragment, offset, len: needle.len() });
            from = offset + needle.len();
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::TextFragment;

    const DEBOUNCE: Duration = Duration::from_millis(150);

    fn store(pages: &[(PageNumber, &[&str])]) -> HashMap<PageNumber, PageText> {
        pages
            .iter()
            .map(|(page, fragments)| {
                (*page, fragments.iter().map(|s| TextFragment::new(*s)).collect())
            })
            .collect()
    }

    fn committed_index(store: &HashMap<PageNumber, PageText>, query: &str) -> SearchIndex {
        let mut index = SearchIndex::new(DEBOUNCE);
        let start = Instant::now();
        index.set_query(query, start);
        assert!(index.poll(start + DEBOUNCE, store));
        index
    }

    #[test]
    fn test_case_insensitive_matches_across_pages() {
        let store = store(&[(1, &["The cat sat on the mat"]), (2, &["bathed in light"])]);
        let index = committed_index(&store, "the");

        let status = index.status();
        assert_eq!(status.total, 3);
        assert_eq!(status.current, Some(0));

        assert_eq!(
            index.matches_for_page(1),
            vec![
                SearchMatch { page: 1, fragment: 0, offset: 0, len: 3 },
                SearchMatch { page: 1, fragment: 0, offset: 15, len: 3 },
            ]
        );
        // "bathed" contains an embedded occurrence.
        assert_eq!(
            index.matches_for_page(2),
            vec![SearchMatch { page: 2, fragment: 0, offset: 2, len: 3 }]
        );
    }

    #[test]
    fn test_matches_sort_by_page_then_fragment_then_offset() {
        let store = store(&[(1, &["The cat", "the mat"]), (2, &["bathed"])]);
        let index = committed_index(&store, "the");

        let all: Vec<SearchMatch> =
            (1..=2).flat_map(|page| index.matches_for_page(page)).collect();
        assert_eq!(
            all,
            vec![
                SearchMatch { page: 1, fragment: 0, offset: 0, len: 3 },
                SearchMatch { page: 1, fragment: 1, offset: 0, len: 3 },
                SearchMatch { page: 2, fragment: 0, offset: 2, len: 3 },
            ]
        );
    }

    #[test]
    fn test_matches_are_non_overlapping() {
        let store = store(&[(1, &["aaaa"])]);
        let index = committed_index(&store, "aa");
        assert_eq!(index.status().total, 2);
    }

    #[test]
    fn test_rebuild_waits_for_debounce() {
        let store = store(&[(1, &["needle"])]);
        let mut index = SearchIndex::new(DEBOUNCE);
        let start = Instant::now();

        index.set_query("need", start);
        assert!(!index.poll(start + Duration::from_millis(100), &store));
        // A later edit pushes the deadline out.
        index.set_query("needle", start + Duration::from_millis(100));
        assert!(!index.poll(start + Duration::from_millis(150), &store));
        assert!(index.poll(start + Duration::from_millis(250), &store));
        assert_eq!(index.status().total, 1);
    }

    #[test]
    fn test_clearing_query_takes_effect_immediately() {
        let store = store(&[(1, &["needle"])]);
        let mut index = committed_index(&store, "needle");
        assert_eq!(index.status().total, 1);

        assert!(index.set_query("", Instant::now()));
        assert_eq!(index.status(), MatchStatus { current: None, total: 0 });
        assert!(!index.has_committed_query());
        // Nothing left to fire later.
        assert!(!index.poll(Instant::now() + DEBOUNCE, &store));
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let store = store(&[(1, &["the cat, the mat, the hat"])]);
        let mut index = committed_index(&store, "the");
        assert_eq!(index.status().current, Some(0));

        index.next();
        index.next();
        assert_eq!(index.status().current, Some(2));
        index.next();
        assert_eq!(index.status().current, Some(0));

        index.previous();
        assert_eq!(index.status().current, Some(2));
    }

    #[test]
    fn test_navigation_with_no_matches_is_noop() {
        let store = store(&[(1, &["nothing here"])]);
        let mut index = committed_index(&store, "zebra");
        assert_eq!(index.next(), None);
        assert_eq!(index.previous(), None);
    }

    #[test]
    fn test_late_rendered_page_splices_in() {
        let store = store(&[(2, &["the mat"])]);
        let mut index = committed_index(&store, "the");
        assert_eq!(index.status().total, 1);

        let page_one: PageText = vec![TextFragment::new("The cat")];
        assert!(index.on_page_rendered(1, &page_one));

        let status = index.status();
        assert_eq!(status.total, 2);
        // Matches stay in document order after the splice.
        assert_eq!(index.matches_for_page(1).len(), 1);
        assert_eq!(index.current_match().unwrap().page, 2);
    }

    #[test]
    fn test_splice_preserves_selected_match() {
        let store = store(&[(3, &["the end"])]);
        let mut index = committed_index(&store, "the");
        let selected = index.current_match().unwrap();
        assert_eq!(selected.page, 3);

        index.on_page_rendered(1, &vec![TextFragment::new("the start")]);
        assert_eq!(index.current_match().unwrap(), selected);
        // The earlier page's match now precedes the selection.
        assert_eq!(index.status().current, Some(1));
    }

    #[test]
    fn test_splice_without_query_is_noop() {
        let mut index = SearchIndex::new(DEBOUNCE);
        assert!(!index.on_page_rendered(1, &vec![TextFragment::new("text")]));
    }
}
