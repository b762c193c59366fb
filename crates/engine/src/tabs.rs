//! Tab attention aggregator.
//!
//! Maps browser tab lifecycle events to visit-duration samples. Purely
//! in-memory; nothing here is ever persisted. The aggregator only emits
//! samples — the caller feeds them to the attention tracker.

use std::collections::HashMap;

use tally_types::TabSnapshot;

/// A completed attention span on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitSample {
    pub snapshot: TabSnapshot,
    pub duration: u64,
}

#[derive(Default)]
pub struct TabTracker {
    current_pages: HashMap<u32, TabSnapshot>,
    last_shown_tab_id: Option<u32>,
    /// Host clock value when the shown tab last became active; 0 while
    /// no span is open.
    last_active_time: u64,
}

impl TabTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page finished loading in a tab. Same-domain refreshes are
    /// ignored so a reload does not restart the attention span.
    pub fn on_load(&mut self, snapshot: TabSnapshot, now: u64) {
        if snapshot.domain.is_empty() {
            return;
        }
        if let Some(current) = self.current_pages.get(&snapshot.tab_id) {
            if current.domain == snapshot.domain {
                return;
            }
        }
        if self.last_shown_tab_id == Some(snapshot.tab_id) {
            self.last_active_time = now;
        }
        self.current_pages.insert(snapshot.tab_id, snapshot);
    }

    /// A tab became the visible one.
    pub fn on_show(&mut self, tab_id: u32, now: u64) {
        self.last_shown_tab_id = Some(tab_id);
        self.last_active_time = now;
    }

    /// A tab stopped being visible; closes the open span, if any.
    pub fn on_hide(&mut self, tab_id: u32, now: u64) -> Option<VisitSample> {
        if self.last_shown_tab_id != Some(tab_id) || self.last_active_time == 0 {
            return None;
        }
        let snapshot = self.current_pages.get(&tab_id)?.clone();
        let duration = now.saturating_sub(self.last_active_time);
        self.last_active_time = 0;
        Some(VisitSample { snapshot, duration })
    }

    /// A tab went away entirely.
    pub fn on_unload(&mut self, tab_id: u32, now: u64) -> Option<VisitSample> {
        let sample = self.on_hide(tab_id, now);
        self.current_pages.remove(&tab_id);
        sample
    }

    /// The browser returned to the foreground.
    pub fn on_foreground(&mut self, tab_id: u32, now: u64) {
        if self.last_shown_tab_id != Some(tab_id) {
            return;
        }
        self.on_show(tab_id, now);
    }

    /// The browser went to the background.
    pub fn on_background(&mut self, tab_id: u32, now: u64) -> Option<VisitSample> {
        self.on_hide(tab_id, now)
    }

    pub fn page_count(&self) -> usize {
        self.current_pages.len()
    }
}
