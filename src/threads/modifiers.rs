//! Derived list state: pagination window, selection summary, mode flags.

use serde::Deserialize;

use crate::constants::PAGE_SIZE;
use crate::state::ThreadArea;

/// Moderation counters the list endpoint attaches to every response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Alerts {
    #[serde(default)]
    pub groups_to_mod: u32,
    #[serde(default)]
    pub messages_to_mod: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Paginator {
    #[serde(default)]
    pub total_threads: u32,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub has_other_pages: bool,
}

/// Live selection figures the modifiers are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    pub selected: usize,
    pub loaded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadListModifiers {
    pub alerts: Alerts,
    pub paginator: Paginator,
    pub start: u32,
    pub end: u32,
    pub prev: bool,
    pub next: bool,
    pub area: String,
    pub archive: bool,
    pub unselect: bool,
    pub num_selected: Option<usize>,
    pub all_mode: bool,
    /// Set by "select every page"; dropped by the next plain selection change
    all_mode_requested: bool,
}

impl Default for ThreadListModifiers {
    fn default() -> Self {
        Self::new(ThreadArea::INBOX)
    }
}

impl ThreadListModifiers {
    pub fn new(area: &str) -> Self {
        let mut modifiers = Self {
            alerts: Alerts::default(),
            paginator: Paginator::default(),
            start: 1,
            end: 0,
            prev: false,
            next: false,
            area: area.to_string(),
            archive: area == ThreadArea::ARCHIVE,
            unselect: false,
            num_selected: None,
            all_mode: false,
            all_mode_requested: false,
        };
        modifiers.update(area, SelectionSummary::default());
        modifiers
    }

    pub fn total_threads(&self) -> u32 {
        self.paginator.total_threads
    }

    /// Merge the server's alert and paginator blocks, then recompute.
    pub fn apply_response(
        &mut self,
        alerts: Alerts,
        paginator: Paginator,
        area: &str,
        selection: SelectionSummary,
    ) {
        self.alerts = alerts;
        self.paginator = paginator;
        self.update(area, selection);
    }

    /// A plain selection change cancels an explicit all-pages request.
    pub fn selection_changed(&mut self, area: &str, selection: SelectionSummary) {
        self.all_mode_requested = false;
        self.update(area, selection);
    }

    /// Treat the selection as covering every thread on every page.
    pub fn request_all_mode(&mut self, area: &str, selection: SelectionSummary) {
        self.all_mode_requested = true;
        self.update(area, selection);
    }

    pub fn update(&mut self, area: &str, selection: SelectionSummary) {
        let total = self.paginator.total_threads;
        let page = u64::from(self.paginator.page_number.max(1));
        let size = u64::from(PAGE_SIZE);

        // page_number is unchecked server input
        self.end = (page * size).min(u64::from(total)) as u32;
        self.start = if total == 0 || page == 1 {
            1
        } else {
            ((page - 1) * size).min(u64::from(total)) as u32
        };
        self.prev = self.start > 1;
        self.next = total > self.end;
        self.area = area.to_string();
        self.archive = area == ThreadArea::ARCHIVE;

        if selection.selected > 0 {
            self.unselect = selection.selected == selection.loaded;
            self.all_mode =
                self.all_mode_requested || selection.selected == total as usize;
            self.num_selected = Some(if self.all_mode_requested {
                total as usize
            } else {
                selection.selected
            });
        } else {
            self.unselect = false;
            self.all_mode = false;
            self.num_selected = None;
        }
    }
}
