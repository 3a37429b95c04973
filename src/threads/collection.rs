//! Server-backed, paginated thread list.
//!
//! Refreshes are two-phase: `begin_fetch` snapshots the query and hands out
//! a `FetchTicket`, `complete_fetch` applies the response only if no newer
//! ticket has been issued since. Debouncing is a deadline the controller
//! polls, so several state changes in one transition cost a single request.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::select::{ActiveSet, SelectionChange};
use crate::state::{Group, NavigationState, ThreadArea};

use super::model::{Thread, ThreadId};
use super::modifiers::{Alerts, Paginator, SelectionSummary, ThreadListModifiers};

/// Body of `GET <threads>?<query>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadsPayload {
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub alerts: Alerts,
    #[serde(default)]
    pub paginator: Paginator,
}

/// Handle for one in-flight list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub query: String,
    /// Plain re-fetches of the same query keep the user's row selection
    pub keep_selection: bool,
}

#[derive(Debug)]
pub struct ThreadCollection {
    threads: ActiveSet<Thread>,
    modifiers: ThreadListModifiers,
    query: String,
    title: String,
    /// Last issued ticket generation
    generation: u64,
    listening_to_badge: bool,
    pending_refresh: Option<Instant>,
    debounce: Duration,
    loading: bool,
}

impl ThreadCollection {
    pub fn new(state: &NavigationState, groups: &ActiveSet<Group>, debounce: Duration) -> Self {
        Self {
            threads: ActiveSet::multi(),
            modifiers: ThreadListModifiers::new(state.area_name()),
            query: state.query(),
            title: state.title(groups),
            generation: 0,
            listening_to_badge: state.is_area(ThreadArea::INBOX),
            pending_refresh: None,
            debounce,
            loading: false,
        }
    }

    pub fn threads(&self) -> &ActiveSet<Thread> {
        &self.threads
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn modifiers(&self) -> &ThreadListModifiers {
        &self.modifiers
    }

    /// Query of the most recently issued request.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether badge "count increased" notifications should trigger a re-fetch.
    pub fn listens_to_badge(&self) -> bool {
        self.listening_to_badge
    }

    /// Push the refresh deadline out to `now + debounce`.
    pub fn schedule_refresh(&mut self, now: Instant) {
        self.pending_refresh = Some(now + self.debounce);
    }

    pub fn refresh_pending(&self) -> bool {
        self.pending_refresh.is_some()
    }

    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.pending_refresh
    }

    pub fn refresh_due(&self, now: Instant) -> bool {
        self.pending_refresh.is_some_and(|deadline| now >= deadline)
    }

    /// Start a refresh for the current navigation state.
    ///
    /// Rows are deselected and the title recomputed up front so the visible
    /// heading already names the requested area while the request is out.
    pub fn begin_fetch(&mut self, state: &NavigationState, groups: &ActiveSet<Group>) -> FetchTicket {
        self.threads.deactivate();
        self.title = state.title(groups);
        self.listening_to_badge = state.is_area(ThreadArea::INBOX);
        self.query = state.query();
        self.pending_refresh = None;
        self.modifiers
            .selection_changed(state.area_name(), self.selection());
        self.issue(false)
    }

    /// Re-fetch the current query without touching selection or title.
    pub fn begin_refetch(&mut self) -> FetchTicket {
        self.issue(true)
    }

    /// Apply a list response, unless a newer request has been issued since.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        payload: ThreadsPayload,
        state: &NavigationState,
    ) -> Result<()> {
        if ticket.generation < self.generation {
            tracing::debug!(
                "Discarding threads for {:?} (generation {} < {})",
                ticket.query,
                ticket.generation,
                self.generation
            );
            return Err(Error::StaleResponse {
                generation: ticket.generation,
                latest: self.generation,
            });
        }

        let kept = if ticket.keep_selection {
            self.threads.active_keys()
        } else {
            Vec::new()
        };
        self.threads.replace(payload.threads);
        for id in &kept {
            if self.threads.contains(id) {
                self.threads.select(id)?;
            }
        }
        self.loading = false;

        let selection = self.selection();
        self.modifiers
            .apply_response(payload.alerts, payload.paginator, state.area_name(), selection);
        tracing::debug!(
            "Loaded {} threads for {:?} ({} total)",
            self.threads.len(),
            ticket.query,
            self.modifiers.total_threads()
        );
        Ok(())
    }

    /// The request behind `ticket` failed; stop showing it as loading if it is current.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket) {
        if ticket.generation == self.generation {
            self.loading = false;
        }
    }

    /// Recompute derived list state after a navigation change.
    pub fn on_state_changed(&mut self, state: &NavigationState) {
        let selection = self.selection();
        self.modifiers.update(state.area_name(), selection);
    }

    /// Toggle one row's checkbox.
    pub fn toggle(&mut self, id: ThreadId, state: &NavigationState) -> Result<SelectionChange> {
        let change = self.threads.change_active(&id)?;
        self.selection_changed(state);
        Ok(change)
    }

    pub fn select_all(&mut self, state: &NavigationState) -> Result<()> {
        self.threads.set_all(true)?;
        self.selection_changed(state);
        Ok(())
    }

    pub fn unselect_all(&mut self, state: &NavigationState) {
        self.threads.deactivate();
        self.selection_changed(state);
    }

    /// Extend the current selection to every thread on every page.
    pub fn request_all_mode(&mut self, state: &NavigationState) {
        let selection = self.selection();
        self.modifiers.request_all_mode(state.area_name(), selection);
    }

    pub fn selected_ids(&self) -> Vec<ThreadId> {
        self.threads.active_keys()
    }

    /// Selected ids as the comma separated `id` query parameter.
    pub fn selected_ids_param(&self) -> String {
        self.selected_ids()
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Mark one row read locally. Returns how many unread messages it had.
    pub fn mark_read(&mut self, id: ThreadId) -> Option<u32> {
        let thread = self.threads.get_mut(&id)?;
        let unread = thread.unread_messages;
        thread.read = true;
        thread.unread_messages = 0;
        Some(unread)
    }

    pub fn mark_all_read(&mut self) {
        for thread in self.threads.items_mut() {
            thread.read = true;
            thread.unread_messages = 0;
        }
    }

    pub fn remove(&mut self, id: ThreadId, state: &NavigationState) -> Option<Thread> {
        let removed = self.threads.remove(&id);
        if removed.is_some() {
            self.selection_changed(state);
        }
        removed
    }

    /// Drop every row (after archiving all threads of the area).
    pub fn clear(&mut self, state: &NavigationState) {
        self.threads.replace(Vec::new());
        self.selection_changed(state);
    }

    fn issue(&mut self, keep_selection: bool) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            generation: self.generation,
            query: self.query.clone(),
            keep_selection,
        }
    }

    fn selection_changed(&mut self, state: &NavigationState) {
        let selection = self.selection();
        self.modifiers.selection_changed(state.area_name(), selection);
    }

    fn selection(&self) -> SelectionSummary {
        SelectionSummary {
            selected: self.threads.active_count(),
            loaded: self.threads.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(ids: &[ThreadId], total: u32) -> ThreadsPayload {
        ThreadsPayload {
            threads: ids
                .iter()
                .map(|&id| Thread::new(id, format!("Thread {}", id)))
                .collect(),
            alerts: Alerts::default(),
            paginator: Paginator {
                total_threads: total,
                page_number: 1,
                total_pages: 1,
                has_other_pages: false,
            },
        }
    }

    fn setup() -> (ActiveSet<ThreadArea>, ActiveSet<Group>, NavigationState) {
        let areas = ThreadArea::defaults();
        let groups = Group::groups(vec![Group::new(1, "Cats Group"), Group::new(2, "Dogs group")]);
        let state = NavigationState::from_selection(&areas, &groups);
        (areas, groups, state)
    }

    #[test]
    fn test_query_follows_state() {
        let (mut areas, mut groups, mut state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        assert_eq!(coll.query(), "?status=active&page=1");

        areas.change_active(&"Archive".to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        coll.begin_fetch(&state, &groups);
        assert_eq!(coll.query(), "?status=archived&page=1");

        state.update_page(4);
        coll.begin_fetch(&state, &groups);
        assert_eq!(coll.query(), "?status=archived&page=5");

        groups.change_active(&1).unwrap();
        state.on_group_changed(&groups);
        let ticket = coll.begin_fetch(&state, &groups);
        assert_eq!(ticket.query, "?status=archived&group=1&page=1");
        assert_eq!(coll.title(), "Cats Group in Archive");
    }

    #[test]
    fn test_complete_fetch_replaces_rows() {
        let (_, groups, state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        let ticket = coll.begin_fetch(&state, &groups);
        assert!(coll.is_loading());

        coll.complete_fetch(&ticket, payload(&[3, 2, 1], 3), &state)
            .unwrap();
        assert!(!coll.is_loading());
        assert_eq!(coll.threads().len(), 3);
        assert_eq!(coll.modifiers().end, 3);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let (mut areas, groups, mut state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));

        let old = coll.begin_fetch(&state, &groups);
        areas.change_active(&"Unread".to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        let new = coll.begin_fetch(&state, &groups);

        coll.complete_fetch(&new, payload(&[10, 11], 2), &state)
            .unwrap();
        let err = coll
            .complete_fetch(&old, payload(&[1, 2, 3, 4], 4), &state)
            .unwrap_err();
        assert!(err.is_stale());
        assert!(coll.get(10).is_some());
        assert!(coll.get(1).is_none());
        assert_eq!(coll.modifiers().total_threads(), 2);
    }

    #[test]
    fn test_begin_fetch_clears_selection() {
        let (_, groups, state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        let ticket = coll.begin_fetch(&state, &groups);
        coll.complete_fetch(&ticket, payload(&[1, 2], 2), &state)
            .unwrap();
        coll.toggle(1, &state).unwrap();
        assert_eq!(coll.modifiers().num_selected, Some(1));

        coll.begin_fetch(&state, &groups);
        assert!(coll.selected_ids().is_empty());
        assert!(coll.modifiers().num_selected.is_none());
    }

    #[test]
    fn test_refetch_keeps_selection_of_surviving_rows() {
        let (_, groups, state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        let ticket = coll.begin_fetch(&state, &groups);
        coll.complete_fetch(&ticket, payload(&[1, 2, 3], 3), &state)
            .unwrap();
        coll.toggle(1, &state).unwrap();
        coll.toggle(3, &state).unwrap();

        let ticket = coll.begin_refetch();
        coll.complete_fetch(&ticket, payload(&[1, 2, 4], 3), &state)
            .unwrap();
        assert_eq!(coll.selected_ids(), vec![1]);
        assert_eq!(coll.modifiers().num_selected, Some(1));
    }

    #[test]
    fn test_selection_helpers() {
        let (_, groups, state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        let ticket = coll.begin_fetch(&state, &groups);
        coll.complete_fetch(&ticket, payload(&[13, 14, 15], 40), &state)
            .unwrap();

        coll.toggle(13, &state).unwrap();
        assert_eq!(coll.selected_ids_param(), "13");

        coll.select_all(&state).unwrap();
        assert_eq!(coll.selected_ids_param(), "13,14,15");
        assert!(coll.modifiers().unselect);
        assert!(!coll.modifiers().all_mode);

        coll.request_all_mode(&state);
        assert!(coll.modifiers().all_mode);
        assert_eq!(coll.modifiers().num_selected, Some(40));

        coll.unselect_all(&state);
        assert!(coll.selected_ids().is_empty());
        assert!(!coll.modifiers().all_mode);
    }

    #[test]
    fn test_debounce_deadline() {
        let (_, groups, state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        let start = Instant::now();

        coll.schedule_refresh(start);
        assert!(!coll.refresh_due(start + Duration::from_millis(100)));
        coll.schedule_refresh(start + Duration::from_millis(100));
        assert!(!coll.refresh_due(start + Duration::from_millis(200)));
        assert!(coll.refresh_due(start + Duration::from_millis(280)));

        coll.begin_fetch(&state, &groups);
        assert!(!coll.refresh_pending());
    }

    #[test]
    fn test_badge_listening_follows_area() {
        let (mut areas, groups, mut state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        assert!(coll.listens_to_badge());

        areas.change_active(&"Archive".to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        coll.begin_fetch(&state, &groups);
        assert!(!coll.listens_to_badge());
    }

    #[test]
    fn test_mark_read_and_remove() {
        let (_, groups, state) = setup();
        let mut coll = ThreadCollection::new(&state, &groups, Duration::from_millis(180));
        let mut data = payload(&[1, 2], 2);
        data.threads[0].read = false;
        data.threads[0].unread_messages = 4;
        let ticket = coll.begin_fetch(&state, &groups);
        coll.complete_fetch(&ticket, data, &state).unwrap();

        assert_eq!(coll.mark_read(1), Some(4));
        assert!(coll.get(1).unwrap().read);
        assert_eq!(coll.mark_read(99), None);

        coll.toggle(2, &state).unwrap();
        assert!(coll.remove(2, &state).is_some());
        assert!(coll.modifiers().num_selected.is_none());
    }
}
