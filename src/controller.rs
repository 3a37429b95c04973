//! Inbox controller.
//!
//! Owns the selection sets, navigation state, thread list, detail caches and
//! the history location, and is the only thing that mutates them. Every
//! selection change is propagated here explicitly: set → `NavigationState` →
//! `ThreadCollection` → refresh deadline.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::api::{Form, InboxApi};
use crate::badge::{BadgeCommand, BadgeEvent, FocusState};
use crate::config::Config;
use crate::constants::{CSRF_FIELD, TITLE_PREFIX};
use crate::error::{Error, Result};
use crate::messages::{MessageCache, MessageId, MessageThread, MessagesPayload, needs_fetch};
use crate::router::{History, Route};
use crate::select::{ActiveSet, SelectionChange};
use crate::state::{Group, GroupId, NavigationState, ThreadArea};
use crate::threads::{EmptyState, FetchTicket, ThreadCollection, ThreadId, ThreadsPayload};

/// Which detail pane is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailView {
    Thread(ThreadId),
    Moderate {
        thread: ThreadId,
        message: MessageId,
    },
}

impl DetailView {
    pub fn thread(&self) -> ThreadId {
        match *self {
            Self::Thread(id) => id,
            Self::Moderate { thread, .. } => thread,
        }
    }

    pub fn route(&self) -> Route {
        match *self {
            Self::Thread(thread) => Route::Detail { thread },
            Self::Moderate { thread, message } => Route::Moderate { thread, message },
        }
    }
}

pub struct InboxController<C> {
    client: C,
    csrf_token: String,
    areas: ActiveSet<ThreadArea>,
    groups: ActiveSet<Group>,
    state: NavigationState,
    threads: ThreadCollection,
    store: MessageCache,
    mod_store: MessageCache,
    detail: Option<DetailView>,
    history: History,
    scrunch_threshold: usize,
    badge: Option<mpsc::Sender<BadgeCommand>>,
    badge_count: Option<u64>,
    last_error: Option<Error>,
}

impl<C: InboxApi> InboxController<C> {
    pub fn new(client: C, groups: Vec<Group>, config: &Config) -> Self {
        let areas = ThreadArea::defaults();
        let groups = Group::groups(groups);
        let state = NavigationState::from_selection(&areas, &groups);
        let threads = ThreadCollection::new(&state, &groups, config.inbox.fetch_debounce());

        Self {
            client,
            csrf_token: config.server.csrf_token.clone(),
            areas,
            groups,
            state,
            threads,
            store: MessageCache::new(),
            mod_store: MessageCache::new(),
            detail: None,
            history: History::new(config.server.history_root.clone()),
            scrunch_threshold: config.inbox.scrunch_threshold,
            badge: None,
            badge_count: None,
            last_error: None,
        }
    }

    /// Route badge commands (mark read, focus) to a running poller.
    pub fn attach_badge(&mut self, cmd_tx: mpsc::Sender<BadgeCommand>) {
        self.badge = Some(cmd_tx);
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn areas(&self) -> &ActiveSet<ThreadArea> {
        &self.areas
    }

    pub fn groups(&self) -> &ActiveSet<Group> {
        &self.groups
    }

    pub fn threads(&self) -> &ThreadCollection {
        &self.threads
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn detail_view(&self) -> Option<DetailView> {
        self.detail
    }

    /// The detail entry currently on screen, if it has loaded.
    pub fn detail(&self) -> Option<&MessageThread> {
        match self.detail? {
            DetailView::Thread(id) => self.store.get(id),
            DetailView::Moderate { thread, .. } => self.mod_store.get(thread),
        }
    }

    pub fn detail_mut(&mut self) -> Option<&mut MessageThread> {
        match self.detail? {
            DetailView::Thread(id) => self.store.get_mut(id),
            DetailView::Moderate { thread, .. } => self.mod_store.get_mut(thread),
        }
    }

    pub fn badge_count(&self) -> Option<u64> {
        self.badge_count
    }

    /// Last failed request, kept until the next successful list load.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn page_title(&self) -> String {
        match self.detail() {
            Some(entry) => format!("{}{}", TITLE_PREFIX, entry.thread().subject),
            None => self.state.page_title(&self.groups),
        }
    }

    /// Placeholder for a loaded, empty list.
    pub fn empty_state(&self) -> Option<EmptyState> {
        let loaded = self.threads.generation() > 0 && !self.threads.is_loading();
        if loaded && self.threads.threads().is_empty() {
            Some(EmptyState::for_state(&self.state, &self.groups))
        } else {
            None
        }
    }

    // ---- Routing ----

    /// Apply a location change. `path` may be absolute (`/messages/inbox/`)
    /// or relative to the history root.
    pub async fn handle_route(&mut self, path: &str) -> Result<()> {
        let route = Route::parse(self.history.relative(path))?;
        tracing::debug!("Route {:?}", route);
        if let Route::Area { area, group } = &route {
            self.check_area(area, *group)?;
        }
        self.history.navigate(&route.path());

        match route {
            Route::Root => {
                self.history.navigate(&Route::inbox().path());
                self.show_area(ThreadArea::INBOX, None)
            }
            Route::Area { area, group } => self.show_area(&area, group),
            Route::Detail { thread } => self.show_detail(thread, false).await,
            Route::Moderate { thread, message } => self.moderate(thread, message).await,
        }
    }

    /// Reject an area route naming an area or group we don't have, before
    /// anything is touched.
    fn check_area(&self, area: &str, group: Option<GroupId>) -> Result<()> {
        if !self.areas.contains(&area.to_string()) {
            return Err(Error::InvariantViolation(format!("unknown area {}", area)));
        }
        if let Some(id) = group {
            if !self.groups.contains(&id) {
                tracing::warn!("Route names unknown group {}", id);
                return Err(Error::InvariantViolation(format!("unknown group {}", id)));
            }
        }
        Ok(())
    }

    fn show_area(&mut self, area: &str, group: Option<GroupId>) -> Result<()> {
        self.check_area(area, group)?;
        let current = format!("{}{}", self.history.root(), self.state.route());
        if self.list_requested() && current == self.history.pathname() {
            // Back from a detail view onto the list that is already loaded
            self.hide_detail();
            return Ok(());
        }
        self.hide_detail();

        let area_change = self.areas.select(&area.to_string())?;
        let group_change = match group {
            Some(id) => self.groups.select(&id)?,
            None if self.groups.active_count() > 0 => {
                self.groups.deactivate();
                SelectionChange::Deactivated
            }
            None => SelectionChange::Unchanged,
        };

        if area_change.changed() {
            self.state.on_thread_area_changed(&self.areas);
        }
        if group_change.changed() {
            self.state.on_group_changed(&self.groups);
        }
        if area_change.changed() || group_change.changed() || !self.list_requested() {
            self.state_changed();
        }

        let route = self.state.route().to_string();
        self.history.navigate(&route);
        Ok(())
    }

    /// Close the detail pane and return to the current list route.
    pub fn back(&mut self) {
        self.hide_detail();
        let route = self.state.route().to_string();
        self.history.navigate(&route);
    }

    pub fn hide_detail(&mut self) {
        if let Some(view) = self.detail.take() {
            tracing::debug!("Closing detail {:?}", view);
        }
    }

    // ---- Thread list ----

    /// Earliest instant `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.threads.refresh_deadline()
    }

    /// Run the debounced list refresh if its deadline has passed.
    pub async fn tick(&mut self, now: Instant) -> Result<bool> {
        if !self.threads.refresh_due(now) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    /// Run a pending refresh now, ignoring the debounce deadline.
    pub async fn flush(&mut self) -> Result<bool> {
        if !self.threads.refresh_pending() {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let ticket = self.begin_refresh();
        let result = self.client.fetch_threads(&ticket.query).await;
        self.finish_refresh(&ticket, result)
    }

    /// Start a list request for the current state.
    pub fn begin_refresh(&mut self) -> FetchTicket {
        self.threads.begin_fetch(&self.state, &self.groups)
    }

    /// Apply the outcome of a list request. Responses to superseded tickets
    /// are dropped with `Error::StaleResponse`.
    pub fn finish_refresh(
        &mut self,
        ticket: &FetchTicket,
        result: Result<ThreadsPayload>,
    ) -> Result<()> {
        match result {
            Ok(payload) => {
                self.threads.complete_fetch(ticket, payload, &self.state)?;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                self.threads.fail_fetch(ticket);
                Err(self.record(e))
            }
        }
    }

    /// Re-fetch the current query, keeping checked rows checked.
    async fn refetch(&mut self) -> Result<()> {
        let ticket = self.threads.begin_refetch();
        let result = self.client.fetch_threads(&ticket.query).await;
        self.finish_refresh(&ticket, result)
    }

    pub async fn on_badge_event(&mut self, event: BadgeEvent) -> Result<()> {
        match event {
            BadgeEvent::Updated { count } => {
                self.badge_count = Some(count);
                if self.threads.listens_to_badge() {
                    tracing::debug!("New mail, refreshing inbox");
                    self.refetch().await?;
                }
            }
            BadgeEvent::Count(count) => self.badge_count = Some(count),
            BadgeEvent::Error(e) => tracing::debug!("Badge poll error: {}", e),
        }
        Ok(())
    }

    pub fn set_focus(&mut self, focus: FocusState) {
        self.notify_badge(BadgeCommand::Focus(focus));
    }

    pub fn next_page(&mut self) -> bool {
        self.change_page(1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.change_page(-1)
    }

    fn change_page(&mut self, delta: i64) -> bool {
        let before = self.state.revision();
        self.state.update_page(delta);
        if self.state.revision() == before {
            return false;
        }
        self.state_changed();
        true
    }

    pub fn toggle_thread(&mut self, id: ThreadId) -> Result<SelectionChange> {
        self.threads.toggle(id, &self.state)
    }

    pub fn select_all(&mut self) -> Result<()> {
        self.threads.select_all(&self.state)
    }

    pub fn unselect_all(&mut self) {
        self.threads.unselect_all(&self.state);
    }

    /// Extend the selection to every thread in the area, across pages.
    pub fn enable_all_mode(&mut self) {
        self.threads.request_all_mode(&self.state);
    }

    // ---- Detail ----

    /// List click: mark the row read locally and open it.
    pub async fn open_thread(&mut self, id: ThreadId) -> Result<()> {
        let unread = self.threads.get(id).is_some_and(|t| !t.read);
        if let Some(count) = self.threads.mark_read(id) {
            if count > 0 {
                self.notify_badge(BadgeCommand::MarkRead(u64::from(count)));
            }
        }
        self.show_detail(id, unread).await
    }

    /// Show a thread, from cache unless `unread` says the cache is outdated.
    pub async fn show_detail(&mut self, id: ThreadId, unread: bool) -> Result<()> {
        self.load_detail(DetailView::Thread(id), unread).await
    }

    pub async fn moderate(&mut self, thread: ThreadId, message: MessageId) -> Result<()> {
        self.load_detail(DetailView::Moderate { thread, message }, false)
            .await
    }

    async fn load_detail(&mut self, view: DetailView, unread: bool) -> Result<()> {
        if !self.request_detail(view, unread) {
            return Ok(());
        }
        let result = self.client.fetch_messages(view.thread()).await;
        match result {
            Ok(payload) => {
                self.receive_detail(view, payload);
                Ok(())
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Open `view`. Returns true if its entry must be fetched.
    pub fn request_detail(&mut self, view: DetailView, unread: bool) -> bool {
        self.history.navigate(&view.route().path());
        self.detail = Some(view);

        let fetch = match view {
            DetailView::Thread(id) => needs_fetch(&self.store, id, unread),
            DetailView::Moderate { thread, message } => {
                self.mod_store
                    .get(thread)
                    .and_then(|entry| entry.moderated())
                    .map(|m| m.id)
                    != Some(message)
            }
        };
        if !fetch {
            tracing::debug!("Showing cached detail for {:?}", view);
        }
        fetch
    }

    /// Store a fetched detail entry. Returns true if it is the one on screen;
    /// late responses only update the cache.
    pub fn receive_detail(&mut self, view: DetailView, payload: MessagesPayload) -> bool {
        match view {
            DetailView::Thread(id) => {
                let entry =
                    MessageThread::from_payload_with_threshold(payload, self.scrunch_threshold);
                self.store.insert(id, entry);
            }
            DetailView::Moderate { thread, message } => {
                self.mod_store
                    .insert(thread, MessageThread::for_moderation(payload, message));
            }
        }

        let visible = self.detail == Some(view);
        if !visible {
            tracing::debug!("Cached {:?} after its view closed", view);
        }
        visible
    }

    // ---- Mutations ----

    /// Archive the thread from its detail view.
    pub async fn archive_thread(&mut self, id: ThreadId) -> Result<()> {
        let url = format!("{}?id={}", self.client.threads_url(), id);
        self.post(&url, &[("status", "archived")]).await?;

        if let Some(entry) = self.store.get_mut(id) {
            entry.thread_mut().userthread_status = Some("archived".to_string());
        }
        self.back();
        self.threads.remove(id, &self.state);
        Ok(())
    }

    /// Flag a message of the open thread. Closes the detail once the thread
    /// has no messages left.
    pub async fn flag_message(&mut self, message: MessageId) -> Result<()> {
        let url = self
            .detail()
            .and_then(|entry| entry.messages().get(&message))
            .and_then(|m| m.flag_url.clone())
            .ok_or_else(|| {
                Error::InvariantViolation(format!("message {} has no flag url on screen", message))
            })?;
        self.post(&url, &[]).await?;

        let emptied = match self.detail_mut() {
            Some(entry) => {
                entry.remove_message(message);
                entry.is_empty()
            }
            None => true,
        };
        if emptied {
            self.back();
        }
        Ok(())
    }

    pub async fn mark_read_selected(&mut self) -> Result<()> {
        if self.threads.modifiers().all_mode {
            return self.mark_read_all().await;
        }
        self.mod_selected(&[("read", "true")]).await
    }

    pub async fn archive_selected(&mut self) -> Result<()> {
        if self.threads.modifiers().all_mode {
            return self.archive_all().await;
        }
        self.mod_selected(&[("status", "archived")]).await
    }

    async fn mod_selected(&mut self, fields: &[(&str, &str)]) -> Result<()> {
        let ids = self.threads.selected_ids_param();
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}?id={}", self.client.threads_url(), ids);
        self.post(&url, fields).await?;
        self.threads.unselect_all(&self.state);

        // The change is applied; a failed reload stays in last_error only
        if let Err(e) = self.refresh().await {
            tracing::warn!("Reload after updating threads {} failed: {}", ids, e);
        }
        Ok(())
    }

    /// Mark every thread of the area read, across pages.
    pub async fn mark_read_all(&mut self) -> Result<()> {
        let url = self.all_mode_url();
        self.post(&url, &[("read", "true")]).await?;

        let total = self.threads.modifiers().total_threads();
        self.notify_badge(BadgeCommand::MarkRead(u64::from(total)));
        self.threads.mark_all_read();
        self.threads.unselect_all(&self.state);
        Ok(())
    }

    /// Archive every thread of the area, across pages.
    pub async fn archive_all(&mut self) -> Result<()> {
        let url = self.all_mode_url();
        self.post(&url, &[("status", "archived")]).await?;

        self.threads.unselect_all(&self.state);
        self.threads.clear(&self.state);
        Ok(())
    }

    fn all_mode_url(&self) -> String {
        format!(
            "{}{}",
            self.client.threads_url(),
            self.state.thread_area().query
        )
    }

    async fn post(&mut self, url: &str, fields: &[(&str, &str)]) -> Result<()> {
        let mut form: Form = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        form.push((CSRF_FIELD.to_string(), self.csrf_token.clone()));

        let result = self.client.post_form(url, form).await;
        result.map_err(|e| self.record(e))
    }

    // ---- Helpers ----

    fn list_requested(&self) -> bool {
        self.threads.generation() > 0 || self.threads.refresh_pending()
    }

    fn state_changed(&mut self) {
        self.threads.on_state_changed(&self.state);
        self.threads.schedule_refresh(Instant::now());
    }

    fn notify_badge(&self, cmd: BadgeCommand) {
        if let Some(tx) = &self.badge {
            if let Err(e) = tx.try_send(cmd) {
                tracing::warn!("Failed to send {:?} to badge: {}", cmd, e);
            }
        }
    }

    fn record(&mut self, e: Error) -> Error {
        tracing::warn!("Request failed: {}", e);
        self.last_error = Some(e.clone());
        e
    }
}
