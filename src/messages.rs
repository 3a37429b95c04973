//! Thread detail: messages of one conversation, the scrunch policy and the
//! per-session detail caches.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::constants::SCRUNCH_THRESHOLD;
use crate::error::Result;
use crate::select::{ActiveSet, Selectable, SelectionChange};
use crate::threads::{Thread, ThreadId, null_as_false, parse_server_time};

pub type MessageId = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub sender_is_staff: bool,
    #[serde(default)]
    pub sender_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(default)]
    pub sent_at: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub read: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub flag_url: Option<String>,
    #[serde(default)]
    pub reply_url: Option<String>,
    #[serde(default)]
    pub is_system_message: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(skip)]
    scrunched: bool,
    #[serde(skip)]
    scrunch_toggle: bool,
    #[serde(skip)]
    scrunch_length: usize,
}

impl Message {
    pub fn new(id: MessageId, sent_at: impl Into<String>, read: bool) -> Self {
        Self {
            id,
            sent_at: sent_at.into(),
            read,
            text: String::new(),
            snippet: String::new(),
            sender: Sender::default(),
            group: String::new(),
            flag_url: None,
            reply_url: None,
            is_system_message: false,
            pending: false,
            scrunched: false,
            scrunch_toggle: false,
            scrunch_length: 0,
        }
    }

    /// Collapsed into the summary placeholder.
    pub fn scrunched(&self) -> bool {
        self.scrunched
    }

    /// This message is the placeholder standing in for the collapsed ones.
    pub fn scrunch_toggle(&self) -> bool {
        self.scrunch_toggle
    }

    /// How many messages the placeholder hides.
    pub fn scrunch_length(&self) -> usize {
        self.scrunch_length
    }

    pub fn sent_time(&self) -> Option<DateTime<FixedOffset>> {
        parse_server_time(&self.sent_at)
    }

    /// Calendar style date relative to `now`: `Today at 2:05 PM`,
    /// `Yesterday at ...`, `Last Monday at ...`, otherwise `06/10/2015`.
    pub fn date(&self, now: DateTime<FixedOffset>) -> Option<String> {
        self.sent_time().map(|sent| calendar_date(sent, now))
    }

    /// Collapse this message unless it is the placeholder or expanded.
    fn set_scrunch(&mut self, active: bool) {
        if self.scrunch_toggle || active {
            return;
        }
        self.scrunched = true;
    }

    fn clear_scrunch(&mut self) {
        self.scrunched = false;
        self.scrunch_toggle = false;
    }
}

impl Selectable for Message {
    type Key = MessageId;

    fn key(&self) -> Self::Key {
        self.id
    }
}

fn calendar_date(sent: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    let sent = sent.with_timezone(now.offset());
    let days = (now.date_naive() - sent.date_naive()).num_days();
    let time = sent.format("%-I:%M %p");
    match days {
        0 => format!("Today at {}", time),
        1 => format!("Yesterday at {}", time),
        -1 => format!("Tomorrow at {}", time),
        2..=6 => format!("Last {} at {}", sent.format("%A"), time),
        _ => sent.format("%m/%d/%Y").to_string(),
    }
}

/// Body of `GET <messages>/<id>/json/`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesPayload {
    pub thread: Thread,
    #[serde(default)]
    pub connectmessages: Vec<Message>,
}

/// Cached detail state of one thread.
#[derive(Debug, Clone)]
pub struct MessageThread {
    thread: Thread,
    messages: ActiveSet<Message>,
    /// Ids of messages that were already read when fetched, oldest first
    read: Vec<MessageId>,
    /// Message under review, denormalized for the moderation view
    moderated: Option<Message>,
}

impl MessageThread {
    /// Build the regular detail view: newest message expanded, long read
    /// histories scrunched.
    pub fn from_payload(payload: MessagesPayload) -> Self {
        Self::from_payload_with_threshold(payload, SCRUNCH_THRESHOLD)
    }

    pub fn from_payload_with_threshold(payload: MessagesPayload, threshold: usize) -> Self {
        let mut detail = Self::build(payload);
        if let Some(last) = detail.messages.last().map(|m| m.id) {
            if let Err(e) = detail.messages.select(&last) {
                tracing::warn!("Failed to expand latest message {}: {}", last, e);
            }
        }
        detail.read = detail
            .messages
            .items()
            .filter(|m| m.read)
            .map(|m| m.id)
            .collect();
        if detail.read.len() > threshold {
            detail.scrunch();
        }
        detail
    }

    /// Build the moderation view: the target message is denormalized onto
    /// the thread context and nothing is expanded.
    pub fn for_moderation(payload: MessagesPayload, message_id: MessageId) -> Self {
        let mut detail = Self::build(payload);
        detail.moderated = detail.messages.get(&message_id).cloned();
        if detail.moderated.is_none() {
            tracing::warn!(
                "Message {} not found in thread {} for moderation",
                message_id,
                detail.thread.id
            );
        }
        detail.messages.deactivate();
        detail
    }

    fn build(payload: MessagesPayload) -> Self {
        let mut messages = payload.connectmessages;
        messages.sort_by(|a, b| match (a.sent_time(), b.sent_time()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.sent_at.cmp(&b.sent_at),
        });
        let entries = messages.into_iter().map(|m| {
            let active = !m.read;
            (m, active)
        });
        Self {
            thread: payload.thread,
            messages: ActiveSet::multi().with_items(entries),
            read: Vec::new(),
            moderated: None,
        }
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn thread_mut(&mut self) -> &mut Thread {
        &mut self.thread
    }

    pub fn messages(&self) -> &ActiveSet<Message> {
        &self.messages
    }

    pub fn moderated(&self) -> Option<&Message> {
        self.moderated.as_ref()
    }

    pub fn read_ids(&self) -> &[MessageId] {
        &self.read
    }

    pub fn is_expanded(&self, id: MessageId) -> bool {
        self.messages.is_active(&id)
    }

    /// Collapse the read history: the oldest read message becomes the
    /// placeholder, every other read and collapsed message is hidden.
    pub fn scrunch(&mut self) {
        let Some(&first) = self.read.first() else {
            return;
        };
        let hidden = self.read.len() - 1;
        if let Some(placeholder) = self.messages.get_mut(&first) {
            placeholder.scrunch_toggle = true;
            placeholder.scrunch_length = hidden;
        }
        for id in &self.read {
            let active = self.messages.is_active(id);
            if let Some(message) = self.messages.get_mut(id) {
                message.set_scrunch(active);
            }
        }
    }

    pub fn unscrunch(&mut self) {
        for message in self.messages.items_mut() {
            message.clear_scrunch();
        }
    }

    /// Expand every message and drop the scrunch.
    pub fn expand_all(&mut self) {
        if let Err(e) = self.messages.set_all(true) {
            tracing::warn!("Failed to expand thread {}: {}", self.thread.id, e);
        }
        self.unscrunch();
    }

    pub fn collapse_all(&mut self) {
        self.messages.deactivate();
    }

    /// Expand or collapse one message.
    pub fn toggle(&mut self, id: MessageId) -> Result<SelectionChange> {
        self.messages.change_active(&id)
    }

    pub fn remove_message(&mut self, id: MessageId) -> Option<Message> {
        self.read.retain(|r| *r != id);
        self.messages.remove(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Detail entries by thread id, kept for the whole session.
#[derive(Debug, Default)]
pub struct MessageCache {
    entries: HashMap<ThreadId, MessageThread>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ThreadId) -> Option<&MessageThread> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut MessageThread> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Store an entry, replacing any previous one for the same thread.
    pub fn insert(&mut self, id: ThreadId, entry: MessageThread) {
        if self.entries.insert(id, entry).is_some() {
            tracing::debug!("Replaced cached detail for thread {}", id);
        }
    }

    pub fn invalidate(&mut self, id: ThreadId) -> Option<MessageThread> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a cached entry can be shown as is.
pub fn needs_fetch(cache: &MessageCache, id: ThreadId, unread: bool) -> bool {
    unread || !cache.contains(id)
}

/// `now` helper for callers rendering message dates.
pub fn local_now() -> DateTime<FixedOffset> {
    chrono::Local::now().fixed_offset()
}
