//! Thread summaries as the list endpoint returns them, plus presentation helpers.

use chrono::{DateTime, Datelike, FixedOffset};
use serde::Deserialize;

use crate::constants::SUBJECT_PREVIEW_CHARS;
use crate::select::Selectable;
use crate::state::GroupId;

pub type ThreadId = u64;

/// A conversation summary row. Presentation fields are derived by methods
/// and never stored, so a re-fetch can't leave them stale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub latest_message_at: String,
    #[serde(default)]
    pub userthread_status: Option<String>,
    /// The server sends `null` for threads the user has no read state on
    #[serde(default, deserialize_with = "null_as_false")]
    pub read: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unread_messages: u32,
    #[serde(default)]
    pub is_system_thread: bool,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub json_url: Option<String>,
    #[serde(default)]
    pub reply_url: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Thread {
    pub fn new(id: ThreadId, subject: impl Into<String>) -> Self {
        Self {
            id,
            subject: subject.into(),
            snippet: String::new(),
            latest_message_at: String::new(),
            userthread_status: Some("active".to_string()),
            read: true,
            category: None,
            unread_messages: 0,
            is_system_thread: false,
            group: String::new(),
            group_id: None,
            json_url: None,
            reply_url: None,
            recipients: Vec::new(),
        }
    }

    pub fn archived(&self) -> bool {
        self.userthread_status.as_deref() == Some("archived")
    }

    /// Subject cut to the list preview width, with an ellipsis when cut.
    pub fn display_subject(&self) -> String {
        truncate_subject(&self.subject)
    }

    pub fn latest_message_time(&self) -> Option<DateTime<FixedOffset>> {
        parse_server_time(&self.latest_message_at)
    }

    /// List date, e.g. `Jun 10th`.
    pub fn date_formatted(&self) -> Option<String> {
        self.latest_message_time().map(|t| month_day_ordinal(&t))
    }

    /// Row category: system threads first, then the group category, else personal.
    pub fn category_label(&self) -> &str {
        if self.is_system_thread {
            return "system";
        }
        match self.category.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => "personal",
        }
    }
}

impl Selectable for Thread {
    type Key = ThreadId;

    fn key(&self) -> Self::Key {
        self.id
    }
}

pub(crate) fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn truncate_subject(subject: &str) -> String {
    if subject.chars().count() < SUBJECT_PREVIEW_CHARS {
        return subject.to_string();
    }
    let cut: String = subject.chars().take(SUBJECT_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

/// Timestamps arrive as Python `str(datetime)`: space separated, fractional
/// seconds optional, offset with a colon.
pub(crate) fn parse_server_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z"))
        .ok()
}

pub(crate) fn month_day_ordinal(t: &DateTime<FixedOffset>) -> String {
    format!("{} {}", t.format("%b"), ordinal(t.day()))
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_SUBJECT: &str =
        "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod";

    #[test]
    fn test_decorates_subject_and_date() {
        let mut thread = Thread::new(45884, LONG_SUBJECT);
        thread.latest_message_at = "2015-06-10 19:57:03.732808-05:00".to_string();

        assert!(thread.subject.chars().count() > 40);
        assert_eq!(thread.date_formatted().as_deref(), Some("Jun 10th"));
        assert_eq!(
            thread.display_subject(),
            "Lorem ipsum dolor sit amet, consectetur ..."
        );
        assert_eq!(thread.display_subject().chars().count(), 43);
    }

    #[test]
    fn test_short_subject_untouched() {
        let thread = Thread::new(1, "Lunch?");
        assert_eq!(thread.display_subject(), "Lunch?");
        assert!(thread.date_formatted().is_none());
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(22), "22nd");
        assert_eq!(ordinal(31), "31st");
    }

    #[test]
    fn test_archived_and_category() {
        let mut thread = Thread::new(2, "x");
        assert!(!thread.archived());
        assert_eq!(thread.category_label(), "personal");

        thread.userthread_status = Some("archived".to_string());
        thread.category = Some("cats".to_string());
        assert!(thread.archived());
        assert_eq!(thread.category_label(), "cats");

        thread.is_system_thread = true;
        assert_eq!(thread.category_label(), "system");
    }

    #[test]
    fn test_deserialize_server_row() {
        let json = r#"{
            "id": 72637,
            "total_messages": "3",
            "subject": "Bake sale",
            "snippet": "Who is bringing...",
            "latest_message_at": "2015-06-11 08:00:00-05:00",
            "read": null,
            "group": "Pizza Group",
            "group_id": 3,
            "type": "group",
            "category": "",
            "unread_messages": 3,
            "is_system_thread": false,
            "userthread_status": "active"
        }"#;
        let thread: Thread = serde_json::from_str(json).unwrap();
        assert_eq!(thread.id, 72637);
        assert!(!thread.read);
        assert_eq!(thread.group_id, Some(3));
        assert_eq!(thread.unread_messages, 3);
        assert_eq!(thread.category_label(), "personal");
        assert_eq!(thread.date_formatted().as_deref(), Some("Jun 11th"));
    }
}
