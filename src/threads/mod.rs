//! Thread list: row model, derived modifiers and the server-backed collection.
//!
//! This module is split into:
//! - `model.rs` - Thread summaries and presentation helpers
//! - `modifiers.rs` - Pagination window and selection summary
//! - `collection.rs` - Fetch tickets, debounce deadline, row selection

mod collection;
mod model;
mod modifiers;

pub use collection::{FetchTicket, ThreadCollection, ThreadsPayload};
pub(crate) use model::{null_as_false, parse_server_time};
pub use model::{Thread, ThreadId};
pub use modifiers::{Alerts, Paginator, SelectionSummary, ThreadListModifiers};

use crate::select::ActiveSet;
use crate::state::{Group, NavigationState, ThreadArea};

/// What the list shows when a fetch returned no threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyState {
    pub header: String,
    pub subhead: String,
}

impl EmptyState {
    pub fn for_state(state: &NavigationState, groups: &ActiveSet<Group>) -> Self {
        if let Some(group) = state.group().id.and_then(|id| groups.get(&id)) {
            return Self::new(
                "No messages",
                format!(
                    "No messages are in this area for the group \"{}\". \
                     Choose a different group, or a different message area.",
                    group.name
                ),
            );
        }
        match state.area_name() {
            ThreadArea::UNREAD => Self::new("No unread messages", "Good work!"),
            ThreadArea::ARCHIVE => Self::new(
                "No archived messages",
                "Use the archive options in the inbox.",
            ),
            _ => Self::new("INBOX ZERO", "Nice job!"),
        }
    }

    fn new(header: impl Into<String>, subhead: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            subhead: subhead.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_per_area_and_group() {
        let mut areas = ThreadArea::defaults();
        let mut groups = Group::groups(vec![Group::new(3, "Pizza Group")]);
        let mut state = NavigationState::from_selection(&areas, &groups);
        assert_eq!(EmptyState::for_state(&state, &groups).header, "INBOX ZERO");

        areas.change_active(&ThreadArea::UNREAD.to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        assert_eq!(
            EmptyState::for_state(&state, &groups).header,
            "No unread messages"
        );

        areas.change_active(&ThreadArea::ARCHIVE.to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        assert_eq!(
            EmptyState::for_state(&state, &groups).subhead,
            "Use the archive options in the inbox."
        );

        groups.change_active(&3).unwrap();
        state.on_group_changed(&groups);
        let empty = EmptyState::for_state(&state, &groups);
        assert_eq!(empty.header, "No messages");
        assert!(empty.subhead.contains("\"Pizza Group\""));
    }
}
