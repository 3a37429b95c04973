//! Navigation state
//!
//! Holds the three facets that select what the thread list shows (area,
//! group filter, page) and derives the canonical route and server query from
//! them. Selection of areas and groups lives in their `ActiveSet`s; the
//! controller calls `on_thread_area_changed`/`on_group_changed` after every
//! selection change so the derived fields never drift.

use serde::Deserialize;

use crate::constants::TITLE_PREFIX;
use crate::select::{ActiveSet, Selectable};

pub type GroupId = u64;

/// One of the fixed top-level filters of the thread list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadArea {
    pub name: String,
    pub query: String,
}

impl ThreadArea {
    pub const INBOX: &'static str = "Inbox";
    pub const UNREAD: &'static str = "Unread";
    pub const ARCHIVE: &'static str = "Archive";

    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }

    /// The three areas every inbox offers, Inbox active.
    pub fn defaults() -> ActiveSet<ThreadArea> {
        ActiveSet::single().disallow_null().with_items(vec![
            (Self::new(Self::INBOX, "?status=active"), true),
            (Self::new(Self::UNREAD, "?read=false"), false),
            (Self::new(Self::ARCHIVE, "?status=archived"), false),
        ])
    }
}

impl Selectable for ThreadArea {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.name.clone()
    }
}

/// A group the user belongs to, usable as a list filter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub shortname: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            shortname: None,
            category: None,
            query: None,
        }
    }

    /// Query fragment that filters the thread list to this group.
    pub fn query(&self) -> String {
        self.query
            .clone()
            .unwrap_or_else(|| format!("&group={}", self.id))
    }

    pub fn groups(groups: impl IntoIterator<Item = Group>) -> ActiveSet<Group> {
        ActiveSet::single().with_items(groups.into_iter().map(|g| (g, false)))
    }
}

impl Selectable for Group {
    type Key = GroupId;

    fn key(&self) -> Self::Key {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaFacet {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFacet {
    pub id: Option<GroupId>,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFacet {
    pub id: u32,
    pub query: String,
}

impl PageFacet {
    pub fn first() -> Self {
        Self::number(1)
    }

    fn number(id: u32) -> Self {
        Self {
            id,
            query: format!("&page={}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    thread_area: AreaFacet,
    group: GroupFacet,
    page: PageFacet,
    route: String,
    /// Bumped on every facet change; the thread list refreshes when it moves
    revision: u64,
}

impl Default for NavigationState {
    fn default() -> Self {
        let mut state = Self {
            thread_area: AreaFacet {
                name: ThreadArea::INBOX.to_string(),
                query: "?status=active".to_string(),
            },
            group: GroupFacet::default(),
            page: PageFacet::first(),
            route: String::new(),
            revision: 0,
        };
        state.compute_route();
        state
    }
}

impl NavigationState {
    /// Build state mirroring whatever is active in the given sets.
    pub fn from_selection(areas: &ActiveSet<ThreadArea>, groups: &ActiveSet<Group>) -> Self {
        let mut state = Self::default();
        state.copy_area(areas);
        state.copy_group(groups);
        state.compute_route();
        state.revision = 0;
        state
    }

    pub fn thread_area(&self) -> &AreaFacet {
        &self.thread_area
    }

    pub fn group(&self) -> &GroupFacet {
        &self.group
    }

    pub fn page(&self) -> &PageFacet {
        &self.page
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn area_name(&self) -> &str {
        &self.thread_area.name
    }

    pub fn is_area(&self, name: &str) -> bool {
        self.thread_area.name == name
    }

    /// Recompute `route` from the current facets.
    pub fn compute_route(&mut self) -> &str {
        let mut route = format!("{}/", self.thread_area.name.to_lowercase());
        if let Some(id) = self.group.id {
            route.push_str(&format!("group/{}/", id));
        }
        self.route = route;
        &self.route
    }

    /// Server query: area, group and page fragments in that order.
    pub fn query(&self) -> String {
        format!(
            "{}{}{}",
            self.thread_area.query, self.group.query, self.page.query
        )
    }

    pub fn on_thread_area_changed(&mut self, areas: &ActiveSet<ThreadArea>) {
        self.copy_area(areas);
        self.page = PageFacet::first();
        self.compute_route();
        self.revision += 1;
    }

    pub fn on_group_changed(&mut self, groups: &ActiveSet<Group>) {
        self.copy_group(groups);
        self.page = PageFacet::first();
        self.compute_route();
        self.revision += 1;
    }

    /// Move `delta` pages, never below page 1.
    pub fn update_page(&mut self, delta: i64) {
        let next = (i64::from(self.page.id) + delta).max(1);
        let next = u32::try_from(next).unwrap_or(u32::MAX);
        if next != self.page.id {
            self.page = PageFacet::number(next);
            self.revision += 1;
        }
    }

    /// List heading: `"<group> in <area>"`, or just the area.
    pub fn title(&self, groups: &ActiveSet<Group>) -> String {
        let group_name = self
            .group
            .id
            .and_then(|id| groups.get(&id))
            .map(|g| g.name.as_str());
        match group_name {
            Some(name) => format!("{} in {}", name, self.thread_area.name),
            None => self.thread_area.name.clone(),
        }
    }

    pub fn page_title(&self, groups: &ActiveSet<Group>) -> String {
        format!("{}{}", TITLE_PREFIX, self.title(groups))
    }

    fn copy_area(&mut self, areas: &ActiveSet<ThreadArea>) {
        if let Some(area) = areas.active_one() {
            self.thread_area = AreaFacet {
                name: area.name.clone(),
                query: area.query.clone(),
            };
        }
    }

    fn copy_group(&mut self, groups: &ActiveSet<Group>) {
        self.group = match groups.active_one() {
            Some(group) => GroupFacet {
                id: Some(group.id),
                query: group.query(),
            },
            None => GroupFacet::default(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_groups() -> ActiveSet<Group> {
        Group::groups(vec![
            Group::new(1, "Cats Group"),
            Group::new(2, "Dogs group"),
            Group::new(3, "Pizza Group"),
        ])
    }

    #[test]
    fn test_route_from_area_and_group() {
        let mut areas = ThreadArea::defaults();
        let mut groups = Group::groups(vec![Group::new(4, "Four")]);
        let mut state = NavigationState::from_selection(&areas, &groups);
        assert_eq!(state.route(), "inbox/");

        groups.change_active(&4).unwrap();
        state.on_group_changed(&groups);
        assert_eq!(state.route(), "inbox/group/4/");

        areas.push(ThreadArea::new("AREA51", "?area=51"), true);
        state.on_thread_area_changed(&areas);
        assert_eq!(state.route(), "area51/group/4/");
    }

    #[test]
    fn test_compute_route_is_idempotent() {
        let mut state = NavigationState::default();
        let first = state.compute_route().to_string();
        assert_eq!(state.compute_route(), first);
        assert_eq!(first, "inbox/");
    }

    #[test]
    fn test_route_and_query_follow_selection() {
        let mut areas = ThreadArea::defaults();
        let mut groups = test_groups();
        let mut state = NavigationState::from_selection(&areas, &groups);
        assert_eq!(state.route(), "inbox/");
        assert_eq!(state.query(), "?status=active&page=1");

        areas.change_active(&"Unread".to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        assert_eq!(state.route(), "unread/");
        assert_eq!(state.query(), "?read=false&page=1");

        groups.change_active(&2).unwrap();
        state.on_group_changed(&groups);
        assert_eq!(state.route(), "unread/group/2/");
        assert_eq!(state.query(), "?read=false&group=2&page=1");
    }

    #[test]
    fn test_area_and_group_changes_reset_page() {
        let mut areas = ThreadArea::defaults();
        let mut groups = test_groups();
        let mut state = NavigationState::from_selection(&areas, &groups);

        state.update_page(4);
        assert_eq!(state.page().id, 5);
        assert_eq!(state.query(), "?status=active&page=5");

        areas.change_active(&"Archive".to_string()).unwrap();
        state.on_thread_area_changed(&areas);
        assert_eq!(state.page().id, 1);

        state.update_page(2);
        groups.change_active(&1).unwrap();
        state.on_group_changed(&groups);
        assert_eq!(state.page().id, 1);
        assert_eq!(state.query(), "?status=archived&group=1&page=1");
    }

    #[test]
    fn test_update_page_clamps_at_one() {
        let mut state = NavigationState::default();
        let revision = state.revision();
        state.update_page(-3);
        assert_eq!(state.page().id, 1);
        assert_eq!(state.page().query, "&page=1");
        assert_eq!(state.revision(), revision);

        state.update_page(1);
        state.update_page(-1);
        assert_eq!(state.page().id, 1);
        assert_eq!(state.route(), "inbox/");
    }

    #[test]
    fn test_clearing_group_empties_facet() {
        let areas = ThreadArea::defaults();
        let mut groups = test_groups();
        let mut state = NavigationState::from_selection(&areas, &groups);

        groups.change_active(&3).unwrap();
        state.on_group_changed(&groups);
        assert_eq!(state.group().id, Some(3));

        groups.deactivate();
        state.on_group_changed(&groups);
        assert_eq!(state.group(), &GroupFacet::default());
        assert_eq!(state.route(), "inbox/");
    }

    #[test]
    fn test_titles() {
        let areas = ThreadArea::defaults();
        let mut groups = test_groups();
        let mut state = NavigationState::from_selection(&areas, &groups);
        assert_eq!(state.title(&groups), "Inbox");

        groups.change_active(&3).unwrap();
        state.on_group_changed(&groups);
        assert_eq!(state.page_title(&groups), "Connect | Pizza Group in Inbox");
    }

    #[test]
    fn test_group_query_override_from_payload() {
        let group: Group =
            serde_json::from_str(r#"{"id": 7, "name": "Seven", "query": "&group=7&x=1"}"#)
                .unwrap();
        assert_eq!(group.query(), "&group=7&x=1");
        assert_eq!(Group::new(7, "Seven").query(), "&group=7");
    }
}
