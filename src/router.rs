//! Client-side routes.
//!
//! Paths are relative to the history root (`/messages/` by default):
//! `""`, `inbox(/)(group/<id>/)`, `unread(...)`, `archive(...)`,
//! `id/<id>(/)` and `mod/<thread>/msg/<msg>(/)`.

use std::fmt;

use crate::constants::HISTORY_LOG_LIMIT;
use crate::error::{Error, Result};
use crate::messages::MessageId;
use crate::state::{GroupId, ThreadArea};
use crate::threads::ThreadId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Bare root, redirected to the inbox.
    Root,
    Area {
        area: String,
        group: Option<GroupId>,
    },
    Detail {
        thread: ThreadId,
    },
    Moderate {
        thread: ThreadId,
        message: MessageId,
    },
}

impl Route {
    pub fn inbox() -> Self {
        Self::Area {
            area: ThreadArea::INBOX.to_string(),
            group: None,
        }
    }

    /// Parse a path relative to the history root. Leading and trailing
    /// slashes are optional.
    pub fn parse(path: &str) -> Result<Self> {
        let unknown = || Error::UnknownRoute(path.to_string());
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Ok(Self::Root),
            [area, rest @ ..] if area_name(area).is_some() => {
                let area = area_name(area).ok_or_else(unknown)?.to_string();
                let group = match rest {
                    [] => None,
                    ["group", id] => Some(id.parse().map_err(|_| unknown())?),
                    _ => return Err(unknown()),
                };
                Ok(Self::Area { area, group })
            }
            ["id", id] => Ok(Self::Detail {
                thread: id.parse().map_err(|_| unknown())?,
            }),
            ["mod", thread, "msg", message] => Ok(Self::Moderate {
                thread: thread.parse().map_err(|_| unknown())?,
                message: message.parse().map_err(|_| unknown())?,
            }),
            _ => Err(unknown()),
        }
    }

    /// Canonical relative path, always with a trailing slash (root is empty).
    pub fn path(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Area { area, group } => {
                let mut path = format!("{}/", area.to_lowercase());
                if let Some(id) = group {
                    path.push_str(&format!("group/{}/", id));
                }
                path
            }
            Self::Detail { thread } => format!("id/{}/", thread),
            Self::Moderate { thread, message } => format!("mod/{}/msg/{}/", thread, message),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn area_name(segment: &str) -> Option<&'static str> {
    match segment {
        "inbox" => Some(ThreadArea::INBOX),
        "unread" => Some(ThreadArea::UNREAD),
        "archive" => Some(ThreadArea::ARCHIVE),
        _ => None,
    }
}

/// Stand-in for the browser history: current location plus a log of
/// navigations, all relative to `root`.
#[derive(Debug, Clone)]
pub struct History {
    root: String,
    fragment: String,
    log: Vec<String>,
}

impl History {
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        if !root.starts_with('/') {
            root.insert(0, '/');
        }
        Self {
            root,
            fragment: String::new(),
            log: Vec::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Current path relative to the root.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Current absolute path, e.g. `/messages/inbox/`.
    pub fn pathname(&self) -> String {
        format!("{}{}", self.root, self.fragment)
    }

    /// Record a navigation. Navigating to the current location is a no-op.
    pub fn navigate(&mut self, fragment: &str) -> bool {
        let fragment = fragment.trim_start_matches('/');
        if fragment == self.fragment {
            return false;
        }
        tracing::debug!("Navigate {} -> {}", self.fragment, fragment);
        self.fragment = fragment.to_string();
        if self.log.len() >= HISTORY_LOG_LIMIT {
            self.log.remove(0);
        }
        self.log.push(self.fragment.clone());
        true
    }

    /// Strip the root from an absolute path. Paths outside the root are
    /// returned as given.
    pub fn relative<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.root.as_str())
            .or_else(|| path.strip_prefix(self.root.trim_end_matches('/')))
            .unwrap_or(path)
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }
}
