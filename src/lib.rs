//! Headless inbox core: selection sets, navigation state, the paginated
//! thread list, per-thread message caches and the controller that routes
//! between them.

pub mod api;
pub mod badge;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod messages;
pub mod retry;
pub mod router;
pub mod select;
pub mod state;
pub mod threads;

pub use api::{HttpInboxApi, InboxApi, UnreadCountSource};
pub use config::Config;
pub use controller::{DetailView, InboxController};
pub use error::{Error, Result};
pub use router::{History, Route};
pub use select::{ActiveSet, Selectable, SelectionChange};
pub use state::{Group, NavigationState, ThreadArea};
