//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Threads per page in the server's paginator.
pub const PAGE_SIZE: u32 = 20;

/// Debounce delay for thread list refreshes in milliseconds.
/// Collapses the several state changes of one route transition into a single fetch.
pub const FETCH_DEBOUNCE_MS: u64 = 180;

/// Number of read messages a thread may show before older ones are scrunched.
pub const SCRUNCH_THRESHOLD: usize = 5;

/// Subjects longer than this are truncated in the thread list.
pub const SUBJECT_PREVIEW_CHARS: usize = 40;

/// Default badge poll interval while the page has focus, in milliseconds.
pub const BADGE_INTERVAL_MS: u64 = 15000;

/// The badge polls this many times slower while the page is blurred.
pub const BADGE_BLUR_FACTOR: u32 = 8;

/// Navigations remembered by the history log.
pub const HISTORY_LOG_LIMIT: usize = 100;

/// Prefix of every document title.
pub const TITLE_PREFIX: &str = "Connect | ";

/// Form field carrying the CSRF token on every mutation.
pub const CSRF_FIELD: &str = "csrfmiddlewaretoken";

/// Maximum retry attempts for idempotent GETs.
pub const MAX_RETRIES: u32 = 3;

/// Initial retry delay in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Maximum retry delay in seconds.
pub const MAX_RETRY_DELAY_SECS: u64 = 30;
