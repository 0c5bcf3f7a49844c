//! Time Provider Abstraction
//!
//! Every `created_at` / `updated_at` value is written by the store from a
//! [`TimeProvider`] rather than by SQLite's `CURRENT_TIMESTAMP`, which only has
//! second resolution. Tests swap in [`MockTimeProvider`] to place mutations at
//! exact instants without thread sleeps.
//!
//! # Storage format
//!
//! Timestamps are stored as fixed-width UTC text (`YYYY-MM-DD HH:MM:SS.ffffff`),
//! so lexical comparison in SQL (`created_at > ?`) is chronological. The
//! store truncates its clock to whole microseconds before writing, so a stored
//! value is the exact instant of the write.
//!
//! # Examples
//!
//! ```rust
//! use gdmon_core::models::time::{format_timestamp, parse_timestamp, TimeProvider, SystemTimeProvider};
//!
//! let now = SystemTimeProvider.now();
//! let text = format_timestamp(now);
//! assert_eq!(text.len(), 26);
//! assert!(parse_timestamp(&text).is_some());
//! ```

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::sync::Mutex;

/// Storage format for every timestamp column (microsecond resolution, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Trait for providing current time
pub trait TimeProvider: Send + Sync {
    /// Get the current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// System time provider using actual system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock time provider for deterministic tests
///
/// Shared behind an `Arc` with the store, so the test keeps a handle and
/// moves the clock between operations.
///
/// # Examples
///
/// ```rust
/// use gdmon_core::models::time::{MockTimeProvider, TimeProvider};
/// use chrono::Duration;
///
/// let provider = MockTimeProvider::new();
/// let t1 = provider.now();
/// provider.advance(Duration::seconds(5));
/// assert_eq!(provider.now() - t1, Duration::seconds(5));
/// ```
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: Mutex<DateTime<Utc>>,
}

impl MockTimeProvider {
    /// Create a new mock time provider starting at the current time
    pub fn new() -> Self {
        Self::with_time(Utc::now())
    }

    /// Create a mock time provider with a specific starting time
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            current_time: Mutex::new(time),
        }
    }

    /// Set the current time to a specific value
    pub fn set_time(&self, time: DateTime<Utc>) {
        let mut current = self
            .current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = time;
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self
            .current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current += duration;
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Render a timestamp in the storage format.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp supplied by a caller or read back from storage.
///
/// Accepts the storage format, the second-resolution form SQLite's
/// `CURRENT_TIMESTAMP` produces (`YYYY-MM-DD HH:MM:SS`) and RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
