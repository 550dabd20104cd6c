use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::storage::{get_millis, LocalStore};

pub const LAST_HIDE_KEY: &str = "ios_install_prompt:last_hide";

/// A dismissed prompt stays hidden this long.
pub const HIDE_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Whether the "add to home screen" hint may be shown at `now`.
pub fn should_show(store: &dyn LocalStore, now: DateTime<Utc>) -> bool {
    let last_hide = get_millis(store, LAST_HIDE_KEY);
    now.timestamp_millis().saturating_sub(last_hide) >= HIDE_WINDOW_MS
}

/// Remember that the user closed the prompt at `now`.
pub fn dismiss(store: &dyn LocalStore, now: DateTime<Utc>) -> Result<()> {
    store.set(LAST_HIDE_KEY, &now.timestamp_millis().to_string())
}
