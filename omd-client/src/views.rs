use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::storage::{get_millis, LocalStore};

pub const DEVICE_ID_KEY: &str = "omd.device_id.v1";

/// Views from the same device within this window are reported once.
pub const VIEW_THROTTLE_MS: i64 = 12 * 60 * 60 * 1000;

/// Local-storage key holding the last reported view time for a pin.
pub fn viewed_key(pin_id: Uuid) -> String {
    format!("omd.viewed.{}", pin_id)
}

/// What `record_view` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewOutcome {
    Recorded,
    /// Already reported from this device within the throttle window
    Throttled,
    /// Nothing happened (degraded call)
    #[default]
    Skipped,
}

/// True when a view at `now_ms` should be reported given the stored time.
pub fn should_report(store: &dyn LocalStore, pin_id: Uuid, now_ms: i64) -> bool {
    let last = get_millis(store, &viewed_key(pin_id));
    now_ms.saturating_sub(last) >= VIEW_THROTTLE_MS
}

pub fn mark_reported(store: &dyn LocalStore, pin_id: Uuid, now: DateTime<Utc>) {
    if let Err(e) = store.set(&viewed_key(pin_id), &now.timestamp_millis().to_string()) {
        tracing::debug!("could not persist view throttle for {}: {}", pin_id, e);
    }
}

/// Pins with a view report currently on the wire. A second report for the
/// same pin is throttled until the first one settles.
#[derive(Debug, Clone, Default)]
pub struct InFlightViews {
    pins: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightViews {
    /// Claims `pin_id`, or `None` if a report for it is already running.
    pub fn begin(&self, pin_id: Uuid) -> Option<InFlightGuard> {
        let inserted = match self.pins.lock() {
            Ok(mut pins) => pins.insert(pin_id),
            Err(poisoned) => poisoned.into_inner().insert(pin_id),
        };
        inserted.then(|| InFlightGuard {
            pins: Arc::clone(&self.pins),
            pin_id,
        })
    }
}

/// Releases the pin when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    pins: Arc<Mutex<HashSet<Uuid>>>,
    pin_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        match self.pins.lock() {
            Ok(mut pins) => pins.remove(&self.pin_id),
            Err(poisoned) => poisoned.into_inner().remove(&self.pin_id),
        };
    }
}

/// Stable per-device identifier for guest view counting.
///
/// Returns `None` when local storage is unavailable.
pub fn device_id(store: &dyn LocalStore) -> Option<String> {
    match store.get(DEVICE_ID_KEY) {
        Ok(Some(existing)) if !existing.is_empty() => Some(existing),
        Ok(_) => {
            let id = new_device_id(Utc::now());
            match store.set(DEVICE_ID_KEY, &id) {
                Ok(()) => Some(id),
                Err(e) => {
                    tracing::debug!("could not persist device id: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            tracing::debug!("local storage unavailable: {}", e);
            None
        }
    }
}

fn new_device_id(now: DateTime<Utc>) -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(11)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("dev_{}{}", random, to_base36(now.timestamp_millis().max(0) as u64))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Session-scoped memo of per-pin view counts.
///
/// Clones share the same map, so one cache can be handed to every consumer
/// of a session and reset between tests.
#[derive(Debug, Clone, Default)]
pub struct ViewCountCache {
    counts: Arc<Mutex<HashMap<Uuid, i64>>>,
}

impl ViewCountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pin_id: Uuid) -> Option<i64> {
        match self.counts.lock() {
            Ok(counts) => counts.get(&pin_id).copied(),
            Err(poisoned) => poisoned.into_inner().get(&pin_id).copied(),
        }
    }

    pub fn insert(&self, pin_id: Uuid, count: i64) {
        match self.counts.lock() {
            Ok(mut counts) => {
                counts.insert(pin_id, count);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(pin_id, count);
            }
        }
    }

    pub fn clear(&self) {
        match self.counts.lock() {
            Ok(mut counts) => counts.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    pub fn len(&self) -> usize {
        match self.counts.lock() {
            Ok(counts) => counts.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLocalStore;
    use chrono::TimeZone;

    #[test]
    fn test_device_id_is_stable() {
        let store = MemoryLocalStore::new();
        let first = device_id(&store).unwrap();
        assert!(first.starts_with("dev_"));
        assert_eq!(device_id(&store).unwrap(), first);
    }

    #[test]
    fn test_throttle_window() {
        let store = MemoryLocalStore::new();
        let pin = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();

        assert!(should_report(&store, pin, t0.timestamp_millis()));
        mark_reported(&store, pin, t0);

        let later = t0.timestamp_millis() + VIEW_THROTTLE_MS - 1;
        assert!(!should_report(&store, pin, later));
        assert!(should_report(&store, pin, t0.timestamp_millis() + VIEW_THROTTLE_MS));

        // Other pins are throttled independently
        assert!(should_report(&store, Uuid::new_v4(), later));
    }

    #[test]
    fn test_negative_stored_time_reports() {
        let store = MemoryLocalStore::new();
        let pin = Uuid::new_v4();
        store.set(&viewed_key(pin), "-1e30").unwrap();
        assert!(should_report(&store, pin, Utc::now().timestamp_millis()));
        assert!(should_report(&store, pin, i64::MAX));
    }

    #[test]
    fn test_in_flight_claim_is_exclusive() {
        let in_flight = InFlightViews::default();
        let pin = Uuid::new_v4();

        let guard = in_flight.begin(pin).unwrap();
        assert!(in_flight.begin(pin).is_none());
        assert!(in_flight.begin(Uuid::new_v4()).is_some());

        drop(guard);
        assert!(in_flight.begin(pin).is_some());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_cache_clones_share_state() {
        let cache = ViewCountCache::new();
        let shared = cache.clone();
        let pin = Uuid::new_v4();

        shared.insert(pin, 7);
        assert_eq!(cache.get(pin), Some(7));

        cache.clear();
        assert!(shared.is_empty());
    }
}
