use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::{Drop, DropPatch, DropWithStats, NewDrop, TopPoster, VoteCounts, VoteValue};

use crate::api::{ApiError, ApiResult, BackendClient};
use crate::config::MediaLimits;
use crate::retry::{with_backoff, RetryPolicy};
use crate::storage::LocalStore;
use crate::views::{self, InFlightViews, ViewCountCache, ViewOutcome};

const PINS: &str = "pins";
const PINS_WITH_PROFILE: &str = "pins_with_profile";
const PIN_VOTES: &str = "pin_votes";
const PIN_REPORTS: &str = "pin_reports";
const MY_PINS_LIST: &str = "my_pins_list";
const TOP_POSTERS: &str = "top_posters";

pub const DEFAULT_TOP_POSTERS: usize = 5;

// First non-null source column wins.
const DISPLAY_NAME_ALIASES: &[&str] = &["display_name", "profiles_display_name", "profile_display_name"];
const USERNAME_ALIASES: &[&str] = &["username", "profiles_username", "profile_username"];
const AVATAR_ALIASES: &[&str] = &["avatar_url", "photo_url", "profiles_photo_url"];
const IMAGE_ALIASES: &[&str] = &["image_url", "media_url"];

/// Data access for drops (map pins): feed, own pins, votes, views, reports.
///
/// Every request goes through the 429 backoff helper and honours the
/// caller's cancellation token.
#[derive(Clone)]
pub struct Drops {
    client: BackendClient,
    store: Arc<dyn LocalStore>,
    views: ViewCountCache,
    in_flight: InFlightViews,
    retry: RetryPolicy,
    limits: MediaLimits,
}

impl Drops {
    pub fn new(
        client: BackendClient,
        store: Arc<dyn LocalStore>,
        views: ViewCountCache,
        retry: RetryPolicy,
        limits: MediaLimits,
    ) -> Self {
        Self {
            client,
            store,
            views,
            in_flight: InFlightViews::default(),
            retry,
            limits,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn limits(&self) -> MediaLimits {
        self.limits
    }

    pub fn view_cache(&self) -> &ViewCountCache {
        &self.views
    }

    async fn retrying<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        with_backoff(&self.retry, cancel, op).await
    }

    /// Public map feed, newest first.
    pub async fn fetch_active_drops(&self, cancel: &CancellationToken) -> ApiResult<Vec<Drop>> {
        let client = &self.client;
        let rows = self
            .retrying(cancel, || {
                client
                    .from(PINS_WITH_PROFILE)
                    .select("*")
                    .order("created_at", false)
                    .fetch_values()
            })
            .await?;

        Ok(decode_drops(rows, |row| normalize_feed_row(row, self.limits.read_cap)))
    }

    /// One user's pins, newest first.
    pub async fn fetch_my_drops(
        &self,
        user_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<Drop>> {
        let user_id = user_id.ok_or_else(|| ApiError::validation("Missing userId"))?;
        let client = &self.client;
        let rows = self
            .retrying(cancel, || {
                client
                    .from(PINS)
                    .select("*")
                    .eq("user_id", user_id)
                    .order("created_at", false)
                    .fetch_values()
            })
            .await?;

        Ok(decode_drops(rows, |row| normalize_own_row(row, self.limits.read_cap)))
    }

    /// Pins shown on a profile page; same rows as [`Drops::fetch_my_drops`].
    pub async fn list_drops_by_profile(
        &self,
        profile_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<Drop>> {
        let profile_id = profile_id.ok_or_else(|| ApiError::validation("Missing profileId"))?;
        self.fetch_my_drops(Some(profile_id), cancel).await
    }

    /// Create a pin and return it as stored.
    pub async fn add_drop(&self, drop: NewDrop, cancel: &CancellationToken) -> ApiResult<Drop> {
        let body = build_insert_body(&drop, self.client.current_user_id(), self.limits.write_cap)?;
        let client = &self.client;
        let row: Value = self
            .retrying(cancel, || client.from(PINS).insert(&body))
            .await?;

        tracing::info!("Created drop at ({}, {})", drop.lat, drop.lng);
        Ok(serde_json::from_value(normalize_own_row(row, self.limits.write_cap))?)
    }

    /// Owner-only partial update.
    pub async fn update_drop(
        &self,
        id: Uuid,
        patch: DropPatch,
        cancel: &CancellationToken,
    ) -> ApiResult<Drop> {
        let body = build_patch_body(&patch, self.limits.write_cap)?;
        let client = &self.client;
        let row: Value = self
            .retrying(cancel, || client.from(PINS).eq("id", id).update(&body))
            .await?;

        Ok(serde_json::from_value(normalize_own_row(row, self.limits.write_cap))?)
    }

    pub async fn delete_drop(&self, id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        let client = &self.client;
        self.retrying(cancel, || client.from(PINS).eq("id", id).delete())
            .await?;
        tracing::info!("Deleted drop {}", id);
        Ok(())
    }

    /// The user's current vote on a pin, if any.
    pub async fn get_vote(
        &self,
        pin_id: Uuid,
        user_id: Uuid,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<VoteValue>> {
        #[derive(Deserialize)]
        struct VoteRow {
            value: VoteValue,
        }

        let client = &self.client;
        let row: Option<VoteRow> = self
            .retrying(cancel, || {
                client
                    .from(PIN_VOTES)
                    .select("value")
                    .eq("pin_id", pin_id)
                    .eq("user_id", user_id)
                    .maybe_single()
            })
            .await?;
        Ok(row.map(|r| r.value))
    }

    /// Up and down totals, counted concurrently.
    pub async fn get_vote_counts(
        &self,
        pin_id: Uuid,
        cancel: &CancellationToken,
    ) -> ApiResult<VoteCounts> {
        let client = &self.client;
        let count_for = |value: i8| {
            self.retrying(cancel, move || {
                client
                    .from(PIN_VOTES)
                    .select("*")
                    .eq("pin_id", pin_id)
                    .eq("value", value)
                    .count()
            })
        };

        let (up, down) = tokio::try_join!(count_for(VoteValue::Up.as_i8()), count_for(VoteValue::Down.as_i8()))?;
        Ok(VoteCounts { up, down })
    }

    /// Cast, change or clear the signed-in user's vote.
    pub async fn set_vote(
        &self,
        pin_id: Uuid,
        value: VoteValue,
        cancel: &CancellationToken,
    ) -> ApiResult<()> {
        let user_id = self.client.require_user_id()?;
        let client = &self.client;

        if value == VoteValue::Clear {
            return self
                .retrying(cancel, || {
                    client
                        .from(PIN_VOTES)
                        .eq("pin_id", pin_id)
                        .eq("user_id", user_id)
                        .delete()
                })
                .await;
        }

        let row = json!({ "pin_id": pin_id, "user_id": user_id, "value": value.as_i8() });
        self.retrying(cancel, || client.from(PIN_VOTES).upsert(&row, "user_id,pin_id"))
            .await
    }

    /// Report a view of `pin_id`, at most once per device every 12 hours.
    /// Concurrent calls for the same pin on one `Drops` send a single report.
    pub async fn record_view(
        &self,
        pin_id: Uuid,
        cancel: &CancellationToken,
    ) -> ApiResult<ViewOutcome> {
        self.record_view_at(pin_id, Utc::now(), cancel).await
    }

    /// [`Drops::record_view`] with an explicit clock.
    pub async fn record_view_at(
        &self,
        pin_id: Uuid,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> ApiResult<ViewOutcome> {
        let store = self.store.as_ref();
        if !views::should_report(store, pin_id, now.timestamp_millis()) {
            return Ok(ViewOutcome::Throttled);
        }
        let Some(_claim) = self.in_flight.begin(pin_id) else {
            return Ok(ViewOutcome::Throttled);
        };

        let args = json!({
            "p_pin_id": pin_id,
            "p_device_id": views::device_id(store),
        });
        let client = &self.client;
        let _: Value = self
            .retrying(cancel, || client.rpc("record_pin_view", args.clone()))
            .await?;

        // Only throttle once the server has the view
        views::mark_reported(store, pin_id, now);
        Ok(ViewOutcome::Recorded)
    }

    /// Total views of a pin, memoised for the session.
    pub async fn get_view_count(&self, pin_id: Uuid, cancel: &CancellationToken) -> ApiResult<i64> {
        if let Some(count) = self.views.get(pin_id) {
            return Ok(count);
        }

        let args = json!({ "p_pin_id": pin_id });
        let client = &self.client;
        let raw: Value = self
            .retrying(cancel, || client.rpc("get_pin_view_count", args.clone()))
            .await?;

        let count = lenient_count(&raw);
        self.views.insert(pin_id, count);
        Ok(count)
    }

    /// Own pins with view and vote totals from the `my_pins_list` view.
    pub async fn fetch_my_drops_with_stats(
        &self,
        user_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<DropWithStats>> {
        let user_id = user_id.ok_or_else(|| ApiError::validation("Missing userId"))?;
        let client = &self.client;
        let rows = self
            .retrying(cancel, || {
                client
                    .from(MY_PINS_LIST)
                    .select("*")
                    .eq("user_id", user_id)
                    .order("created_at", false)
                    .fetch_values()
            })
            .await?;

        let cap = self.limits.read_cap;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                serde_json::from_value(normalize_own_row(row, cap))
                    .map_err(|e| tracing::warn!("[fetch_my_drops_with_stats] skipping row: {}", e))
                    .ok()
            })
            .collect())
    }

    pub async fn fetch_top_posters(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<TopPoster>> {
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(TOP_POSTERS)
                .select("*")
                .order("pin_count", false)
                .limit(limit)
                .fetch()
        })
        .await
    }

    /// Flag a pin for moderation.
    pub async fn report_drop(
        &self,
        pin_id: Uuid,
        reason: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::validation("A reason is required"));
        }
        let reporter_id = self.client.require_user_id()?;

        let row = json!({ "pin_id": pin_id, "reason": reason, "reporter_id": reporter_id });
        let client = &self.client;
        self.retrying(cancel, || client.from(PIN_REPORTS).insert_minimal(&row))
            .await?;
        tracing::info!("Reported drop {}", pin_id);
        Ok(())
    }
}

fn decode_drops(rows: Vec<Value>, normalize: impl Fn(Value) -> Value) -> Vec<Drop> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Drop>(normalize(row)) {
            Ok(drop) => Some(drop),
            Err(e) => {
                tracing::warn!("skipping malformed drop row: {}", e);
                None
            }
        })
        .collect()
}

/// Coerce a `media_urls` value (array, scalar or null) into at most `cap`
/// non-empty strings; `None` when nothing remains.
pub fn coerce_media_urls(value: &Value, cap: usize) -> Option<Vec<String>> {
    let urls: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(truthy_string).take(cap).collect(),
        other => truthy_string(other).map(|s| s.trim().to_string()).into_iter().filter(|s| !s.is_empty()).collect(),
    };
    if urls.is_empty() {
        None
    } else {
        Some(urls)
    }
}

fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn first_present(row: &Map<String, Value>, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Fold the feed view's aliased profile and media columns into one shape.
fn normalize_feed_row(row: Value, read_cap: usize) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };

    let display_name = first_present(&map, DISPLAY_NAME_ALIASES);
    let username = first_present(&map, USERNAME_ALIASES);
    let avatar_url = first_present(&map, AVATAR_ALIASES);
    let image_url = first_present(&map, IMAGE_ALIASES);

    map.insert("display_name".into(), display_name);
    map.insert("username".into(), username);
    map.insert("avatar_url".into(), avatar_url);
    map.insert("image_url".into(), image_url);
    coerce_media_field(&mut map, read_cap);

    Value::Object(map)
}

fn normalize_own_row(row: Value, cap: usize) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };
    coerce_media_field(&mut map, cap);
    Value::Object(map)
}

fn coerce_media_field(map: &mut Map<String, Value>, cap: usize) {
    let coerced = map
        .get("media_urls")
        .and_then(|v| coerce_media_urls(v, cap));
    map.insert("media_urls".into(), json!(coerced));
}

fn blank_to_null(value: &Option<String>) -> Value {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Value::String(s.to_string()),
        _ => Value::Null,
    }
}

fn check_coordinates(lat: f64, lng: f64) -> ApiResult<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::validation("Latitude must be between -90 and 90"));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::validation("Longitude must be between -180 and 180"));
    }
    Ok(())
}

/// Insert body for a new pin. The legacy `image_url` falls back to the
/// first array element.
pub fn build_insert_body(drop: &NewDrop, user_id: Option<Uuid>, write_cap: usize) -> ApiResult<Value> {
    check_coordinates(drop.lat, drop.lng)?;

    let media_urls = drop
        .media_urls
        .as_ref()
        .and_then(|urls| coerce_media_urls(&json!(urls), write_cap));
    let legacy = drop
        .media_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .map(str::to_string)
        .or_else(|| media_urls.as_ref().and_then(|u| u.first().cloned()));

    let mut body = json!({
        "lat": drop.lat,
        "lng": drop.lng,
        "note": blank_to_null(&drop.note),
        "image_url": legacy,
        "media_urls": media_urls,
        "link_url": blank_to_null(&drop.link_url),
        "is_private": drop.is_private,
    });
    if let (Some(user_id), Value::Object(map)) = (user_id, &mut body) {
        map.insert("user_id".into(), json!(user_id));
    }
    Ok(body)
}

/// Update body for a patch. Writing `media_urls` without `image_url` keeps
/// the legacy column mirrored to the first element (or null).
pub fn build_patch_body(patch: &DropPatch, write_cap: usize) -> ApiResult<Map<String, Value>> {
    if patch.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }
    if let Some(lat) = patch.lat {
        check_coordinates(lat, 0.0)?;
    }
    if let Some(lng) = patch.lng {
        check_coordinates(0.0, lng)?;
    }

    let Value::Object(mut body) = serde_json::to_value(patch)? else {
        return Err(ApiError::validation("Nothing to update"));
    };

    if let Some(media) = &patch.media_urls {
        let coerced = media
            .as_ref()
            .and_then(|urls| coerce_media_urls(&json!(urls), write_cap));
        if patch.image_url.is_none() {
            let first = coerced.as_ref().and_then(|u| u.first().cloned());
            body.insert("image_url".into(), json!(first));
        }
        body.insert("media_urls".into(), json!(coerced));
    }
    Ok(body)
}

fn lenient_count(raw: &Value) -> i64 {
    let n = match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n as i64
    } else {
        0
    }
}
