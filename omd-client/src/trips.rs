use std::future::Future;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::{NewStop, NewTrip, Stop, StopPatch, Trip, TripPatch};

use crate::api::{ApiError, ApiResult, BackendClient};
use crate::follows::Follows;
use crate::retry::{with_backoff, RetryPolicy};

const TRIPS: &str = "trips";
const STOPS: &str = "stops";

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Which trips to list and for whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripFilter {
    /// Whose trips; `None` means the viewer's own
    pub owner: Option<Uuid>,
    pub viewer: Option<Uuid>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TripFilter {
    fn default() -> Self {
        Self {
            owner: None,
            viewer: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Trips and their stops.
#[derive(Clone)]
pub struct Trips {
    client: BackendClient,
    follows: Follows,
    retry: RetryPolicy,
}

impl Trips {
    pub fn new(client: BackendClient, follows: Follows, retry: RetryPolicy) -> Self {
        Self {
            client,
            follows,
            retry,
        }
    }

    async fn retrying<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        with_backoff(&self.retry, cancel, op).await
    }

    /// Trips newest first. Owners and accepted followers see private trips;
    /// everyone else only public ones.
    pub async fn list(&self, filter: TripFilter, cancel: &CancellationToken) -> ApiResult<Vec<Trip>> {
        let Some(owner) = filter.owner.or(filter.viewer) else {
            return Ok(Vec::new());
        };
        let public_only = !self.follows.can_view_private(owner, filter.viewer, cancel).await?;

        let client = &self.client;
        let last = filter.offset.saturating_add(filter.limit.max(1) - 1);
        self.retrying(cancel, || {
            let query = client
                .from(TRIPS)
                .select("*")
                .eq("user_id", owner)
                .order("created_at", false)
                .range(filter.offset, last);
            let query = if public_only {
                query.eq("is_private", false)
            } else {
                query
            };
            query.fetch()
        })
        .await
    }

    pub async fn get(&self, id: Uuid, cancel: &CancellationToken) -> ApiResult<Option<Trip>> {
        let client = &self.client;
        self.retrying(cancel, || client.from(TRIPS).select("*").eq("id", id).maybe_single())
            .await
    }

    pub async fn create(&self, trip: &NewTrip, cancel: &CancellationToken) -> ApiResult<Trip> {
        if trip.title.trim().is_empty() {
            return Err(ApiError::validation("A trip needs a title"));
        }
        if let (Some(start), Some(end)) = (trip.start_date, trip.end_date) {
            if end < start {
                return Err(ApiError::validation("End date is before start date"));
            }
        }

        let client = &self.client;
        let created: Trip = self
            .retrying(cancel, || client.from(TRIPS).insert(trip))
            .await?;
        tracing::info!("Created trip {}", created.id);
        Ok(created)
    }

    /// Partial update; stamps `updated_at`.
    pub async fn update(&self, id: Uuid, patch: &TripPatch, cancel: &CancellationToken) -> ApiResult<Trip> {
        let body = stamped(patch)?;
        let client = &self.client;
        self.retrying(cancel, || client.from(TRIPS).eq("id", id).update(&body))
            .await
    }

    pub async fn delete(&self, id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        let client = &self.client;
        self.retrying(cancel, || client.from(TRIPS).eq("id", id).delete())
            .await?;
        tracing::info!("Deleted trip {}", id);
        Ok(())
    }

    /// Stops of a trip ordered by day, then position within the day.
    pub async fn stops(&self, trip_id: Uuid, cancel: &CancellationToken) -> ApiResult<Vec<Stop>> {
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(STOPS)
                .select("*")
                .eq("trip_id", trip_id)
                .order("day_index", true)
                .order("order_index", true)
                .fetch()
        })
        .await
    }

    pub async fn add_stop(&self, stop: &NewStop, cancel: &CancellationToken) -> ApiResult<Stop> {
        if stop.title.trim().is_empty() {
            return Err(ApiError::validation("A stop needs a title"));
        }
        if stop.day_index < 0 || stop.order_index < 0 {
            return Err(ApiError::validation("Day and order must not be negative"));
        }
        let client = &self.client;
        self.retrying(cancel, || client.from(STOPS).insert(stop)).await
    }

    /// Partial update; stamps `updated_at`.
    pub async fn update_stop(&self, id: Uuid, patch: &StopPatch, cancel: &CancellationToken) -> ApiResult<Stop> {
        let body = stamped(patch)?;
        let client = &self.client;
        self.retrying(cancel, || client.from(STOPS).eq("id", id).update(&body))
            .await
    }

    pub async fn delete_stop(&self, id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        let client = &self.client;
        self.retrying(cancel, || client.from(STOPS).eq("id", id).delete())
            .await
    }
}

/// Patch body with `updated_at` set to now. Empty patches are rejected.
fn stamped(patch: &impl Serialize) -> ApiResult<Map<String, Value>> {
    let mut body = match serde_json::to_value(patch)? {
        Value::Object(map) if !map.is_empty() => map,
        _ => return Err(ApiError::validation("Nothing to update")),
    };
    body.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
    Ok(body)
}
