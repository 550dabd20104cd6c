use std::future::Future;

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::RatingSummary;

use crate::api::{ApiError, ApiResult, BackendClient};
use crate::retry::{with_backoff, RetryPolicy};

const PIN_RATINGS: &str = "pin_ratings";

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Deserialize)]
struct RatingRow {
    rating: u8,
}

/// Star ratings (1 to 5) on drops, one per user and drop.
#[derive(Clone)]
pub struct Ratings {
    client: BackendClient,
    retry: RetryPolicy,
}

impl Ratings {
    pub fn new(client: BackendClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn retrying<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        with_backoff(&self.retry, cancel, op).await
    }

    /// Average and number of ratings for a drop.
    pub async fn summary(&self, pin_id: Uuid, cancel: &CancellationToken) -> ApiResult<RatingSummary> {
        let client = &self.client;
        let rows: Vec<RatingRow> = self
            .retrying(cancel, || {
                client
                    .from(PIN_RATINGS)
                    .select("rating")
                    .eq("pin_id", pin_id)
                    .fetch()
            })
            .await?;
        Ok(summarize(rows.iter().map(|r| r.rating)))
    }

    /// The signed-in user's rating, if any. Signed out reads as none.
    pub async fn mine(&self, pin_id: Uuid, cancel: &CancellationToken) -> ApiResult<Option<u8>> {
        let Some(user_id) = self.client.current_user_id() else {
            return Ok(None);
        };
        let client = &self.client;
        let row: Option<RatingRow> = self
            .retrying(cancel, || {
                client
                    .from(PIN_RATINGS)
                    .select("rating")
                    .eq("pin_id", pin_id)
                    .eq("user_id", user_id)
                    .maybe_single()
            })
            .await?;
        Ok(row.map(|r| r.rating))
    }

    /// Rate or re-rate a drop and return the refreshed summary.
    pub async fn rate(
        &self,
        pin_id: Uuid,
        value: u8,
        cancel: &CancellationToken,
    ) -> ApiResult<RatingSummary> {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(ApiError::validation(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        let user_id = self.client.require_user_id()?;

        let row = json!({ "pin_id": pin_id, "user_id": user_id, "rating": value });
        let client = &self.client;
        self.retrying(cancel, || client.from(PIN_RATINGS).upsert(&row, "pin_id,user_id"))
            .await?;
        self.summary(pin_id, cancel).await
    }
}

/// Mean of the given ratings; zero when there are none.
pub fn summarize(ratings: impl IntoIterator<Item = u8>) -> RatingSummary {
    let (total, count) = ratings
        .into_iter()
        .fold((0u64, 0usize), |(total, count), r| (total + u64::from(r), count + 1));
    if count == 0 {
        return RatingSummary::default();
    }
    RatingSummary {
        average: total as f64 / count as f64,
        count,
    }
}
