use std::future::Future;

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::{FollowRequest, FollowStatus};

use crate::api::{ApiError, ApiResult, BackendClient};
use crate::retry::{with_backoff, RetryPolicy};

const FOLLOW_REQUESTS: &str = "follow_requests";

/// Follow requests between users. A request starts `pending` and the
/// followed user accepts or rejects it.
#[derive(Clone)]
pub struct Follows {
    client: BackendClient,
    retry: RetryPolicy,
}

impl Follows {
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

    /// Ask to follow `target_id` as the signed-in user.
    pub async fn send_request(&self, target_id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        let follower_id = self.client.require_user_id()?;
        if follower_id == target_id {
            return Err(ApiError::validation("You cannot follow yourself"));
        }

        let row = json!({
            "follower_id": follower_id,
            "followed_id": target_id,
            "status": FollowStatus::Pending.as_str(),
        });
        let client = &self.client;
        self.retrying(cancel, || client.from(FOLLOW_REQUESTS).insert_minimal(&row))
            .await?;
        tracing::info!("Sent follow request to {}", target_id);
        Ok(())
    }

    /// Withdraw a pending request or unfollow.
    pub async fn cancel(&self, target_id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        let follower_id = self.client.require_user_id()?;
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(FOLLOW_REQUESTS)
                .eq("follower_id", follower_id)
                .eq("followed_id", target_id)
                .delete()
        })
        .await
    }

    pub async fn accept(&self, follower_id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        self.respond(follower_id, FollowStatus::Accepted, cancel).await
    }

    pub async fn reject(&self, follower_id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        self.respond(follower_id, FollowStatus::Rejected, cancel).await
    }

    async fn respond(
        &self,
        follower_id: Uuid,
        status: FollowStatus,
        cancel: &CancellationToken,
    ) -> ApiResult<()> {
        let followed_id = self.client.require_user_id()?;
        let patch = json!({ "status": status.as_str() });
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(FOLLOW_REQUESTS)
                .eq("follower_id", follower_id)
                .eq("followed_id", followed_id)
                .update_minimal(&patch)
        })
        .await?;
        tracing::info!("Follow request from {} {}", follower_id, status.as_str());
        Ok(())
    }

    /// Pending requests addressed to the signed-in user, newest first.
    pub async fn incoming(&self, cancel: &CancellationToken) -> ApiResult<Vec<FollowRequest>> {
        match self.client.current_user_id() {
            Some(me) => self.list("followed_id", me, FollowStatus::Pending, cancel).await,
            None => Ok(Vec::new()),
        }
    }

    /// Pending requests the signed-in user has sent, newest first.
    pub async fn outgoing(&self, cancel: &CancellationToken) -> ApiResult<Vec<FollowRequest>> {
        match self.client.current_user_id() {
            Some(me) => self.list("follower_id", me, FollowStatus::Pending, cancel).await,
            None => Ok(Vec::new()),
        }
    }

    /// Accepted followers of `user_id`.
    pub async fn followers(&self, user_id: Uuid, cancel: &CancellationToken) -> ApiResult<Vec<FollowRequest>> {
        self.list("followed_id", user_id, FollowStatus::Accepted, cancel).await
    }

    /// Users `user_id` follows (accepted only).
    pub async fn following(&self, user_id: Uuid, cancel: &CancellationToken) -> ApiResult<Vec<FollowRequest>> {
        self.list("follower_id", user_id, FollowStatus::Accepted, cancel).await
    }

    async fn list(
        &self,
        column: &str,
        user_id: Uuid,
        status: FollowStatus,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<FollowRequest>> {
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(FOLLOW_REQUESTS)
                .select("*")
                .eq(column, user_id)
                .eq("status", status.as_str())
                .order("created_at", false)
                .fetch()
        })
        .await
    }

    /// State of the signed-in user's request towards `target_id`.
    pub async fn relationship(
        &self,
        target_id: Uuid,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<FollowStatus>> {
        match self.client.current_user_id() {
            Some(me) => self.status_between(me, target_id, cancel).await,
            None => Ok(None),
        }
    }

    /// Status of the request from `follower_id` to `followed_id`, if one exists.
    pub async fn status_between(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<FollowStatus>> {
        #[derive(Deserialize)]
        struct StatusRow {
            status: FollowStatus,
        }

        let client = &self.client;
        let row: Option<StatusRow> = self
            .retrying(cancel, || {
                client
                    .from(FOLLOW_REQUESTS)
                    .select("status")
                    .eq("follower_id", follower_id)
                    .eq("followed_id", followed_id)
                    .maybe_single()
            })
            .await?;
        Ok(row.map(|r| r.status))
    }

    /// Whether `viewer` may see `owner`'s private content: the owner, or an
    /// accepted follower.
    pub async fn can_view_private(
        &self,
        owner: Uuid,
        viewer: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> ApiResult<bool> {
        match viewer {
            Some(viewer) if viewer == owner => Ok(true),
            Some(viewer) => Ok(self.status_between(viewer, owner, cancel).await? == Some(FollowStatus::Accepted)),
            None => Ok(false),
        }
    }
}
