use std::collections::HashMap;
use std::future::Future;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::{Comment, CommentWithAuthor, ProfileSummary};

use crate::api::{ApiError, ApiResult, BackendClient, Degrade};
use crate::retry::{with_backoff, RetryPolicy};

const DROP_COMMENTS: &str = "drop_comments";
const PROFILES: &str = "profiles";
const PUBLIC_SCHEMA: &str = "public";

/// Comment threads under a drop. Comments and profiles live in the public
/// schema.
#[derive(Clone)]
pub struct Comments {
    client: BackendClient,
    retry: RetryPolicy,
}

impl Comments {
    pub fn new(client: &BackendClient, retry: RetryPolicy) -> Self {
        Self {
            client: client.schema(PUBLIC_SCHEMA),
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

    pub async fn count(&self, drop_id: Uuid, cancel: &CancellationToken) -> ApiResult<i64> {
        let client = &self.client;
        self.retrying(cancel, || client.from(DROP_COMMENTS).eq("drop_id", drop_id).count())
            .await
    }

    /// Comments newest first, each with its author's profile when it could
    /// be loaded.
    pub async fn list(
        &self,
        drop_id: Uuid,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<CommentWithAuthor>> {
        let client = &self.client;
        let comments: Vec<Comment> = self
            .retrying(cancel, || {
                client
                    .from(DROP_COMMENTS)
                    .select("id, drop_id, user_id, comment, created_at")
                    .eq("drop_id", drop_id)
                    .order("created_at", false)
                    .fetch()
            })
            .await?;

        let mut author_ids: Vec<Uuid> = Vec::new();
        for comment in &comments {
            if !author_ids.contains(&comment.user_id) {
                author_ids.push(comment.user_id);
            }
        }

        let authors: HashMap<Uuid, ProfileSummary> = if author_ids.is_empty() {
            HashMap::new()
        } else {
            let ids = author_ids.as_slice();
            self.retrying(cancel, || {
                client
                    .from(PROFILES)
                    .select("id, username, display_name, photo_url")
                    .in_list("id", ids)
                    .fetch::<ProfileSummary>()
            })
            .await
            .or_degrade("comments.authors")
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
        };

        Ok(comments
            .into_iter()
            .map(|comment| {
                let author = authors.get(&comment.user_id).cloned();
                CommentWithAuthor { comment, author }
            })
            .collect())
    }

    /// Post as the signed-in user. The body is trimmed and must not be empty.
    pub async fn post(
        &self,
        drop_id: Uuid,
        body: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<Comment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ApiError::validation("Comment cannot be empty"));
        }
        let user_id = self.client.require_user_id()?;

        let row = json!({ "drop_id": drop_id, "user_id": user_id, "comment": body });
        let client = &self.client;
        let comment = self
            .retrying(cancel, || client.from(DROP_COMMENTS).insert(&row))
            .await?;
        tracing::debug!("Posted comment on drop {}", drop_id);
        Ok(comment)
    }
}
