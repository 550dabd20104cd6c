use std::future::Future;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::Notification;

use crate::api::{ApiResult, BackendClient};
use crate::retry::{with_backoff, RetryPolicy};

const NOTIFICATIONS: &str = "notifications";

/// The signed-in user's notification inbox. Signed-out calls are no-ops.
#[derive(Clone)]
pub struct Notifications {
    client: BackendClient,
    retry: RetryPolicy,
}

impl Notifications {
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

    /// Exact number of unread notifications.
    pub async fn unread_count(&self, cancel: &CancellationToken) -> ApiResult<i64> {
        let Some(me) = self.client.current_user_id() else {
            return Ok(0);
        };
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(NOTIFICATIONS)
                .eq("recipient", me)
                .eq("is_read", false)
                .count()
        })
        .await
    }

    /// All notifications, newest first.
    pub async fn list(&self, cancel: &CancellationToken) -> ApiResult<Vec<Notification>> {
        let Some(me) = self.client.current_user_id() else {
            return Ok(Vec::new());
        };
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(NOTIFICATIONS)
                .select("*")
                .eq("recipient", me)
                .order("created_at", false)
                .fetch()
        })
        .await
    }

    pub async fn mark_all_read(&self, cancel: &CancellationToken) -> ApiResult<()> {
        let Some(me) = self.client.current_user_id() else {
            return Ok(());
        };
        let patch = json!({ "is_read": true });
        let client = &self.client;
        self.retrying(cancel, || {
            client
                .from(NOTIFICATIONS)
                .eq("recipient", me)
                .eq("is_read", false)
                .update_minimal(&patch)
        })
        .await?;
        tracing::debug!("Marked notifications read for {}", me);
        Ok(())
    }

    /// Inbox view: fetch everything, then clear the unread marker.
    pub async fn open_inbox(&self, cancel: &CancellationToken) -> ApiResult<Vec<Notification>> {
        let items = self.list(cancel).await?;
        self.mark_all_read(cancel).await?;
        Ok(items)
    }

    /// Badge shown on the bell icon.
    pub async fn has_unread(&self, cancel: &CancellationToken) -> ApiResult<bool> {
        Ok(self.unread_count(cancel).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FixedJitter;
    use crate::test_support::FakeBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn notifications_for(client: BackendClient) -> Notifications {
        Notifications::new(
            client,
            RetryPolicy::new(3, Duration::from_millis(1), Arc::new(FixedJitter(Duration::ZERO))),
        )
    }

    fn seed(fake: &FakeBackend, me: Uuid, other: Uuid) {
        fake.seed(
            "notifications",
            vec![
                json!({ "id": Uuid::new_v4(), "recipient": me, "message": "old", "is_read": true,
                        "created_at": "2025-03-01T08:00:00Z" }),
                json!({ "id": Uuid::new_v4(), "recipient": me, "message": "newer", "is_read": false,
                        "created_at": "2025-03-02T08:00:00Z" }),
                json!({ "id": Uuid::new_v4(), "recipient": me, "message": "newest", "is_read": false,
                        "created_at": "2025-03-03T08:00:00Z" }),
                json!({ "id": Uuid::new_v4(), "recipient": other, "message": "not mine", "is_read": false,
                        "created_at": "2025-03-04T08:00:00Z" }),
            ],
        );
    }

    #[tokio::test]
    async fn test_count_list_and_mark_read() {
        let fake = FakeBackend::new();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        seed(&fake, me, other);
        let inbox = notifications_for(fake.client_as(me));
        let cancel = CancellationToken::new();

        assert_eq!(inbox.unread_count(&cancel).await.unwrap(), 2);
        assert!(inbox.has_unread(&cancel).await.unwrap());

        let items = inbox.list(&cancel).await.unwrap();
        let messages: Vec<_> = items.iter().filter_map(|n| n.message.as_deref()).collect();
        assert_eq!(messages, vec!["newest", "newer", "old"]);

        inbox.mark_all_read(&cancel).await.unwrap();
        assert_eq!(inbox.unread_count(&cancel).await.unwrap(), 0);

        // Other recipients are untouched
        let theirs = notifications_for(fake.client_as(other));
        assert_eq!(theirs.unread_count(&cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_inbox_clears_badge() {
        let fake = FakeBackend::new();
        let me = Uuid::new_v4();
        seed(&fake, me, Uuid::new_v4());
        let inbox = notifications_for(fake.client_as(me));
        let cancel = CancellationToken::new();

        let items = inbox.open_inbox(&cancel).await.unwrap();
        assert_eq!(items.len(), 3);
        assert!(!items[0].is_read);
        assert!(!inbox.has_unread(&cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_signed_out_is_empty() {
        let fake = FakeBackend::new();
        seed(&fake, Uuid::new_v4(), Uuid::new_v4());
        let inbox = notifications_for(fake.client());
        let cancel = CancellationToken::new();

        assert_eq!(inbox.unread_count(&cancel).await.unwrap(), 0);
        assert!(inbox.list(&cancel).await.unwrap().is_empty());
        inbox.mark_all_read(&cancel).await.unwrap();
        assert_eq!(fake.request_count(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let fake = FakeBackend::new();
        let me = Uuid::new_v4();
        seed(&fake, me, Uuid::new_v4());
        fake.fail_next("notifications", 429, r#"{"message":"slow down"}"#);
        let inbox = notifications_for(fake.client_as(me));

        assert_eq!(inbox.unread_count(&CancellationToken::new()).await.unwrap(), 2);
        assert_eq!(fake.request_count(), 2);
    }
}
