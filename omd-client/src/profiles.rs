use std::future::Future;

use chrono::{Datelike, NaiveDate, Utc};
use rand::Rng;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::{FollowStatus, Profile, ProfilePhoto, ProfileStats, ProfileUpdate};

use crate::api::{ApiError, ApiResult, BackendClient};
use crate::follows::Follows;
use crate::retry::{with_backoff, RetryPolicy};

const PROFILES: &str = "profiles";
const PROFILE_PHOTOS: &str = "profile_photos";
const FOLLOW_REQUESTS: &str = "follow_requests";
const PINS: &str = "pins";
const TRIPS: &str = "trips";
const PUBLIC_SCHEMA: &str = "public";

/// Attempts at finding a free `<base><4 digits>` username.
pub const USERNAME_ATTEMPTS: usize = 4;

/// Details collected on the registration form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registration {
    pub display_name: Option<String>,
    /// Preferred username stem; falls back to the display name, then the
    /// email local part
    pub username_base: Option<String>,
    pub email: String,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<String>,
}

/// Profile pages: lookup, editing, stats and photos.
#[derive(Clone)]
pub struct Profiles {
    /// Public schema, where `profiles` lives
    public: BackendClient,
    /// App schema for photos and counts
    omd: BackendClient,
    follows: Follows,
    retry: RetryPolicy,
}

impl Profiles {
    pub fn new(client: &BackendClient, follows: Follows, retry: RetryPolicy) -> Self {
        Self {
            public: client.schema(PUBLIC_SCHEMA),
            omd: client.clone(),
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

    pub async fn by_username(&self, username: &str, cancel: &CancellationToken) -> ApiResult<Option<Profile>> {
        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return Err(ApiError::validation("Missing username"));
        }
        let public = &self.public;
        self.retrying(cancel, || public.from(PROFILES).select("*").eq("username", username).maybe_single())
            .await
    }

    pub async fn by_id(&self, id: Uuid, cancel: &CancellationToken) -> ApiResult<Option<Profile>> {
        let public = &self.public;
        self.retrying(cancel, || public.from(PROFILES).select("*").eq("id", id).maybe_single())
            .await
    }

    /// Edit the signed-in user's profile. The username cannot be changed here.
    pub async fn update_own(&self, update: &ProfileUpdate, cancel: &CancellationToken) -> ApiResult<Profile> {
        if update.is_empty() {
            return Err(ApiError::validation("Nothing to update"));
        }
        let me = self.public.require_user_id()?;
        let public = &self.public;
        let profile = self
            .retrying(cancel, || public.from(PROFILES).eq("id", me).update(update))
            .await?;
        tracing::info!("Updated profile {}", me);
        Ok(profile)
    }

    /// Follower, following, drop and trip totals, counted concurrently.
    pub async fn stats(&self, user_id: Uuid, cancel: &CancellationToken) -> ApiResult<ProfileStats> {
        let omd = &self.omd;
        let accepted = FollowStatus::Accepted.as_str();

        let followers = self.retrying(cancel, || {
            omd.from(FOLLOW_REQUESTS)
                .eq("followed_id", user_id)
                .eq("status", accepted)
                .count()
        });
        let following = self.retrying(cancel, || {
            omd.from(FOLLOW_REQUESTS)
                .eq("follower_id", user_id)
                .eq("status", accepted)
                .count()
        });
        let drops = self.retrying(cancel, || omd.from(PINS).eq("user_id", user_id).count());
        let trips = self.retrying(cancel, || omd.from(TRIPS).eq("user_id", user_id).count());

        let (followers, following, drops, trips) = tokio::try_join!(followers, following, drops, trips)?;
        Ok(ProfileStats {
            followers,
            following,
            drops,
            trips,
        })
    }

    /// Photos on a profile, newest first. Private photos are only returned to
    /// the owner and accepted followers.
    pub async fn photos(&self, user_id: Uuid, cancel: &CancellationToken) -> ApiResult<Vec<ProfilePhoto>> {
        let omd = &self.omd;
        let photos: Vec<ProfilePhoto> = self
            .retrying(cancel, || {
                omd.from(PROFILE_PHOTOS)
                    .select("id, url, is_private, created_at")
                    .eq("user_id", user_id)
                    .order("created_at", false)
                    .fetch()
            })
            .await?;

        if !photos.iter().any(|p| p.is_private) {
            return Ok(photos);
        }
        let viewer = self.omd.current_user_id();
        if self.follows.can_view_private(user_id, viewer, cancel).await? {
            Ok(photos)
        } else {
            Ok(photos.into_iter().filter(|p| !p.is_private).collect())
        }
    }

    /// Attach an already uploaded photo to the signed-in user's profile.
    pub async fn add_photo(
        &self,
        url: &str,
        caption: Option<&str>,
        is_private: bool,
        cancel: &CancellationToken,
    ) -> ApiResult<ProfilePhoto> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ApiError::validation("Missing photo url"));
        }
        let me = self.omd.require_user_id()?;
        let row = json!({
            "user_id": me,
            "url": url,
            "caption": caption.map(str::trim).filter(|c| !c.is_empty()),
            "is_private": is_private,
        });
        let omd = &self.omd;
        self.retrying(cancel, || omd.from(PROFILE_PHOTOS).insert(&row)).await
    }

    pub async fn delete_photo(&self, id: Uuid, cancel: &CancellationToken) -> ApiResult<()> {
        let omd = &self.omd;
        self.retrying(cancel, || omd.from(PROFILE_PHOTOS).eq("id", id).delete())
            .await
    }

    /// Fill in a freshly registered profile with a unique
    /// `<slug><4 digits>` username, retrying on collisions.
    pub async fn claim_username(
        &self,
        user_id: Uuid,
        registration: &Registration,
        cancel: &CancellationToken,
    ) -> ApiResult<String> {
        let base = slugify(username_source(registration));
        let today = Utc::now().date_naive();
        let age = registration.birthdate.and_then(|b| age_on(b, today));
        let display_name = registration
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let sex = registration.sex.as_deref().filter(|s| !s.is_empty());

        let public = &self.public;
        let mut last_err = None;
        for attempt in 1..=USERNAME_ATTEMPTS {
            let username = format!("{}{}", base, random_digits(4));
            let patch = json!({
                "display_name": display_name,
                "username": username,
                "birthdate": registration.birthdate,
                "age": age,
                "is_adult": age.map(|a| a >= 18),
                "sex": sex,
                "updated_at": Utc::now().to_rfc3339(),
            });

            match self
                .retrying(cancel, || public.from(PROFILES).eq("id", user_id).update_minimal(&patch))
                .await
            {
                Ok(()) => {
                    tracing::info!("Claimed username {}", username);
                    return Ok(username);
                }
                Err(ApiError::Conflict(message)) => {
                    tracing::debug!("username {} taken (attempt {}): {}", username, attempt, message);
                    last_err = Some(ApiError::Conflict(message));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ApiError::Conflict("username unavailable".to_string())))
    }
}

fn username_source(registration: &Registration) -> &str {
    [registration.username_base.as_deref(), registration.display_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| registration.email.split('@').next().unwrap_or_default())
}

/// Lowercase, runs of anything but `[a-z0-9]` become one `-`, no leading or
/// trailing dashes; `user` when nothing is left.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "user".to_string()
    } else {
        slug.to_string()
    }
}

fn random_digits(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

/// Whole years between `birthdate` and `today`; `None` for future dates.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FixedJitter;
    use crate::test_support::FakeBackend;
    use regex::Regex;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Arc::new(FixedJitter(Duration::ZERO)))
    }

    fn profiles_for(client: BackendClient) -> Profiles {
        Profiles::new(&client, Follows::new(client.clone(), policy()), policy())
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Alex R."), "alex-r");
        assert_eq!(slugify("  --Road__Runner--  "), "road-runner");
        assert_eq!(slugify("!!!"), "user");
        assert_eq!(slugify(""), "user");
    }

    #[test]
    fn test_age_on() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(age_on(NaiveDate::from_ymd_opt(2007, 6, 15).unwrap(), today), Some(18));
        assert_eq!(age_on(NaiveDate::from_ymd_opt(2007, 6, 16).unwrap(), today), Some(17));
        assert_eq!(age_on(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), today), None);
    }

    #[tokio::test]
    async fn test_claim_username_retries_on_conflict() {
        let fake = FakeBackend::new();
        fake.unique(PROFILES, "username");
        let user = Uuid::new_v4();
        fake.seed(PROFILES, vec![json!({ "id": user, "username": "placeholder" })]);
        fake.fail_next(PROFILES, 409, r#"{"code":"23505","message":"duplicate key"}"#);
        let profiles = profiles_for(fake.client_as(user));

        let registration = Registration {
            display_name: Some("Road Runner".into()),
            email: "rr@example.com".into(),
            ..Default::default()
        };
        let username = profiles
            .claim_username(user, &registration, &CancellationToken::new())
            .await
            .unwrap();

        assert!(Regex::new(r"^road-runner\d{4}$").unwrap().is_match(&username));
        assert_eq!(fake.request_count(), 2);
        let stored = fake.rows(PROFILES);
        assert_eq!(stored[0]["username"], json!(username));
        assert_eq!(stored[0]["display_name"], json!("Road Runner"));
    }

    #[tokio::test]
    async fn test_claim_username_gives_up() {
        let fake = FakeBackend::new();
        for _ in 0..USERNAME_ATTEMPTS {
            fake.fail_next(PROFILES, 409, r#"{"message":"duplicate key"}"#);
        }
        let err = profiles_for(fake.client())
            .claim_username(Uuid::new_v4(), &Registration::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(fake.request_count(), USERNAME_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_lookup_and_update_own() {
        let fake = FakeBackend::new();
        let me = Uuid::new_v4();
        fake.seed(PROFILES, vec![json!({ "id": me, "username": "rider0042" })]);
        let profiles = profiles_for(fake.client_as(me));
        let cancel = CancellationToken::new();

        let found = profiles.by_username("@rider0042", &cancel).await.unwrap().unwrap();
        assert_eq!(found.id, me);
        assert!(found.discoverable);
        assert!(profiles.by_username("nobody", &cancel).await.unwrap().is_none());

        let updated = profiles
            .update_own(
                &ProfileUpdate {
                    bio: Some("Long haul".into()),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Long haul"));
        assert_eq!(updated.username, "rider0042");

        let err = profiles.update_own(&ProfileUpdate::default(), &cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let fake = FakeBackend::new();
        let user = Uuid::new_v4();
        fake.seed(
            FOLLOW_REQUESTS,
            vec![
                json!({ "follower_id": Uuid::new_v4(), "followed_id": user, "status": "accepted" }),
                json!({ "follower_id": Uuid::new_v4(), "followed_id": user, "status": "pending" }),
                json!({ "follower_id": user, "followed_id": Uuid::new_v4(), "status": "accepted" }),
            ],
        );
        fake.seed(PINS, vec![json!({ "id": Uuid::new_v4(), "user_id": user }); 3]);
        fake.seed(TRIPS, vec![json!({ "id": Uuid::new_v4(), "user_id": user })]);

        let stats = profiles_for(fake.client())
            .stats(user, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            stats,
            ProfileStats {
                followers: 1,
                following: 1,
                drops: 3,
                trips: 1
            }
        );
    }

    #[tokio::test]
    async fn test_private_photos_hidden_from_strangers() {
        let fake = FakeBackend::new();
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        fake.seed(
            PROFILE_PHOTOS,
            vec![
                json!({ "id": Uuid::new_v4(), "user_id": owner, "url": "https://cdn/public.jpg", "is_private": false }),
                json!({ "id": Uuid::new_v4(), "user_id": owner, "url": "https://cdn/private.jpg", "is_private": true }),
            ],
        );
        fake.seed(
            FOLLOW_REQUESTS,
            vec![json!({ "follower_id": friend, "followed_id": owner, "status": "accepted" })],
        );
        let cancel = CancellationToken::new();

        let stranger = profiles_for(fake.client_as(Uuid::new_v4()));
        assert_eq!(stranger.photos(owner, &cancel).await.unwrap().len(), 1);
        let anonymous = profiles_for(fake.client());
        assert_eq!(anonymous.photos(owner, &cancel).await.unwrap().len(), 1);

        let follower = profiles_for(fake.client_as(friend));
        assert_eq!(follower.photos(owner, &cancel).await.unwrap().len(), 2);
        let me = profiles_for(fake.client_as(owner));
        assert_eq!(me.photos(owner, &cancel).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_and_delete_photo() {
        let fake = FakeBackend::new();
        let me = Uuid::new_v4();
        let profiles = profiles_for(fake.client_as(me));
        let cancel = CancellationToken::new();

        let photo = profiles
            .add_photo(" https://cdn/me.jpg ", Some("  "), false, &cancel)
            .await
            .unwrap();
        assert_eq!(photo.url, "https://cdn/me.jpg");
        assert_eq!(fake.rows(PROFILE_PHOTOS)[0]["caption"], serde_json::Value::Null);

        profiles.delete_photo(photo.id, &cancel).await.unwrap();
        assert!(fake.rows(PROFILE_PHOTOS).is_empty());
    }
}
