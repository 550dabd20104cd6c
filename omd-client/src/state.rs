use std::sync::Arc;

use crate::api::{AuthClient, BackendClient};
use crate::comments::Comments;
use crate::composer::Compression;
use crate::config::Settings;
use crate::drops::Drops;
use crate::follows::Follows;
use crate::notifications::Notifications;
use crate::profiles::Profiles;
use crate::ratings::Ratings;
use crate::retry::RetryPolicy;
use crate::storage::LocalStore;
use crate::trips::Trips;
use crate::upload::{CdnUploader, MediaUploader};
use crate::views::ViewCountCache;

/// Every service wired to one backend client, one local store and one
/// session-scoped view-count cache.
#[derive(Clone)]
pub struct AppState {
    pub client: BackendClient,
    pub auth: AuthClient,
    pub drops: Drops,
    pub comments: Comments,
    pub ratings: Ratings,
    pub follows: Follows,
    pub notifications: Notifications,
    pub profiles: Profiles,
    pub trips: Trips,
    pub uploader: Arc<dyn MediaUploader>,
    pub store: Arc<dyn LocalStore>,
    pub compression: Compression,
}

impl AppState {
    /// HTTP-backed state from loaded settings.
    pub fn new(settings: &Settings, store: Arc<dyn LocalStore>) -> Self {
        let client = BackendClient::http(
            settings.backend.url.clone(),
            settings.backend.anon_key.clone(),
            settings.backend.schema.clone(),
        );
        let uploader = Arc::new(CdnUploader::new(
            settings.upload.endpoint.clone(),
            settings.upload.cdn_base.clone(),
        ));
        let mut state = Self::with_parts(client, store, uploader, settings.retry.policy(), settings);
        state.compression = Compression {
            max_size: settings.upload.max_size,
            quality: settings.upload.quality,
        };
        state
    }

    /// State over an arbitrary client and uploader.
    pub fn with_parts(
        client: BackendClient,
        store: Arc<dyn LocalStore>,
        uploader: Arc<dyn MediaUploader>,
        retry: RetryPolicy,
        settings: &Settings,
    ) -> Self {
        let follows = Follows::new(client.clone(), retry.clone());
        Self {
            auth: AuthClient::new(client.clone()),
            drops: Drops::new(
                client.clone(),
                store.clone(),
                ViewCountCache::new(),
                retry.clone(),
                settings.media,
            ),
            comments: Comments::new(&client, retry.clone()),
            ratings: Ratings::new(client.clone(), retry.clone()),
            notifications: Notifications::new(client.clone(), retry.clone()),
            profiles: Profiles::new(&client, follows.clone(), retry.clone()),
            trips: Trips::new(client.clone(), follows.clone(), retry),
            follows,
            client,
            uploader,
            store,
            compression: Compression::default(),
        }
    }
}
