use chrono::Utc;
use tokio_util::sync::CancellationToken;

use omd_types::{Drop, MediaKind, NewDrop};

use crate::api::{ApiError, ApiResult};
use crate::drops::Drops;
use crate::hashtag::extract_hashtags;
use crate::links::is_safe_url;
use crate::upload::{compress_image, media_key, MediaFile, MediaUploader, DEFAULT_MAX_SIZE, DEFAULT_QUALITY};

pub const MISSING_HASHTAG: &str = "Add at least one #hashtag in the note.";
pub const LINK_NOT_ALLOWED: &str = "That link is not allowed.";
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable. Enable GPS and try again.";

/// Re-encoding applied to photos before upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compression {
    pub max_size: u32,
    pub quality: f32,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// What the user has typed and attached in the "Create a Drop" sheet.
#[derive(Debug, Clone, Default)]
pub struct DropDraft {
    pub lat: f64,
    pub lng: f64,
    pub note: String,
    pub files: Vec<MediaFile>,
    /// Pre-hosted image used when no files are attached
    pub image_url_override: Option<String>,
    pub link_url: Option<String>,
}

impl DropDraft {
    pub fn new(lat: f64, lng: f64, note: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            note: note.into(),
            ..Default::default()
        }
    }

    /// Attach files, keeping at most `max_files`.
    pub fn with_files(mut self, files: Vec<MediaFile>, max_files: usize) -> Self {
        self.files = files.into_iter().take(max_files).collect();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link_url = Some(link.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url_override = Some(url.into());
        self
    }

    /// Checks that need no network.
    pub fn validate(&self) -> ApiResult<()> {
        if extract_hashtags(&self.note).is_empty() {
            return Err(ApiError::validation(MISSING_HASHTAG));
        }
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(ApiError::validation(LOCATION_UNAVAILABLE));
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ApiError::validation("Location is out of range."));
        }
        if let Some(link) = self.link_url.as_deref() {
            if !is_safe_url(link) {
                return Err(ApiError::validation(LINK_NOT_ALLOWED));
            }
        }
        Ok(())
    }

    /// [`DropDraft::submit_with`] using the default compression.
    pub async fn submit(
        &self,
        drops: &Drops,
        uploader: &dyn MediaUploader,
        cancel: &CancellationToken,
    ) -> ApiResult<Drop> {
        self.submit_with(drops, uploader, Compression::default(), cancel).await
    }

    /// Validate, upload attached photos in order, then create the drop. Any
    /// failed upload aborts the whole submission.
    pub async fn submit_with(
        &self,
        drops: &Drops,
        uploader: &dyn MediaUploader,
        compression: Compression,
        cancel: &CancellationToken,
    ) -> ApiResult<Drop> {
        self.validate()?;

        let user_id = drops.client().current_user_id();
        let max_files = drops.limits().composer_max_files;
        let mut media_urls = Vec::new();

        if !self.files.is_empty() {
            for file in self.files.iter().take(max_files) {
                let compressed = compress_image(&file.bytes, &file.name, compression.max_size, compression.quality)?;
                let key = media_key(user_id, MediaKind::Posts, &file.name, Utc::now());
                let url = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                    result = uploader.upload(&compressed, &key) => result?,
                };
                media_urls.push(url);
            }
        } else if let Some(url) = self
            .image_url_override
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            media_urls.push(url.to_string());
        }

        let note = self.note.trim();
        let new_drop = NewDrop {
            lat: self.lat,
            lng: self.lng,
            note: (!note.is_empty()).then(|| note.to_string()),
            media_url: media_urls.first().cloned(),
            media_urls: (!media_urls.is_empty()).then_some(media_urls),
            link_url: self
                .link_url
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            is_private: false,
        };

        drops.add_drop(new_drop, cancel).await
    }
}
