use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use omd_types::MediaKind;

use crate::api::{ApiError, ApiResult};

pub const DEFAULT_MAX_SIZE: u32 = 1280;
pub const DEFAULT_QUALITY: f32 = 0.82;

static EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(\w{1,8})$").expect("extension regex is valid"));

static TRAILING_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[^/.]+$").expect("trailing extension regex is valid"));

/// An in-memory file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Downscale an image so neither side exceeds `max_size` and re-encode it as
/// JPEG at `quality` (0..=1). Images are never upscaled.
pub fn compress_image(bytes: &[u8], file_name: &str, max_size: u32, quality: f32) -> ApiResult<MediaFile> {
    if image::guess_format(bytes).is_err() {
        return Err(ApiError::Image("Invalid image file".to_string()));
    }
    let decoded = image::load_from_memory(bytes)?;

    let (width, height) = (decoded.width(), decoded.height());
    let (target_w, target_h) = fit_within(width, height, max_size);
    let resized = if (target_w, target_h) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();
    let quality = (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;

    tracing::debug!(
        "compressed {} from {}x{} to {}x{} ({} bytes)",
        file_name,
        width,
        height,
        target_w,
        target_h,
        out.get_ref().len()
    );

    Ok(MediaFile::new(jpeg_name(file_name), "image/jpeg", out.into_inner()))
}

/// Target dimensions: scale by `min(max/w, max/h, 1)`, rounded, at least 1px.
pub fn fit_within(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_size as f64 / width as f64)
        .min(max_size as f64 / height as f64)
        .min(1.0);
    let w = ((width as f64 * scale).round() as u32).clamp(1, width);
    let h = ((height as f64 * scale).round() as u32).clamp(1, height);
    (w.min(max_size.max(1)), h.min(max_size.max(1)))
}

fn jpeg_name(file_name: &str) -> String {
    let base = if file_name.trim().is_empty() { "upload" } else { file_name };
    if TRAILING_EXT_RE.is_match(base) {
        TRAILING_EXT_RE.replace(base, ".jpg").into_owned()
    } else {
        format!("{}.jpg", base)
    }
}

/// Lowercased extension of a file name, `jpg` when there is none.
pub fn extension_of(name: &str) -> String {
    EXTENSION_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}

/// Object key `onemoreday/<kind>/<user>/<yyyy>/<mm>/<ts>-<rand6>.<ext>`.
pub fn media_key(user_id: Option<Uuid>, kind: MediaKind, original_name: &str, now: DateTime<Utc>) -> String {
    let user = user_id.map(|u| u.to_string()).unwrap_or_else(|| "anon".to_string());
    let rand6: String = {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        (0..6)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect()
    };
    format!(
        "onemoreday/{}/{}/{}/{:02}/{}-{}.{}",
        kind.as_str(),
        user,
        now.year(),
        now.month(),
        now.timestamp_millis(),
        rand6,
        extension_of(original_name)
    )
}

/// `<cdn base>/<key without leading slashes>`
pub fn public_url_for_key(cdn_base: &str, key: &str) -> String {
    format!("{}/{}", cdn_base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Anything that can store a file under a key and hand back its public URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, file: &MediaFile, key: &str) -> ApiResult<String>;
}

/// Uploads through the CDN worker, which accepts multipart `file`, `key`
/// and `path` fields.
#[derive(Clone)]
pub struct CdnUploader {
    client: Client,
    endpoint: String,
    cdn_base: String,
}

impl CdnUploader {
    pub fn new(endpoint: impl Into<String>, cdn_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            cdn_base: cdn_base.into(),
        }
    }

    pub fn public_url_for_key(&self, key: &str) -> String {
        public_url_for_key(&self.cdn_base, key)
    }
}

#[async_trait]
impl MediaUploader for CdnUploader {
    async fn upload(&self, file: &MediaFile, key: &str) -> ApiResult<String> {
        if file.bytes.is_empty() {
            return Err(ApiError::validation("No file provided"));
        }
        if key.trim().is_empty() {
            return Err(ApiError::validation("Missing storage key"));
        }

        let (path, file_name) = match key.rsplit_once('/') {
            Some((path, name)) if !name.is_empty() => (path.to_string(), name.to_string()),
            Some((path, _)) => (path.to_string(), "upload.bin".to_string()),
            None => (String::new(), key.to_string()),
        };

        let part = Part::bytes(file.bytes.clone())
            .file_name(file_name)
            .mime_str(&file.content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("key", key.to_string())
            .text("path", path);

        tracing::debug!("POST {} ({} bytes, key {})", self.endpoint, file.bytes.len(), key);
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = if text.trim().is_empty() {
                format!("Upload failed ({})", status.as_u16())
            } else {
                text
            };
            return Err(ApiError::Upload {
                status: status.as_u16(),
                message,
            });
        }

        // Prefer the worker's URL; otherwise the deterministic public URL
        let url = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("url").and_then(Value::as_str).map(str::to_string))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.public_url_for_key(key));
        Ok(url)
    }
}
