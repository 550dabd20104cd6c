use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too Many Requests: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Upload failed ({status}): {message}")]
    Upload { status: u16, message: String },

    #[error("Image error: {0}")]
    Image(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// True for HTTP 429 responses, including ones that only surface as a
    /// "Too Many Requests" message.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ApiError::RateLimited(_) => true,
            ApiError::Api { status, .. } | ApiError::Upload { status, .. } => *status == 429,
            ApiError::Network(e) => {
                e.status().is_some_and(|s| s.as_u16() == 429)
                    || contains_too_many_requests(&e.to_string())
            }
            other => contains_too_many_requests(&other.to_string()),
        }
    }
}

fn contains_too_many_requests(message: &str) -> bool {
    message.to_lowercase().contains("too many requests")
}

impl From<image::ImageError> for ApiError {
    fn from(err: image::ImageError) -> Self {
        ApiError::Image(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Explicit opt-in to silent degradation at a call site: log and fall back
/// to the type's default (zero counts, empty lists, `None`).
pub trait Degrade<T> {
    fn or_degrade(self, context: &str) -> T;

    /// Like [`Degrade::or_degrade`] but rate-limit failures are not logged.
    fn or_degrade_quiet_429(self, context: &str) -> T;
}

impl<T: Default> Degrade<T> for ApiResult<T> {
    fn or_degrade(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("[{}] {}", context, e);
                T::default()
            }
        }
    }

    fn or_degrade_quiet_429(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) if e.is_rate_limited() => T::default(),
            Err(e) => {
                tracing::warn!("[{}] {}", context, e);
                T::default()
            }
        }
    }
}
