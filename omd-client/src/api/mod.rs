mod auth;
mod client;
mod error;
mod transport;

pub use auth::{AuthClient, SignUpOutcome};
pub use client::{BackendClient, Query};
pub use error::{ApiError, ApiResult, Degrade};
pub use transport::{BackendRequest, BackendResponse, HttpTransport, Transport};
