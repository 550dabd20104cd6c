use std::fmt::Display;
use std::sync::{Arc, RwLock};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use omd_types::AuthSession;

use super::transport::{BackendRequest, BackendResponse, HttpTransport, Transport};
use super::{ApiError, ApiResult};

const REST_PREFIX: &str = "rest/v1";

/// Handle to the hosted database/auth service.
///
/// Cloning is cheap: clones share the transport and the signed-in session.
#[derive(Clone)]
pub struct BackendClient {
    transport: Arc<dyn Transport>,
    anon_key: String,
    schema: String,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl BackendClient {
    /// Create a client on top of an arbitrary transport
    pub fn new(
        transport: Arc<dyn Transport>,
        anon_key: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            anon_key: anon_key.into(),
            schema: schema.into(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a client talking HTTP to `base_url`
    pub fn http(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self::new(Arc::new(HttpTransport::new(base_url)), anon_key, schema)
    }

    /// Same connection and session, different schema
    pub fn schema(&self, schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..self.clone()
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Replace the signed-in session (None signs out locally)
    pub fn set_session(&self, session: Option<AuthSession>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn current_user_id(&self) -> Option<Uuid> {
        self.session().map(|s| s.user.id)
    }

    /// Id of the signed-in user, or `NotSignedIn`
    pub fn require_user_id(&self) -> ApiResult<Uuid> {
        self.current_user_id().ok_or(ApiError::NotSignedIn)
    }

    /// Start a query against a table or view in the client's schema
    pub fn from(&self, table: &str) -> Query<'_> {
        Query::new(self, table)
    }

    /// Call a server-side function
    pub async fn rpc<T: DeserializeOwned>(&self, function: &str, args: Value) -> ApiResult<T> {
        let request = BackendRequest::new(Method::POST, format!("{}/rpc/{}", REST_PREFIX, function))
            .header("Content-Profile", self.schema.clone())
            .json(args);
        let response = self.send(request).await?;
        decode_body(&response.body)
    }

    /// Attach credentials, execute, and map non-2xx statuses to errors
    pub async fn send(&self, request: BackendRequest) -> ApiResult<BackendResponse> {
        let bearer = self
            .session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        let request = request
            .header("apikey", self.anon_key.clone())
            .header("Authorization", format!("Bearer {}", bearer));

        let response = self.transport.execute(request).await?;
        handle_response(response)
    }
}

/// Turn a raw response into an error for non-2xx statuses.
fn handle_response(response: BackendResponse) -> ApiResult<BackendResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let message = error_message(response.status, &response.body);
    match response.status {
        400 => Err(ApiError::BadRequest(message)),
        401 | 403 => Err(ApiError::Unauthorized(message)),
        404 | 406 => Err(ApiError::NotFound(message)),
        409 => Err(ApiError::Conflict(message)),
        429 => Err(ApiError::RateLimited(message)),
        status => Err(ApiError::Api { status, message }),
    }
}

fn error_message(status: u16, body: &str) -> String {
    // Clean up HTML error messages (e.g., from proxy error pages)
    if body.contains("<html>") || body.contains("<!DOCTYPE") {
        return format!("Server returned {} error. Please check the backend URL.", status);
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(text) = map.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Request failed ({})", status)
    } else {
        trimmed.to_string()
    }
}

/// Decode a response body; an empty body reads as JSON `null`.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Rows from a representation body, which may be an array or one object.
fn decode_rows(body: &str) -> ApiResult<Vec<Value>> {
    match decode_body::<Value>(body)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => Ok(rows),
        row => Ok(vec![row]),
    }
}

/// Parse the total from a `Content-Range` header such as `0-9/42` or `*/42`.
pub(crate) fn parse_content_range_total(header: &str) -> Option<i64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

/// Chainable request builder for one table or view.
pub struct Query<'a> {
    client: &'a BackendClient,
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl<'a> Query<'a> {
    fn new(client: &'a BackendClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_string(), format!("neq.{}", value)));
        self
    }

    /// `column IN (values...)`
    pub fn in_list<V: Display>(mut self, column: &str, values: &[V]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filters.push((column.to_string(), format!("in.({})", joined)));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Inclusive row range, as in `range(0, 49)` for the first fifty rows
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    fn path(&self) -> String {
        format!("{}/{}", REST_PREFIX, self.table)
    }

    fn read_request(&self, method: Method) -> BackendRequest {
        let mut request = BackendRequest::new(method, self.path())
            .header("Accept-Profile", self.client.schema.clone())
            .query("select", self.select.clone());
        for (column, op) in &self.filters {
            request = request.query(column.clone(), op.clone());
        }
        if !self.order.is_empty() {
            request = request.query("order", self.order.join(","));
        }
        if let Some(limit) = self.limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(offset) = self.offset {
            request = request.query("offset", offset.to_string());
        }
        request
    }

    fn write_request(&self, method: Method) -> BackendRequest {
        let mut request = BackendRequest::new(method, self.path())
            .header("Content-Profile", self.client.schema.clone());
        for (column, op) in &self.filters {
            request = request.query(column.clone(), op.clone());
        }
        request
    }

    /// All matching rows as raw JSON objects
    pub async fn fetch_values(self) -> ApiResult<Vec<Value>> {
        let request = self.read_request(Method::GET);
        let response = self.client.send(request).await?;
        decode_rows(&response.body)
    }

    /// All matching rows
    pub async fn fetch<T: DeserializeOwned>(self) -> ApiResult<Vec<T>> {
        self.fetch_values()
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(ApiError::from))
            .collect()
    }

    /// First matching row, if any
    pub async fn maybe_single<T: DeserializeOwned>(self) -> ApiResult<Option<T>> {
        let rows = self.limit(1).fetch_values().await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Exactly one row; `NotFound` when nothing matches
    pub async fn single<T: DeserializeOwned>(self) -> ApiResult<T> {
        let table = self.table.clone();
        self.maybe_single()
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("no matching row in {}", table)))
    }

    /// Exact row count without transferring rows
    pub async fn count(self) -> ApiResult<i64> {
        let request = self
            .read_request(Method::HEAD)
            .header("Prefer", "count=exact");
        let response = self.client.send(request).await?;
        response
            .header("content-range")
            .and_then(parse_content_range_total)
            .ok_or_else(|| ApiError::Api {
                status: response.status,
                message: "missing Content-Range count".to_string(),
            })
    }

    /// Insert one row and return it as stored
    pub async fn insert<T: DeserializeOwned>(self, row: &impl Serialize) -> ApiResult<T> {
        let table = self.table.clone();
        let request = self
            .write_request(Method::POST)
            .header("Prefer", "return=representation")
            .json(serde_json::to_value(row)?);
        let response = self.client.send(request).await?;
        let first = decode_rows(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("insert into {} returned no row", table)))?;
        Ok(serde_json::from_value(first)?)
    }

    /// Insert one row without reading it back
    pub async fn insert_minimal(self, row: &impl Serialize) -> ApiResult<()> {
        let request = self
            .write_request(Method::POST)
            .header("Prefer", "return=minimal")
            .json(serde_json::to_value(row)?);
        self.client.send(request).await?;
        Ok(())
    }

    /// Patch matching rows and return the first updated row
    pub async fn update<T: DeserializeOwned>(self, patch: &impl Serialize) -> ApiResult<T> {
        let table = self.table.clone();
        let request = self
            .write_request(Method::PATCH)
            .header("Prefer", "return=representation")
            .json(serde_json::to_value(patch)?);
        let response = self.client.send(request).await?;
        let first = decode_rows(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("no matching row in {}", table)))?;
        Ok(serde_json::from_value(first)?)
    }

    /// Patch matching rows without reading them back
    pub async fn update_minimal(self, patch: &impl Serialize) -> ApiResult<()> {
        let request = self
            .write_request(Method::PATCH)
            .header("Prefer", "return=minimal")
            .json(serde_json::to_value(patch)?);
        self.client.send(request).await?;
        Ok(())
    }

    /// Insert or merge on the given unique columns, e.g. `"user_id,pin_id"`
    pub async fn upsert(self, row: &impl Serialize, on_conflict: &str) -> ApiResult<()> {
        let request = self
            .write_request(Method::POST)
            .query("on_conflict", on_conflict)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(serde_json::to_value(row)?);
        self.client.send(request).await?;
        Ok(())
    }

    /// Delete matching rows
    pub async fn delete(self) -> ApiResult<()> {
        let request = self.write_request(Method::DELETE);
        self.client.send(request).await?;
        Ok(())
    }
}
