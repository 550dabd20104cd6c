//! In-memory stand-in for the hosted REST/auth backend used by unit tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use omd_types::{AuthSession, AuthUser};

use crate::api::{ApiResult, BackendClient, BackendRequest, BackendResponse, Transport};

const REST_PREFIX: &str = "rest/v1/";
const RPC_PREFIX: &str = "rest/v1/rpc/";
const AUTH_PREFIX: &str = "auth/v1/";

#[derive(Default)]
struct FakeState {
    tables: HashMap<String, Vec<Value>>,
    unique: Vec<(String, String)>,
    failures: Vec<(String, u16, String)>,
    requests: Vec<BackendRequest>,
    rpc_calls: HashMap<String, usize>,
    views: HashSet<(String, String)>,
    users: HashMap<String, Uuid>,
}

/// Fake PostgREST: tables are vectors of JSON rows, filters understand
/// `eq.`, `neq.` and `in.(..)`.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// A signed-out client
    pub fn client(&self) -> BackendClient {
        BackendClient::new(
            Arc::new(FakeTransport {
                state: self.state.clone(),
            }),
            "anon-key",
            "omd",
        )
    }

    /// A client already signed in as `user_id`
    pub fn client_as(&self, user_id: Uuid) -> BackendClient {
        let client = self.client();
        client.set_session(Some(session_for(user_id, None)));
        client
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Reject writes that would duplicate `column` in `table` with a 23505.
    pub fn unique(&self, table: &str, column: &str) {
        self.lock()
            .unique
            .push((table.to_string(), column.to_string()));
    }

    /// Fail the next request whose path contains `path_fragment`.
    pub fn fail_next(&self, path_fragment: &str, status: u16, body: &str) {
        self.lock()
            .failures
            .push((path_fragment.to_string(), status, body.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.lock().requests.clone()
    }

    pub fn rpc_calls(&self, function: &str) -> usize {
        self.lock().rpc_calls.get(function).copied().unwrap_or(0)
    }
}

fn session_for(user_id: Uuid, email: Option<String>) -> AuthSession {
    AuthSession {
        access_token: format!("token-{}", user_id),
        refresh_token: Some(format!("refresh-{}", user_id)),
        expires_in: Some(3600),
        user: AuthUser { id: user_id, email },
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: BackendRequest) -> ApiResult<BackendResponse> {
        // Let concurrent requests interleave like real I/O
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        if let Some(pos) = state
            .failures
            .iter()
            .position(|(fragment, _, _)| request.path.contains(fragment.as_str()))
        {
            let (_, status, body) = state.failures.remove(pos);
            return Ok(BackendResponse::new(status, body));
        }

        let path = request.path.trim_start_matches('/').to_string();
        if let Some(function) = path.strip_prefix(RPC_PREFIX) {
            return Ok(state.rpc(function, &request));
        }
        if let Some(endpoint) = path.strip_prefix(AUTH_PREFIX) {
            return Ok(state.auth(endpoint, &request));
        }
        if let Some(table) = path.strip_prefix(REST_PREFIX) {
            return Ok(state.rest(table, &request));
        }
        Ok(BackendResponse::new(404, r#"{"message":"unknown path"}"#))
    }
}

impl FakeState {
    fn rpc(&mut self, function: &str, request: &BackendRequest) -> BackendResponse {
        *self.rpc_calls.entry(function.to_string()).or_default() += 1;
        let args = request.body.clone().unwrap_or(Value::Null);
        let pin = cell_text(args.get("p_pin_id").unwrap_or(&Value::Null));

        match function {
            "record_pin_view" => {
                let device = cell_text(args.get("p_device_id").unwrap_or(&Value::Null));
                self.views.insert((pin, device));
                BackendResponse::new(204, "")
            }
            "get_pin_view_count" => {
                let count = self.views.iter().filter(|(p, _)| *p == pin).count();
                BackendResponse::new(200, count.to_string())
            }
            _ => BackendResponse::new(404, format!(r#"{{"message":"function {} not found"}}"#, function)),
        }
    }

    fn auth(&mut self, endpoint: &str, request: &BackendRequest) -> BackendResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        let email = body
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match endpoint {
            "token" => {
                if body.get("password").and_then(Value::as_str) == Some("wrong") {
                    return BackendResponse::new(
                        400,
                        r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
                    );
                }
                let id = *self.users.entry(email.clone()).or_insert_with(Uuid::new_v4);
                json_response(200, &json!(session_for(id, Some(email))))
            }
            "signup" => {
                let id = Uuid::new_v4();
                self.users.insert(email.clone(), id);
                self.tables
                    .entry("profiles".to_string())
                    .or_default()
                    .push(json!({ "id": id, "username": format!("user-{}", &id.simple().to_string()[..8]) }));
                json_response(200, &json!(session_for(id, Some(email))))
            }
            "recover" => BackendResponse::new(200, "{}"),
            "logout" => BackendResponse::new(204, ""),
            _ => BackendResponse::new(404, r#"{"message":"unknown auth endpoint"}"#),
        }
    }

    fn rest(&mut self, table: &str, request: &BackendRequest) -> BackendResponse {
        let filters: Vec<(String, String)> = request
            .query
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "select" | "order" | "limit" | "offset" | "on_conflict"))
            .cloned()
            .collect();
        let wants_rows = request
            .header_value("Prefer")
            .is_some_and(|p| p.contains("return=representation"));

        match request.method.as_str() {
            "GET" => {
                let rows = self.select(table, &filters, request);
                json_response(200, &Value::Array(rows))
            }
            "HEAD" => {
                let total = self.select(table, &filters, request).len();
                BackendResponse::new(200, "").with_header("Content-Range", format!("*/{}", total))
            }
            "POST" => {
                let incoming = match request.body.clone() {
                    Some(Value::Array(rows)) => rows,
                    Some(row @ Value::Object(_)) => vec![row],
                    _ => return BackendResponse::new(400, r#"{"message":"missing body"}"#),
                };
                let conflict = request.query_value("on_conflict").map(|c| {
                    c.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>()
                });
                let mut written = Vec::new();
                for row in incoming {
                    match self.write_row(table, row, conflict.as_deref()) {
                        Ok(stored) => written.push(stored),
                        Err(response) => return response,
                    }
                }
                if wants_rows {
                    json_response(201, &Value::Array(written))
                } else {
                    BackendResponse::new(201, "")
                }
            }
            "PATCH" => {
                let Some(Value::Object(patch)) = request.body.clone() else {
                    return BackendResponse::new(400, r#"{"message":"missing body"}"#);
                };
                let candidate_rows = self.tables.get(table).cloned().unwrap_or_default();
                let mut updated = Vec::new();
                let mut next_rows = Vec::with_capacity(candidate_rows.len());
                for row in candidate_rows {
                    if matches_all(&row, &filters) {
                        let mut merged = row.as_object().cloned().unwrap_or_default();
                        for (k, v) in &patch {
                            merged.insert(k.clone(), v.clone());
                        }
                        updated.push(Value::Object(merged.clone()));
                        next_rows.push(Value::Object(merged));
                    } else {
                        next_rows.push(row);
                    }
                }
                if let Some(response) = self.unique_violation(table, &next_rows) {
                    return response;
                }
                self.tables.insert(table.to_string(), next_rows);
                if wants_rows {
                    json_response(200, &Value::Array(updated))
                } else {
                    BackendResponse::new(204, "")
                }
            }
            "DELETE" => {
                if let Some(rows) = self.tables.get_mut(table) {
                    rows.retain(|row| !matches_all(row, &filters));
                }
                BackendResponse::new(204, "")
            }
            _ => BackendResponse::new(405, r#"{"message":"method not allowed"}"#),
        }
    }

    fn select(&self, table: &str, filters: &[(String, String)], request: &BackendRequest) -> Vec<Value> {
        let mut rows: Vec<Value> = self
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches_all(r, filters)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = request.query_value("order") {
            let keys: Vec<(String, bool)> = order
                .split(',')
                .filter_map(|part| {
                    let (column, direction) = part.rsplit_once('.')?;
                    Some((column.to_string(), direction != "desc"))
                })
                .collect();
            rows.sort_by(|a, b| {
                for (column, ascending) in &keys {
                    let ordering = compare_cells(a.get(column), b.get(column));
                    let ordering = if *ascending { ordering } else { ordering.reverse() };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = request
            .query_value("offset")
            .and_then(|o| o.parse::<usize>().ok())
            .unwrap_or(0);
        let limit = request
            .query_value("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(usize::MAX);
        rows.into_iter().skip(offset).take(limit).collect()
    }

    fn write_row(
        &mut self,
        table: &str,
        row: Value,
        on_conflict: Option<&[String]>,
    ) -> Result<Value, BackendResponse> {
        let Value::Object(incoming) = row else {
            return Err(BackendResponse::new(400, r#"{"message":"row must be an object"}"#));
        };
        let mut rows = self.tables.get(table).cloned().unwrap_or_default();

        let existing = on_conflict.and_then(|columns| {
            rows.iter().position(|r| {
                columns
                    .iter()
                    .all(|c| cell_text(r.get(c).unwrap_or(&Value::Null)) == cell_text(incoming.get(c).unwrap_or(&Value::Null)))
            })
        });

        let stored = match existing {
            Some(index) => {
                let mut merged: Map<String, Value> = rows[index].as_object().cloned().unwrap_or_default();
                for (k, v) in incoming {
                    merged.insert(k, v);
                }
                rows[index] = Value::Object(merged);
                rows[index].clone()
            }
            None => {
                let mut fresh = incoming;
                fresh
                    .entry("id".to_string())
                    .or_insert_with(|| json!(Uuid::new_v4()));
                fresh
                    .entry("created_at".to_string())
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
                let value = Value::Object(fresh);
                rows.push(value.clone());
                value
            }
        };

        if let Some(response) = self.unique_violation(table, &rows) {
            return Err(response);
        }
        self.tables.insert(table.to_string(), rows);
        Ok(stored)
    }

    fn unique_violation(&self, table: &str, rows: &[Value]) -> Option<BackendResponse> {
        for (t, column) in &self.unique {
            if t != table {
                continue;
            }
            let mut seen = HashSet::new();
            for row in rows {
                match row.get(column) {
                    Some(Value::Null) | None => {}
                    Some(value) => {
                        if !seen.insert(cell_text(value)) {
                            return Some(BackendResponse::new(
                                409,
                                format!(
                                    r#"{{"code":"23505","message":"duplicate key value violates unique constraint \"{}_{}_key\""}}"#,
                                    table, column
                                ),
                            ));
                        }
                    }
                }
            }
        }
        None
    }
}

fn json_response(status: u16, body: &Value) -> BackendResponse {
    BackendResponse::new(status, body.to_string())
}

/// Text form of a cell as it appears in a filter value.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn matches_all(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, op)| {
        let cell = cell_text(row.get(column).unwrap_or(&Value::Null));
        if let Some(expected) = op.strip_prefix("eq.") {
            cell == expected
        } else if let Some(expected) = op.strip_prefix("neq.") {
            cell != expected
        } else if let Some(list) = op.strip_prefix("in.(").and_then(|l| l.strip_suffix(')')) {
            list.split(',').any(|item| item == cell)
        } else {
            false
        }
    })
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        // Nulls sort last ascending
        (Some(Value::Null) | None, _) => Ordering::Greater,
        (_, Some(Value::Null) | None) => Ordering::Less,
        (Some(x), Some(y)) => cell_text(x).cmp(&cell_text(y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_filters_orders_and_counts() {
        let fake = FakeBackend::new();
        fake.seed(
            "things",
            vec![
                json!({ "id": 1, "kind": "a", "rank": 3 }),
                json!({ "id": 2, "kind": "b", "rank": 1 }),
                json!({ "id": 3, "kind": "a", "rank": 2 }),
            ],
        );
        let client = fake.client();

        let rows = client
            .from("things")
            .eq("kind", "a")
            .order("rank", true)
            .fetch_values()
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1]);

        let count = client.from("things").in_list("id", &[1, 2]).count().await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_fake_unique_constraint() {
        let fake = FakeBackend::new();
        fake.unique("profiles", "username");
        fake.seed("profiles", vec![json!({ "id": "a", "username": "taken" })]);

        let err = fake
            .client()
            .from("profiles")
            .insert_minimal(&json!({ "id": "b", "username": "taken" }))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::api::ApiError::Conflict(_)));
    }
}
