use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};

use super::ApiResult;

/// One request against the hosted backend, relative to its base URL.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl BackendRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response; header names are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl BackendResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wire seam between the query layer and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: BackendRequest) -> ApiResult<BackendResponse>;
}

/// `reqwest`-backed transport used outside of tests.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: BackendRequest) -> ApiResult<BackendResponse> {
        let url = self.url_for(&request.path);
        tracing::debug!("{} {}", request.method, url);

        let mut req = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_trims_slashes() {
        let transport = HttpTransport::new("https://db.example.com/");
        assert_eq!(
            transport.url_for("/rest/v1/pins"),
            "https://db.example.com/rest/v1/pins"
        );
    }

    #[test]
    fn test_request_lookups_are_case_insensitive_for_headers() {
        let request = BackendRequest::new(Method::GET, "rest/v1/pins")
            .header("Accept-Profile", "omd")
            .query("select", "*");
        assert_eq!(request.header_value("accept-profile"), Some("omd"));
        assert_eq!(request.query_value("select"), Some("*"));
        assert_eq!(request.query_value("order"), None);
    }

    #[test]
    fn test_response_headers_lowercased() {
        let response = BackendResponse::new(206, "").with_header("Content-Range", "0-0/5");
        assert_eq!(response.header("content-range"), Some("0-0/5"));
        assert!(response.is_success());
    }
}
