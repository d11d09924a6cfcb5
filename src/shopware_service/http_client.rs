use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::client_credentials::ClientCredentialsAuth;
use crate::error::{MediaFsError, Result};

/// Body of an API request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Bytes { content_type: String, data: Vec<u8> },
}

/// One request against the admin API, relative to the API root
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn bytes(mut self, content_type: &str, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes {
            content_type: content_type.to_string(),
            data,
        };
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// JSON body, if any
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Successful response; non-2xx statuses are returned as errors
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn no_content() -> Self {
        Self::new(204, Vec::new())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Wire access to the media service
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;

    /// Fetch raw content from an absolute download URL
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP client for the shop's admin API
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    api_root: String,
    auth: Arc<ClientCredentialsAuth>,
}

impl HttpClient {
    pub fn new(client: Client, shop_url: &str, api_version: &str, auth: Arc<ClientCredentialsAuth>) -> Self {
        Self {
            client,
            api_root: Self::build_api_root(shop_url, api_version),
            auth,
        }
    }

    fn build_api_root(shop_url: &str, api_version: &str) -> String {
        let shop_url = shop_url.trim_end_matches('/');
        if api_version.is_empty() {
            format!("{}/api", shop_url)
        } else {
            format!("{}/api/{}", shop_url, api_version)
        }
    }

    /// Get full URL by prepending the API root if needed
    pub fn get_full_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.api_root, path)
        }
    }

    async fn auth_header(&self) -> Result<String> {
        let token = self.auth.get_valid_token().await?;
        Ok(format!("Bearer {}", token))
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.get_full_url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header("Accept", "application/json")
            .header("Authorization", self.auth_header().await?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes { content_type, data } => {
                builder.header("Content-Type", content_type).body(data)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if status.as_u16() == 401 {
            // next attempt fetches a fresh token
            self.auth.invalidate().await;
        }
        if !status.is_success() {
            return Err(MediaFsError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(ApiResponse::new(status.as_u16(), body))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
