//! SIGMA HTTP clients

pub mod auth;
pub mod error;
pub mod interceptor;
pub mod services;

use error::ClientError;
use interceptor::AuthInterceptor;
use reqwest::{Client, ClientBuilder, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client for one backend service
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    interceptor: Arc<AuthInterceptor>,
}

/// A request that already went through the request interceptor
#[derive(Debug)]
pub struct ApiRequest {
    path: String,
    builder: reqwest::RequestBuilder,
}

impl ApiRequest {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Send `body` as JSON
    #[must_use]
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    /// Append query parameters
    #[must_use]
    pub fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Self {
        self.builder = self.builder.query(query);
        self
    }
}

impl ApiClient {
    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn interceptor(&self) -> &Arc<AuthInterceptor> {
        &self.interceptor
    }

    /// Create a request, attaching the stored token where required.
    ///
    /// Fails with [`ClientError::Cancelled`] when the request must not be sent.
    pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest, ClientError> {
        let token = self.interceptor.before_request(path)?;

        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        Ok(ApiRequest {
            path: path.to_string(),
            builder,
        })
    }

    /// Execute a request and handle common errors
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let ApiRequest { path, builder } = request;
        Self::send(builder)
            .await
            .map_err(|e| self.interceptor.after_error(&path, e))
    }

    async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            // Empty bodies (204 and friends) read as JSON null
            let body: &[u8] = if body.is_empty() { b"null" } else { &body };
            Ok(serde_json::from_slice(body)?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            debug!(status = status.as_u16(), "Request failed");
            Err(ClientError::from_status(status, message))
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.request(Method::GET, path)?;
        self.execute(request).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path)?.json(body);
        self.execute(request).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PUT, path)?.json(body);
        self.execute(request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.request(Method::DELETE, path)?;
        self.execute(request).await
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    interceptor: Option<Arc<AuthInterceptor>>,
}

impl ApiClientBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the interceptor shared with the other service clients
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<AuthInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let interceptor = self
            .interceptor
            .ok_or_else(|| ClientError::Configuration("interceptor is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder =
            client_builder.user_agent(concat!("sigma-client/", env!("CARGO_PKG_VERSION")));

        Ok(ApiClient {
            client: client_builder.build()?,
            base_url,
            interceptor,
        })
    }
}
