//! REST client for the dispatch backend.
//!
//! Every call attaches the session bearer token (when one is set) and a fresh
//! `X-Request-Id`. Non-success responses are normalized into
//! [`Error::Api`] carrying the server's `error` message, or an
//! operation-specific fallback when the body has none.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::config::AppConfig;
use crate::domain::{
    AccountForm, Admin, AuthResponse, Credentials, Job, JobId, JobRoute, NewJob, Route,
    RoutePoint, TechId, Technician,
};
use crate::error::{Error, Result};

const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// HTTP client for the dispatch REST API
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    health_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let base_url = Url::parse(config.api_url.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| Error::Invalid {
                message: format!("Unsupported API URL: {}", config.api_url),
            })?;

        Ok(Self {
            client,
            base_url,
            health_url: config.health_url(),
            token: None,
        })
    }

    /// Builder-style token attachment
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    // ==================== Auth ====================

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let response = self.send(Method::POST, &["admin", "login"], Some(credentials)).await?;
        read(response, None, "Login failed").await
    }

    pub async fn register(&self, form: &AccountForm) -> Result<AuthResponse> {
        let response = self.send(Method::POST, &["admin", "register"], Some(form)).await?;
        read(response, None, "Registration failed").await
    }

    // ==================== Admins ====================

    pub async fn list_admins(&self) -> Result<Vec<Admin>> {
        let response = self.send(Method::GET, &["admin", "all"], None::<&()>).await?;
        read(response, Some("admins"), "Failed to fetch admins").await
    }

    pub async fn create_admin(&self, form: &AccountForm) -> Result<Admin> {
        let response = self.send(Method::POST, &["admin", "create-admin"], Some(form)).await?;
        read(response, Some("admin"), "Failed to create admin").await
    }

    pub async fn update_admin(&self, id: &str, form: &AccountForm) -> Result<Admin> {
        let response = self.send(Method::PUT, &["admin", id], Some(form)).await?;
        read(response, Some("admin"), "Failed to update admin").await
    }

    pub async fn delete_admin(&self, id: &str) -> Result<()> {
        let response = self.send(Method::DELETE, &["admin", id], None::<&()>).await?;
        ensure_success(response, "Failed to delete admin").await.map(drop)
    }

    // ==================== Technicians ====================

    pub async fn list_technicians(&self) -> Result<Vec<Technician>> {
        let response = self.send(Method::GET, &["technician", "all"], None::<&()>).await?;
        read(response, Some("technicians"), "Failed to fetch technicians").await
    }

    pub async fn get_technician(&self, id: &TechId) -> Result<Technician> {
        let response = self.send(Method::GET, &["technician", id.as_str()], None::<&()>).await?;
        read(response, Some("technician"), "Failed to fetch technician").await
    }

    pub async fn create_technician(&self, form: &AccountForm) -> Result<Technician> {
        let response = self
            .send(Method::POST, &["admin", "create-technician"], Some(form))
            .await?;
        read(response, Some("technician"), "Failed to create technician").await
    }

    pub async fn update_technician(&self, id: &TechId, form: &AccountForm) -> Result<Technician> {
        let response = self
            .send(Method::PUT, &["admin", "technician", id.as_str()], Some(form))
            .await?;
        read(response, Some("technician"), "Failed to update technician").await
    }

    pub async fn delete_technician(&self, id: &TechId) -> Result<()> {
        let response = self
            .send(Method::DELETE, &["admin", "technician", id.as_str()], None::<&()>)
            .await?;
        ensure_success(response, "Failed to delete technician").await.map(drop)
    }

    /// Technicians that have reported at least one position
    pub async fn technician_locations(&self) -> Result<Vec<Technician>> {
        let response = self.send(Method::GET, &["technicians", "locations"], None::<&()>).await?;
        read(response, Some("technicians"), "Failed to fetch locations").await
    }

    pub async fn location_history(&self, id: &TechId) -> Result<Vec<RoutePoint>> {
        let response = self
            .send(Method::GET, &["technician", id.as_str(), "location-history"], None::<&()>)
            .await?;
        read(response, Some("locationHistory"), "Failed to fetch location history").await
    }

    // ==================== Jobs ====================

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let response = self.send(Method::GET, &["jobs"], None::<&()>).await?;
        read(response, Some("jobs"), "Failed to fetch jobs").await
    }

    pub async fn get_job(&self, id: &JobId) -> Result<Job> {
        let response = self.send(Method::GET, &["jobs", id.as_str()], None::<&()>).await?;
        read(response, Some("job"), "Failed to fetch job").await
    }

    pub async fn assign_job(&self, job: &NewJob) -> Result<Job> {
        let response = self.send(Method::POST, &["admin", "assign-job"], Some(job)).await?;
        read(response, Some("job"), "Failed to assign job").await
    }

    // ==================== Routes ====================

    pub async fn active_routes(&self) -> Result<Vec<Route>> {
        let response = self.send(Method::GET, &["routes", "active"], None::<&()>).await?;
        read(response, Some("routes"), "Failed to fetch active routes").await
    }

    pub async fn job_route(&self, job: &JobId) -> Result<JobRoute> {
        let response = self
            .send(Method::GET, &["routes", "job", job.as_str()], None::<&()>)
            .await?;
        read(response, None, "Failed to fetch job route").await
    }

    // ==================== Health ====================

    /// Whether the backend answers its health check with a success status
    pub async fn health(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "health check failed");
                false
            }
        }
    }

    // ---- private helpers ----

    /// Base URL plus percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.url(segments);
        tracing::debug!(%method, path = url.path(), "api request");
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

/// Map a non-success response to [`Error::Api`]
async fn ensure_success(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    tracing::warn!(status = status.as_u16(), %message, "api error");
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

/// Decode a success body, optionally taking one top-level field
async fn read<T: DeserializeOwned>(
    response: Response,
    field: Option<&str>,
    fallback: &str,
) -> Result<T> {
    let response = ensure_success(response, fallback).await?;
    let mut body: Value = response.json().await?;

    let value = match field {
        None => body,
        Some(field) => match body.get_mut(field) {
            Some(value) => value.take(),
            None => {
                return Err(Error::Invalid {
                    message: format!("response is missing `{field}`"),
                });
            }
        },
    };
    Ok(serde_json::from_value(value)?)
}
