//! Service Hub
//!
//! Owns the REST client and the push-event connection, and gives the state
//! layer a single place to start, refresh and stop them.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::domain::config::AppConfig;
use crate::domain::{JobId, TechId};
use crate::error::Result;
use crate::services::{ApiClient, EventClient, ServiceEvent, SocketConfig};

/// Central hub for backend services
pub struct ServiceHub {
    api: Arc<ApiClient>,
    socket: SocketConfig,
    events: Option<EventClient>,
    cancel: CancellationToken,
}

impl ServiceHub {
    /// Create a hub; the push channel is not opened until [`Self::start_events`]
    pub fn new(config: &AppConfig, token: Option<String>) -> Result<Self> {
        let api = match token {
            Some(token) => ApiClient::new(config)?.with_token(token),
            None => ApiClient::new(config)?,
        };

        Ok(Self {
            api: Arc::new(api),
            socket: SocketConfig::new(config.socket_url.clone()),
            events: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn api(&self) -> Arc<ApiClient> {
        self.api.clone()
    }

    /// Open the push channel and return its event stream
    ///
    /// Calling this again replaces the previous connection.
    pub async fn start_events(&mut self) -> UnboundedReceiver<ServiceEvent> {
        self.stop().await;
        self.cancel = CancellationToken::new();

        let (tx, rx) = mpsc::unbounded_channel();
        tracing::info!(url = %self.socket.url, "starting event channel");
        self.events = Some(EventClient::spawn(
            self.socket.clone(),
            tx,
            self.cancel.child_token(),
        ));
        rx
    }

    pub fn is_connected(&self) -> bool {
        self.events.as_ref().is_some_and(EventClient::is_connected)
    }

    /// Ask for fresh technician, location and route snapshots
    ///
    /// Returns false when the push channel is down and nothing was sent.
    pub fn refresh_live_map(&self) -> bool {
        let Some(events) = &self.events else {
            return false;
        };
        let locations = events.request_all_locations();
        let technicians = events.request_all_technicians();
        let routes = events.request_active_routes();
        locations && technicians && routes
    }

    /// Ask for active routes and locations after a route started or completed
    pub fn refresh_routes(&self) -> bool {
        let Some(events) = &self.events else {
            return false;
        };
        let routes = events.request_active_routes();
        let locations = events.request_all_locations();
        routes && locations
    }

    pub fn request_job_route(&self, job: &JobId) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.request_job_route(job))
    }

    pub fn request_history(&self, tech: &TechId) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.request_history(tech))
    }

    /// Close the push channel and wait for its task to finish
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(events) = self.events.take() {
            tracing::info!("stopping event channel");
            events.shutdown().await;
        }
    }
}

impl Drop for ServiceHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ServiceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHub")
            .field("api", &self.api.base_url())
            .field("socket", &self.socket.url)
            .field("connected", &self.is_connected())
            .finish()
    }
}
