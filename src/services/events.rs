//! Service Events
//!
//! Events delivered by the push channel (and the connection supervisor) to the
//! state layer, plus the requests the console can send back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

use crate::domain::{
    GeoPoint, JobId, JobRoute, Route, RoutePoint, TechId, Technician, TechnicianStatus,
    opt_id_string,
};
use crate::error::Result;

/// Incremental position report for one technician (`locationUpdate`)
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub tech_id: TechId,
    #[serde(default)]
    pub tech_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub status: Option<TechnicianStatus>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdate {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// A technician switched GPS tracking on or off (`techGPSChanged`)
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingToggle {
    pub tech_id: TechId,
    #[serde(default)]
    pub tech_name: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub status: Option<TechnicianStatus>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl TrackingToggle {
    /// Reported coordinate, if both halves are present
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

/// Route started/completed notification; only used as a refresh trigger
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLifecycle {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub route_id: Option<String>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub tech_id: Option<TechId>,
}

/// Location history for one technician (`locationHistory`)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocationHistory {
    pub tech_id: Option<TechId>,
    pub points: Vec<RoutePoint>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHistory {
    Points(Vec<RoutePoint>),
    Wrapped {
        #[serde(default, rename = "techId")]
        tech_id: Option<TechId>,
        #[serde(default, rename = "locationHistory", alias = "history")]
        points: Vec<RoutePoint>,
    },
}

impl From<RawHistory> for LocationHistory {
    fn from(raw: RawHistory) -> Self {
        match raw {
            RawHistory::Points(points) => Self {
                tech_id: None,
                points,
            },
            RawHistory::Wrapped { tech_id, points } => Self { tech_id, points },
        }
    }
}

/// Events emitted by the service layer
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    // ==================== Snapshots ====================
    /// Technicians currently reporting positions (`allLocations`)
    AllLocations(Vec<Technician>),

    /// Every technician, with or without GPS (`allTechnicians`)
    AllTechnicians(Vec<Technician>),

    /// Routes in progress (`activeRoutes`)
    ActiveRoutes(Vec<Route>),

    // ==================== Incremental ====================
    LocationUpdate(LocationUpdate),

    TrackingChanged(TrackingToggle),

    RouteStarted(RouteLifecycle),

    RouteCompleted(RouteLifecycle),

    // ==================== Responses ====================
    LocationHistory(LocationHistory),

    JobRoute(JobRoute),

    // ==================== Connection State ====================
    /// Push channel connection state changed
    ConnectionState {
        /// Service name
        service: Arc<str>,
        /// Whether connected
        connected: bool,
        /// Additional detail (e.g. "Reconnecting in 2.0s (attempt 3)")
        detail: Arc<str>,
    },
}

impl ServiceEvent {
    /// Decode a push event by name; unknown names yield `Ok(None)`
    pub fn from_socket_event(name: &str, args: Vec<Value>) -> Result<Option<Self>> {
        let payload = args.into_iter().next().unwrap_or(Value::Null);

        let event = match name {
            "allLocations" => Self::AllLocations(decode(payload)?),
            "allTechnicians" => Self::AllTechnicians(decode(payload)?),
            "activeRoutes" => Self::ActiveRoutes(decode(payload)?),
            "locationUpdate" => Self::LocationUpdate(decode(payload)?),
            "techGPSChanged" => Self::TrackingChanged(decode(payload)?),
            "routeStarted" => Self::RouteStarted(serde_json::from_value(payload).unwrap_or_default()),
            "routeCompleted" => {
                Self::RouteCompleted(serde_json::from_value(payload).unwrap_or_default())
            }
            "locationHistory" => Self::LocationHistory(decode::<RawHistory>(payload)?.into()),
            "jobRoute" => Self::JobRoute(decode(payload)?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AllLocations(_) => "allLocations",
            Self::AllTechnicians(_) => "allTechnicians",
            Self::ActiveRoutes(_) => "activeRoutes",
            Self::LocationUpdate(_) => "locationUpdate",
            Self::TrackingChanged(_) => "techGPSChanged",
            Self::RouteStarted(_) => "routeStarted",
            Self::RouteCompleted(_) => "routeCompleted",
            Self::LocationHistory(_) => "locationHistory",
            Self::JobRoute(_) => "jobRoute",
            Self::ConnectionState { .. } => "connectionState",
        }
    }
}

/// Null snapshot payloads are treated as empty lists
fn decode<T: DeserializeOwned>(payload: Value) -> Result<T> {
    let payload = match payload {
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    Ok(serde_json::from_value(payload)?)
}

/// Client-to-server requests on the push channel
#[derive(Clone, Debug, PartialEq)]
pub enum ClientRequest {
    /// Join the admin room; sent on every (re)connect
    JoinAdmin,
    AllLocations,
    ActiveRoutes,
    AllTechnicians,
    History(TechId),
    JobRoute(JobId),
}

impl ClientRequest {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinAdmin => "joinAdmin",
            Self::AllLocations => "requestAllLocations",
            Self::ActiveRoutes => "requestActiveRoutes",
            Self::AllTechnicians => "requestAllTechnicians",
            Self::History(_) => "requestHistory",
            Self::JobRoute(_) => "requestJobRoute",
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::History(id) => vec![Value::String(id.to_string())],
            Self::JobRoute(id) => vec![Value::String(id.to_string())],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_location_update() {
        let event = ServiceEvent::from_socket_event(
            "locationUpdate",
            vec![json!({"techId": "t1", "techName": "Karim", "lat": 23.7, "lng": 90.4, "status": "ON_WAY"})],
        )
        .expect("decode")
        .expect("known event");

        match event {
            ServiceEvent::LocationUpdate(update) => {
                assert_eq!(update.tech_id.as_str(), "t1");
                assert_eq!(update.status, Some(TechnicianStatus::OnWay));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let event = ServiceEvent::from_socket_event("chatMessage", vec![json!("hi")]).expect("decode");
        assert!(event.is_none());
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let result = ServiceEvent::from_socket_event("locationUpdate", vec![json!({"lat": 1})]);
        assert!(result.is_err());
    }

    #[test]
    fn test_route_lifecycle_tolerates_any_payload() {
        let event = ServiceEvent::from_socket_event("routeStarted", vec![json!("r-1")])
            .expect("decode")
            .expect("known event");
        assert!(matches!(event, ServiceEvent::RouteStarted(_)));
    }

    #[test]
    fn test_location_history_shapes() {
        let bare = ServiceEvent::from_socket_event(
            "locationHistory",
            vec![json!([{"lat": 1.0, "lng": 2.0}])],
        )
        .expect("decode");
        let wrapped = ServiceEvent::from_socket_event(
            "locationHistory",
            vec![json!({"techId": "t9", "locationHistory": [{"lat": 1.0, "lng": 2.0}]})],
        )
        .expect("decode");

        match (bare, wrapped) {
            (
                Some(ServiceEvent::LocationHistory(a)),
                Some(ServiceEvent::LocationHistory(b)),
            ) => {
                assert_eq!(a.points.len(), 1);
                assert_eq!(b.tech_id.map(|t| t.to_string()).as_deref(), Some("t9"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_request_wire_names() {
        assert_eq!(ClientRequest::JoinAdmin.event_name(), "joinAdmin");
        let req = ClientRequest::JobRoute(JobId::from("j4"));
        assert_eq!(req.event_name(), "requestJobRoute");
        assert_eq!(req.args(), vec![json!("j4")]);
    }
}
