//! Live Map State
//!
//! Reconciles three independently arriving sources into one view of the
//! field: full snapshots (`allLocations`, `allTechnicians`, `activeRoutes`),
//! incremental push events (`locationUpdate`, `techGPSChanged`) and the
//! periodic re-poll. The latest event always wins; nothing is versioned, so a
//! late packet can move a marker backwards until the next snapshot.
//!
//! All methods take `now` explicitly so the staleness rule stays testable.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::constants::DEFAULT_MAP_CENTER;
use crate::domain::{
    GeoPoint, JobId, JobRoute, Route, RoutePoint, TechId, Technician, TechnicianStatus,
};
use crate::services::{LocationHistory, LocationUpdate, ServiceEvent, TrackingToggle};

/// Technicians keyed by id, in stable display order
#[derive(Clone, Debug, Default)]
pub struct TechnicianSet {
    by_id: AHashMap<TechId, Technician>,
    order: Vec<TechId>,
}

impl TechnicianSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set; a repeated id keeps its first position and last record
    pub fn replace(&mut self, techs: Vec<Technician>) {
        self.by_id.clear();
        self.order.clear();
        for tech in techs {
            self.upsert(tech);
        }
    }

    /// Insert at the end, or overwrite in place
    pub fn upsert(&mut self, tech: Technician) {
        let id = tech.id.clone();
        if self.by_id.insert(id.clone(), tech).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &TechId) -> Option<&Technician> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &TechId) -> Option<&mut Technician> {
        self.by_id.get_mut(id)
    }

    pub fn contains(&self, id: &TechId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Technicians in display order
    pub fn iter(&self) -> impl Iterator<Item = &Technician> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Follow-up the caller should perform after an event was applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveMapEffect {
    /// Re-request locations, active routes and the roster
    RefreshAll,
    /// Re-request active routes and locations
    RefreshRoutes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// Tracked technician
    Live,
    /// Roster technician with a last known position but no live feed
    Offline,
}

/// A technician pin
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub tech_id: TechId,
    pub name: String,
    pub position: GeoPoint,
    pub status: TechnicianStatus,
    pub kind: MarkerKind,
    pub job_title: Option<String>,
}

/// Line from a route's start to its technician's current position
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSegment {
    pub route_id: String,
    pub job_id: JobId,
    pub job_title: String,
    pub technician: Option<String>,
    pub start: GeoPoint,
    /// Unknown when the technician is not in the tracked set
    pub current: Option<GeoPoint>,
    pub started_at: DateTime<Utc>,
}

/// Recorded path of the selected route
#[derive(Clone, Debug, PartialEq)]
pub struct RoutePath {
    pub points: Vec<GeoPoint>,
    pub start: Option<RoutePoint>,
    pub end: Option<RoutePoint>,
}

impl RoutePath {
    /// A line needs at least two points
    pub fn is_drawable(&self) -> bool {
        self.points.len() > 1
    }
}

/// Bounding box of every known position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl Bounds {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    fn extend(self, p: GeoPoint) -> Self {
        Self {
            south_west: GeoPoint::new(self.south_west.lat.min(p.lat), self.south_west.lng.min(p.lng)),
            north_east: GeoPoint::new(self.north_east.lat.max(p.lat), self.north_east.lng.max(p.lng)),
        }
    }
}

/// Live map view model
#[derive(Debug, Default)]
pub struct LiveMapState {
    /// Technicians on the live feed
    tracked: TechnicianSet,
    /// Every technician, GPS on or off
    roster: TechnicianSet,
    routes: Vec<Route>,
    selected_tech: Option<TechId>,
    focused_tech: Option<TechId>,
    selected_route: Option<String>,
    history: Vec<RoutePoint>,
    connected: bool,
    connection_detail: Option<Arc<str>>,
    last_update: Option<DateTime<Utc>>,
}

impl LiveMapState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one service event
    pub fn apply(&mut self, event: ServiceEvent, now: DateTime<Utc>) -> Option<LiveMapEffect> {
        tracing::trace!(event = event.kind(), "live map event");

        match event {
            ServiceEvent::AllLocations(techs) => self.apply_snapshot(techs, now),
            ServiceEvent::AllTechnicians(techs) => self.apply_roster(techs, now),
            ServiceEvent::ActiveRoutes(routes) => self.apply_active_routes(routes, now),
            ServiceEvent::LocationUpdate(update) => self.apply_location_update(update, now),
            ServiceEvent::TrackingChanged(toggle) => self.apply_tracking_toggle(toggle, now),
            ServiceEvent::RouteStarted(_) | ServiceEvent::RouteCompleted(_) => {
                return Some(LiveMapEffect::RefreshRoutes);
            }
            ServiceEvent::JobRoute(job_route) => self.apply_job_route(job_route, now),
            ServiceEvent::LocationHistory(history) => self.apply_location_history(history, now),
            ServiceEvent::ConnectionState {
                connected, detail, ..
            } => {
                let was_connected = self.connected;
                self.connected = connected;
                self.connection_detail = Some(detail);
                if connected && !was_connected {
                    return Some(LiveMapEffect::RefreshAll);
                }
            }
        }
        None
    }

    /// Replace the tracked set
    pub fn apply_snapshot(&mut self, techs: Vec<Technician>, now: DateTime<Utc>) {
        self.tracked.replace(techs);
        self.last_update = Some(now);
    }

    /// Replace the roster
    pub fn apply_roster(&mut self, techs: Vec<Technician>, now: DateTime<Utc>) {
        self.roster.replace(techs);
        self.last_update = Some(now);
    }

    pub fn apply_active_routes(&mut self, routes: Vec<Route>, now: DateTime<Utc>) {
        self.routes = routes;
        self.last_update = Some(now);
    }

    /// Patch position and status of a known technician, or add a minimal one
    pub fn apply_location_update(&mut self, update: LocationUpdate, now: DateTime<Utc>) {
        let position = update.position();
        match self.tracked.get_mut(&update.tech_id) {
            Some(tech) => {
                tech.last_lat = Some(position.lat);
                tech.last_lng = Some(position.lng);
                if update.status.is_some() {
                    tech.status = update.status;
                }
            }
            None => {
                let mut tech = Technician::minimal(update.tech_id, update.tech_name, position);
                tech.status = update.status;
                self.tracked.upsert(tech);
            }
        }
        self.last_update = Some(now);
    }

    /// GPS switched on or off
    ///
    /// The roster entry always follows the toggle. The tracked set only
    /// learns about it when tracking was enabled with a position.
    pub fn apply_tracking_toggle(&mut self, toggle: TrackingToggle, now: DateTime<Utc>) {
        let position = toggle.position();

        if let Some(tech) = self.roster.get_mut(&toggle.tech_id) {
            tech.is_tracking = toggle.enabled;
            if toggle.status.is_some() {
                tech.status = toggle.status;
            }
            if let Some(lat) = toggle.lat {
                tech.last_lat = Some(lat);
            }
            if let Some(lng) = toggle.lng {
                tech.last_lng = Some(lng);
            }
        }

        if let (true, Some(position)) = (toggle.enabled, position) {
            match self.tracked.get_mut(&toggle.tech_id) {
                Some(tech) => {
                    tech.last_lat = Some(position.lat);
                    tech.last_lng = Some(position.lng);
                    tech.is_tracking = true;
                    if toggle.status.is_some() {
                        tech.status = toggle.status;
                    }
                }
                None => {
                    let mut tech = Technician::minimal(toggle.tech_id, toggle.tech_name, position);
                    tech.status = toggle.status;
                    tech.is_tracking = true;
                    self.tracked.upsert(tech);
                }
            }
        }

        self.last_update = Some(now);
    }

    /// Replace the selected route's path when the response carries one
    pub fn apply_job_route(&mut self, job_route: JobRoute, now: DateTime<Utc>) {
        if let Some(history) = job_route.location_history {
            self.history = history;
        }
        self.last_update = Some(now);
    }

    /// Show a technician's recorded trail while they are selected without a route
    pub fn apply_location_history(&mut self, history: LocationHistory, now: DateTime<Utc>) {
        let for_selected = match (&history.tech_id, &self.selected_tech) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(from), Some(selected)) => from == selected,
        };
        if !for_selected || self.selected_route.is_some() {
            tracing::debug!(tech = ?history.tech_id, "location history for another view ignored");
            return;
        }
        self.history = history.points;
        self.last_update = Some(now);
    }

    // ==================== Selection ====================

    /// Select a technician; returns their active job so its route can be requested
    pub fn select_technician(&mut self, id: &TechId) -> Option<JobId> {
        self.selected_tech = Some(id.clone());
        self.focused_tech = Some(id.clone());
        self.selected_route = None;
        self.history.clear();

        self.tracked
            .get(id)
            .or_else(|| self.roster.get(id))
            .and_then(Technician::active_job)
            .and_then(|job| job.id.clone())
    }

    /// Highlight a technician from the search list without touching the route view
    pub fn focus_technician(&mut self, id: &TechId) {
        self.selected_tech = Some(id.clone());
        self.focused_tech = Some(id.clone());
    }

    /// Select an active route by id; returns its job for the REST fetch
    pub fn select_route(&mut self, route_id: &str) -> Option<JobId> {
        let job_id = self
            .routes
            .iter()
            .find(|r| r.id == route_id)
            .map(|r| r.job_id.clone())?;
        self.selected_route = Some(route_id.to_string());
        self.selected_tech = None;
        Some(job_id)
    }

    /// Select the active route of a job
    pub fn select_route_for_job(&mut self, job_id: &JobId) -> Option<JobId> {
        let route_id = self
            .routes
            .iter()
            .find(|r| &r.job_id == job_id)
            .map(|r| r.id.clone());
        match route_id {
            Some(route_id) => self.select_route(&route_id),
            None => {
                // Completed routes are not in the active list; the path can still be shown
                self.selected_route = None;
                self.selected_tech = None;
                Some(job_id.clone())
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_tech = None;
        self.focused_tech = None;
        self.selected_route = None;
        self.history.clear();
    }

    // ==================== Getters ====================

    pub fn tracked(&self) -> &TechnicianSet {
        &self.tracked
    }

    pub fn roster(&self) -> &TechnicianSet {
        &self.roster
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn selected_technician(&self) -> Option<&Technician> {
        self.selected_tech
            .as_ref()
            .and_then(|id| self.tracked.get(id).or_else(|| self.roster.get(id)))
    }

    pub fn focused_technician(&self) -> Option<&TechId> {
        self.focused_tech.as_ref()
    }

    pub fn selected_route(&self) -> Option<&Route> {
        self.selected_route
            .as_ref()
            .and_then(|id| self.routes.iter().find(|r| &r.id == id))
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connection_detail(&self) -> Option<&str> {
        self.connection_detail.as_deref()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    // ==================== Derived View ====================

    /// Live markers for tracked technicians, then offline markers for the rest of the roster
    pub fn markers(&self, now: DateTime<Utc>) -> Vec<Marker> {
        let live = self.tracked.iter().filter_map(|tech| {
            tech.position()
                .map(|position| marker(tech, position, MarkerKind::Live, now))
        });
        let offline = self
            .roster
            .iter()
            .filter(|tech| !self.tracked.contains(&tech.id))
            .filter_map(|tech| {
                tech.position()
                    .map(|position| marker(tech, position, MarkerKind::Offline, now))
            });
        live.chain(offline).collect()
    }

    pub fn route_segments(&self) -> Vec<RouteSegment> {
        self.routes
            .iter()
            .map(|route| RouteSegment {
                route_id: route.id.clone(),
                job_id: route.job_id.clone(),
                job_title: route.job_title().to_string(),
                technician: route.technician_name().map(str::to_string),
                start: route.start(),
                current: self.tracked.get(&route.tech_id).and_then(Technician::position),
                started_at: route.started_at,
            })
            .collect()
    }

    /// Path of the selected route, if a history is loaded
    pub fn selected_path(&self) -> Option<RoutePath> {
        if self.history.is_empty() {
            return None;
        }
        Some(RoutePath {
            points: self.history.iter().map(RoutePoint::position).collect(),
            start: self.history.iter().find(|p| p.is_start_point).cloned(),
            end: self.history.iter().find(|p| p.is_end_point).cloned(),
        })
    }

    /// Roster technicians that are effectively online
    pub fn gps_on_count(&self, now: DateTime<Utc>) -> usize {
        self.roster
            .iter()
            .filter(|t| t.is_effectively_online(now))
            .count()
    }

    /// Tracked technicians with a position
    pub fn active_count(&self) -> usize {
        self.tracked.iter().filter(|t| t.position().is_some()).count()
    }

    /// Case-insensitive name/email search over the roster
    pub fn search(&self, query: &str) -> Vec<&Technician> {
        let query = query.trim();
        self.roster
            .iter()
            .filter(|t| query.is_empty() || t.matches(query))
            .collect()
    }

    /// Box around every known position, tracked and roster
    pub fn bounds(&self) -> Option<Bounds> {
        self.tracked
            .iter()
            .chain(self.roster.iter())
            .filter_map(Technician::position)
            .fold(None, |acc: Option<Bounds>, p| {
                Some(match acc {
                    Some(b) => b.extend(p),
                    None => Bounds {
                        south_west: p,
                        north_east: p,
                    },
                })
            })
    }

    /// Centre of the known positions, or the default city centre
    pub fn view_center(&self) -> GeoPoint {
        self.bounds().map(|b| b.center()).unwrap_or_else(|| {
            let (lat, lng) = DEFAULT_MAP_CENTER;
            GeoPoint::new(lat, lng)
        })
    }
}

fn marker(tech: &Technician, position: GeoPoint, kind: MarkerKind, now: DateTime<Utc>) -> Marker {
    Marker {
        tech_id: tech.id.clone(),
        name: tech.display_name().to_string(),
        position,
        status: tech.display_status(now),
        kind,
        job_title: tech.active_job().map(|j| j.title.clone()),
    }
}
