//! Text rendering of console views.
//!
//! Everything returns a `String` so views can be printed or asserted on.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::domain::{Admin, Job, Route, RoutePoint, Technician};
use crate::state::live_map::{MarkerKind, RoutePath};
use crate::state::{DataState, JobsPage, LiveMapState, Toast};
use crate::utils::format::{format_age, format_datetime, format_position, format_time, truncate};

const RULE: &str = "────────────────────────────────────────────────────────────────────────";

pub fn technicians(techs: &[Technician], now: DateTime<Utc>) -> String {
    if techs.is_empty() {
        return "No technicians found\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<22} {:<28} {:<9} {:<6} {}", "ID", "NAME", "EMAIL", "STATUS", "GPS", "LAST SEEN");
    for t in techs {
        let _ = writeln!(
            out,
            "{:<10} {:<22} {:<28} {:<9} {:<6} {}",
            truncate(t.id.as_str(), 10),
            truncate(t.display_name(), 22),
            truncate(t.email.as_deref().unwrap_or("-"), 28),
            t.display_status(now).label(),
            if t.is_effectively_online(now) { "on" } else { "off" },
            t.last_ping.map(|p| format_age(&p, &now)).unwrap_or_else(|| "never".into()),
        );
    }
    out
}

pub fn technician_detail(t: &Technician, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", t.display_name(), t.id);
    let _ = writeln!(out, "  email:    {}", t.email.as_deref().unwrap_or("-"));
    let _ = writeln!(
        out,
        "  status:   {} (reported {})",
        t.display_status(now).label(),
        t.status.map(|s| s.label()).unwrap_or("-")
    );
    let _ = writeln!(out, "  tracking: {}", if t.is_tracking { "yes" } else { "no" });
    let _ = writeln!(
        out,
        "  position: {}",
        t.position().map(|p| format_position(&p)).unwrap_or_else(|| "unknown".into())
    );
    if let Some(ping) = &t.last_ping {
        let _ = writeln!(out, "  last ping: {} ({})", format_datetime(ping), format_age(ping, &now));
    }
    if let Some(job) = t.active_job() {
        let _ = writeln!(out, "  job:      {}", job.title);
    }
    out
}

pub fn admins(admins: &[Admin]) -> String {
    if admins.is_empty() {
        return "No admins found\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<24} {:<30} {}", "ID", "NAME", "EMAIL", "CREATED");
    for a in admins {
        let _ = writeln!(
            out,
            "{:<10} {:<24} {:<30} {}",
            truncate(&a.id, 10),
            truncate(&a.name, 24),
            truncate(&a.email, 30),
            a.created_at.as_ref().map(format_datetime).unwrap_or_else(|| "-".into()),
        );
    }
    out
}

fn job_row(out: &mut String, j: &Job) {
    let technician = j
        .technician
        .as_ref()
        .and_then(|t| t.name.as_deref())
        .or(j.tech_id.as_ref().map(|id| id.as_str()))
        .unwrap_or("-");
    let _ = writeln!(
        out,
        "{:<10} {:<28} {:<12} {:<20} {}",
        truncate(j.id.as_str(), 10),
        truncate(&j.title, 28),
        j.status.label(),
        truncate(technician, 20),
        j.created_at.as_ref().map(format_datetime).unwrap_or_else(|| "-".into()),
    );
}

fn job_header(out: &mut String) {
    let _ = writeln!(out, "{:<10} {:<28} {:<12} {:<20} {}", "ID", "TITLE", "STATUS", "TECHNICIAN", "CREATED");
}

pub fn jobs_page(page: &JobsPage<'_>) -> String {
    if page.total_items == 0 {
        return "No jobs yet\n".to_string();
    }
    let mut out = String::new();
    job_header(&mut out);
    for j in page.items {
        job_row(&mut out, j);
    }
    let _ = writeln!(
        out,
        "Showing {} to {} of {} jobs (page {}/{})",
        page.first_item, page.last_item, page.total_items, page.page, page.total_pages
    );
    out
}

pub fn job_detail(j: &Job) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", j.title, j.id);
    let _ = writeln!(out, "  status:      {}", j.status.label());
    let _ = writeln!(out, "  address:     {}", j.address.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "  description: {}", j.description.as_deref().unwrap_or("-"));
    let technician = j.technician.as_ref().and_then(|t| t.name.clone());
    let _ = writeln!(
        out,
        "  technician:  {}",
        technician
            .or_else(|| j.tech_id.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "-".into())
    );
    if let Some(created) = &j.created_at {
        let _ = writeln!(out, "  created:     {}", format_datetime(created));
    }
    if let Some(updated) = &j.updated_at {
        let _ = writeln!(out, "  updated:     {}", format_datetime(updated));
    }
    out
}

pub fn overview(data: &DataState) -> String {
    let stats = data.stats();
    let mut out = String::new();
    if let Some(error) = &data.last_error {
        let _ = writeln!(out, "! {error}");
    }
    let _ = writeln!(out, "Technicians: {:<6} Online: {}", stats.total_technicians, stats.online_technicians);
    let _ = writeln!(
        out,
        "Jobs:        {:<6} Active: {:<6} Completed: {}",
        stats.total_jobs, stats.active_jobs, stats.completed_jobs
    );
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "Recent jobs");
    if data.recent_jobs().is_empty() {
        let _ = writeln!(out, "  No jobs yet");
    } else {
        job_header(&mut out);
        for j in data.recent_jobs() {
            job_row(&mut out, j);
        }
    }
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "Active technicians");
    let active = data.active_technicians();
    if active.is_empty() {
        let _ = writeln!(out, "  No active technicians");
    }
    for t in active {
        let _ = writeln!(
            out,
            "  {:<24} {:<9} {}",
            truncate(t.display_name(), 24),
            t.status.map(|s| s.label()).unwrap_or("-"),
            t.active_job().map(|j| j.title.as_str()).unwrap_or("")
        );
    }
    out
}

pub fn routes(routes: &[Route]) -> String {
    if routes.is_empty() {
        return "No active routes\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<10} {:<28} {:<20} {}", "ROUTE", "JOB", "TITLE", "TECHNICIAN", "STARTED");
    for r in routes {
        let _ = writeln!(
            out,
            "{:<10} {:<10} {:<28} {:<20} {}",
            truncate(&r.id, 10),
            truncate(r.job_id.as_str(), 10),
            truncate(r.job_title(), 28),
            truncate(r.technician_name().unwrap_or("-"), 20),
            format_time(&r.started_at),
        );
    }
    out
}

pub fn history(points: &[RoutePoint]) -> String {
    if points.is_empty() {
        return "No recorded points\n".to_string();
    }
    let mut out = String::new();
    for p in points {
        let marker = match (p.is_start_point, p.is_end_point) {
            (true, _) => "start",
            (_, true) => "end",
            _ => "",
        };
        let _ = writeln!(
            out,
            "{:<20} {:<26} {}",
            p.recorded_at.as_ref().map(format_datetime).unwrap_or_else(|| "-".into()),
            format_position(&p.position()),
            marker
        );
    }
    out
}

fn path(out: &mut String, path: &RoutePath) {
    let _ = writeln!(out, "Route path: {} points", path.points.len());
    if let Some(start) = &path.start {
        let _ = writeln!(out, "  start {}", format_position(&start.position()));
    }
    if let Some(end) = &path.end {
        let _ = writeln!(out, "  end   {}", format_position(&end.position()));
    }
    if !path.is_drawable() {
        let _ = writeln!(out, "  (not enough points to draw a line)");
    }
}

/// One frame of the live map
pub fn live_map(state: &LiveMapState, search: Option<&str>, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Live Map  [{}]  last update: {}",
        if state.is_connected() { "Live" } else { "Disconnected" },
        state.last_update().as_ref().map(format_time).unwrap_or_else(|| "-".into())
    );
    if !state.is_connected() {
        if let Some(detail) = state.connection_detail() {
            let _ = writeln!(out, "  {detail}");
        }
    }
    let _ = writeln!(out, "View centre: {}", format_position(&state.view_center()));

    let _ = writeln!(out, "\nMarkers ({} active, {} GPS on)", state.active_count(), state.gps_on_count(now));
    let markers = state.markers(now);
    if markers.is_empty() {
        let _ = writeln!(out, "  No active technicians");
    }
    let focused = state.focused_technician();
    for m in markers {
        let _ = writeln!(
            out,
            "{} {:<22} {:<9} {:<26} {}{}",
            if focused == Some(&m.tech_id) { '>' } else { ' ' },
            truncate(&m.name, 22),
            m.status.label(),
            format_position(&m.position),
            match m.kind {
                MarkerKind::Live => "live",
                MarkerKind::Offline => "last known",
            },
            m.job_title.map(|t| format!("  [{t}]")).unwrap_or_default()
        );
    }

    let _ = writeln!(out, "\nActive routes ({})", state.routes().len());
    let selected_route = state.selected_route().map(|r| r.id.as_str());
    for seg in state.route_segments() {
        let _ = writeln!(
            out,
            "{} {:<28} {:<18} from {} to {}",
            if selected_route == Some(seg.route_id.as_str()) { '>' } else { ' ' },
            truncate(&seg.job_title, 28),
            truncate(seg.technician.as_deref().unwrap_or("-"), 18),
            format_position(&seg.start),
            seg.current.map(|p| format_position(&p)).unwrap_or_else(|| "?".into()),
        );
    }

    if let Some(selected) = state.selected_path() {
        let _ = writeln!(out);
        path(&mut out, &selected);
    }

    if let Some(query) = search {
        let found = state.search(query);
        let _ = writeln!(out, "\nSearch \"{query}\" ({})", found.len());
        if found.is_empty() {
            let _ = writeln!(out, "  No technicians found");
        }
        for t in found {
            let _ = writeln!(
                out,
                "  {:<22} {:<9} {}",
                truncate(t.display_name(), 22),
                if t.is_effectively_online(now) { "GPS On" } else { "GPS Off" },
                t.position().map(|p| format_position(&p)).unwrap_or_else(|| "no position".into())
            );
        }
    }
    out
}

pub fn toast(toast: &Toast) -> String {
    format!("[{}] {}", toast.kind.label(), toast.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, JobStatus, TechId, TechnicianStatus};

    fn tech(id: &str, tracking: bool, now: DateTime<Utc>) -> Technician {
        Technician {
            id: TechId::from(id),
            name: Some(format!("Tech {id}")),
            email: None,
            status: Some(TechnicianStatus::OnWay),
            is_tracking: tracking,
            last_lat: Some(23.8),
            last_lng: Some(90.4),
            last_ping: Some(now),
            jobs: Vec::new(),
        }
    }

    #[test]
    fn test_technicians_table_shows_effective_status() {
        let now = Utc::now();
        let out = technicians(&[tech("a", true, now), tech("b", false, now)], now);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("On Way"));
        assert!(lines[2].contains("Offline"));
        assert_eq!(technicians(&[], now), "No technicians found\n");
    }

    #[test]
    fn test_jobs_page_footer() {
        let jobs: Vec<Job> = (1..=12)
            .map(|i| Job {
                id: JobId::new(i.to_string()),
                title: format!("Job {i}"),
                description: None,
                address: None,
                status: JobStatus::Assigned,
                tech_id: None,
                admin_id: None,
                created_at: None,
                updated_at: None,
                technician: None,
                admin: None,
            })
            .collect();
        let data = DataState {
            jobs,
            ..DataState::default()
        };
        let out = jobs_page(&data.jobs_page(2));
        assert!(out.contains("Showing 11 to 12 of 12 jobs (page 2/2)"));
    }

    #[test]
    fn test_overview_reports_failed_load() {
        let data = DataState {
            last_error: Some("Failed to fetch jobs (HTTP 500)".into()),
            ..DataState::default()
        };
        let out = overview(&data);
        assert!(out.starts_with("! Failed to fetch jobs (HTTP 500)\n"));
        assert!(out.contains("No jobs yet"));

        assert!(!overview(&DataState::default()).contains('!'));
    }

    #[test]
    fn test_live_map_frame() {
        let now = Utc::now();
        let mut state = LiveMapState::new();
        state.apply_snapshot(vec![tech("a", true, now)], now);
        state.apply_roster(vec![tech("a", true, now), tech("b", false, now)], now);
        state.focus_technician(&TechId::from("a"));

        let out = live_map(&state, Some("tech b"), now);
        assert!(out.contains("Disconnected"));
        assert!(out.contains("Markers (1 active, 1 GPS on)"));
        assert!(out.contains("> Tech a"));
        assert!(out.contains("last known"));
        assert!(out.contains("Search \"tech b\" (1)"));
    }
}
