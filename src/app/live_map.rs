//! The `watch` live-map loop.
//!
//! One task folds everything into [`LiveMapState`]: the initial REST load,
//! push events, the drift-correction poll and the REST route fetch for a
//! selected route. A frame is printed after the initial load, on every poll
//! tick and whenever the connection state changes.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use tokio::time::MissedTickBehavior;

use super::cli::WatchOptions;
use super::render;
use crate::domain::{JobId, TechId};
use crate::services::{ApiClient, ServiceEvent, ServiceHub};
use crate::state::{LiveMapEffect, LiveMapState, Notifications};

/// Run the live map until Ctrl-C
pub async fn watch(hub: &mut ServiceHub, options: WatchOptions, poll: Duration) -> Result<()> {
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupted, leaving live map");
    };
    watch_until(hub, options, poll, interrupted).await
}

async fn watch_until(
    hub: &mut ServiceHub,
    options: WatchOptions,
    poll: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let api = hub.api();
    let mut state = LiveMapState::new();
    let mut toasts = Notifications::default();

    initial_load(&api, &mut state, &mut toasts).await;

    // Technician whose trail is requested over the push channel once connected
    let mut trail_for: Option<TechId> = None;
    if let Some(tech) = &options.tech {
        let job = state.select_technician(tech);
        if state.selected_technician().is_none() {
            toasts.error(format!("Technician {tech} not found"), Utc::now());
            state.clear_selection();
        } else if let Some(job) = job {
            load_job_route(&api, &job, &mut state, &mut toasts).await;
        } else {
            trail_for = Some(tech.clone());
        }
    }
    if let Some(job) = &options.route {
        if let Some(job) = state.select_route_for_job(job) {
            load_job_route(&api, &job, &mut state, &mut toasts).await;
        }
    }

    let mut events = hub.start_events().await;
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    print_frame(&mut state, &options, &mut toasts);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            _ = ticker.tick() => {
                if !hub.refresh_live_map() {
                    tracing::debug!("event channel down, poll skipped");
                }
                print_frame(&mut state, &options, &mut toasts);
            }

            event = events.recv() => {
                let Some(event) = event else {
                    hub.stop().await;
                    let detail = state.connection_detail().unwrap_or("event channel closed");
                    bail!("Live updates stopped: {detail}");
                };
                let connection_change = matches!(event, ServiceEvent::ConnectionState { .. });

                match state.apply(event, Utc::now()) {
                    Some(LiveMapEffect::RefreshAll) => {
                        toasts.success("Live updates connected", Utc::now());
                        hub.refresh_live_map();
                        // Pick the selection back up after a (re)connect
                        let active_job = state
                            .selected_technician()
                            .and_then(|t| t.active_job())
                            .and_then(|j| j.id.clone());
                        if let Some(job) = active_job {
                            hub.request_job_route(&job);
                        } else if let Some(tech) = &trail_for {
                            hub.request_history(tech);
                        }
                    }
                    Some(LiveMapEffect::RefreshRoutes) => {
                        hub.refresh_routes();
                    }
                    None => {}
                }

                if connection_change {
                    print_frame(&mut state, &options, &mut toasts);
                } else {
                    print_toasts(&mut toasts);
                }
            }
        }
    }

    hub.stop().await;
    Ok(())
}

/// REST snapshot so the map is populated before the push channel connects
async fn initial_load(api: &ApiClient, state: &mut LiveMapState, toasts: &mut Notifications) {
    let (locations, roster, routes) = tokio::join!(
        api.technician_locations(),
        api.list_technicians(),
        api.active_routes()
    );
    let now = Utc::now();

    match locations {
        Ok(techs) => state.apply_snapshot(techs, now),
        Err(e) => {
            toasts.error(e.to_string(), now);
        }
    }
    match roster {
        Ok(techs) => state.apply_roster(techs, now),
        Err(e) => {
            toasts.error(e.to_string(), now);
        }
    }
    match routes {
        Ok(routes) => state.apply_active_routes(routes, now),
        Err(e) => {
            toasts.error(e.to_string(), now);
        }
    }
}

async fn load_job_route(
    api: &ApiClient,
    job: &JobId,
    state: &mut LiveMapState,
    toasts: &mut Notifications,
) {
    match api.job_route(job).await {
        Ok(job_route) => state.apply_job_route(job_route, Utc::now()),
        Err(e) => {
            toasts.error(format!("Error fetching route: {e}"), Utc::now());
        }
    }
}

/// A search that narrows to one technician highlights them, unless something is selected
fn focus_search_match(state: &mut LiveMapState, options: &WatchOptions) {
    if options.tech.is_some() || options.route.is_some() {
        return;
    }
    let Some(query) = options.search.as_deref() else {
        return;
    };
    let single = match state.search(query).as_slice() {
        [only] => Some(only.id.clone()),
        _ => None,
    };
    if let Some(id) = single {
        state.focus_technician(&id);
    }
}

fn print_frame(state: &mut LiveMapState, options: &WatchOptions, toasts: &mut Notifications) {
    focus_search_match(state, options);
    let now = Utc::now();
    print!("{}", render::live_map(state, options.search.as_deref(), now));
    for toast in toasts.visible(now) {
        println!("{}", render::toast(toast));
    }
    // Everything visible was just shown with the frame
    toasts.take_unseen();
}

fn print_toasts(toasts: &mut Notifications) {
    for toast in toasts.take_unseen() {
        eprintln!("{}", render::toast(&toast));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
    use axum::routing::get;
    use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
    use tokio_util::sync::CancellationToken;

    use crate::domain::config::AppConfig;

    /// What the fake backend does after an admin joins
    #[derive(Clone, Copy)]
    enum Script {
        Quiet,
        PushRouteStarted,
        /// Hang up on the first connection only
        DropFirstSession,
    }

    async fn serve(mut socket: WebSocket, script: Script, session: usize, seen: UnboundedSender<String>) {
        let open = r#"0{"sid":"watch-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
        if socket.send(Message::Text(open.to_string())).await.is_err() {
            return;
        }

        while let Some(Ok(msg)) = socket.recv().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let _ = seen.send(text.clone());

            let reply = match (text.as_str(), script) {
                ("40", _) => Some(r#"40{"sid":"socket-1"}"#),
                (r#"42["joinAdmin"]"#, Script::PushRouteStarted) => {
                    Some(r#"42["routeStarted",{"routeId":"r1","jobId":"j1","techId":"t1"}]"#)
                }
                (r#"42["joinAdmin"]"#, Script::DropFirstSession) if session == 0 => return,
                _ => None,
            };
            if let Some(reply) = reply {
                if socket.send(Message::Text(reply.to_string())).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Socket.IO endpoint recording every client frame; REST paths answer 404
    async fn start_backend(script: Script) -> (AppConfig, UnboundedReceiver<String>) {
        let (seen, seen_rx) = mpsc::unbounded_channel();
        let sessions = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/socket.io/",
            get(move |ws: WebSocketUpgrade| {
                let seen = seen.clone();
                let session = sessions.fetch_add(1, Ordering::SeqCst);
                async move { ws.on_upgrade(move |socket| serve(socket, script, session, seen)) }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let config = AppConfig {
            api_url: format!("http://{addr}/api"),
            socket_url: format!("http://{addr}"),
            ..AppConfig::default()
        };
        (config, seen_rx)
    }

    fn count(frames: &[String], event: &str) -> usize {
        let packet = format!(r#"42["{event}"]"#);
        frames.iter().filter(|f| **f == packet).count()
    }

    /// Watch until `done` holds for the recorded client frames (or 10 s pass)
    async fn watch_backend(
        script: Script,
        poll: Duration,
        done: impl Fn(&[String]) -> bool,
    ) -> (Result<()>, Vec<String>) {
        let (config, mut seen) = start_backend(script).await;
        let mut hub = ServiceHub::new(&config, Some("tok".into())).expect("hub");
        let stop = CancellationToken::new();

        let collect = async {
            let mut frames = Vec::new();
            let _ = tokio::time::timeout(Duration::from_secs(10), async {
                while let Some(text) = seen.recv().await {
                    frames.push(text);
                    if done(&frames) {
                        break;
                    }
                }
            })
            .await;
            stop.cancel();
            frames
        };

        let watching = watch_until(&mut hub, WatchOptions::default(), poll, stop.clone().cancelled_owned());
        tokio::join!(watching, collect)
    }

    #[tokio::test]
    async fn test_route_started_refreshes_routes_and_locations() {
        let (result, frames) = watch_backend(Script::PushRouteStarted, Duration::from_secs(60), |f| {
            count(f, "requestActiveRoutes") >= 2 && count(f, "requestAllLocations") >= 2
        })
        .await;

        result.expect("watch ends cleanly");
        assert_eq!(count(&frames, "joinAdmin"), 1);
        // One full refresh on connect, then routes and locations for the push
        assert_eq!(count(&frames, "requestAllTechnicians"), 1);
        assert_eq!(count(&frames, "requestActiveRoutes"), 2);
        assert_eq!(count(&frames, "requestAllLocations"), 2);
    }

    #[tokio::test]
    async fn test_poll_tick_requests_all_snapshots() {
        let (result, frames) = watch_backend(Script::Quiet, Duration::from_millis(100), |f| {
            count(f, "requestAllTechnicians") >= 3
        })
        .await;

        result.expect("watch ends cleanly");
        // More than the single connect refresh means the ticker fired
        assert!(count(&frames, "requestAllTechnicians") >= 3);
        assert!(count(&frames, "requestAllLocations") >= 2);
        assert!(count(&frames, "requestActiveRoutes") >= 2);
    }

    #[tokio::test]
    async fn test_reconnect_triggers_full_refresh() {
        let refreshed_after_rejoin = |f: &[String]| {
            let rejoin = f
                .iter()
                .enumerate()
                .filter(|(_, text)| text.as_str() == r#"42["joinAdmin"]"#)
                .nth(1)
                .map(|(i, _)| i);
            rejoin.is_some_and(|i| count(&f[i..], "requestAllTechnicians") >= 1)
        };

        let (result, frames) =
            watch_backend(Script::DropFirstSession, Duration::from_secs(60), refreshed_after_rejoin).await;

        result.expect("watch ends cleanly");
        assert!(refreshed_after_rejoin(&frames), "frames: {frames:?}");
    }

    #[tokio::test]
    async fn test_unusable_socket_url_fails_with_detail() {
        let config = AppConfig {
            api_url: "http://127.0.0.1:9/api".into(),
            socket_url: "localhost:3000".into(),
            ..AppConfig::default()
        };
        let mut hub = ServiceHub::new(&config, None).expect("hub");

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            watch_until(
                &mut hub,
                WatchOptions::default(),
                Duration::from_secs(60),
                std::future::pending(),
            ),
        )
        .await
        .expect("watch gives up");

        let err = result.expect_err("closed event channel is an error");
        assert!(err.to_string().contains("Unsupported socket URL"), "{err}");
    }

    #[test]
    fn test_single_search_match_is_focused() {
        let now = Utc::now();
        let tech = |id: &str, name: &str| {
            serde_json::from_value::<crate::domain::Technician>(serde_json::json!({
                "id": id, "name": name, "lastLat": 1.0, "lastLng": 2.0
            }))
            .expect("technician")
        };
        let mut state = LiveMapState::new();
        state.apply_roster(vec![tech("t1", "Karim"), tech("t2", "Rahim")], now);

        let mut options = WatchOptions {
            search: Some("ahim".into()),
            ..WatchOptions::default()
        };
        focus_search_match(&mut state, &options);
        assert_eq!(state.focused_technician().map(TechId::as_str), Some("t2"));

        state.clear_selection();
        options.search = Some("im".into());
        focus_search_match(&mut state, &options);
        assert!(state.focused_technician().is_none(), "two matches");
    }
}
