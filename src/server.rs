//! Web server for the quakeview dashboard.
//!
//! Provides the live earthquake dashboard using:
//! - Axum for the HTTP server
//! - SSE (Server-Sent Events) to tell the page when to redraw
//! - Leaflet for the map
//!
//! The page never owns state. Every view (map, list, footer) redraws from
//! the same `/api/state` document, so they always agree on selection.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::client::{TimeWindow, USGS_BASE_URL, UsgsClient};
use crate::errors::SchedulerStopped;
use crate::scheduler::{RefreshOutcome, RefreshScheduler, SchedulerConfig, SchedulerHandle};
use crate::views::{DashboardView, Severity};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub feed_base_url: String,
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            feed_base_url: USGS_BASE_URL.to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    scheduler: SchedulerHandle,
}

/// Filter form posted by the sidebar.
#[derive(Debug, Default, Deserialize)]
pub struct FilterUpdate {
    pub min_magnitude: Option<f64>,
    pub time_window: Option<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler))
        .route("/api/state", get(state_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/filters", post(filters_handler))
        .route("/api/select/{id}", post(select_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the scheduler and the web server; stop both on Ctrl+C.
///
/// # Errors
///
/// Returns an error if the feed client cannot be built or the listener
/// cannot bind.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let client = UsgsClient::with_base_url(&config.feed_base_url)
        .context("failed to create USGS client")?;
    let (scheduler, scheduler_task) =
        RefreshScheduler::spawn(Arc::new(client), config.scheduler.clone());

    let app = create_router(AppState {
        scheduler: scheduler.clone(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 quakeview dashboard starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The periodic timer must not outlive the dashboard
    scheduler.shutdown().await;
    if let Err(e) = scheduler_task.await {
        tracing::warn!("scheduler task ended abnormally: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the HTML UI.
async fn index_handler() -> Html<String> {
    Html(INDEX_HTML.replace("{{LEGEND}}", &legend_html()))
}

/// Current dashboard state for all three views.
async fn state_handler(State(state): State<AppState>) -> Json<DashboardView> {
    Json(DashboardView::new(state.scheduler.snapshot(), Utc::now()))
}

/// Manual refresh. Joins a fetch already in flight.
async fn refresh_handler(
    State(state): State<AppState>,
) -> Result<Json<RefreshOutcome>, StatusCode> {
    let outcome = state.scheduler.refresh_now().await.map_err(unavailable)?;
    tracing::debug!("manual refresh via UI: {:?}", outcome);
    Ok(Json(outcome))
}

/// Apply filter changes from the sidebar.
async fn filters_handler(
    State(state): State<AppState>,
    Json(update): Json<FilterUpdate>,
) -> Result<Json<DashboardView>, StatusCode> {
    if let Some(value) = update.min_magnitude {
        state
            .scheduler
            .set_min_magnitude(value)
            .await
            .map_err(unavailable)?;
    }
    if let Some(window) = update.time_window.as_deref() {
        state
            .scheduler
            .set_time_window(TimeWindow::parse_lenient(window))
            .await
            .map_err(unavailable)?;
    }
    Ok(Json(DashboardView::new(state.scheduler.snapshot(), Utc::now())))
}

/// Select an event from the map or the list.
async fn select_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DashboardView>, StatusCode> {
    state.scheduler.select(&id).await.map_err(unavailable)?;
    Ok(Json(DashboardView::new(state.scheduler.snapshot(), Utc::now())))
}

/// SSE stream of dashboard change events.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.scheduler.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(change) => Some(Ok(Event::default().event(change.as_str()).data(change.as_str()))),
        // Lagged: the page re-reads the whole state on the next event anyway
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

fn unavailable(e: SchedulerStopped) -> StatusCode {
    tracing::error!("{}", e);
    StatusCode::SERVICE_UNAVAILABLE
}

fn legend_html() -> String {
    [
        Severity::Minor,
        Severity::Light,
        Severity::Moderate,
        Severity::Strong,
    ]
    .iter()
    .map(|s| {
        format!(
            r#"<div class="legend-row"><span class="legend-dot" style="background:{};width:{}px;height:{}px"></span>{}</div>"#,
            s.color(),
            s.size() / 2,
            s.size() / 2,
            s.legend()
        )
    })
    .collect()
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>quakeview · Earthquake Visualizer</title>

    <!-- Leaflet -->
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>

    <style>
        :root {
            --font: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif;
            --bg: #f8fafc;
            --panel: #ffffff;
            --text: #0f172a;
            --muted: #64748b;
            --border: #e2e8f0;
            --accent: #2563eb;
            --selected: #dbeafe;
            --danger: #ef4444;
        }
        * { box-sizing: border-box; }
        body { margin: 0; font-family: var(--font); color: var(--text); background: var(--bg);
               display: flex; flex-direction: column; height: 100vh; }
        header { background: var(--accent); color: white; padding: 0.75rem 1rem;
                 display: flex; justify-content: space-between; align-items: center; }
        header h1 { margin: 0; font-size: 1.2rem; }
        button { cursor: pointer; border: none; border-radius: 6px; padding: 0.4rem 0.8rem; font: inherit; }
        button:disabled { opacity: 0.5; cursor: not-allowed; }
        #refresh { background: white; color: var(--accent); }
        .layout { flex: 1; display: flex; overflow: hidden; }
        aside { width: 320px; background: var(--panel); border-right: 1px solid var(--border);
                padding: 1rem; overflow-y: auto; }
        aside h2 { font-size: 1rem; margin: 0 0 0.5rem; }
        aside label { display: block; margin-bottom: 0.75rem; color: var(--muted); font-size: 0.9rem; }
        aside input, aside select { display: block; width: 100%; margin-top: 0.25rem; padding: 0.35rem;
                                    border: 1px solid var(--border); border-radius: 6px; }
        #list { list-style: none; margin: 0; padding: 0; }
        #list li { padding: 0.6rem; margin-bottom: 0.4rem; border: 1px solid var(--border);
                   border-radius: 8px; cursor: pointer; }
        #list li:hover { background: var(--bg); }
        #list li.selected { background: var(--selected); border-color: var(--accent); }
        #list .place { font-weight: 600; font-size: 0.9rem; }
        #list .meta { font-size: 0.8rem; color: var(--muted); margin-top: 0.2rem; }
        .empty { color: var(--muted); font-style: italic; }
        #map { flex: 1; }
        .quake-marker { border-radius: 50%; border: 2px solid white; color: white; font-weight: bold;
                        display: flex; align-items: center; justify-content: center; width: 100%; height: 100%; }
        .quake-marker.selected { border-color: #06b6d4; }
        .legend { background: white; padding: 0.5rem 0.75rem; border-radius: 6px; font-size: 0.8rem; }
        .legend-row { display: flex; align-items: center; gap: 0.4rem; margin-top: 0.2rem; }
        .legend-dot { display: inline-block; border-radius: 50%; }
        footer { background: #f1f5f9; color: var(--muted); padding: 0.5rem 1rem; font-size: 0.85rem;
                 display: flex; justify-content: space-between; gap: 1rem; flex-wrap: wrap; }
        #toasts { position: fixed; top: 4rem; right: 1rem; z-index: 1000; display: flex;
                  flex-direction: column; gap: 0.5rem; }
        .toast { background: var(--text); color: white; padding: 0.6rem 0.9rem; border-radius: 8px;
                 box-shadow: 0 4px 12px rgba(0,0,0,0.2); font-size: 0.9rem; }
        .toast.error { background: var(--danger); }
        @media (max-width: 768px) {
            .layout { flex-direction: column; }
            aside { width: 100%; max-height: 40vh; }
        }
    </style>
</head>
<body>
    <header>
        <h1>🌎 Earthquake Visualizer</h1>
        <button id="refresh" type="button">↻ Refresh</button>
    </header>

    <div class="layout">
        <aside>
            <h2>Filters</h2>
            <label>Min Magnitude
                <input id="min-magnitude" type="number" min="0" step="0.5" value="0">
            </label>
            <label>Time Range
                <select id="time-window">
                    <option value="day">Past Day</option>
                    <option value="week">Past Week</option>
                    <option value="month">Past Month</option>
                </select>
            </label>

            <h2>Earthquakes</h2>
            <ul id="list"><li class="empty">Loading…</li></ul>
        </aside>
        <div id="map"></div>
    </div>

    <footer>
        <span id="stats">0 events</span>
        <span id="status">Not refreshed yet</span>
        <span>Data: USGS · Map: Leaflet</span>
    </footer>

    <div id="toasts"></div>

    <script>
        const map = L.map('map', { zoomControl: true }).setView([20, 0], 2);
        const osm = '&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors';
        const baseLayers = {
            'Standard': L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', { attribution: osm }),
            'Satellite': L.tileLayer('https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}', {
                attribution: 'Tiles &copy; Esri &mdash; Source: Esri, i-cubed, USDA, USGS, AEX, GeoEye, Getmapping, Aerogrid, IGN, IGP, UPR-EGP, and the GIS User Community'
            }),
            'Dark': L.tileLayer('https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png', {
                attribution: osm + ' &copy; <a href="https://carto.com/attributions">CARTO</a>'
            })
        };
        baseLayers['Standard'].addTo(map);
        L.control.layers(baseLayers, null, { position: 'topright' }).addTo(map);
        L.control.scale({ imperial: false }).addTo(map);
        const legend = L.control({ position: 'bottomleft' });
        legend.onAdd = () => {
            const div = L.DomUtil.create('div', 'legend');
            div.innerHTML = '<strong>Magnitude</strong>{{LEGEND}}';
            return div;
        };
        legend.addTo(map);
        const markers = L.layerGroup().addTo(map);

        let lastViewport = '';
        let pending = false;

        const esc = (s) => String(s).replace(/[&<>"']/g,
            (c) => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c]));

        async function post(url, body) {
            const res = await fetch(url, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(body || {})
            });
            return res.ok ? res.json() : null;
        }

        async function load() {
            pending = false;
            const res = await fetch('/api/state');
            if (res.ok) render(await res.json());
        }

        function scheduleLoad() {
            if (pending) return;
            pending = true;
            requestAnimationFrame(load);
        }

        function select(id) {
            post('/api/select/' + encodeURIComponent(id)).then((s) => s && render(s));
        }

        function render(s) {
            const selectedId = s.selected ? s.selected.id : null;

            // Filters
            const input = document.getElementById('min-magnitude');
            if (document.activeElement !== input) input.value = s.criteria.min_magnitude;
            document.getElementById('time-window').value = s.criteria.time_window;

            // List
            const list = document.getElementById('list');
            if (s.status.in_flight && s.visible.length === 0) {
                list.innerHTML = '<li class="empty">Loading…</li>';
            } else if (s.visible.length === 0) {
                list.innerHTML = '<li class="empty">No earthquakes found.</li>';
            } else {
                list.innerHTML = s.visible.map((e, i) => `
                    <li data-id="${esc(e.id)}" class="${e.id === selectedId ? 'selected' : ''}">
                        <div class="place">${esc(e.place)}</div>
                        <div class="meta">Mag ${e.magnitude.toFixed(1)} · Depth ${e.depth} km · ${esc(s.ages[i])}</div>
                    </li>`).join('');
                list.querySelectorAll('li[data-id]').forEach((li) =>
                    li.addEventListener('click', () => select(li.dataset.id)));
                const active = list.querySelector('li.selected');
                if (active) active.scrollIntoView({ block: 'nearest' });
            }

            // Map
            markers.clearLayers();
            s.markers.forEach((m) => {
                const icon = L.divIcon({
                    className: '',
                    iconSize: [m.size, m.size],
                    iconAnchor: [m.size / 2, m.size / 2],
                    html: `<div class="quake-marker ${m.selected ? 'selected' : ''}"
                                style="background:${m.color};box-shadow:0 0 ${m.selected ? 12 : 6}px ${m.color};
                                       font-size:${Math.max(8, m.size / 3)}px">${esc(m.label)}</div>`
                });
                L.marker([m.latitude, m.longitude], { icon, zIndexOffset: m.selected ? 1000 : 0 })
                    .bindTooltip(esc(m.tooltip), { direction: 'top' })
                    .bindPopup(`<strong>${esc(m.place)}</strong><br>${esc(m.tooltip)}<br>
                                <em>${esc(m.age)}</em><br>
                                <a href="${esc(m.detail_url)}" target="_blank" rel="noopener noreferrer">View details on USGS</a>`)
                    .on('click', () => select(m.id))
                    .addTo(markers);
            });

            const vp = JSON.stringify(s.viewport);
            if (vp !== lastViewport) {
                lastViewport = vp;
                const v = s.viewport;
                if (v.kind === 'focus') map.setView([v.latitude, v.longitude], v.zoom, { animate: true });
                else if (v.kind === 'bounds') map.fitBounds([[v.south, v.west], [v.north, v.east]], { padding: [20, 20] });
                else map.setView([v.latitude, v.longitude], v.zoom);
            }

            // Footer
            document.getElementById('stats').textContent =
                `${s.stats.total_count} events · max M${s.stats.max_magnitude.toFixed(1)} · mean depth ${s.stats.mean_depth_rounded} km`;
            document.getElementById('status').textContent = s.status_line;
            const refresh = document.getElementById('refresh');
            refresh.disabled = s.status.in_flight;
            refresh.textContent = s.status.in_flight ? '↻ Refreshing…' : '↻ Refresh';

            // Notifications
            document.getElementById('toasts').innerHTML = s.notifications
                .map((n) => `<div class="toast ${n.level}">${esc(n.message)}</div>`).join('');
        }

        document.getElementById('refresh').addEventListener('click', () => post('/api/refresh'));
        document.getElementById('min-magnitude').addEventListener('change', (e) =>
            post('/api/filters', { min_magnitude: Number(e.target.value) || 0 }).then((s) => s && render(s)));
        document.getElementById('time-window').addEventListener('change', (e) =>
            post('/api/filters', { time_window: e.target.value }).then((s) => s && render(s)));

        const events = new EventSource('/stream');
        ['filters_changed', 'canonical_set_changed', 'visible_subset_changed',
         'selection_changed', 'status_changed', 'notifications_changed']
            .forEach((name) => events.addEventListener(name, scheduleLoad));

        load();
    </script>
</body>
</html>
"##;
