//! HTTP request handlers for the pairing endpoint
//!
//! Two real routes: `GET /sync` serves the self-contained sync page and
//! `POST /time/set` validates and applies the phone's clock. Everything else
//! (captive-portal probes included) is nudged to `/sync` with a 302 so the
//! phone's connectivity-check browser lands on the page without the user
//! typing a URL.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use aimsync_core::{TimeService, TimeSetRequest};
use aimsync_session::{codec, SessionLogic};

/// Events pushed by handlers and the radio adapter, drained by the
/// controller's `loop_tick()`. Keeps all protocol-state mutation on the
/// control loop instead of inside driver callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// A station joined the AP (or fetched the sync page, which implies it)
    StationConnected,
    /// Time was applied; carry the offset so the controller can set TZ and
    /// tear the AP down
    Applied { tz_offset_min: i32 },
}

/// Shared state for the axum handlers.
pub struct AppState {
    /// The session state machine. Locked only across synchronous validation,
    /// never across an await point, which serializes requests exactly like
    /// the device's one-at-a-time loop.
    pub session: Mutex<SessionLogic>,
    /// Cached copy of the session token for the fast-path comparison and the
    /// sync page. Refreshed on `begin()`/`reissue()`.
    pub token: RwLock<String>,
    /// Wall/monotonic clock collaborator; absent means `500 No time adapters`
    pub time: Option<Arc<dyn TimeService + Send + Sync>>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl AppState {
    pub fn new(
        time: Option<Arc<dyn TimeService + Send + Sync>>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            session: Mutex::new(SessionLogic::new()),
            token: RwLock::new(String::new()),
            time,
            events,
        }
    }
}

/// Create the pairing-endpoint router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sync", get(sync_handler))
        .route("/time/set", post(time_set_handler))
        // Captive-portal connectivity probes: steer the phone's sign-in
        // browser to the sync page
        .route("/", get(redirect_handler))
        .route("/hotspot-detect.html", get(redirect_handler))
        .route("/success.txt", get(redirect_handler))
        .route("/success.html", get(redirect_handler))
        .route("/ncsi.txt", get(redirect_handler))
        .route("/generate_204", get(redirect_handler))
        .fallback(redirect_handler)
        .with_state(state)
}

/// Serve the minimal self-contained sync page.
///
/// The page embeds the session token and immediately POSTs the phone's
/// `Date.now()` and negated `getTimezoneOffset()` to `/time/set`. Anything
/// fetching this page has necessarily joined the AP, so this also counts as
/// a station-connected signal.
async fn sync_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let _ = state.events.send(TransportEvent::StationConnected);
    let token = state.token.read().await.clone();
    Html(sync_page(&token))
}

fn sync_page(token: &str) -> String {
    let mut html = String::with_capacity(1024);
    html.push_str(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
         </head><body><pre id='log'>Sync...</pre><script>",
    );
    html.push_str("const TOKEN='");
    html.push_str(token);
    html.push_str("';\n");
    html.push_str("const epochMs=Date.now(); const tzOffsetMin=-new Date().getTimezoneOffset();\n");
    html.push_str(
        "fetch('/time/set',{method:'POST',headers:{'Content-Type':'application/json'},\
         body:JSON.stringify({epochMs,tzOffsetMin,token:TOKEN})})\
         .then(async r=>{document.getElementById('log').textContent=\
         r.ok?('OK\\n'+await r.text()):('ERR '+r.status+'\\n'+await r.text());})\
         .catch(e=>{document.getElementById('log').textContent='ERR\\n'+e;});",
    );
    html.push_str("</script></body></html>");
    html
}

/// Validate and apply one time-set request.
async fn time_set_handler(State(state): State<Arc<AppState>>, body: String) -> (StatusCode, String) {
    handle_time_set(&state, &body).await
}

/// Parse the flat three-field request body. `None` on any missing or
/// malformed field.
fn parse_time_set_body(body: &str) -> Option<TimeSetRequest> {
    Some(TimeSetRequest {
        epoch_ms: codec::json_extract_i64(body, "epochMs")?,
        tz_offset_min: codec::json_extract_i32(body, "tzOffsetMin")?,
        token: codec::json_extract_string(body, "token")?,
    })
}

/// The `/time/set` decision, separated from the axum plumbing so it can be
/// exercised directly in tests.
pub async fn handle_time_set(state: &AppState, body: &str) -> (StatusCode, String) {
    let Some(TimeSetRequest {
        epoch_ms,
        tz_offset_min,
        token,
    }) = parse_time_set_body(body)
    else {
        debug!("time/set request with unparseable body");
        return (StatusCode::BAD_REQUEST, "Invalid JSON".to_string());
    };

    let Some(time) = state.time.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "No time adapters".to_string(),
        );
    };

    // Fast-path short-circuit against the cached token. Same value and same
    // semantics as the session's own check, which stays authoritative.
    {
        let cached = state.token.read().await;
        if !codec::verify_token(&cached, &token) {
            return (StatusCode::FORBIDDEN, "invalid_token".to_string());
        }
    }

    let mut session = state.session.lock().await;
    if session.handle_time_set_request(epoch_ms, tz_offset_min, &token, Some(time.as_ref())) {
        let _ = state.events.send(TransportEvent::Applied { tz_offset_min });
        (StatusCode::OK, "Time applied".to_string())
    } else {
        (StatusCode::BAD_REQUEST, session.error_message().to_string())
    }
}

/// 302 to `/sync?t=<token>`, the captive-portal landing path
async fn redirect_handler(State(state): State<Arc<AppState>>) -> Response {
    let token = state.token.read().await.clone();
    let location = format!("/sync?t={}", token);
    (StatusCode::FOUND, [(header::LOCATION, location)], "").into_response()
}
