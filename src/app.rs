use axum::{
    Form, Json, Router,
    extract::{Path, State, rejection::FormRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::{RelayConfig, ServerConfig};
use crate::downloader::{to_csv, to_xlsx};
use crate::mailer::{Mailer, Notifier};
use crate::progress::ProgressSnapshot;
use crate::relay::{Relay, ResultEnvelope};
use crate::sheet::{FileStore, RowStore};
use crate::submission::Submission;
use crate::tracker::{PanelState, Tracker};

type FormPairs = Vec<(String, String)>;

/// One relay per poll, keyed by slug
pub struct AppState {
    polls: BTreeMap<String, Arc<Relay>>,
}

#[derive(Serialize)]
struct PollInfo<'a> {
    slug: &'a str,
    title: &'a str,
    open: bool,
}

#[derive(Serialize)]
struct ProgressResponse {
    snapshot: Option<ProgressSnapshot>,
    panel: PanelState,
}

impl AppState {
    pub fn new(relays: Vec<Relay>) -> Self {
        let polls = relays
            .into_iter()
            .map(|relay| (relay.schema().slug.clone(), Arc::new(relay)))
            .collect();
        AppState { polls }
    }

    /// Opens a sheet file per poll and wires the mailer if any poll notifies
    pub fn from_config(config: &RelayConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let notifier: Option<Arc<dyn Notifier>> = if config.any_notifications() {
            Some(Arc::new(Mailer::new(&config.smtp)?))
        } else {
            None
        };

        let mut relays = Vec::new();
        for schema in config.schemas() {
            let path = config.storage.sheet_path(&schema.slug);
            let store: Arc<dyn RowStore> = Arc::new(FileStore::open(&path, schema.headers())?);
            let recipient = config.recipient_for(&schema.slug).map(str::to_string);

            let mut relay = Relay::new(schema, store, config.institution.clone());
            if let (Some(recipient), Some(notifier)) = (recipient, &notifier) {
                relay = relay.with_notifications(recipient, Arc::clone(notifier));
            }
            relays.push(relay);
        }

        Ok(AppState::new(relays))
    }

    pub fn relay(&self, slug: &str) -> Option<&Arc<Relay>> {
        self.polls.get(slug)
    }
}

pub fn router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/polls", get(list_polls))
        .route("/polls/:poll", get(probe).post(submit))
        .route("/polls/:poll/progress", post(progress))
        .route("/polls/:poll/export.csv", get(export_csv))
        .route("/polls/:poll/export.xlsx", get(export_xlsx))
        .layer(cors(&server.allowed_origins))
        .with_state(state);

    if let Some(dir) = &server.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub async fn run(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = router(state, &config.server);

    let listener = TcpListener::bind(&config.server.bind).await?;
    log::info!("Listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn unknown_poll(slug: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ResultEnvelope::error(format!("Unknown poll: {}", slug))),
    )
        .into_response()
}

async fn list_polls(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now: DateTime<FixedOffset> = Utc::now().into();
    let polls: Vec<PollInfo> = state
        .polls
        .values()
        .map(|relay| PollInfo {
            slug: &relay.schema().slug,
            title: &relay.schema().title,
            open: relay.schema().is_open_at(now),
        })
        .collect();

    Json(serde_json::json!({ "polls": polls })).into_response()
}

async fn probe(Path(poll): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.relay(&poll) {
        Some(relay) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{} Form Handler is active", relay.schema().title),
        )
            .into_response(),
        None => unknown_poll(&poll),
    }
}

async fn submit(
    Path(poll): Path<String>,
    State(state): State<Arc<AppState>>,
    form: Result<Form<FormPairs>, FormRejection>,
) -> Response {
    let Some(relay) = state.relay(&poll).cloned() else {
        return unknown_poll(&poll);
    };

    let submission = match form {
        Ok(Form(pairs)) => Submission::from_pairs(pairs),
        Err(rejection) => return Json(ResultEnvelope::error(rejection.body_text())).into_response(),
    };

    // Appending rewrites the sheet file, so keep it off the async workers.
    let envelope = match tokio::task::spawn_blocking(move || relay.submit(&submission)).await {
        Ok(envelope) => envelope,
        Err(e) => ResultEnvelope::error(e.to_string()),
    };

    Json(envelope).into_response()
}

async fn progress(
    Path(poll): Path<String>,
    State(state): State<Arc<AppState>>,
    form: Result<Form<FormPairs>, FormRejection>,
) -> Response {
    let Some(relay) = state.relay(&poll) else {
        return unknown_poll(&poll);
    };
    let submission = match form {
        Ok(Form(pairs)) => Submission::from_pairs(pairs),
        Err(rejection) => return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response(),
    };

    let mut tracker = Tracker::new();
    let mut panel = PanelState::default();
    let schema = relay.schema();

    let snapshot = if schema.is_open_at(Utc::now().into()) {
        tracker.refresh(&schema.layout(&submission), &mut panel)
    } else {
        tracker.close(&mut panel);
        None
    };

    Json(ProgressResponse { snapshot, panel }).into_response()
}

async fn export_csv(Path(poll): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let Some(relay) = state.relay(&poll) else {
        return unknown_poll(&poll);
    };

    match relay.store().snapshot() {
        Ok(sheet) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.csv\"", poll),
                ),
            ],
            to_csv(&sheet),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn export_xlsx(Path(poll): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let Some(relay) = state.relay(&poll) else {
        return unknown_poll(&poll);
    };

    let xlsx = relay
        .store()
        .snapshot()
        .map_err(|e| e.to_string())
        .and_then(|sheet| to_xlsx(&sheet, &poll).map_err(|e| e.to_string()));

    match xlsx {
        Ok(bytes) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.xlsx\"", poll),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}
