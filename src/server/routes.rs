//! HTTP routes
//!
//! Catalogue endpoints answer with JSON. `/play/:param` attaches a pump to
//! the track's live stream and hands the read side of an in-memory pipe to
//! the response body.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;

use crate::error::{Error, LibraryError};
use crate::library::Track;
use crate::station::Station;

const SONG_NOT_FOUND: &str = "song not found";

const WELCOME: &str = "Welcome to airwave!\n\n\
Available endpoints:\n\n\
GET /songs\n\
GET /songs/:param\n\
GET /search/:param\n\
GET /play/:param\n\n\
:param is a song id or part of a title.\n\n\
Enjoy!\n";

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    station: Arc<Station>,
    listener_slots: Option<Arc<Semaphore>>,
}

impl AppState {
    /// `max_listeners` of 0 leaves `/play` unlimited
    pub fn new(station: Arc<Station>, max_listeners: usize) -> Self {
        let listener_slots = if max_listeners > 0 {
            Some(Arc::new(Semaphore::new(max_listeners)))
        } else {
            None
        };

        Self {
            station,
            listener_slots,
        }
    }
}

/// Error answered as `{"message": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        Error::Library(e).into()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Library(LibraryError::TrackNotFound(_)) => {
                ApiError::new(StatusCode::NOT_FOUND, SONG_NOT_FOUND)
            }
            e => {
                tracing::warn!(error = %e, "Failed to start stream");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "stream unavailable")
            }
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/songs", get(list_songs))
        .route("/songs/:param", get(get_song))
        .route("/search/:param", get(search_songs))
        .route("/play/:param", get(play))
        .fallback(not_found)
        .with_state(state)
}

async fn index() -> &'static str {
    WELCOME
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}

async fn list_songs(State(state): State<AppState>) -> Result<Json<Vec<Track>>, ApiError> {
    let tracks = state.station.library().tracks();
    if tracks.is_empty() {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "library is empty"));
    }
    Ok(Json(tracks.to_vec()))
}

async fn get_song(
    State(state): State<AppState>,
    Path(param): Path<String>,
) -> Result<Json<Track>, ApiError> {
    let track = state.station.library().resolve(&param)?;
    Ok(Json(track.clone()))
}

async fn search_songs(State(state): State<AppState>, Path(term): Path<String>) -> Json<Vec<Track>> {
    let hits = state.station.library().search(&term);
    Json(hits.into_iter().cloned().collect())
}

async fn play(State(state): State<AppState>, Path(param): Path<String>) -> Result<Response, ApiError> {
    let permit = match &state.listener_slots {
        Some(slots) => match Arc::clone(slots).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(param = %param, "Listener rejected: limit reached");
                return Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "too many listeners"));
            }
        },
        None => None,
    };

    let capacity = state.station.config().chunk_size.max(1);
    let (reader, writer) = tokio::io::duplex(capacity);
    let (track, pump) = state.station.attach(&param, writer).await?;

    tracing::info!(
        listener = %pump.id(),
        track = track.id,
        title = %track.title,
        "Listener connected"
    );

    tokio::spawn(async move {
        // Held for the life of the listener
        let _permit = permit;
        let report = pump.run().await;

        tracing::info!(
            listener = %report.id,
            chunks = report.stats.chunks_written,
            bytes = report.stats.bytes_written,
            secs = report.stats.duration().as_secs(),
            "Listener disconnected"
        );
    });

    let headers = [
        (header::CONTENT_TYPE, track.format.content_type()),
        (header::CACHE_CONTROL, "no-cache, no-store"),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(reader))).into_response())
}
