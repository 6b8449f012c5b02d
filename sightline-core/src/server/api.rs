//! HTTP surface of the room relay
//!
//! - `POST {prefix}/room.create` creates a room
//! - `POST {prefix}/room.join?room_id=` claims a seat
//! - `POST {prefix}/room.stream?room_id=&seat_id=` broadcasts the body
//! - `GET {prefix}/room.stream?room_id=&seat_id=` streams every broadcast
//!
//! Any other method on these paths is a 404.

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use super::registry::RoomRegistry;
use super::room::RoomHandle;
use crate::config::ServerConfig;
use crate::error::{Result, SightlineError};

type Params = Query<HashMap<String, String>>;

/// Shared state for the handlers
#[derive(Clone)]
struct ApiState {
    registry: RoomRegistry,
    config: Arc<ServerConfig>,
}

/// Error body `{"error": "..."}` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SightlineError> for ApiError {
    fn from(err: SightlineError) -> Self {
        let status = match err.root() {
            SightlineError::RoomNotFound(_) | SightlineError::RoomStopped(_) => {
                StatusCode::NOT_FOUND
            }
            SightlineError::RoomFull => StatusCode::GONE,
            SightlineError::SeatNotInRoom(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Build the relay router
pub fn router(config: &ServerConfig, registry: RoomRegistry) -> Router {
    let prefix = config.normalized_prefix();
    let state = ApiState {
        registry,
        config: Arc::new(config.clone()),
    };

    Router::new()
        .route(
            &format!("{}/room.create", prefix),
            post(create_room).fallback(not_found),
        )
        .route(
            &format!("{}/room.join", prefix),
            post(join_room).fallback(not_found),
        )
        .route(
            &format!("{}/room.stream", prefix),
            get(get_stream).post(stream_room).fallback(not_found),
        )
        .layer(DefaultBodyLimit::max(config.max_chunk_bytes))
        .with_state(state)
}

/// Bind `config.bind` and serve until `shutdown` resolves
pub async fn serve(
    config: ServerConfig,
    registry: RoomRegistry,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind).await.map_err(|e| {
        SightlineError::Io(e).with_context(format!("Failed to bind {}", config.bind))
    })?;
    serve_on(listener, config, registry, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_on(
    listener: TcpListener,
    config: ServerConfig,
    registry: RoomRegistry,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    config.validate_strict().map_err(SightlineError::config)?;
    let app = router(&config, registry.clone());
    if let Ok(addr) = listener.local_addr() {
        info!(
            "Room relay listening on http://{}{}",
            addr,
            config.normalized_prefix()
        );
    }

    // Open viewer streams only end once their room does
    let signal = async move {
        shutdown.await;
        info!("Shutting down room relay, stopping {} room(s)", registry.len());
        for id in registry.ids() {
            if let Some(room) = registry.get(&id) {
                let _ = room.stop().await;
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await?;

    info!("Room relay stopped");
    Ok(())
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn create_room(State(state): State<ApiState>) -> impl IntoResponse {
    let room = state.registry.create_room(&state.config);
    info!("Created room {}", room);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": room.id() })),
    )
}

async fn join_room(
    State(state): State<ApiState>,
    Query(params): Params,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let room = lookup_room(&state, &params)?;
    let seat = room.claim_seat().await?;
    debug!("Seat {} claimed in room {}", seat, room);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "seat_id": seat })),
    ))
}

async fn stream_room(
    State(state): State<ApiState>,
    Query(params): Params,
    body: Bytes,
) -> std::result::Result<StatusCode, ApiError> {
    let room = lookup_room(&state, &params)?;
    let seat = seat_param(&params)?;

    let delivered = room.broadcast(seat, body).await?;
    debug!("Room {} seat {} broadcast to {} client(s)", room, seat, delivered);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_stream(
    State(state): State<ApiState>,
    Query(params): Params,
) -> std::result::Result<Response, ApiError> {
    let room = lookup_room(&state, &params)?;
    let seat = seat_param(&params)?;

    let (tx, rx) = mpsc::channel(state.config.viewer_buffer.max(1));
    let client = tx.downgrade();
    room.set_client(seat, tx).await?;
    info!("Viewer attached to room {} seat {}", room, seat);

    let stream = ViewerStream {
        rx,
        _seat: SeatGuard {
            room,
            seat,
            client,
        },
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/webm"),
            (header::CACHE_CONTROL, "private"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

fn lookup_room(
    state: &ApiState,
    params: &HashMap<String, String>,
) -> std::result::Result<RoomHandle, ApiError> {
    let id = params
        .get("room_id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("room_id required"))?;

    state
        .registry
        .get(id)
        .ok_or_else(|| SightlineError::RoomNotFound(id.clone()).into())
}

fn seat_param(params: &HashMap<String, String>) -> std::result::Result<u32, ApiError> {
    params
        .get("seat_id")
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| ApiError::bad_request("seat_id required"))
}

/// Frees the viewer's seat when its response body is dropped
struct SeatGuard {
    room: RoomHandle,
    seat: u32,
    client: mpsc::WeakSender<Bytes>,
}

impl Drop for SeatGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        // Already unbound by the room
        let Some(client) = self.client.upgrade() else {
            return;
        };
        let room = self.room.clone();
        let seat = self.seat;
        runtime.spawn(async move {
            match room.release_client(seat, client).await {
                Ok(()) => debug!("Viewer left room {} seat {}", room, seat),
                Err(SightlineError::RoomStopped(_)) => {}
                Err(e) => warn!("Failed to free room {} seat {}: {}", room, seat, e),
            }
        });
    }
}

/// Response body of a viewer
struct ViewerStream {
    rx: mpsc::Receiver<Bytes>,
    _seat: SeatGuard,
}

impl Stream for ViewerStream {
    type Item = std::result::Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}
