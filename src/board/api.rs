use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch},
};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::db::DbHandle;
#[cfg(test)]
use super::db::BoardDb;
use super::models::{ErrorBody, PositionsResponse};
use super::ws::{BoardEvent, broadcast_event};
use crate::errors::BoardError;
use crate::reorder::ReconciliationRequest;
use crate::session::{Session, SessionProvider};

/// Header carrying the caller's email.
pub const USER_HEADER: &str = "x-roadmap-user";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub events_tx: broadcast::Sender<String>,
    pub sessions: Arc<dyn SessionProvider>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateCardRequest {
    pub title: String,
    pub description: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Request body the handler could not decode.
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<BoardError>() {
            Some(e @ (BoardError::BoardNotFound { .. } | BoardError::CardNotFound { .. })) => {
                ApiError::NotFound(e.to_string())
            }
            Some(e @ BoardError::PositionConflict { .. }) => ApiError::Conflict(e.to_string()),
            Some(e @ (BoardError::CardNotOnBoard { .. } | BoardError::BadRequest(_))) => {
                ApiError::BadRequest(e.to_string())
            }
            _ => ApiError::Internal(format!("{:#}", err)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Unprocessable(message),
            _ => ApiError::BadRequest(message),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// Extracted as `Result` so the session is checked first; rejections answer with `ErrorBody`.
type JsonBody<T> = Result<Json<T>, JsonRejection>;
type PathId = Result<Path<i64>, PathRejection>;

// ── Session gating ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Edit,
}

fn authorize(state: &AppState, headers: &HeaderMap, access: Access) -> Result<Session, ApiError> {
    let email = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok());
    let session = state
        .sessions
        .resolve(email)
        .ok_or_else(|| ApiError::Unauthorized("Sign in to view the roadmap board".into()))?;

    let allowed = match access {
        Access::Read => session.permissions.can_access_roadmap_board,
        Access::Edit => session.permissions.can_edit(),
    };
    if !allowed {
        tracing::debug!(email = ?session.email, ?access, "permission denied");
        let message = match access {
            Access::Read => "You do not have access to the roadmap board",
            Access::Edit => "You do not have permission to edit the roadmap board",
        };
        return Err(ApiError::Forbidden(message.into()));
    }
    Ok(session)
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/{id}/cards", get(list_cards).post(create_card))
        .route("/api/boards/{id}/positions", patch(patch_positions))
        .route("/api/cards/{id}", delete(delete_card))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_boards(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, Access::Read)?;
    let boards = state.db.call(|db| db.list_boards()).await?;
    Ok(Json(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: JsonBody<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, Access::Edit)?;
    let Json(req) = body?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Board name must not be empty".into()));
    }
    let board = state.db.call(move |db| db.create_board(&name)).await?;
    tracing::info!(board_id = board.id, name = %board.name, "board created");
    broadcast_event(&state.events_tx, &BoardEvent::board_created(board.clone()));
    Ok((StatusCode::CREATED, Json(board)))
}

async fn list_cards(
    State(state): State<SharedState>,
    headers: HeaderMap,
    path: PathId,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, Access::Read)?;
    let Path(board_id) = path?;
    let cards = state.db.call(move |db| db.list_cards(board_id)).await?;
    Ok(Json(cards))
}

async fn create_card(
    State(state): State<SharedState>,
    headers: HeaderMap,
    path: PathId,
    body: JsonBody<CreateCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, Access::Edit)?;
    let Path(board_id) = path?;
    let Json(req) = body?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Card title must not be empty".into()));
    }
    let description = req.description.unwrap_or_default();
    let card = state
        .db
        .call(move |db| db.create_card(board_id, &title, &description))
        .await?;
    tracing::info!(board_id, card_id = card.id, position = card.position, "card created");
    broadcast_event(&state.events_tx, &BoardEvent::card_created(card.clone()));
    Ok((StatusCode::CREATED, Json(card)))
}

async fn delete_card(
    State(state): State<SharedState>,
    headers: HeaderMap,
    path: PathId,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, Access::Edit)?;
    let Path(id) = path?;
    let deleted = state.db.call(move |db| db.delete_card(id)).await?;
    match deleted {
        Some(card) => {
            tracing::info!(board_id = card.board_id, card_id = id, "card deleted");
            broadcast_event(&state.events_tx, &BoardEvent::card_deleted(card.board_id, id));
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(BoardError::CardNotFound { id }.into()),
    }
}

/// Persistence endpoint for reorders: applies one batch of positions and
/// answers with the board's full ordering.
async fn patch_positions(
    State(state): State<SharedState>,
    headers: HeaderMap,
    path: PathId,
    body: JsonBody<ReconciliationRequest<i64>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = authorize(&state, &headers, Access::Edit)?;
    let Path(board_id) = path?;
    let Json(req) = body?;
    if req.is_empty() {
        return Err(ApiError::BadRequest("No position updates supplied".into()));
    }
    let updates = req.updates;
    let changed = updates.len();
    let positions = state
        .db
        .call(move |db| db.apply_positions(board_id, &updates))
        .await
        .map_err(|e| {
            tracing::warn!(board_id, error = %e, "position update refused");
            ApiError::from(e)
        })?;
    tracing::info!(board_id, changed, email = ?session.email, "positions applied");
    broadcast_event(
        &state.events_tx,
        &BoardEvent::positions_changed(board_id, positions.clone()),
    );
    Ok(Json(PositionsResponse { positions }))
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        ApiError::from(anyhow::Error::new(err))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
