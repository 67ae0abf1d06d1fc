use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::room::{
        CreateRoomRequest, GuessRequest, GuessResponse, JoinRoomRequest, LeaveRoomRequest,
        RoomSummary, StartGameRequest,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Room lifecycle endpoints for clients that do not hold a WebSocket session.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/start", post(start_game))
        .route("/rooms/{id}/guess", post(submit_guess))
        .route("/rooms/{id}/leave", post(leave_room))
}

/// Open a room; the caller becomes its owner.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomSummary),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomSummary>), AppError> {
    let summary = game_service::create_room(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Current public view of a room.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room", body = RoomSummary),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    Ok(Json(game_service::room_summary(&state, &id).await?))
}

/// Join a room still in its lobby.
#[utoipa::path(
    post,
    path = "/rooms/{id}/join",
    tag = "rooms",
    params(("id" = String, Path, description = "Room identifier")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined", body = RoomSummary),
        (status = 409, description = "Room already started or full")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<RoomSummary>, AppError> {
    Ok(Json(game_service::join_room(&state, &id, payload).await?))
}

/// Owner only: resolve a playlist and start the game.
#[utoipa::path(
    post,
    path = "/rooms/{id}/start",
    tag = "rooms",
    params(("id" = String, Path, description = "Room identifier")),
    request_body = StartGameRequest,
    responses(
        (status = 202, description = "Playlist resolution started", body = RoomSummary),
        (status = 401, description = "Caller is not the owner"),
        (status = 409, description = "Room is not in its lobby")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<StartGameRequest>,
) -> Result<(StatusCode, Json<RoomSummary>), AppError> {
    let summary = game_service::start_game(&state, &id, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(summary)))
}

/// Submit an answer for the open round.
#[utoipa::path(
    post,
    path = "/rooms/{id}/guess",
    tag = "rooms",
    params(("id" = String, Path, description = "Room identifier")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess evaluated", body = GuessResponse),
        (status = 409, description = "Room is not playing")
    )
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<GuessRequest>,
) -> Result<Json<GuessResponse>, AppError> {
    let outcome = game_service::submit_guess(&state, &id, payload).await?;
    Ok(Json(outcome.into()))
}

/// Leave a room; it is torn down once nobody connected is left.
#[utoipa::path(
    post,
    path = "/rooms/{id}/leave",
    tag = "rooms",
    params(("id" = String, Path, description = "Room identifier")),
    request_body = LeaveRoomRequest,
    responses((status = 204, description = "Left the room"))
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<LeaveRoomRequest>,
) -> Result<StatusCode, AppError> {
    game_service::leave_room(&state, &id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
