use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Tune Race Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::start_game,
        crate::routes::rooms::submit_guess,
        crate::routes::rooms::leave_room,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::StartGameRequest,
            crate::dto::room::GuessRequest,
            crate::dto::room::LeaveRoomRequest,
            crate::dto::room::RoomSummary,
            crate::dto::room::PlayerSummary,
            crate::dto::room::GuessResponse,
            crate::dto::room::GuessVerdict,
            crate::dto::phase::VisibleRoomPhase,
            crate::providers::PlaylistCriteria,
            crate::providers::Difficulty,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::dto::ws::SessionInfo,
            crate::dto::sse::Handshake,
            crate::dto::sse::RoomMembershipEvent,
            crate::dto::sse::PlayerJoinedEvent,
            crate::dto::sse::PlayerLeftEvent,
            crate::dto::sse::GameLoadingEvent,
            crate::dto::sse::GameStartedEvent,
            crate::dto::sse::RoundCountdownEvent,
            crate::dto::sse::RoundStartedEvent,
            crate::dto::sse::SongReveal,
            crate::dto::sse::RoundWonEvent,
            crate::dto::sse::RoundTimeoutEvent,
            crate::dto::sse::WrongGuessReason,
            crate::dto::sse::WrongGuessEvent,
            crate::dto::sse::ScoreboardEvent,
            crate::dto::sse::GameOverEvent,
            crate::dto::sse::ErrorEvent,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lifecycle and guessing"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket player sessions"),
    )
)]
pub struct ApiDoc;
