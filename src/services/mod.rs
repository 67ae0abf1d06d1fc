/// OpenAPI documentation generation.
pub mod documentation;
/// Room orchestration: the operations exposed to every transport.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Playlist resolution from criteria to playable songs.
pub mod playlist_service;
/// Names and builders of room events.
pub mod room_events;
/// Server-Sent Events room streams.
pub mod sse_service;
/// History backend supervision with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket player sessions.
pub mod websocket_service;
