//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::registry::ROOM_ID_ALPHABET;

/// Longest display name accepted, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 24;

/// Validates a display name: 1 to 24 visible characters, no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Ann")         // Ok
/// validate_player_name("   ")         // Err - blank
/// validate_player_name("tab\there")   // Err - control character
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a room ID is exactly 6 characters of the room alphabet.
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != 6 {
        let mut err = ValidationError::new("room_id_length");
        err.message =
            Some(format!("Room ID must be exactly 6 characters (got {})", id.len()).into());
        return Err(err);
    }

    if !id.bytes().all(|b| ROOM_ID_ALPHABET.contains(&b)) {
        let mut err = ValidationError::new("room_id_format");
        err.message = Some("Room ID contains characters outside of its alphabet".into());
        return Err(err);
    }

    Ok(())
}
