//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

/// Longest display name a guest may pick, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 32;

/// Validates a requested guest name. Blank names are accepted and replaced by a generated one.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Ada")        // Ok
/// validate_player_name("   ")        // Ok, a name gets generated
/// validate_player_name("bad\u{7}")   // Err - control character
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that the answer ids of a question are unique.
pub fn validate_unique_ids(ids: &[u64]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    if ids.iter().all(|id| seen.insert(*id)) {
        return Ok(());
    }

    let mut err = ValidationError::new("duplicate_ids");
    err.message = Some("Identifiers must be unique".into());
    Err(err)
}
