use thiserror::Error;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_EMOJI_CHARS: usize = 32;
pub const REPLY_EXCERPT_CHARS: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("value is empty")]
    Empty,
    #[error("value is too long (max {max}, got {got})")]
    TooLong { max: usize, got: usize },
}

/// Message text must be non-empty after trimming and within the length cap.
/// Lengths are counted in characters, not bytes.
pub fn validate_message_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = text.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong {
            max: MAX_MESSAGE_CHARS,
            got: len,
        });
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = name.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(ValidationError::TooLong {
            max: MAX_NAME_CHARS,
            got: len,
        });
    }
    Ok(())
}

pub fn validate_emoji(emoji: &str) -> Result<(), ValidationError> {
    if emoji.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = emoji.chars().count();
    if len > MAX_EMOJI_CHARS {
        return Err(ValidationError::TooLong {
            max: MAX_EMOJI_CHARS,
            got: len,
        });
    }
    Ok(())
}

/// Quote excerpt for reply references: first `REPLY_EXCERPT_CHARS` characters
/// plus an ellipsis when truncated.
pub fn reply_excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(REPLY_EXCERPT_CHARS).collect();
    if text.chars().count() > REPLY_EXCERPT_CHARS {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_limits() {
        assert_eq!(validate_message_text("gm"), Ok(()));
        assert_eq!(validate_message_text("   "), Err(ValidationError::Empty));
        let long = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(validate_message_text(&long), Ok(()));
        let too_long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            validate_message_text(&too_long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn length_is_counted_in_characters() {
        // 2000 multibyte characters are fine even though the byte count is larger.
        let text = "é".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(validate_message_text(&text), Ok(()));
    }

    #[test]
    fn excerpt_truncates_with_ellipsis() {
        assert_eq!(reply_excerpt("short"), "short");
        let long = "x".repeat(150);
        let excerpt = reply_excerpt(&long);
        assert_eq!(excerpt.chars().count(), REPLY_EXCERPT_CHARS + 1);
        assert!(excerpt.ends_with('…'));
    }
}
