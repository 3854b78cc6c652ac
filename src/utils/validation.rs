use mongodb::bson::{oid::ObjectId, DateTime};
use validator::ValidationErrors;

use crate::services::ServiceError;

/// Flattens validator output into a single message, sorted by field so the
/// text is stable.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Rejects empty or whitespace-only text and text over `max` characters.
pub fn require_text(field: &str, text: &str, max: u64) -> Result<(), ServiceError> {
    if text.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} must not be empty", field)));
    }
    optional_text(field, Some(text), max)
}

pub fn optional_text(field: &str, text: Option<&str>, max: u64) -> Result<(), ServiceError> {
    match text {
        Some(text) if text.chars().count() as u64 > max => Err(ServiceError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

pub fn parse_object_id(value: &str, what: &str) -> Result<ObjectId, ServiceError> {
    ObjectId::parse_str(value).map_err(|_| ServiceError::Validation(format!("Invalid {} ID", what)))
}

pub fn parse_rfc3339(value: &str, field: &str) -> Result<DateTime, ServiceError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|parsed| DateTime::from_millis(parsed.timestamp_millis()))
        .map_err(|_| ServiceError::Validation(format!("{} must be an RFC 3339 timestamp", field)))
}

pub fn format_datetime(value: DateTime) -> String {
    value
        .try_to_rfc3339_string()
        .unwrap_or_else(|_| value.timestamp_millis().to_string())
}

pub fn later_of(a: DateTime, b: DateTime) -> DateTime {
    if b.timestamp_millis() > a.timestamp_millis() { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
        rating: i32,
    }

    #[test]
    fn validation_message_uses_custom_text() {
        let errors = Sample { rating: 9 }.validate().unwrap_err();
        assert_eq!(validation_message(&errors), "Rating must be between 1 and 5");
    }

    #[test]
    fn require_text_rejects_blank() {
        assert!(require_text("Response", "", 500).is_err());
        assert!(require_text("Response", "   ", 500).is_err());
        assert!(require_text("Response", "ok", 500).is_ok());
    }

    #[test]
    fn length_is_counted_in_characters() {
        let text = "é".repeat(500);
        assert!(require_text("Response", &text, 500).is_ok());
        let text = "é".repeat(501);
        assert!(matches!(
            require_text("Response", &text, 500),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn parses_timestamps_and_ids() {
        let at = parse_rfc3339("2026-01-02T03:04:05Z", "scheduled_at").unwrap();
        assert_eq!(at.timestamp_millis(), 1_767_323_045_000);
        assert!(parse_rfc3339("tomorrow", "scheduled_at").is_err());
        assert!(parse_object_id("not-an-id", "booking").is_err());
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "booking").unwrap(), id);
    }

    #[test]
    fn later_of_picks_max() {
        let a = DateTime::from_millis(10);
        let b = DateTime::from_millis(20);
        assert_eq!(later_of(a, b), b);
        assert_eq!(later_of(b, a), b);
    }
}
