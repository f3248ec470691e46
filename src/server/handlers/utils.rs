use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::core::errors::ApiError;

/// Unwraps a JSON body, turning any rejection (bad syntax, missing or
/// mistyped field, wrong content type) into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            let message = rejection.body_text();
            tracing::debug!("Rejected request body: {}", message);
            Err(ApiError::BadRequest(message))
        }
    }
}

pub fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("'{}' must not be empty", field)));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert!(matches!(
            require_text("query", "   "),
            Err(ApiError::BadRequest(msg)) if msg.contains("query")
        ));
        assert_eq!(require_text("query", " hi ").ok(), Some("hi"));
    }
}
