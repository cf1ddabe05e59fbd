use crate::error::AppError;
use crate::routes::envelope::ApiEnvelope;
use axum::{http::StatusCode, response::IntoResponse, Json};

/// Map a domain error to the REST response envelope. The underlying detail
/// for 5xx failures is logged in `public_message`, never returned.
pub fn map_error(err: &AppError) -> (StatusCode, ApiEnvelope<()>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = err.public_message();
    let envelope = ApiEnvelope::failure(status, &message, err.code());
    (status, envelope)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, envelope) = map_error(&err);
    (status, Json(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400_envelope() {
        let (status, envelope) = map_error(&AppError::Validation("content required".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!envelope.success);
        assert_eq!(envelope.status, 400);
        assert_eq!(envelope.error.as_deref(), Some("VALIDATION_ERROR"));
    }

    #[test]
    fn internal_error_hides_detail() {
        let (status, envelope) = map_error(&AppError::Database(sqlx::Error::RowNotFound));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message, "internal server error");
    }
}
