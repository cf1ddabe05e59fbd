use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Uniform REST response envelope: `{success, status, message, data, error?}`.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn success(status: StatusCode, message: &str, data: T) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: true,
                status: status.as_u16(),
                message: message.to_string(),
                data: Some(data),
                error: None,
            }),
        )
    }

    pub fn failure(status: StatusCode, message: &str, code: &str) -> Self {
        Self {
            success: false,
            status: status.as_u16(),
            message: message.to_string(),
            data: None,
            error: Some(code.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error_field() {
        let (_, Json(envelope)) = ApiEnvelope::success(StatusCode::OK, "ok", 1);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], 200);
        assert_eq!(json["data"], 1);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_envelope_carries_code() {
        let envelope = ApiEnvelope::<()>::failure(StatusCode::FORBIDDEN, "nope", "FORBIDDEN");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "FORBIDDEN");
        assert!(json.get("data").is_none());
    }
}
