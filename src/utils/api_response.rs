use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Uniform JSON envelope returned by every endpoint, for both success and
/// failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            errors: None,
        }
    }

    /// Create an error response
    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<serde_json::Value>,
    ) -> Self {
        ApiResponse {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: None,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_carries_data() {
        let resp = ApiResponse::success(StatusCode::OK, "ok", json!({"count": 3}));
        assert!(resp.success);
        assert_eq!(resp.status_code, 200);
        assert!(resp.errors.is_none());
        assert_eq!(resp.data.unwrap()["count"], 3);
    }

    #[test]
    fn error_envelope_omits_data() {
        let resp = ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Request not found",
            Some(json!({"id": "missing"})),
        );
        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["status_code"], 404);
        assert!(body.get("data").is_none());
        assert_eq!(body["errors"]["id"], "missing");
    }
}
