//! Uniform status + JSON payload responses.
//!
//! Every error the gateway produces itself goes through [`error`], so
//! clients always see `{"error": "<message>"}` with the matching status.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Write `status` and, when present, `payload` as a JSON body.
///
/// Encoding failures are logged and the bare status is sent.
pub fn respond<T: Serialize + ?Sized>(status: StatusCode, payload: Option<&T>) -> Response {
    let Some(payload) = payload else {
        return status.into_response();
    };

    match serde_json::to_vec(payload) {
        Ok(body) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(status = %status, error = %e, "failed to encode response body");
            status.into_response()
        }
    }
}

pub fn error(status: StatusCode, message: impl Into<String>) -> Response {
    respond(
        status,
        Some(&ErrorBody {
            error: message.into(),
        }),
    )
}

/// Router fallback for unmatched paths and methods.
pub async fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "not found")
}
