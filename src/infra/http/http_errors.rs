// Translates reqwest failures and non-2xx responses into RagError::RemoteService,
// deciding along the way whether a retry could help.

use crate::core::errors::RagError;
use reqwest::{Response, StatusCode};

/// Transport-level failure (DNS, connect, timeout, body decode).
pub fn request_error(service: &str, err: reqwest::Error) -> RagError {
    let transient = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    RagError::RemoteService {
        service: service.to_string(),
        message: err.to_string(),
        transient,
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Passes successful responses through; turns anything else into a RemoteService error
/// carrying the status and response body.
pub async fn ensure_success(service: &str, response: Response) -> Result<Response, RagError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());

    let message = format!("{} - {}", status, body);
    if is_retryable_status(status) {
        Err(RagError::transient(service, message))
    } else {
        Err(RagError::permanent(service, message))
    }
}
