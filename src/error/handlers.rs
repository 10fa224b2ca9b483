//! Standardized mapping of HTTP and transport failures onto [`PullerError`]

use crate::error::PullerError;
use reqwest::StatusCode;

/// Registry error bodies can be whole HTML pages; keep log lines readable
const MAX_ERROR_BODY_LEN: usize = 512;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> PullerError {
        let error_text = Self::truncate_body(error_text);
        let message = match status.as_u16() {
            401 => format!(
                "Unauthorized to perform {} operation: {}",
                operation, error_text
            ),
            403 => format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            ),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            408 => format!("Registry timed out during {}: {}", operation, error_text),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed: {}", operation, error_text),
        };

        PullerError::Registry {
            status: status.as_u16(),
            message,
        }
    }

    fn truncate_body(text: &str) -> &str {
        let text = text.trim();
        if text.len() <= MAX_ERROR_BODY_LEN {
            return text;
        }
        let mut end = MAX_ERROR_BODY_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> PullerError {
        if error.is_timeout() {
            PullerError::Timeout(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            PullerError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.is_body() || error.is_decode() {
            PullerError::Network(format!("Body transfer error during {}: {}", context, error))
        } else if error.is_builder() {
            PullerError::Validation(format!("Invalid request for {}: {}", context, error))
        } else {
            PullerError::Network(format!("{} network error: {}", context, error))
        }
    }
}
