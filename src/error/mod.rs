//! Error types and handlers for image pull operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PullerError>;

#[derive(Error, Debug)]
pub enum PullerError {
    /// The user-supplied image string could not be decomposed
    #[error("Invalid image reference '{reference}': {reason}")]
    Reference { reference: String, reason: String },

    /// Token exchange with the auth endpoint failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Manifest could not be fetched or understood
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The manifest index has no entry for the requested platform
    #[error("No matching platform in manifest index: {os}/{architecture}")]
    NoMatchingPlatform { os: String, architecture: String },

    /// The registry answered with a non-success status
    #[error("Registry error (HTTP {status}): {message}")]
    Registry { status: u16, message: String },

    /// Connection, DNS, TLS or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed gzip stream in a layer blob
    #[error("Decompression error: {0}")]
    Decompress(String),

    /// Output archive could not be written
    #[error("Archive error: {0}")]
    Archive(String),

    /// A spawned download or processing task did not complete
    #[error("Task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure of one image pull, tagged with the image name
    #[error("{image}: {source}")]
    Image {
        image: String,
        #[source]
        source: Box<PullerError>,
    },
}

impl PullerError {
    pub fn reference(reference: &str, reason: impl Into<String>) -> Self {
        PullerError::Reference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap this error with the name of the image whose pull it aborted
    pub fn for_image(self, image: &str) -> Self {
        match self {
            already @ PullerError::Image { .. } => already,
            other => PullerError::Image {
                image: image.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Whether the shared retry policy should try the request again
    pub fn is_retryable(&self) -> bool {
        match self {
            PullerError::Network(_) | PullerError::Timeout(_) => true,
            PullerError::Registry { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PullerError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "registry request")
    }
}

impl From<url::ParseError> for PullerError {
    fn from(err: url::ParseError) -> Self {
        PullerError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PullerError::Network("reset".into()).is_retryable());
        assert!(PullerError::Timeout("slow".into()).is_retryable());
        assert!(
            PullerError::Registry {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            PullerError::Registry {
                status: 429,
                message: "rate limited".into()
            }
            .is_retryable()
        );
        assert!(
            !PullerError::Registry {
                status: 404,
                message: "manifest unknown".into()
            }
            .is_retryable()
        );
        assert!(!PullerError::Decompress("bad gzip".into()).is_retryable());
        assert!(!PullerError::reference("", "empty").is_retryable());
    }

    #[test]
    fn test_for_image_wraps_once() {
        let err = PullerError::Auth("denied".into())
            .for_image("nginx")
            .for_image("other");
        match &err {
            PullerError::Image { image, source } => {
                assert_eq!(image, "nginx");
                assert!(matches!(**source, PullerError::Auth(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.to_string(), "nginx: Authentication error: denied");
    }
}
