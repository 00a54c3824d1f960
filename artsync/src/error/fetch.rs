//! Transport-level failures of the upstream build service and artifact proxy.

use thiserror::Error;

use super::ErrorKind;

/// Failure of a remote call against the build-record service or the
/// artifact proxy, before any artifact-level classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The remote endpoint could not be reached at all.
    #[error("server unreachable")]
    ServerUnreachable,

    /// The call did not complete within the client timeout.
    #[error("client timed out")]
    ClientTimeout,

    /// The remote endpoint rejected our credentials.
    #[error("authorization failed")]
    AuthorizationError,

    /// The requested path does not exist on the remote side.
    #[error("not found: {uri}")]
    NotFound {
        /// URI that produced the 404.
        uri: String,
    },

    /// TLS handshake or certificate validation failed.
    #[error("ssl failure: {message}")]
    SslError {
        /// Underlying TLS message.
        message: String,
    },

    /// The remote side reported an internal failure.
    #[error("system error: {description}")]
    SystemError {
        /// Remote failure description.
        description: String,
    },

    /// The remote side answered with a status the client does not handle.
    #[error("unexpected response: status {status}")]
    UnknownResponse {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// A downloaded file did not match its expected checksum.
    #[error("downloaded content corrupted: {path}")]
    ContentCorrupted {
        /// Local path of the corrupted download.
        path: String,
    },

    /// Anything that escaped the failure handling of the client itself.
    #[error("uncaught failure: {message}")]
    Uncaught {
        /// Rendered failure message.
        message: String,
    },
}

impl FetchError {
    /// Classifies this transport failure into a terminal [`ErrorKind`].
    ///
    /// Total: every variant resolves to exactly one kind.
    #[must_use]
    pub fn classify(&self) -> ErrorKind {
        match self {
            Self::Uncaught { message } => ErrorKind::UncaughtException {
                message: message.clone(),
            },
            Self::ClientTimeout => ErrorKind::Timeout,
            Self::SslError { message } => ErrorKind::ProxySslError {
                message: message.clone(),
            },
            Self::UnknownResponse { status, body } => ErrorKind::UnknownError {
                lines: format!("response status {status}; body {body}"),
            },
            Self::NotFound { uri } => ErrorKind::ProxyNotFound { uri: uri.clone() },
            Self::SystemError { description } => ErrorKind::ProxyServerError {
                lines: description.clone(),
            },
            Self::AuthorizationError => ErrorKind::ProxyServerError {
                lines: "authorization error".to_string(),
            },
            Self::ServerUnreachable => ErrorKind::ProxyServerError {
                lines: "proxy unreachable".to_string(),
            },
            Self::ContentCorrupted { path } => ErrorKind::CorruptedData {
                lines: format!("download {path} corrupted, check the download URL"),
            },
        }
    }
}

/// Failure of the durable result store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    /// The store rejected the write.
    #[error("result store rejected the write: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Category;

    #[test]
    fn test_every_fetch_error_classifies() {
        let cases = [
            FetchError::ServerUnreachable,
            FetchError::ClientTimeout,
            FetchError::AuthorizationError,
            FetchError::NotFound {
                uri: "https://proxy/a".to_string(),
            },
            FetchError::SslError {
                message: "handshake".to_string(),
            },
            FetchError::SystemError {
                description: "oom".to_string(),
            },
            FetchError::UnknownResponse {
                status: 418,
                body: "teapot".to_string(),
            },
            FetchError::ContentCorrupted {
                path: "/tmp/a.jar".to_string(),
            },
            FetchError::Uncaught {
                message: "panic".to_string(),
            },
        ];
        for err in cases {
            // classification must be total and must never yield Ignore
            assert_ne!(err.classify().category(), Category::Ignore, "{err}");
        }
    }

    #[test]
    fn test_timeout_maps_to_retryable_kind() {
        assert_eq!(FetchError::ClientTimeout.classify(), ErrorKind::Timeout);
        assert!(FetchError::ClientTimeout.classify().is_retryable());
    }

    #[test]
    fn test_not_found_is_unrecoverable() {
        let kind = FetchError::NotFound {
            uri: "https://proxy/gone".to_string(),
        }
        .classify();
        assert_eq!(kind.category(), Category::Unrecoverable);
    }
}
