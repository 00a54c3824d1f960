//! The closed set of terminal error kinds and their recovery categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recovery classification of a terminal error.
///
/// The category decides what happens next: retry automatically, drop the
/// error as harmless, escalate to a human, or give up for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Transient; safe to retry automatically.
    Recover,
    /// The destination already holds the correct content; not a real failure.
    Ignore,
    /// Requires a human decision; never retried automatically.
    ManualIntervention,
    /// Will never succeed; stop trying.
    Unrecoverable,
}

/// Terminal error kind attached to a single artifact outcome.
///
/// The set is closed: new kinds are added deliberately together with their
/// category mapping, and classification always resolves to one of these
/// variants (unrecognized input becomes [`ErrorKind::UnknownError`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Destination registry rejected the authentication token.
    InvalidToken,
    /// The same content is already published at the destination.
    Conflict {
        /// URL the artifact resolved to at the destination.
        deployed_url: String,
        /// Destination repository id.
        repository: String,
        /// When the conflicting upload was observed.
        uploaded_at: DateTime<Utc>,
    },
    /// Destination registry throttled the request.
    RateLimitExceeded,
    /// Destination registry storage quota is exhausted.
    QuotaExceeded,
    /// Destination registry answered with a server-side failure.
    ServerError {
        /// Captured output lines around the failure.
        lines: String,
    },
    /// Connection to the destination registry broke down.
    ConnectionError {
        /// Underlying transport message.
        message: String,
    },

    /// The source proxy has no file at the requested path.
    ProxyNotFound {
        /// The missing URI.
        uri: String,
    },
    /// TLS failure while talking to the source proxy.
    ProxySslError {
        /// Underlying TLS message.
        message: String,
    },
    /// The source proxy answered with a server-side failure.
    ProxyServerError {
        /// Captured detail of the failure.
        lines: String,
    },

    /// A remote call did not finish within its execution timeout.
    Timeout,
    /// A rate-limit permit was not granted within the acquisition timeout.
    RateLimitTimeout,
    /// No destination repository is configured for the source repository.
    MissingRepositoryMapping {
        /// Name of the unmapped source repository.
        repository: String,
    },
    /// Downloaded or uploaded content failed validation.
    CorruptedData {
        /// Captured output lines around the failure.
        lines: String,
    },
    /// A failure that matched no known pattern.
    UnknownError {
        /// Captured output lines around the failure.
        lines: String,
    },
    /// A defect escaped the processing of a single unit.
    UncaughtException {
        /// Rendered failure message.
        message: String,
    },
    /// The publisher finished without reporting an outcome for the artifact
    /// and the destination listing does not contain it either.
    MissingUpload {
        /// Captured output lines around the failure.
        lines: String,
    },
    /// Not attempted because an earlier version of the same package failed.
    Skipped,
    /// A prior success retracted because its version unit failed as a whole.
    Invalidated {
        /// URL the artifact had been deployed to, when known.
        deployed_url: Option<String>,
        /// Destination repository id, when known.
        repository: Option<String>,
        /// Original upload time, when known.
        uploaded_at: Option<DateTime<Utc>>,
    },
}

impl ErrorKind {
    /// Recovery category of this kind.
    ///
    /// The table is exhaustive on purpose; adding a variant without
    /// extending it is a compile error.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Conflict { .. } => Category::Ignore,

            Self::InvalidToken
            | Self::RateLimitExceeded
            | Self::ConnectionError { .. }
            | Self::ServerError { .. }
            | Self::Timeout
            | Self::RateLimitTimeout => Category::Recover,

            Self::QuotaExceeded
            | Self::ProxySslError { .. }
            | Self::ProxyServerError { .. }
            | Self::MissingRepositoryMapping { .. }
            | Self::UnknownError { .. }
            | Self::UncaughtException { .. }
            | Self::MissingUpload { .. }
            | Self::Skipped
            | Self::Invalidated { .. } => Category::ManualIntervention,

            Self::ProxyNotFound { .. } | Self::CorruptedData { .. } => Category::Unrecoverable,
        }
    }

    /// Short stable name, used in logs and persisted outcome records.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidToken => "InvalidToken",
            Self::Conflict { .. } => "Conflict",
            Self::RateLimitExceeded => "RateLimitExceeded",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::ServerError { .. } => "ServerError",
            Self::ConnectionError { .. } => "ConnectionError",
            Self::ProxyNotFound { .. } => "ProxyNotFound",
            Self::ProxySslError { .. } => "ProxySslError",
            Self::ProxyServerError { .. } => "ProxyServerError",
            Self::Timeout => "Timeout",
            Self::RateLimitTimeout => "RateLimitTimeout",
            Self::MissingRepositoryMapping { .. } => "MissingRepositoryMapping",
            Self::CorruptedData { .. } => "CorruptedData",
            Self::UnknownError { .. } => "UnknownError",
            Self::UncaughtException { .. } => "UncaughtException",
            Self::MissingUpload { .. } => "MissingUpload",
            Self::Skipped => "Skipped",
            Self::Invalidated { .. } => "Invalidated",
        }
    }

    /// True when retrying the surrounding remote call may clear the error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category() == Category::Recover
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_ignored() {
        let kind = ErrorKind::Conflict {
            deployed_url: "https://registry/repo/a.jar".to_string(),
            repository: "released".to_string(),
            uploaded_at: Utc::now(),
        };
        assert_eq!(kind.category(), Category::Ignore);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn test_transient_kinds_recover() {
        for kind in [
            ErrorKind::InvalidToken,
            ErrorKind::RateLimitExceeded,
            ErrorKind::Timeout,
            ErrorKind::RateLimitTimeout,
            ErrorKind::ConnectionError {
                message: "reset by peer".to_string(),
            },
            ErrorKind::ServerError {
                lines: "503".to_string(),
            },
        ] {
            assert_eq!(kind.category(), Category::Recover, "{}", kind.name());
            assert!(kind.is_retryable());
        }
    }

    #[test]
    fn test_terminal_kinds_are_unrecoverable() {
        assert_eq!(
            ErrorKind::ProxyNotFound {
                uri: "https://proxy/a.jar".to_string()
            }
            .category(),
            Category::Unrecoverable
        );
        assert_eq!(
            ErrorKind::CorruptedData {
                lines: "bad checksum".to_string()
            }
            .category(),
            Category::Unrecoverable
        );
    }

    #[test]
    fn test_escalating_kinds_need_a_human() {
        for kind in [
            ErrorKind::QuotaExceeded,
            ErrorKind::Skipped,
            ErrorKind::MissingUpload {
                lines: String::new(),
            },
            ErrorKind::UnknownError {
                lines: String::new(),
            },
            ErrorKind::MissingRepositoryMapping {
                repository: "builds-untested".to_string(),
            },
            ErrorKind::UncaughtException {
                message: "boom".to_string(),
            },
            ErrorKind::Invalidated {
                deployed_url: None,
                repository: None,
                uploaded_at: None,
            },
        ] {
            assert_eq!(
                kind.category(),
                Category::ManualIntervention,
                "{}",
                kind.name()
            );
        }
    }
}
