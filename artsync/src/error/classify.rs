//! Classification of publisher tool output and HTTP status codes.
//!
//! Batch publishers (the Maven deploy plugin, `npm publish`) report progress
//! as log lines rather than structured results. The classifiers here turn
//! those lines into events the result aggregation can act on, while a small
//! ring buffer keeps the surrounding lines as context for error detail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::ErrorKind;

/// Number of recent output lines kept as error context.
pub const LOG_CONTEXT_LINES: usize = 20;

/// Maps an HTTP status observed during an upload to a terminal kind.
///
/// Unhandled statuses fall through to [`ErrorKind::UnknownError`].
#[must_use]
pub fn classify_http_status(
    status: u16,
    reason: &str,
    deployed_url: &str,
    repository: &str,
    observed_at: DateTime<Utc>,
) -> ErrorKind {
    match status {
        400 => ErrorKind::CorruptedData {
            lines: reason.to_string(),
        },
        402 => ErrorKind::QuotaExceeded,
        // upload paths only resolve against content that already exists,
        // so a 404 points back at the proxy
        404 => ErrorKind::ProxyNotFound {
            uri: reason.to_string(),
        },
        409 => ErrorKind::Conflict {
            deployed_url: deployed_url.to_string(),
            repository: repository.to_string(),
            uploaded_at: observed_at,
        },
        429 => ErrorKind::RateLimitExceeded,
        500..=599 => ErrorKind::ServerError {
            lines: reason.to_string(),
        },
        _ => ErrorKind::UnknownError {
            lines: format!("status {status}: {reason}"),
        },
    }
}

/// Bounded ring of recent output lines; the oldest line is evicted on
/// overflow. Joined content becomes the `lines` detail of error kinds.
#[derive(Debug)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineBuffer {
    /// Creates a buffer holding at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a line, evicting the oldest one when full.
    pub fn push(&mut self, line: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    /// Joins the retained lines into one newline-separated block.
    #[must_use]
    pub fn joined(&self) -> String {
        if self.lines.is_empty() {
            return "EMPTY BUFFER".to_string();
        }
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(LOG_CONTEXT_LINES)
    }
}

/// Event extracted from one line of Maven deploy-plugin output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MavenLogEvent {
    /// A file finished uploading to the given destination URL.
    Uploaded {
        /// Destination URL of the uploaded file.
        deploy_url: String,
    },
    /// The deploy goal failed with an HTTP status.
    Failed {
        /// Status code text from the plugin output.
        status: String,
        /// Reason phrase from the plugin output.
        reason: String,
    },
}

/// Line classifier for Maven deploy-plugin output.
#[derive(Debug)]
pub struct MavenLogClassifier {
    upload: Regex,
    error: Regex,
}

impl MavenLogClassifier {
    /// Compiles the line patterns.
    #[must_use]
    #[allow(clippy::unwrap_used)] // patterns are constant
    pub fn new() -> Self {
        Self {
            upload: Regex::new(r"^\[INFO] Uploaded to .+: (?P<deploy_url>\S+) \(.+ at .+\)$")
                .unwrap(),
            error: Regex::new(
                r"^\[ERROR] Failed to execute goal org\.apache\.maven\.plugins:maven-deploy-plugin.+ status code: (?P<status>.+), reason phrase: (?P<reason>.+) -> .*$",
            )
            .unwrap(),
        }
    }

    /// Classifies one output line, if it matches a known pattern.
    #[must_use]
    pub fn classify_line(&self, line: &str) -> Option<MavenLogEvent> {
        if let Some(caps) = self.upload.captures(line) {
            return Some(MavenLogEvent::Uploaded {
                deploy_url: caps["deploy_url"].to_string(),
            });
        }
        if let Some(caps) = self.error.captures(line) {
            return Some(MavenLogEvent::Failed {
                status: caps["status"].to_string(),
                reason: caps["reason"].to_string(),
            });
        }
        None
    }
}

impl Default for MavenLogClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Event extracted from one line of `npm publish` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpmLogEvent {
    /// The package tarball was accepted.
    Published {
        /// `name@version` as printed by npm.
        package: String,
    },
    /// npm reported an error code.
    Failed {
        /// The `EXXX` code.
        code: String,
    },
    /// The tarball to publish was missing on the proxy side.
    NotFound {
        /// URL npm failed to fetch.
        url: String,
    },
}

/// Line classifier for `npm publish` output.
#[derive(Debug)]
pub struct NpmLogClassifier {
    publish: Regex,
    error: Regex,
    not_found: Regex,
}

impl NpmLogClassifier {
    /// Compiles the line patterns.
    #[must_use]
    #[allow(clippy::unwrap_used)] // patterns are constant
    pub fn new() -> Self {
        Self {
            publish: Regex::new(r"^\+ (?P<package>.+)$").unwrap(),
            error: Regex::new(r"^npm ERR! code (?P<code>.+)$").unwrap(),
            not_found: Regex::new(r"^npm ERR! 404 Not Found - GET (?P<url>.+)$").unwrap(),
        }
    }

    /// Classifies one output line, if it matches a known pattern.
    ///
    /// The 404 pattern is checked before the generic code pattern so the
    /// missing-tarball case keeps its URL detail.
    #[must_use]
    pub fn classify_line(&self, line: &str) -> Option<NpmLogEvent> {
        if let Some(caps) = self.not_found.captures(line) {
            return Some(NpmLogEvent::NotFound {
                url: caps["url"].to_string(),
            });
        }
        if let Some(caps) = self.error.captures(line) {
            let code = caps["code"].to_string();
            // E404 carries its own pattern with the URL
            if code == "E404" {
                return None;
            }
            return Some(NpmLogEvent::Failed { code });
        }
        if let Some(caps) = self.publish.captures(line) {
            return Some(NpmLogEvent::Published {
                package: caps["package"].to_string(),
            });
        }
        None
    }

    /// Maps an npm error code to a terminal kind.
    #[must_use]
    pub fn classify_code(
        &self,
        code: &str,
        context: &LineBuffer,
        repo_url: &str,
        repository: &str,
        observed_at: DateTime<Utc>,
    ) -> ErrorKind {
        match code {
            "E400" => ErrorKind::CorruptedData {
                lines: context.joined(),
            },
            "E402" => ErrorKind::QuotaExceeded,
            "ENEEDAUTH" => ErrorKind::InvalidToken,
            "E409" => ErrorKind::Conflict {
                deployed_url: repo_url.to_string(),
                repository: repository.to_string(),
                uploaded_at: observed_at,
            },
            "E429" => ErrorKind::RateLimitExceeded,
            "E500" => ErrorKind::ServerError {
                lines: context.joined(),
            },
            _ => ErrorKind::UnknownError {
                lines: context.joined(),
            },
        }
    }
}

impl Default for NpmLogClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Category;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_buffer_evicts_oldest() {
        let mut buffer = LineBuffer::new(2);
        buffer.push("one");
        buffer.push("two");
        buffer.push("three");
        assert_eq!(buffer.joined(), "two\nthree");
    }

    #[test]
    fn test_line_buffer_empty_marker() {
        let buffer = LineBuffer::new(3);
        assert_eq!(buffer.joined(), "EMPTY BUFFER");
    }

    #[test]
    fn test_http_status_table() {
        let now = Utc::now();
        assert!(matches!(
            classify_http_status(409, "Conflict", "u", "r", now),
            ErrorKind::Conflict { .. }
        ));
        assert_eq!(
            classify_http_status(429, "Too Many Requests", "u", "r", now),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            classify_http_status(402, "Payment Required", "u", "r", now),
            ErrorKind::QuotaExceeded
        );
        assert!(matches!(
            classify_http_status(500, "boom", "u", "r", now),
            ErrorKind::ServerError { .. }
        ));
        // anything unexpected stays classified, never dropped
        assert_eq!(
            classify_http_status(418, "teapot", "u", "r", now).category(),
            Category::ManualIntervention
        );
    }

    #[test]
    fn test_maven_upload_line() {
        let classifier = MavenLogClassifier::new();
        let line = "[INFO] Uploaded to released: https://registry.example.com/maven/released/org/acme/app/1.0/app-1.0.jar (12 kB at 34 kB/s)";
        assert_eq!(
            classifier.classify_line(line),
            Some(MavenLogEvent::Uploaded {
                deploy_url:
                    "https://registry.example.com/maven/released/org/acme/app/1.0/app-1.0.jar"
                        .to_string()
            })
        );
    }

    #[test]
    fn test_maven_error_line() {
        let classifier = MavenLogClassifier::new();
        let line = "[ERROR] Failed to execute goal org.apache.maven.plugins:maven-deploy-plugin:3.1.1:deploy-file (default-cli) status code: 409, reason phrase: Conflict -> [Help 1]";
        assert_eq!(
            classifier.classify_line(line),
            Some(MavenLogEvent::Failed {
                status: "409".to_string(),
                reason: "Conflict".to_string()
            })
        );
    }

    #[test]
    fn test_maven_unrelated_line() {
        let classifier = MavenLogClassifier::new();
        assert_eq!(classifier.classify_line("[INFO] BUILD SUCCESS"), None);
    }

    #[test]
    fn test_npm_lines() {
        let classifier = NpmLogClassifier::new();
        assert_eq!(
            classifier.classify_line("+ @acme/app@1.2.3"),
            Some(NpmLogEvent::Published {
                package: "@acme/app@1.2.3".to_string()
            })
        );
        assert_eq!(
            classifier.classify_line("npm ERR! code E429"),
            Some(NpmLogEvent::Failed {
                code: "E429".to_string()
            })
        );
        assert_eq!(
            classifier.classify_line("npm ERR! 404 Not Found - GET https://proxy/app-1.2.3.tgz"),
            Some(NpmLogEvent::NotFound {
                url: "https://proxy/app-1.2.3.tgz".to_string()
            })
        );
        // E404 defers to the dedicated not-found pattern
        assert_eq!(classifier.classify_line("npm ERR! code E404"), None);
    }

    #[test]
    fn test_npm_code_mapping() {
        let classifier = NpmLogClassifier::new();
        let context = LineBuffer::default();
        let now = Utc::now();
        assert_eq!(
            classifier.classify_code("ENEEDAUTH", &context, "u", "r", now),
            ErrorKind::InvalidToken
        );
        assert_eq!(
            classifier.classify_code("E429", &context, "u", "r", now),
            ErrorKind::RateLimitExceeded
        );
        assert!(matches!(
            classifier.classify_code("EWEIRD", &context, "u", "r", now),
            ErrorKind::UnknownError { .. }
        ));
    }
}
