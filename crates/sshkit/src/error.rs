//! Error types for remote operations.
//!
//! Two layers of failure exist. [`Error`] covers the cases where the local
//! side could not even start the exchange (missing `ssh` binary, an invalid
//! host alias). A remote command that ran and exited non-zero is not an
//! error at this layer: it comes back as a failed
//! [`CommandOutcome`](crate::CommandOutcome), which [`FailureCategory`]
//! can classify for user feedback.

use thiserror::Error;

/// Categories of remote failures, derived from exit status and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// ssh could not reach or resolve the host
    Connection,
    /// The host rejected our credentials
    Authentication,
    /// Remote permission problem
    Permission,
    /// The remote command itself failed
    Command,
}

impl FailureCategory {
    /// Classify a failed exchange.
    ///
    /// OpenSSH reserves exit status 255 for its own errors, so a 255 with a
    /// recognizable message is attributed to the transport rather than to
    /// the remote command.
    pub fn classify(exit_code: Option<i32>, stderr: &str) -> Self {
        let stderr_lower = stderr.to_lowercase();

        if stderr_lower.contains("permission denied (publickey")
            || stderr_lower.contains("host key verification failed")
            || stderr_lower.contains("too many authentication failures")
        {
            return Self::Authentication;
        }

        if exit_code == Some(255)
            || stderr_lower.contains("could not resolve hostname")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("connection timed out")
            || stderr_lower.contains("no route to host")
        {
            return Self::Connection;
        }

        if stderr_lower.contains("permission denied")
            || stderr_lower.contains("operation not permitted")
        {
            return Self::Permission;
        }

        Self::Command
    }

    /// Get actionable advice for this failure category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connection => "Check the host alias in ~/.ssh/config and that the host is up",
            Self::Authentication => "Make sure your SSH key is trusted by the host (ssh-copy-id)",
            Self::Permission => "Check ownership and permissions of the remote path",
            Self::Command => "See the captured stderr above",
        }
    }
}

/// Errors raised before a remote exchange completes.
#[derive(Debug, Error)]
pub enum Error {
    /// The local ssh/scp program could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Host identifier rejected before reaching ssh
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget {
        /// The rejected identifier
        target: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_connection() {
        let cat = FailureCategory::classify(
            Some(255),
            "ssh: Could not resolve hostname gpu-box: Name or service not known",
        );
        assert_eq!(cat, FailureCategory::Connection);
    }

    #[test]
    fn test_classify_authentication() {
        let cat = FailureCategory::classify(Some(255), "user@host: Permission denied (publickey).");
        assert_eq!(cat, FailureCategory::Authentication);
    }

    #[test]
    fn test_classify_remote_permission() {
        let cat = FailureCategory::classify(Some(1), "mkdir: cannot create directory: Permission denied");
        assert_eq!(cat, FailureCategory::Permission);
    }

    #[test]
    fn test_classify_plain_command_failure() {
        let cat = FailureCategory::classify(Some(1), "");
        assert_eq!(cat, FailureCategory::Command);
        assert_eq!(cat.advice(), "See the captured stderr above");
    }
}
