//! Generic error handling utilities
//!
//! Every error enum in the crate implements [`ContextualError`] so the app
//! boundary can decide between showing a specific message and a generic
//! context line with debug detail.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the user can act on
    /// (bad configuration value, unreadable config file, ...)
    fn is_user_actionable(&self) -> bool;

    /// The specific user message for user-actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors show their own message; system errors (transport
/// failures, closed channels) show the operation context and keep the detail
/// at debug level.
///
/// # Examples
/// ```rust,no_run
/// # use livequeue::core::error_handling::log_error_with_context;
/// # use livequeue::app::cli::config::ConfigError;
/// let err = ConfigError::Invalid("rate_limit_ms must be finite".to_string());
/// log_error_with_context(&err, "Loading configuration");
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Log a recoverable failure that was absorbed at a component boundary
pub fn log_absorbed<E: ContextualError + std::fmt::Display>(error: &E, operation_context: &str) {
    if error.is_user_actionable() {
        log::warn!("{}: {}", operation_context, error);
    } else {
        log::debug!("{}: {}", operation_context, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct TestUserError {
        message: String,
    }

    impl fmt::Display for TestUserError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl std::error::Error for TestUserError {}

    impl ContextualError for TestUserError {
        fn is_user_actionable(&self) -> bool {
            true
        }

        fn user_message(&self) -> Option<&str> {
            Some(&self.message)
        }
    }

    #[derive(Debug)]
    struct TestSystemError;

    impl fmt::Display for TestSystemError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "socket closed")
        }
    }

    impl std::error::Error for TestSystemError {}

    impl ContextualError for TestSystemError {
        fn is_user_actionable(&self) -> bool {
            false
        }

        fn user_message(&self) -> Option<&str> {
            None
        }
    }

    #[test]
    fn test_user_actionable_error_exposes_message() {
        let error = TestUserError {
            message: "max_size must be positive".to_string(),
        };

        assert!(error.is_user_actionable());
        assert_eq!(error.user_message(), Some("max_size must be positive"));
        log_error_with_context(&error, "Loading configuration");
    }

    #[test]
    fn test_system_error_has_no_user_message() {
        let error = TestSystemError;

        assert!(!error.is_user_actionable());
        assert_eq!(error.user_message(), None);
        log_absorbed(&error, "Sending frame");
    }
}
