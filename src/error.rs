//! Error types for Gator.

use thiserror::Error;

/// Common error type for Gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// Database error.
    ///
    /// Any persistence failure that is not a uniqueness violation.
    #[error("database error: {0}")]
    Database(String),

    /// Uniqueness violation (duplicate user name, feed URL, follow, post URL).
    #[error("{0} already exists")]
    Conflict(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// No usable current user.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Transport failure, non-2xx status or oversized body.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Malformed feed, publish date, duration or number.
    #[error("parse error: {0}")]
    Parse(String),

    /// Wrong number of command arguments. Holds the usage string.
    #[error("usage: {0}")]
    Usage(String),

    /// Command name is not registered.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Command name is empty.
    #[error("no command specified")]
    NoCommand,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Background task failed to complete.
    #[error("task error: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error with the operation it happened in.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GatorError>,
    },
}

impl GatorError {
    /// Innermost error, skipping any attached context.
    pub fn root(&self) -> &GatorError {
        match self {
            GatorError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for uniqueness violations.
    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), GatorError::Conflict(_))
    }

    /// True for missing resources.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), GatorError::NotFound(_))
    }

    /// True for errors the CLI reports with a usage line.
    pub fn is_usage(&self) -> bool {
        matches!(self.root(), GatorError::Usage(_) | GatorError::NoCommand)
    }

    /// Wrap this error with a description of the failed operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        GatorError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                GatorError::Conflict(db_err.message().to_string())
            }
            _ => GatorError::Database(e.to_string()),
        }
    }
}

/// Attach operation context to a failing result.
pub trait ResultExt<T> {
    /// Wrap the error, computing the context lazily.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<GatorError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

/// Result type alias for Gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_error_display() {
        let err = GatorError::Conflict("user alice".to_string());
        assert_eq!(err.to_string(), "user alice already exists");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = GatorError::NotFound("feed".to_string());
        assert_eq!(err.to_string(), "feed not found");
    }

    #[test]
    fn test_unknown_command_display() {
        let err = GatorError::UnknownCommand("bogus".to_string());
        assert_eq!(err.to_string(), "unknown command: bogus");
        assert_eq!(GatorError::NoCommand.to_string(), "no command specified");
    }

    #[test]
    fn test_context_display_and_kind() {
        let err = GatorError::Conflict("post".to_string()).context("feed http://x/feed.xml");
        assert_eq!(err.to_string(), "feed http://x/feed.xml: post already exists");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_nested_context_root() {
        let err = GatorError::NotFound("user bob".to_string())
            .context("resolve current user")
            .context("command follow");
        assert!(err.is_not_found());
        assert!(matches!(err.root(), GatorError::NotFound(_)));
    }

    #[test]
    fn test_is_usage() {
        assert!(GatorError::Usage("gator login <name>".to_string()).is_usage());
        assert!(GatorError::NoCommand.is_usage());
        assert!(!GatorError::UnknownCommand("x".to_string()).is_usage());
    }

    #[test]
    fn test_with_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.with_context(|| "read config").unwrap_err();
        assert!(err.to_string().starts_with("read config: I/O error"));
        assert!(matches!(err.root(), GatorError::Io(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GatorError = io_err.into();
        assert!(matches!(err, GatorError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
