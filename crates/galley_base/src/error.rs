use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

/// Error variants that can occur in galley operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// File system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input data could not be parsed or had the wrong shape
    DataError { message: String },

    /// Stylesheet could not be parsed
    StyleError {
        line: u32,
        column: u32,
        message: String,
    },

    /// Template could not be parsed or rendered
    TemplateError { message: String },

    /// A message could not be delivered to a connected viewer
    DeliveryError {
        connection: String,
        message: String,
    },

    /// Catch-all for other errors with a message
    Message { message: String },
}

/// Comprehensive error type wrapping ErrorKind with optional context.
/// GalleyError implements the standard Error trait and supports context attachment.
#[derive(Debug)]
pub struct GalleyError {
    kind: ErrorKind,
    context: Vec<String>,
}

impl GalleyError {
    /// Creates a new error from an ErrorKind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
        }
    }

    /// Creates a new catch-all error from a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Attaches context to an error.
    /// Context is displayed before the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    /// Useful to avoid expensive string construction for successful paths.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    /// Allows pattern matching on specific error variants.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the innermost error in the chain.
    /// Traverses the error source chain to find the root cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

impl From<ErrorKind> for GalleyError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for GalleyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for GalleyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display context first if present
        for (i, ctx) in self.context.iter().enumerate() {
            if i == 0 {
                write!(f, "{}", ctx)?;
            } else {
                write!(f, ": {}", ctx)?;
            }
        }

        // Add a separator if we have context
        if !self.context.is_empty() {
            write!(f, ": ")?;
        }

        // Display the underlying error kind
        match &self.kind {
            ErrorKind::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            ErrorKind::DataError { message } => {
                write!(f, "Data error: {}", message)
            }
            ErrorKind::StyleError {
                line,
                column,
                message,
            } => {
                write!(f, "Style error at line {}, column {}: {}", line, column, message)
            }
            ErrorKind::TemplateError { message } => {
                write!(f, "Template error: {}", message)
            }
            ErrorKind::DeliveryError {
                connection,
                message,
            } => {
                write!(f, "Delivery error for connection {}: {}", connection, message)
            }
            ErrorKind::Message { message } => {
                write!(f, "{}", message)
            }
        }
    }
}

/// Standard result type for galley operations.
pub type GalleyResult<T> = std::result::Result<T, Box<GalleyError>>;

/// Creates a boxed [`GalleyError`] from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::error::GalleyError::message(format!($($arg)*)))
    };
}

/// Extension trait for attaching context to Results.
/// Provides ergonomic error context attachment during error propagation.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    /// Eager evaluation: context is evaluated immediately.
    fn context(self, context: impl Into<String>) -> GalleyResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    /// Prefer this to avoid expensive string formatting in the success path.
    fn with_context<F>(self, f: F) -> GalleyResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for GalleyResult<T> {
    fn context(self, context: impl Into<String>) -> GalleyResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> GalleyResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use std::io;

    #[test]
    fn test_error_from_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let path = PathBuf::from("data.yml");
        let kind = ErrorKind::FileError {
            path: path.clone(),
            source: io_err,
        };
        let error = GalleyError::new(kind);

        match error.kind() {
            ErrorKind::FileError { path: p, .. } => {
                assert_eq!(p, &path);
            }
            _ => panic!("Expected FileError variant"),
        }
    }

    #[test]
    fn test_error_from_message() {
        let error = GalleyError::message("something went wrong");

        match error.kind() {
            ErrorKind::Message { message } => {
                assert_eq!(message, "something went wrong");
            }
            _ => panic!("Expected Message variant"),
        }
    }

    #[test]
    fn test_error_context_attachment() {
        let error = GalleyError::message("original error")
            .context("first context")
            .context("second context");

        assert_eq!(error.context.len(), 2);
        assert_eq!(error.context[0], "first context");
        assert_eq!(error.context[1], "second context");
    }

    #[test]
    fn test_error_with_context_lazy_evaluation() {
        let mut called = false;
        let error = GalleyError::message("error").with_context(|| {
            called = true;
            "lazy context".to_string()
        });

        assert!(called);
        assert_eq!(error.context[0], "lazy context");
    }

    #[test]
    fn test_error_display_message_only() {
        let error = GalleyError::message("test message");
        assert_eq!(error.to_string(), "test message");
    }

    #[test]
    fn test_error_display_with_context() {
        let error = GalleyError::message("test message").context("operation failed");
        assert_eq!(error.to_string(), "operation failed: test message");
    }

    #[test]
    fn test_error_display_with_multiple_contexts() {
        let error = GalleyError::message("root error")
            .context("first")
            .context("second")
            .context("third");
        assert_eq!(error.to_string(), "first: second: third: root error");
    }

    #[test]
    fn test_error_display_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let kind = ErrorKind::FileError {
            path: PathBuf::from("/tmp/data.yml"),
            source: io_err,
        };
        let error = GalleyError::new(kind);
        let display = error.to_string();
        assert!(display.contains("/tmp/data.yml"));
        assert!(display.contains("not found"));
    }

    #[test]
    fn test_error_display_data_error() {
        let kind = ErrorKind::DataError {
            message: "top level is not a mapping".to_string(),
        };
        let error = GalleyError::new(kind);
        assert_eq!(
            error.to_string(),
            "Data error: top level is not a mapping"
        );
    }

    #[test]
    fn test_error_display_style_error() {
        let kind = ErrorKind::StyleError {
            line: 3,
            column: 7,
            message: "unexpected token".to_string(),
        };
        let error = GalleyError::new(kind);
        assert_eq!(
            error.to_string(),
            "Style error at line 3, column 7: unexpected token"
        );
    }

    #[test]
    fn test_error_display_template_error() {
        let kind = ErrorKind::TemplateError {
            message: "unclosed tag".to_string(),
        };
        let error = GalleyError::new(kind);
        assert_eq!(error.to_string(), "Template error: unclosed tag");
    }

    #[test]
    fn test_error_display_delivery_error() {
        let kind = ErrorKind::DeliveryError {
            connection: "b1f3".to_string(),
            message: "connection reset".to_string(),
        };
        let error = GalleyError::new(kind);
        assert_eq!(
            error.to_string(),
            "Delivery error for connection b1f3: connection reset"
        );
    }

    #[test]
    fn test_error_from_impl() {
        let kind = ErrorKind::Message {
            message: "test".to_string(),
        };
        let error: GalleyError = kind.into();
        match error.kind() {
            ErrorKind::Message { message } => {
                assert_eq!(message, "test");
            }
            _ => panic!("Expected Message variant"),
        }
    }

    #[test]
    fn test_error_source_file_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let kind = ErrorKind::FileError {
            path: PathBuf::from("data.yml"),
            source: io_err,
        };
        let error = GalleyError::new(kind);
        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_source_message() {
        let error = GalleyError::message("test");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_error_root_cause_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let kind = ErrorKind::FileError {
            path: PathBuf::from("data.yml"),
            source: io_err,
        };
        let error = GalleyError::new(kind);
        let root = error.root_cause();
        // The root cause is the io::Error itself
        assert_eq!(root.to_string(), "not found");
    }

    #[test]
    fn test_error_root_cause_message() {
        let error = GalleyError::message("test");
        let root = error.root_cause();
        // For Message variant with no source, the root cause is the error itself
        assert_eq!(root.to_string(), "test");
    }

    #[test]
    fn test_result_ext_context_success() {
        let result: GalleyResult<i32> = Ok(42);
        let final_result = result.context("operation failed");
        assert_eq!(final_result.unwrap(), 42);
    }

    #[test]
    fn test_result_ext_context_error() {
        let result: GalleyResult<i32> = Err(Box::new(GalleyError::message("original")));
        let final_result = result.context("operation failed");
        assert!(final_result.is_err());
        let err = final_result.unwrap_err();
        assert_eq!(err.to_string(), "operation failed: original");
    }

    #[test]
    fn test_result_ext_with_context_success() {
        let result: GalleyResult<i32> = Ok(42);
        let final_result = result.with_context(|| "operation failed".to_string());
        assert_eq!(final_result.unwrap(), 42);
    }

    #[test]
    fn test_result_ext_with_context_error() {
        let result: GalleyResult<i32> = Err(Box::new(GalleyError::message("original")));
        let final_result = result.with_context(|| "lazy context".to_string());
        assert!(final_result.is_err());
        let err = final_result.unwrap_err();
        assert_eq!(err.to_string(), "lazy context: original");
    }

    #[test]
    fn test_result_ext_chaining() {
        let result: GalleyResult<i32> = Err(Box::new(GalleyError::message("root")));
        let final_result = result
            .context("step 1")
            .context("step 2")
            .with_context(|| "step 3".to_string());
        assert!(final_result.is_err());
        let err = final_result.unwrap_err();
        assert_eq!(err.to_string(), "step 1: step 2: step 3: root");
    }

    #[test]
    fn test_err_macro() {
        let error = *err!("watch failed for {}", "style.css");
        assert_eq!(error.to_string(), "watch failed for style.css");
    }

    #[test]
    fn test_debug_format() {
        let error = GalleyError::message("render failed").context("while processing data.yml");
        expect![[r#"
            GalleyError {
                kind: Message {
                    message: "render failed",
                },
                context: [
                    "while processing data.yml",
                ],
            }
        "#]]
        .assert_debug_eq(&error);
    }
}
