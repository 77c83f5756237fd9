//! Error handling for strata
//!
//! Every failure the compile-and-cache pipeline or the scope resolver can
//! produce is a variant of [`StrataError`]. Nothing is retried: each error is
//! terminal for the current render and is surfaced to the caller.
//!
//! # Error Categories
//!
//! - **Template sources**: [`StrataError::SourceUnavailable`], [`StrataError::TemplateNotFound`]
//! - **Compilation**: [`StrataError::CompileError`]
//! - **Execution**: [`StrataError::RenderError`], [`StrataError::InvalidPropertySource`],
//!   [`StrataError::NoParentScope`]
//! - **Cache storage**: [`StrataError::CacheWriteError`]
//! - **Operations**: [`StrataError::PermissionDenied`], [`StrataError::ConfigError`]
//!
//! The CLI turns any error into an [`ErrorContext`] through
//! [`user_friendly_error`], which adds a colored headline and a suggestion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use strata::core::{StrataError, user_friendly_error};
//!
//! let error = StrataError::NoParentScope;
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used by the library APIs.
pub type Result<T, E = StrataError> = std::result::Result<T, E>;

/// The main error type for strata operations.
#[derive(Error, Debug, Clone)]
pub enum StrataError {
    /// The template source file is missing or could not be read.
    #[error("Template source unavailable: {}", path.display())]
    SourceUnavailable {
        /// Path of the template source
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// The compiler rejected the template source.
    ///
    /// Propagated verbatim from the [`TemplateCompiler`](crate::templating::TemplateCompiler).
    #[error("Failed to compile template '{template}': {reason}")]
    CompileError {
        /// Name of the template being compiled
        template: String,
        /// Reason reported by the compiler
        reason: String,
    },

    /// Executing a compiled artifact failed.
    #[error("Failed to render template '{template}': {reason}")]
    RenderError {
        /// Name of the template being executed
        template: String,
        /// Reason for the failure
        reason: String,
    },

    /// An overlay, underlay or registry entry has neither a usable literal nor a callable.
    #[error("Injected property '{property}' has no value or callable source")]
    InvalidPropertySource {
        /// The property being resolved
        property: String,
    },

    /// `Up` was requested while already at the outermost scope.
    #[error("Up called when already at the top of the scope")]
    NoParentScope,

    /// The compiled artifact could not be written to the template cache.
    #[error("Failed to write template cache entry: {}", path.display())]
    CacheWriteError {
        /// Cache location that failed
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// An included template could not be located in any template directory.
    #[error("Template '{name}' not found")]
    TemplateNotFound {
        /// Name of the template that was requested
        name: String,
    },

    /// The operation is not permitted by the current configuration.
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// The operation that was refused
        operation: String,
    },

    /// Configuration or registry setup is invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },
}

impl StrataError {
    /// Wrap an execution failure with the template it happened in.
    pub fn render(template: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::RenderError {
            template: template.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn cache_write(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Self::CacheWriteError {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: StrataError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: StrataError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for CLI display.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let wrapped = error.chain().count() > 1;

    if !wrapped && let Some(strata_error) = error.downcast_ref::<StrataError>() {
        return create_error_context(strata_error.clone());
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    // Errors wrapped in anyhow context keep their specific suggestion
    if let Some(inner) = error.chain().find_map(|e| e.downcast_ref::<StrataError>()) {
        return create_error_context(inner.clone()).with_details(message);
    }

    if let Some(toml_error) = error.chain().find_map(|e| e.downcast_ref::<toml::de::Error>()) {
        let context = ErrorContext::new(StrataError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your strata.toml file");
        return if wrapped { context.with_details(message) } else { context };
    }

    ErrorContext::new(StrataError::RenderError {
        template: "unknown".to_string(),
        reason: message,
    })
}

fn create_error_context(error: StrataError) -> ErrorContext {
    match &error {
        StrataError::SourceUnavailable {
            reason,
            ..
        } => ErrorContext::new(error.clone())
            .with_details(reason.clone())
            .with_suggestion("Check that the template path exists and is readable"),
        StrataError::CompileError {
            ..
        } => ErrorContext::new(error.clone()).with_suggestion(
            "Check template syntax for unclosed <% %> blocks or misspelled tags",
        ),
        StrataError::InvalidPropertySource {
            property,
        } => {
            let suggestion = format!(
                "Give '{property}' a non-null literal or a callable when injecting it"
            );
            ErrorContext::new(error.clone()).with_suggestion(suggestion)
        }
        StrataError::NoParentScope => ErrorContext::new(error.clone())
            .with_suggestion("Only use $Up inside a loop, with block or include"),
        StrataError::CacheWriteError {
            reason,
            ..
        } => ErrorContext::new(error.clone())
            .with_details(reason.clone())
            .with_suggestion("Check free disk space and permissions of the cache directory"),
        StrataError::TemplateNotFound {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Add the directory containing the template to template_dirs"),
        StrataError::PermissionDenied {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Set allow_artifact_listing = true in strata.toml"),
        StrataError::ConfigError {
            ..
        }
        | StrataError::RenderError {
            ..
        } => ErrorContext::new(error.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = StrataError::CompileError {
            template: "Page.ss".to_string(),
            reason: "unclosed loop".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to compile template 'Page.ss': unclosed loop");

        let error = StrataError::InvalidPropertySource {
            property: "Title".to_string(),
        };
        assert!(error.to_string().contains("'Title'"));
    }

    #[test]
    fn test_user_friendly_error_adds_suggestion() {
        let ctx = user_friendly_error(anyhow::Error::from(StrataError::NoParentScope));
        assert!(matches!(ctx.error, StrataError::NoParentScope));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_finds_wrapped_error() {
        let error = anyhow::Error::from(StrataError::TemplateNotFound {
            name: "Footer".to_string(),
        })
        .context("Failed to render page");

        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, StrataError::TemplateNotFound { .. }));
        assert!(ctx.details.unwrap().contains("Failed to render page"));
    }

    #[test]
    fn test_user_friendly_error_keeps_outer_context() {
        let error = anyhow::Error::from(StrataError::ConfigError {
            message: "unknown environment 'staging'".to_string(),
        })
        .context("Failed to load configuration from strata.toml");

        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, StrataError::ConfigError { .. }));
        let details = ctx.details.unwrap_or_default();
        assert!(details.contains("Failed to load configuration from strata.toml"));
        assert!(details.contains("unknown environment 'staging'"));
    }

    #[test]
    fn test_user_friendly_error_wrapped_toml_error() {
        let toml_error = toml::from_str::<toml::Table>("extension = {").unwrap_err();
        let error = anyhow::Error::from(toml_error).context("Failed to parse strata.toml");

        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, StrataError::ConfigError { .. }));
        assert!(ctx.details.unwrap_or_default().contains("Failed to parse strata.toml"));
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(StrataError::ConfigError {
            message: "bad".to_string(),
        })
        .with_suggestion("fix it")
        .with_details("more");

        let rendered = format!("{ctx}");
        assert!(rendered.contains("Configuration error: bad"));
        assert!(rendered.contains("Details: more"));
        assert!(rendered.contains("Suggestion: fix it"));
    }
}
