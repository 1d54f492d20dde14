//! Error types for the INDIGO driver generator.
//!
//! This module provides a unified error type [`GeneratorError`] that covers
//! all error conditions that can occur while lexing and parsing a driver
//! definition, checking it, and reading or writing files.

use thiserror::Error;

/// Result type alias using [`GeneratorError`].
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Unified error type for all generator operations.
#[derive(Error, Debug)]
pub enum GeneratorError {
    // ============ DSL Errors ============
    /// End of input inside a string, code block or expression, or a
    /// character no token starts with
    #[error("{line}:{column}: lexical error: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Missing or unexpected token
    #[error("{line}:{column}: syntax error: {message}{}", token_suffix(.token))]
    SyntaxError {
        line: usize,
        column: usize,
        message: String,
        token: Option<String>,
    },

    /// Structurally valid definition that is missing a required element
    #[error("semantic error: {message}")]
    SemanticError { message: String },

    // ============ I/O Errors ============
    /// Error reading a definition or source file
    #[error("Failed to read '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a generated file
    #[error("Failed to write '{path}': {source}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ============ CLI Errors ============
    /// Command line misuse
    #[error("{message}")]
    UsageError { message: String },
}

fn token_suffix(token: &Option<String>) -> String {
    match token {
        Some(text) => format!(" (found '{}')", text),
        None => String::new(),
    }
}

impl GeneratorError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a syntax error
    pub fn syntax(
        line: usize,
        column: usize,
        message: impl Into<String>,
        token: Option<&str>,
    ) -> Self {
        Self::SyntaxError {
            line,
            column,
            message: message.into(),
            token: token.map(str::to_string),
        }
    }

    /// Create a semantic error
    pub fn semantic(message: impl Into<String>) -> Self {
        Self::SemanticError {
            message: message.into(),
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::UsageError {
            message: message.into(),
        }
    }

    /// Create a file read error
    pub fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::FileReadError {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create a file write error
    pub fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::FileWriteError {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = GeneratorError::syntax(3, 14, "expected ';'", Some("}"));
        assert_eq!(err.to_string(), "3:14: syntax error: expected ';' (found '}')");

        let err = GeneratorError::syntax(1, 1, "expected 'driver'", None);
        assert_eq!(err.to_string(), "1:1: syntax error: expected 'driver'");
    }

    #[test]
    fn test_semantic_error_display() {
        let err = GeneratorError::semantic("no device defined");
        assert_eq!(err.to_string(), "semantic error: no device defined");
    }
}
