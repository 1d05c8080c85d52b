//! Error types for the portal tooling.

use std::fmt;

/// Why a payload could not be turned into course records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The portal answered with a page (usually the login form again) instead of data.
    AuthLikelyFailed,
    /// Structured, but not the structure we expect.
    Malformed,
    /// Nothing at all came back.
    Empty,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::AuthLikelyFailed => "authentication likely failed",
            ParseErrorKind::Malformed => "malformed payload",
            ParseErrorKind::Empty => "empty payload",
        };
        f.write_str(s)
    }
}

const SNIPPET_LEN: usize = 120;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {detail} (payload starts with {snippet:?})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub detail: String,
    pub snippet: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, detail: impl Into<String>, payload: &str) -> Self {
        Self {
            kind,
            detail: detail.into(),
            snippet: payload.trim().chars().take(SNIPPET_LEN).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("credential error: {0}")]
    Credential(String),

    #[error("login error: {0}")]
    Session(String),

    #[error("parse error for {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: ParseError,
    },

    #[error("notifier not configured: {0}")]
    NotifierConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("snapshot store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(key: impl Into<String>, source: ParseError) -> Self {
        Error::Parse {
            key: key.into(),
            source,
        }
    }

    /// One line suitable for the terminal. Never includes secrets or payloads.
    pub fn hint(&self) -> &'static str {
        match self {
            Error::Credential(_) => "Check your credentials file or the values you entered.",
            Error::Session(_) => "Could not find the login form. The portal may have changed.",
            Error::Parse { source, .. } => match source.kind {
                ParseErrorKind::AuthLikelyFailed | ParseErrorKind::Empty => {
                    "Something went wrong... Did you enter the correct password? \
                     The portal may also be unavailable right now. Check the error log."
                }
                ParseErrorKind::Malformed => {
                    "The portal returned data in an unexpected shape. Check the error log."
                }
            },
            Error::NotifierConfig(_) => "No notification channel is configured.",
            Error::Http(_) => "The portal may be unreachable right now.",
            Error::Store(_) | Error::Io(_) => "Could not access local data files.",
            Error::Config(_) => "Check your settings and command line flags.",
            Error::Json(_) => "A file could not be read as JSON.",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
