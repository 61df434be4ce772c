//! Error types for bawwab

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("invalid directory address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unsupported directory scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },

    #[error("invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    // Connection errors
    #[error("connection failed: {0}")]
    Connection(String),

    // Authentication errors
    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("empty password is not allowed")]
    EmptyPassword,

    #[error("search failed: {0}")]
    SearchFailed(String),

    #[error("search error: empty result")]
    SearchEmpty,

    #[error("search error: multiple entries ({0})")]
    SearchAmbiguous(usize),

    // Authorization errors
    #[error("user {username} does not match any allowed users nor allowed groups")]
    NotAuthorized {
        username: String,
        #[source]
        source: Option<Box<Error>>,
    },

    // Session errors
    #[error("session user {session} != auth user {request}")]
    SessionMismatch { session: String, request: String },

    #[error("missing or malformed Basic credentials")]
    MissingCredentials,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Coarse error class, used as a log field and metrics label.
    pub fn class(&self) -> &'static str {
        match self {
            Error::InvalidAddress { .. }
            | Error::UnsupportedScheme { .. }
            | Error::InvalidTrustAnchor(_)
            | Error::Invalid(_) => "configuration",

            Error::Connection(_) => "connection",

            Error::BindFailed(_)
            | Error::EmptyPassword
            | Error::SearchFailed(_)
            | Error::SearchEmpty
            | Error::SearchAmbiguous(_)
            | Error::MissingCredentials => "authentication",

            Error::NotAuthorized { .. } => "authorization",

            Error::SessionMismatch { .. } => "session",

            Error::Io(_) => "io",
        }
    }

    /// Render the error and its source chain as a single line for the
    /// denial response body.
    pub fn reason(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_search_message() {
        let err = Error::SearchAmbiguous(2);
        assert_eq!(err.to_string(), "search error: multiple entries (2)");
    }

    #[test]
    fn test_session_mismatch_message() {
        let err = Error::SessionMismatch {
            session: "bob".to_string(),
            request: "carol".to_string(),
        };
        assert_eq!(err.to_string(), "session user bob != auth user carol");
    }

    #[test]
    fn test_not_authorized_chains_last_search_error() {
        let err = Error::NotAuthorized {
            username: "alice".to_string(),
            source: Some(Box::new(Error::SearchFailed("no such object".to_string()))),
        };

        let reason = err.reason();
        assert!(reason.contains("does not match any allowed users nor allowed groups"));
        assert!(reason.contains("search failed: no such object"));
    }

    #[test]
    fn test_not_authorized_without_source() {
        let err = Error::NotAuthorized {
            username: "alice".to_string(),
            source: None,
        };
        assert_eq!(
            err.reason(),
            "user alice does not match any allowed users nor allowed groups"
        );
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::Connection("refused".to_string()).class(), "connection");
        assert_eq!(Error::SearchEmpty.class(), "authentication");
        assert_eq!(
            Error::NotAuthorized {
                username: "a".to_string(),
                source: None
            }
            .class(),
            "authorization"
        );
    }
}
