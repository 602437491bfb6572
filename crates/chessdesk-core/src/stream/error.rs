use std::fmt;

/// Why a stream connection ended. Only ever used to pick a backoff and log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// HTTP 429 from the server.
    RateLimited,
    /// Any other non-success HTTP status.
    HttpStatus,
    /// Connection, TLS, body read or idle-timeout failure.
    Transport,
    /// The server closed the body cleanly.
    Closed,
    /// No token available to authenticate with.
    Unauthenticated,
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamErrorKind::RateLimited => write!(f, "rate_limited"),
            StreamErrorKind::HttpStatus => write!(f, "http_status"),
            StreamErrorKind::Transport => write!(f, "transport"),
            StreamErrorKind::Closed => write!(f, "closed"),
            StreamErrorKind::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Structured stream failure with kind and a one-line message.
#[derive(Debug, Clone)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    pub message: String,
}

impl StreamError {
    pub fn new(kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies a non-success status.
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = if status == 429 {
            StreamErrorKind::RateLimited
        } else {
            StreamErrorKind::HttpStatus
        };
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };
        Self { kind, message }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(StreamErrorKind::Transport, message)
    }

    pub fn closed() -> Self {
        Self::new(StreamErrorKind::Closed, "server closed the stream")
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        assert_eq!(
            StreamError::http_status(429, "").kind,
            StreamErrorKind::RateLimited
        );
        let err = StreamError::http_status(500, " oops ");
        assert_eq!(err.kind, StreamErrorKind::HttpStatus);
        assert_eq!(err.to_string(), "HTTP 500: oops");
    }
}
