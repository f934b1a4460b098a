use thiserror::Error;

/// Data-plane resolution errors.
///
/// A stage that cannot produce any response returns one of these. The
/// enclosing group resolver decides whether to retry a sibling based on
/// [`ResolveError::is_transient`].
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("upstream {server} timed out")]
    UpstreamTimeout { server: String },

    #[error("connection refused by {server}")]
    ConnectionRefused { server: String },

    #[error("connection to {server} reset")]
    ConnectionReset { server: String },

    #[error("TLS handshake with {server} failed: {reason}")]
    TlsHandshake { server: String, reason: String },

    #[error("QUIC stream to {server} reset: {reason}")]
    QuicStreamReset { server: String, reason: String },

    #[error("truncated response from {server}")]
    Truncated { server: String },

    #[error("no usable address for upstream host {host}")]
    NoUpstreamAddress { host: String },

    #[error("I/O error talking to {server}: {reason}")]
    Io { server: String, reason: String },

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("response id {got} does not match query id {want}")]
    IdMismatch { want: u16, got: u16 },

    /// The query was intentionally discarded; the listener must not reply.
    #[error("query dropped")]
    Dropped,

    #[error("list source {source_name} failed to load: {reason}")]
    ListLoad { source_name: String, reason: String },

    #[error("list rule '{rule}' failed to parse: {reason}")]
    ListParse { rule: String, reason: String },
}

impl ResolveError {
    /// Retry-appropriate failures. Group resolvers fail over to a sibling
    /// only when this returns `true`; permanent errors propagate as-is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolveError::UpstreamTimeout { .. }
                | ResolveError::ConnectionRefused { .. }
                | ResolveError::ConnectionReset { .. }
                | ResolveError::TlsHandshake { .. }
                | ResolveError::QuicStreamReset { .. }
                | ResolveError::Truncated { .. }
                | ResolveError::NoUpstreamAddress { .. }
                | ResolveError::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert!(ResolveError::UpstreamTimeout {
            server: "1.2.3.4:53".into()
        }
        .is_transient());
        assert!(ResolveError::ConnectionRefused {
            server: "1.2.3.4:53".into()
        }
        .is_transient());
    }

    #[test]
    fn policy_and_parse_failures_are_permanent() {
        assert!(!ResolveError::Dropped.is_transient());
        assert!(!ResolveError::MalformedQuery("no question".into()).is_transient());
        assert!(!ResolveError::IdMismatch { want: 1, got: 2 }.is_transient());
    }
}
