use thiserror::Error;

/// Startup-time configuration failures. All of these are fatal; the
/// process exits before serving traffic.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    FileRead(String, String),

    #[error("failed to parse config file {0}: {1}")]
    Parse(String, String),

    #[error("duplicate id '{0}'")]
    DuplicateId(String),

    #[error("unknown type '{kind}' for '{id}'")]
    UnknownKind { id: String, kind: String },

    #[error("'{id}' references non-existent resolver, group or router '{reference}'")]
    UnresolvedDependency { id: String, reference: String },

    #[error("unable to resolve dependencies: cycle involving {0}")]
    DependencyCycle(String),

    #[error("type {kind} expects {expected} in '{id}'")]
    Arity {
        id: String,
        kind: String,
        expected: &'static str,
    },

    #[error("conflicting options in '{id}': {reason}")]
    OptionConflict { id: String, reason: String },

    #[error("invalid pattern '{pattern}' in '{id}': {reason}")]
    InvalidPattern {
        id: String,
        pattern: String,
        reason: String,
    },

    #[error("invalid CIDR '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("invalid upstream endpoint in '{id}': {reason}")]
    InvalidEndpoint { id: String, reason: String },

    #[error("invalid record string '{value}' in '{id}': {reason}")]
    InvalidRecord {
        id: String,
        value: String,
        reason: String,
    },

    #[error("listener '{id}': {reason}")]
    Listener { id: String, reason: String },

    #[error("blocklist source error in '{id}': {reason}")]
    ListSource { id: String, reason: String },

    #[error("{0}")]
    Validation(String),
}
