//! Error types for the reconciler crate.

use thiserror::Error;

use crate::codec::MetadataType;
use crate::gateway::GatewayError;
use crate::types::OperationKind;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// An entry declares a type outside STRING, NUMBER, BOOLEAN.
    #[error("metadata key '{key}': unsupported type '{type_name}'")]
    UnsupportedType { key: String, type_name: String },

    /// An entry declares a domain outside TENANT, PROVIDER.
    #[error("metadata key '{key}': unsupported domain '{domain}'")]
    UnsupportedDomain { key: String, domain: String },

    /// A textual value cannot be decoded as its declared type.
    #[error("metadata key '{key}': cannot parse '{value}' as {target}: {reason}")]
    ValueParse {
        key: String,
        value: String,
        target: MetadataType,
        reason: String,
    },

    /// The same key appears twice in one metadata set.
    #[error("metadata key '{key}' is declared more than once")]
    DuplicateKey { key: String },

    /// A configured key is covered by an ignore rule set to fail.
    #[error("metadata key '{key}' is configured but matches ignore rule {rule}")]
    IgnoredKeyConflict { key: String, rule: String },

    /// A remote create/update/delete failed; the pass was aborted.
    #[error(
        "{operation} of metadata key '{key}' failed: {cause} (succeeded: [{}]; not attempted: [{}])",
        .succeeded.join(", "),
        .not_attempted.join(", ")
    )]
    RemoteOperation {
        key: String,
        operation: OperationKind,
        #[source]
        cause: GatewayError,
        succeeded: Vec<String>,
        not_attempted: Vec<String>,
    },

    /// A gateway call outside the operation sequence failed.
    #[error("gateway call '{call}' failed: {source}")]
    Gateway {
        call: String,
        #[source]
        source: GatewayError,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Document loading or persistence failed.
    #[error(transparent)]
    Core(#[from] metasync_core::Error),
}

impl Error {
    /// Create an unsupported domain error.
    pub fn unsupported_domain(key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::UnsupportedDomain {
            key: key.into(),
            domain: domain.into(),
        }
    }

    /// Create a duplicate key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    /// Create an ignored key conflict error.
    pub fn ignored_key_conflict(key: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::IgnoredKeyConflict {
            key: key.into(),
            rule: rule.into(),
        }
    }

    /// Create a remote operation error.
    pub fn remote_operation(
        operation: OperationKind,
        key: impl Into<String>,
        cause: GatewayError,
        succeeded: Vec<String>,
        not_attempted: Vec<String>,
    ) -> Self {
        Self::RemoteOperation {
            key: key.into(),
            operation,
            cause,
            succeeded,
            not_attempted,
        }
    }

    /// Create a gateway error.
    pub fn gateway(call: impl Into<String>, source: GatewayError) -> Self {
        Self::Gateway {
            call: call.into(),
            source,
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the error was raised locally, before any remote call.
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType { .. }
                | Self::UnsupportedDomain { .. }
                | Self::ValueParse { .. }
                | Self::DuplicateKey { .. }
                | Self::IgnoredKeyConflict { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// The metadata key the error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnsupportedType { key, .. }
            | Self::UnsupportedDomain { key, .. }
            | Self::ValueParse { key, .. }
            | Self::DuplicateKey { key }
            | Self::IgnoredKeyConflict { key, .. }
            | Self::RemoteOperation { key, .. } => Some(key),
            Self::Gateway { .. } | Self::InvalidConfig { .. } | Self::Core(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_operation_names_key_and_progress() {
        let err = Error::remote_operation(
            OperationKind::Update,
            "owner",
            GatewayError::unavailable("503 service unavailable"),
            vec!["stale".to_string()],
            vec!["fresh".to_string(), "new".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.starts_with("update of metadata key 'owner' failed"));
        assert!(msg.contains("503 service unavailable"));
        assert!(msg.contains("succeeded: [stale]"));
        assert!(msg.contains("not attempted: [fresh, new]"));
        assert!(!err.is_local());
        assert_eq!(err.key(), Some("owner"));
    }

    #[test]
    fn test_validation_errors_are_local() {
        assert!(Error::duplicate_key("a").is_local());
        assert!(Error::unsupported_domain("a", "GLOBAL").is_local());
        assert!(Error::invalid_config("missing gateway").is_local());
        assert!(!Error::gateway("get_all", GatewayError::unavailable("down")).is_local());
    }
}
