use thiserror::Error as ThisError;

/// Matches a record name in a specific way.
///
/// Used for selecting which records already carry pre-formatted names and should therefore be
/// exposed without any camel-case splitting.  Matching is case-insensitive.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Matcher {
    /// Matches the entire record name.
    Full(String),
    /// Matches the beginning of the record name.
    Prefix(String),
    /// Matches the end of the record name.
    Suffix(String),
    /// Matches anywhere within the record name.
    Contains(String),
}

impl Matcher {
    /// Checks if the given name matches this matcher.
    ///
    /// `name` is expected to already be ASCII-lowercased.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Matcher::Suffix(suffix) => name.ends_with(suffix.as_str()),
            Matcher::Full(full) => name == full,
            Matcher::Contains(needle) => name.contains(needle.as_str()),
        }
    }

    /// Creates a lowercased version of this matcher.
    pub(crate) fn lowercased(self) -> Matcher {
        match self {
            Matcher::Prefix(prefix) => Matcher::Prefix(prefix.to_ascii_lowercase()),
            Matcher::Suffix(suffix) => Matcher::Suffix(suffix.to_ascii_lowercase()),
            Matcher::Full(full) => Matcher::Full(full.to_ascii_lowercase()),
            Matcher::Contains(needle) => Matcher::Contains(needle.to_ascii_lowercase()),
        }
    }
}

/// Errors that could occur while building or installing a Prometheus sink.
#[derive(Debug, ThisError)]
pub enum BuildError {
    /// There was an issue when creating the necessary Tokio runtime to launch the exporter.
    #[error("failed to create Tokio runtime for exporter: {0}")]
    FailedToCreateRuntime(String),

    /// There was an issue when creating the HTTP listener.
    #[error("failed to create HTTP listener: {0}")]
    FailedToCreateHTTPListener(String),

    /// The given IP address or subnet for the allowlist could not be parsed correctly.
    #[error("invalid allowlist address: {0}")]
    InvalidAllowlistAddress(String),

    /// The collection interval was zero.
    #[error("collection interval cannot be zero")]
    ZeroCollectionInterval,
}
