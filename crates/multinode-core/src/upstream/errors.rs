use std::{fmt, time::Duration};
use thiserror::Error;

/// Configuration rejected while validating node entries or building the pool policy.
///
/// Fatal at construction time: a pool is never started from a configuration that produced
/// one of these. Node-level variants carry the zero-based index of the offending entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Entry has no name.
    #[error("node {index}: missing name")]
    MissingName { index: usize },

    /// WebSocket URL absent, unparseable or not `ws`/`wss`.
    #[error("node {index} ({name}): invalid ws url: {reason}")]
    InvalidWsUrl { index: usize, name: String, reason: String },

    /// HTTP URL absent, unparseable or not `http`/`https`.
    #[error("node {index} ({name}): invalid http url: {reason}")]
    InvalidHttpUrl { index: usize, name: String, reason: String },

    /// Explicit order outside `[1, 100]`.
    #[error("node {index} ({name}): order out of range: {order} (allowed 1..=100)")]
    OrderOutOfRange { index: usize, name: String, order: i32 },

    /// Two entries share a name.
    #[error("node {index}: duplicate name: {name}")]
    DuplicateName { index: usize, name: String },

    /// Two entries share a WebSocket URL.
    #[error("node {index} ({name}): duplicate ws url: {url}")]
    DuplicateWsUrl { index: usize, name: String, url: String },

    /// Two entries share an HTTP URL.
    #[error("node {index} ({name}): duplicate http url: {url}")]
    DuplicateHttpUrl { index: usize, name: String, url: String },

    /// Selection mode is not one of the four supported values.
    #[error("unknown selection mode: {0:?}")]
    UnknownSelectionMode(String),

    /// A required pool-level setting was not supplied.
    #[error("missing pool setting: {0}")]
    MissingField(&'static str),

    /// Poll interval is below the smallest supported cadence.
    #[error("poll interval must be at least {min:?}")]
    PollIntervalTooShort { min: Duration },

    /// A duration string could not be parsed.
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
}

impl ConfigError {
    /// Index of the offending node entry, if the error concerns one.
    #[must_use]
    pub fn node_index(&self) -> Option<usize> {
        match self {
            Self::MissingName { index } |
            Self::InvalidWsUrl { index, .. } |
            Self::InvalidHttpUrl { index, .. } |
            Self::OrderOutOfRange { index, .. } |
            Self::DuplicateName { index, .. } |
            Self::DuplicateWsUrl { index, .. } |
            Self::DuplicateHttpUrl { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// A liveness or sync probe failed. Contained within the node's monitor; callers only see
/// its effect on node state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid probe response: {0}")]
    InvalidResponse(String),
}

/// Classification of JSON-RPC errors for deciding whether a failed call is the node's fault.
///
/// - Client errors don't penalize nodes
/// - Provider errors count against the node
/// - Rate limits are transient and don't penalize
/// - Execution errors are forwarded to callers without penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorCategory {
    /// Invalid request, method not found, invalid params.
    ClientError,
    /// Internal error, server error.
    ProviderError,
    /// Rate limiting at JSON-RPC level (-32005).
    RateLimit,
    /// Malformed response from the node.
    ParseError,
    /// Reverts, out of gas and similar transaction issues.
    ExecutionError,
}

impl RpcErrorCategory {
    /// Classifies a JSON-RPC error code and message.
    ///
    /// For the -32000 to -32099 range the message is inspected to tell execution errors
    /// (caller's fault) from provider errors.
    #[must_use]
    pub fn from_code_and_message(code: i32, message: &str) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32602..=-32600 => Self::ClientError,
            -32005 => Self::RateLimit,
            -32099..=-32000 => {
                let message_lower = message.to_lowercase();
                if message_lower.contains("revert") ||
                    message_lower.contains("out of gas") ||
                    message_lower.contains("insufficient funds") ||
                    message_lower.contains("nonce too low") ||
                    message_lower.contains("gas too low")
                {
                    Self::ExecutionError
                } else {
                    Self::ProviderError
                }
            }
            _ => Self::ProviderError,
        }
    }

    /// Returns `true` if this category indicates a problem with the node itself.
    #[must_use]
    pub fn should_penalize_node(&self) -> bool {
        matches!(self, Self::ProviderError | Self::ParseError)
    }

    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientError => "client_error",
            Self::ProviderError => "provider_error",
            Self::RateLimit => "rate_limit",
            Self::ParseError => "parse_error",
            Self::ExecutionError => "execution_error",
        }
    }
}

/// An RPC call dispatched to a selected node failed.
///
/// Surfaced to the caller. The pool never retries the call on another node; callers wanting
/// failover select again.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NodeCallError {
    #[error("request timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-2xx HTTP status and (truncated) body.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl NodeCallError {
    #[must_use]
    pub fn rpc_category(&self) -> Option<RpcErrorCategory> {
        match self {
            Self::RpcError(code, message) => {
                Some(RpcErrorCategory::from_code_and_message(*code, message))
            }
            _ => None,
        }
    }

    /// Returns `true` if the failure should count against the node's health.
    ///
    /// Timeouts, connection failures, 5xx responses, malformed responses and provider-side
    /// RPC errors count; client mistakes, reverts and rate limits do not.
    #[must_use]
    pub fn should_penalize_node(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) | Self::InvalidResponse(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status),
            Self::RpcError(_, _) => self.rpc_category().is_some_and(|c| c.should_penalize_node()),
            Self::InvalidRequest(_) => false,
        }
    }
}

/// Errors surfaced by [`NodePool`](super::manager::NodePool) operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PoolError {
    /// No node is currently alive. The pool does not wait or retry.
    #[error("no alive nodes available")]
    Exhausted,

    #[error("node pool already started")]
    AlreadyStarted,

    #[error("node pool is closed")]
    Closed,

    /// The transport factory could not create a transport for a node.
    #[error("failed to create transport for node {node}: {source}")]
    TransportInit {
        node: String,
        #[source]
        source: NodeCallError,
    },

    /// A call against the selected node failed.
    #[error("call to node {node} failed: {source}")]
    Call {
        node: String,
        #[source]
        source: NodeCallError,
    },
}

/// One component that failed to stop cleanly during `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownFailure {
    /// Monitor did not acknowledge the stop signal within the bound and was aborted.
    MonitorTimeout { node: String },
    /// Monitor task ended with a panic.
    MonitorPanicked { node: String, message: String },
    /// Releasing the node's transport failed.
    Transport { node: String, message: String },
}

impl fmt::Display for ShutdownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MonitorTimeout { node } => write!(f, "{node}: monitor did not stop in time"),
            Self::MonitorPanicked { node, message } => {
                write!(f, "{node}: monitor panicked: {message}")
            }
            Self::Transport { node, message } => write!(f, "{node}: transport close failed: {message}"),
        }
    }
}

/// All failures observed while closing a pool, reported once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("node pool shutdown finished with {} failure(s): {}", .failures.len(), join_failures(.failures))]
pub struct ShutdownError {
    pub failures: Vec<ShutdownFailure>,
}

fn join_failures(failures: &[ShutdownFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
