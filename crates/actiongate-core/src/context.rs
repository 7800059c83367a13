//! Invocation context for action executions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Caller-supplied parameters, ordered by name.
pub type Parameters = BTreeMap<String, String>;

/// Request IP recorded when the transport cannot tell.
pub const UNKNOWN_IP: &str = "unknown";

/// Everything a caller brings to one invocation.
///
/// The public key selects the action; the parameters are substituted
/// into its content and the request IP ends up in the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Call-time parameters.
    #[serde(default)]
    pub parameters: Parameters,

    /// Origin of the request, for the execution log.
    pub request_ip: String,
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new(Parameters::new())
    }
}

impl InvocationContext {
    /// Create a context with parameters and an unknown origin.
    #[must_use]
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            request_ip: UNKNOWN_IP.to_string(),
        }
    }

    /// Build a context from raw query pairs, dropping the `key` selector.
    #[must_use]
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let parameters = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k != "key")
            .collect();
        Self::new(parameters)
    }

    /// Set the request origin.
    #[must_use]
    pub fn with_request_ip(mut self, ip: impl Into<String>) -> Self {
        self.request_ip = ip.into();
        self
    }
}
