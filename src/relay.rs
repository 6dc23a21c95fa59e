//! Outbound URL rewriting through a relay endpoint.
//!
//! Public relays come in two conventions: query-style ones take the target as
//! an encoded parameter (`https://relay/?url=`), path-style ones take it as a
//! raw trailing path (`https://relay/`). The style is inferred from whether the
//! prefix contains a `?`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStyle {
    Direct,
    Query,
    Path,
}

/// The relay in effect for a call. An empty prefix means a direct connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    prefix: String,
}

impl RelayConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into().trim().to_string() }
    }

    pub fn direct() -> Self { Self::default() }

    pub fn prefix(&self) -> &str { &self.prefix }

    pub fn style(&self) -> RelayStyle {
        if self.prefix.is_empty() {
            RelayStyle::Direct
        } else if self.prefix.contains('?') {
            RelayStyle::Query
        } else {
            RelayStyle::Path
        }
    }

    pub fn resolve(&self, target_url: &str) -> String { build_request_url(self, target_url) }
}

/// Rewrite `target_url` so that it is fetched through `relay`.
pub fn build_request_url(relay: &RelayConfig, target_url: &str) -> String {
    match relay.style() {
        RelayStyle::Direct => target_url.to_string(),
        RelayStyle::Query => format!("{}{}", relay.prefix, urlencoding::encode(target_url)),
        RelayStyle::Path => format!("{}{}", relay.prefix, target_url),
    }
}
