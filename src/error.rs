//! Error types for fetching, aggregation and registry management.
//!
//! Source-scoped failures (`SourceError`) are collected during fan-out and
//! reported next to partial results; only `AggregateError` aborts a whole call.

use thiserror::Error;

/// A failure confined to one source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connection, DNS or relay failure, or a non-success HTTP status.
    #[error("{source_name}: request failed ({message}). The relay may be down or misconfigured; try another relay or a direct connection")]
    Transport { source_name: String, message: String },

    /// The body is not the expected JSON or playlist text.
    #[error("{source_name}: unexpected response format ({message})")]
    Format { source_name: String, message: String },

    /// A well-formed response that reports a remote failure.
    #[error("{source_name}: {message}")]
    Api { source_name: String, message: String },

    #[error("{source_name}: invalid source url '{url}'")]
    InvalidUrl { source_name: String, url: String },
}

impl SourceError {
    pub fn transport<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::Transport { source_name: source_name.into(), message: message.into() }
    }

    pub fn format<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::Format { source_name: source_name.into(), message: message.into() }
    }

    pub fn api<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::Api { source_name: source_name.into(), message: message.into() }
    }

    pub fn is_transport(&self) -> bool { matches!(self, Self::Transport { .. }) }
}

/// Failures of an aggregate operation as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("No usable sources. Add a source or re-test the existing ones")]
    NoUsableSources,

    #[error("No catalog (CMS) source is registered; live playlists cannot be browsed by category")]
    NoCatalogSource,

    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A source with url '{url}' already exists")]
    Duplicate { url: String },

    #[error("Invalid source url '{url}'")]
    InvalidUrl { url: String },

    #[error("No source with id '{id}'")]
    NotFound { id: String },

    #[error("No curated source named '{name}'")]
    UnknownCurated { name: String },
}
