//! Error types for eraline-resolver
//!
//! A tier that runs cleanly and finds nothing is not an error: tiers report
//! that through their outcome types. These variants cover the failures that
//! make a tier fall through to the next one.

use thiserror::Error;

/// Resolver error type
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Provider signalled rate limiting (HTTP 429 or local budget exhausted)
    #[error("Provider {provider} rate limited")]
    ProviderRateLimited { provider: String },

    /// Provider failed: network, non-success status, timeout, unparseable body
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// Durable store read or write failed
    #[error("Durable store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reference knowledge base request failed
    #[error("Reference lookup failed: {0}")]
    Reference(String),

    /// Upstream metadata provider failed
    #[error("Metadata provider failed: {0}")]
    Metadata(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// eraline-common error
    #[error("Common error: {0}")]
    Common(#[from] eraline_common::Error),
}

impl ResolverError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        ResolverError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn rate_limited(provider: &str) -> Self {
        ResolverError::ProviderRateLimited {
            provider: provider.to_string(),
        }
    }
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;
