//! Core traits and types for sequential publishing
//!
//! This module defines the publish client abstraction the sequencer drives.
//! Anything that can push one package to a registry and report the outcome
//! can stand behind it: the `cargo publish` wrapper, or a fake in tests.

use crate::core::package::PackageId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Publishing
// ============================================================================

/// Successful result of a single publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// A new version was uploaded
    Published {
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },

    /// The registry already has this version; nothing was uploaded
    AlreadyPublished,
}

impl PublishOutcome {
    pub fn published() -> Self {
        Self::Published { output: None }
    }

    /// Whether the registry gained a new artifact that needs time to propagate
    pub fn uploaded(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

// ============================================================================
// Publish Client Trait
// ============================================================================

/// External capability that publishes one package
///
/// Credential resolution, packaging and the registry wire protocol all live
/// behind this trait. A failed publish must be reported as `Err`; the
/// sequencer never inspects exit codes itself.
///
/// # Examples
///
/// ```no_run
/// # use publish_sequencer::core::{PackageId, PublishClient, PublishOutcome};
/// # use async_trait::async_trait;
/// struct EchoClient;
///
/// #[async_trait]
/// impl PublishClient for EchoClient {
///     fn name(&self) -> &str { "echo" }
///
///     async fn publish(&self, package: &PackageId) -> anyhow::Result<PublishOutcome> {
///         println!("publishing {}", package);
///         Ok(PublishOutcome::published())
///     }
/// }
/// ```
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Client name used in logs and reports (e.g. "cargo")
    fn name(&self) -> &str;

    /// Publish a single package and wait for the registry to accept it
    async fn publish(&self, package: &PackageId) -> anyhow::Result<PublishOutcome>;
}

#[async_trait]
impl<T: PublishClient + ?Sized> PublishClient for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn publish(&self, package: &PackageId) -> anyhow::Result<PublishOutcome> {
        (**self).publish(package).await
    }
}
