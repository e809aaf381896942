//! Contracts modules plug in through.
//!
//! The external loader resolves an opaque identifier to a [`Module`]; the
//! session then drives the module's `mount` entry point, which hands back a
//! typed [`Mounted`]: the instance for the mount table plus an optional
//! teardown. The kernel never interprets identifier strings.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use axon_core::contracts::{ContextManager, Observer, Provider, Tool};
use axon_core::errors::KernelError;

use crate::cancellation::CancellationToken;
use crate::coordinator::Coordinator;

/// Async teardown registered by a module at mount time.
pub type CleanupFn = Box<
    dyn Fn() -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

/// What a module installed, tagged by mount point.
pub enum ModuleInstance {
    Orchestrator(Arc<dyn Orchestrator>),
    Context(Arc<dyn ContextManager>),
    Provider(Arc<dyn Provider>),
    Tool(Arc<dyn Tool>),
    Observer(Arc<dyn Observer>),
}

impl ModuleInstance {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Orchestrator(_) => "orchestrator",
            Self::Context(_) => "context",
            Self::Provider(_) => "provider",
            Self::Tool(_) => "tool",
            Self::Observer(_) => "observer",
        }
    }
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// The product of a successful mount.
pub struct Mounted {
    pub instance: ModuleInstance,
    pub cleanup: Option<CleanupFn>,
}

impl Mounted {
    pub fn new(instance: ModuleInstance) -> Self {
        Self {
            instance,
            cleanup: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupFn) -> Self {
        self.cleanup = Some(cleanup);
        self
    }
}

/// A loadable module. `mount` receives the coordinator (for capability
/// registration, hook registration, and infrastructure access) and the
/// module's config block from the mount plan.
#[async_trait]
pub trait Module: Send + Sync {
    async fn mount(
        &self,
        coordinator: Arc<Coordinator>,
        config: Value,
    ) -> Result<Mounted, KernelError>;
}

/// Resolves opaque module identifiers to modules.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load a module by identifier. Unresolvable identifiers fail with
    /// [`KernelError::ModuleNotFound`].
    async fn load(&self, module_id: &str) -> Result<Arc<dyn Module>, KernelError>;
}

/// Drives one turn of the conversation loop.
///
/// The orchestrator calls providers, tools, and the context through the
/// coordinator, emits lifecycle events at each boundary, and checks the
/// cancellation token at its loop boundaries.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn run(
        &self,
        prompt: &str,
        coordinator: Arc<Coordinator>,
        cancellation: CancellationToken,
    ) -> Result<String, KernelError>;
}
