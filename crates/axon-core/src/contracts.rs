//! Contracts the kernel consumes from external modules.
//!
//! Everything here is object-safe and `Send + Sync` so instances can live in
//! the mount table as `Arc<dyn _>`. The orchestrator, module, and loader
//! contracts live in `axon-kernel` because they reference the coordinator.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::errors::{ApprovalError, KernelError};
use crate::hooks::{ApprovalDefault, NoticeLevel};
use crate::messages::{ChatMessage, ChatRequest, ChatResponse};

/// Streaming provider output: a sequence of partial responses.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatResponse, KernelError>> + Send>>;

/// An LLM provider.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, KernelError>;

    /// Streaming variant. Providers that only support unary completion keep
    /// the default.
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream, KernelError> {
        let _ = request;
        Err(KernelError::Provider(format!(
            "provider '{}' does not support streaming",
            self.name()
        )))
    }
}

/// Result of one tool execution.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// An executable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// JSON schema describing the tool's input.
    fn schema(&self) -> Value;

    async fn execute(&self, input: Value) -> Result<ToolOutcome, KernelError>;
}

/// The conversation store.
#[async_trait]
pub trait ContextManager: Send + Sync {
    async fn add_message(&self, message: ChatMessage) -> Result<(), KernelError>;

    async fn get_messages(&self) -> Result<Vec<ChatMessage>, KernelError>;

    async fn should_compact(&self) -> bool;

    async fn compact(&self) -> Result<(), KernelError>;

    async fn clear(&self) -> Result<(), KernelError>;
}

/// A mounted hook observer module.
///
/// Observers register their handlers with the hook registry during mount;
/// the mount table keeps them only so installations stay enumerable.
pub trait Observer: Send + Sync {
    fn name(&self) -> &str;
}

/// The external approval surface (UI, policy engine, …).
///
/// Returns the chosen option string. A timeout raises
/// [`ApprovalError::Timeout`], which the kernel maps to the requesting
/// hook's default decision.
#[async_trait]
pub trait ApprovalSystem: Send + Sync {
    async fn request_approval(
        &self,
        prompt: &str,
        options: &[String],
        timeout: Duration,
        default: ApprovalDefault,
    ) -> Result<String, ApprovalError>;
}

/// The external display surface. Fire-and-forget: the kernel logs failures
/// and never propagates them.
#[async_trait]
pub trait DisplaySystem: Send + Sync {
    async fn show_message(
        &self,
        text: &str,
        level: NoticeLevel,
        source: &str,
    ) -> Result<(), KernelError>;
}
