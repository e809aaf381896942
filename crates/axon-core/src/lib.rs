//! Core types for the Axon agent runtime kernel.
//!
//! This crate defines the vocabulary shared between the kernel and every
//! pluggable module: causality identifiers, canonical event names, the hook
//! result model, the error taxonomy, the mount plan, the chat message model,
//! and the leaf module contracts (provider, tool, context, approval,
//! display). The runtime that wires these together lives in `axon-kernel`.

pub mod config;
pub mod contracts;
pub mod errors;
pub mod events;
pub mod hooks;
pub mod ids;
pub mod messages;

pub use config::{ModuleSpec, MountPlan};
pub use contracts::{
    ApprovalSystem, ChatStream, ContextManager, DisplaySystem, Observer, Provider, Tool,
    ToolOutcome,
};
pub use errors::{ApprovalError, HookError, KernelError};
pub use hooks::{
    ApprovalDefault, HookAction, HookHandler, HookResult, InjectionRole, NoticeLevel,
};
pub use ids::{now_rfc3339, SeqCounter, SessionId, SpanId, SpanScope, TurnId};
pub use messages::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, TokenUsage, ToolDescriptor, ToolInvocation,
};
