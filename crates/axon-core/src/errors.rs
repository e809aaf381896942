//! Error taxonomy for the kernel.
//!
//! Propagation follows a non-interference discipline: anything that would
//! break session invariants (uninitialized execute, unresolvable
//! orchestrator or context, occupied singleton mount) is raised; everything
//! else is logged and contained at its boundary. Hook failures never fail an
//! emission, approval failures never crash a session, and a failing
//! contribution only drops itself.

use std::time::Duration;

/// Errors surfaced by hook handlers and dispatch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HookError {
    #[error("hook handler '{name}' failed: {message}")]
    Handler { name: String, message: String },

    #[error("hook dispatch timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the external approval system.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApprovalError {
    /// The user did not answer in time. The kernel maps this to the hook's
    /// `approval_default`; it is never re-raised to the orchestrator.
    #[error("approval timed out after {0:?}")]
    Timeout(Duration),

    #[error("no approval system available")]
    Unavailable,

    #[error("{0}")]
    Other(String),
}

/// Top-level kernel error.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The mount plan is missing required keys or malformed.
    #[error("invalid mount plan: {0}")]
    ConfigInvalid(String),

    /// The loader could not resolve a module identifier.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// A module's mount entry point failed.
    #[error("module '{module}' failed to mount: {reason}")]
    ModuleLoadFailure { module: String, reason: String },

    /// `execute` was called before `initialize`.
    #[error("session not initialized")]
    NotInitialized,

    /// A singleton mount point is already occupied.
    #[error("mount point '{point}' already occupied by '{existing}'")]
    MountConflict { point: String, existing: String },

    /// A hook injection exceeded the hard per-injection byte limit.
    #[error("context injection of {size} bytes exceeds the {limit}-byte limit")]
    InjectionTooLarge { size: usize, limit: usize },

    /// The turn was interrupted by immediate cancellation.
    #[error("cancelled")]
    Cancelled,

    /// A context manager operation failed.
    #[error("context error: {0}")]
    Context(String),

    /// A provider call failed (surfaced through orchestrators).
    #[error("provider error: {0}")]
    Provider(String),

    /// An orchestrator run failed.
    #[error("orchestration error: {0}")]
    Orchestration(String),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl KernelError {
    /// Whether this error aborts the whole session rather than one turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid(_)
                | Self::ModuleNotFound(_)
                | Self::ModuleLoadFailure { .. }
                | Self::NotInitialized
                | Self::MountConflict { .. }
        )
    }

    /// Short classification tag for logging and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "config_invalid",
            Self::ModuleNotFound(_) => "module_not_found",
            Self::ModuleLoadFailure { .. } => "module_load_failure",
            Self::NotInitialized => "not_initialized",
            Self::MountConflict { .. } => "mount_conflict",
            Self::InjectionTooLarge { .. } => "injection_too_large",
            Self::Cancelled => "cancelled",
            Self::Context(_) => "context",
            Self::Provider(_) => "provider",
            Self::Orchestration(_) => "orchestration",
            Self::Hook(_) => "hook",
            Self::Approval(_) => "approval",
        }
    }
}
