//! Canonical lifecycle event names.
//!
//! Events follow a `namespace:action` pattern. The kernel emits the session,
//! turn, cancellation, approval, and injection events itself; orchestrators
//! and modules emit the rest at their own boundaries. Hook handlers register
//! against these names.

// --- Session lifecycle ---

/// A session has started (payload `source`: "startup" / "resume" / "fork").
pub const SESSION_START: &str = "session:start";
/// A session has ended.
pub const SESSION_END: &str = "session:end";
/// A fatal error escaped a session turn.
pub const SESSION_ERROR: &str = "session:error";
/// A previously persisted session has been resumed.
pub const SESSION_RESUME: &str = "session:resume";
/// A child session has been forked from this one.
pub const SESSION_FORK: &str = "session:fork";

// --- Turn lifecycle ---

/// A turn has begun (fresh `turn_id`).
pub const TURN_START: &str = "turn:start";
/// A turn has finished, successfully or not.
pub const TURN_END: &str = "turn:end";
/// A turn failed with an error.
pub const TURN_ERROR: &str = "turn:error";

// --- Prompt lifecycle ---

pub const PROMPT_SUBMIT: &str = "prompt:submit";
pub const PROMPT_COMPLETE: &str = "prompt:complete";

// --- Provider calls ---

pub const PROVIDER_REQUEST: &str = "provider:request";
pub const PROVIDER_RESPONSE: &str = "provider:response";
pub const PROVIDER_ERROR: &str = "provider:error";

// --- Tool invocations ---

/// A tool is about to run. Hooks may deny or modify the call.
pub const TOOL_PRE: &str = "tool:pre";
/// A tool has finished running.
pub const TOOL_POST: &str = "tool:post";
pub const TOOL_ERROR: &str = "tool:error";

// --- Context management ---

pub const CONTEXT_PRE_COMPACT: &str = "context:pre_compact";
pub const CONTEXT_POST_COMPACT: &str = "context:post_compact";
/// A hook's context injection was accepted and applied.
pub const HOOK_CONTEXT_INJECTION: &str = "hook:context_injection";

// --- Cancellation ---

/// Cancellation was requested (payload `mode`: "graceful" / "immediate").
pub const CANCEL_REQUESTED: &str = "cancel:requested";
/// Cancellation teardown has run.
pub const CANCEL_COMPLETED: &str = "cancel:completed";

// --- Approvals ---

pub const APPROVAL_REQUESTED: &str = "approval:requested";
pub const APPROVAL_DECISION: &str = "approval:decision";
pub const APPROVAL_TIMEOUT: &str = "approval:timeout";

// --- User-facing notifications ---

pub const USER_NOTIFICATION: &str = "user:notification";

// --- Orchestration ---

pub const ORCHESTRATOR_COMPLETE: &str = "orchestrator:complete";

// --- Decision events (emit_and_collect consumers) ---

pub const DECISION_TOOL_RESOLUTION: &str = "decision:tool_resolution";
pub const DECISION_AGENT_RESOLUTION: &str = "decision:agent_resolution";
pub const DECISION_CONTEXT_RESOLUTION: &str = "decision:context_resolution";

/// Every canonical event name, for iteration and validation.
pub const ALL_EVENTS: &[&str] = &[
    SESSION_START,
    SESSION_END,
    SESSION_ERROR,
    SESSION_RESUME,
    SESSION_FORK,
    TURN_START,
    TURN_END,
    TURN_ERROR,
    PROMPT_SUBMIT,
    PROMPT_COMPLETE,
    PROVIDER_REQUEST,
    PROVIDER_RESPONSE,
    PROVIDER_ERROR,
    TOOL_PRE,
    TOOL_POST,
    TOOL_ERROR,
    CONTEXT_PRE_COMPACT,
    CONTEXT_POST_COMPACT,
    HOOK_CONTEXT_INJECTION,
    CANCEL_REQUESTED,
    CANCEL_COMPLETED,
    APPROVAL_REQUESTED,
    APPROVAL_DECISION,
    APPROVAL_TIMEOUT,
    USER_NOTIFICATION,
    ORCHESTRATOR_COMPLETE,
    DECISION_TOOL_RESOLUTION,
    DECISION_AGENT_RESOLUTION,
    DECISION_CONTEXT_RESOLUTION,
];
