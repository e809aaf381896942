//! Hook result model and handler contract.
//!
//! A hook observes a named lifecycle event and returns a [`HookResult`]
//! whose `action` field steers the dispatch pipeline:
//!
//! | Action           | Pipeline behavior                                   |
//! |------------------|-----------------------------------------------------|
//! | `continue`       | proceed to the next handler                         |
//! | `deny`           | short-circuit, return the denial                    |
//! | `modify`         | replace the payload flowing to later handlers       |
//! | `inject_context` | accumulate text for the conversation context        |
//! | `ask_user`       | short-circuit, caller resolves the approval         |

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::HookError;

/// The action a hook handler requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    #[default]
    Continue,
    Deny,
    Modify,
    InjectContext,
    AskUser,
}

/// Conversation role for injected context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionRole {
    /// Environmental feedback (default).
    #[default]
    System,
    /// Simulated user input.
    User,
    /// Agent self-talk.
    Assistant,
}

impl InjectionRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// What an approval resolves to when the user never answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDefault {
    Allow,
    #[default]
    Deny,
}

/// Severity of a user-facing notice from a hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

fn default_approval_timeout() -> f64 {
    300.0
}

/// Result returned by a hook handler.
///
/// Only the fields relevant to the chosen action need to be set; everything
/// defaults to a plain `continue`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    #[serde(default)]
    pub action: HookAction,

    /// Explanation for a denial, surfaced to the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Replacement payload when `action == Modify`. Chains to later handlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, Value>>,

    /// Text to insert into the conversation when `action == InjectContext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_injection: Option<String>,

    #[serde(default)]
    pub context_injection_role: InjectionRole,

    /// Injection is counted and announced but not persisted to the context.
    #[serde(default)]
    pub ephemeral: bool,

    /// Question to put to the user when `action == AskUser`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_prompt: Option<String>,

    /// Choices offered to the user. Defaults to Allow / Deny at the
    /// delegation site when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_options: Option<Vec<String>>,

    /// Seconds to wait for the user before applying `approval_default`.
    #[serde(default = "default_approval_timeout")]
    pub approval_timeout: f64,

    #[serde(default)]
    pub approval_default: ApprovalDefault,

    /// Text for the display system, independent of context injection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,

    #[serde(default)]
    pub user_message_level: NoticeLevel,

    /// Source tag override for the display system (falls back to the
    /// handler's registered name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message_source: Option<String>,

    /// Hide this hook's own output from the transcript.
    #[serde(default)]
    pub suppress_output: bool,
}

impl Default for HookResult {
    fn default() -> Self {
        Self {
            action: HookAction::Continue,
            reason: None,
            data: None,
            context_injection: None,
            context_injection_role: InjectionRole::System,
            ephemeral: false,
            approval_prompt: None,
            approval_options: None,
            approval_timeout: default_approval_timeout(),
            approval_default: ApprovalDefault::Deny,
            user_message: None,
            user_message_level: NoticeLevel::Info,
            user_message_source: None,
            suppress_output: false,
        }
    }
}

impl HookResult {
    /// Proceed without touching anything.
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Block the operation with an explanation.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            action: HookAction::Deny,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Replace the event payload for later handlers.
    pub fn modify(data: HashMap<String, Value>) -> Self {
        Self {
            action: HookAction::Modify,
            data: Some(data),
            ..Default::default()
        }
    }

    /// Insert text into the conversation context.
    pub fn inject(text: impl Into<String>, role: InjectionRole) -> Self {
        Self {
            action: HookAction::InjectContext,
            context_injection: Some(text.into()),
            context_injection_role: role,
            ..Default::default()
        }
    }

    /// Ask the user before proceeding.
    pub fn ask_user(prompt: impl Into<String>) -> Self {
        Self {
            action: HookAction::AskUser,
            approval_prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_user_message(mut self, text: impl Into<String>, level: NoticeLevel) -> Self {
        self.user_message = Some(text.into());
        self.user_message_level = level;
        self
    }

    pub fn is_deny(&self) -> bool {
        self.action == HookAction::Deny
    }
}

/// Contract for a registered hook handler.
///
/// Handlers receive the event name and the current payload (after default
/// field merging and any upstream modifications) and return their verdict.
/// Errors are contained by the dispatcher: a failing handler is logged and
/// treated as `continue`.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, event: &str, payload: Value) -> Result<HookResult, HookError>;
}
