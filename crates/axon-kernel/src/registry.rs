//! Hook registration and priority-ordered dispatch.
//!
//! # Dispatch model
//!
//! Handlers for an event run **sequentially**, ordered by `(priority,
//! registration order)` with lower priorities first. Each handler's verdict
//! folds into the outcome:
//!
//! | Verdict          | Effect                                               |
//! |------------------|------------------------------------------------------|
//! | `continue`       | nothing                                              |
//! | `deny`           | short-circuit; later handlers never run              |
//! | `modify`         | replaces the payload flowing into later handlers     |
//! | `inject_context` | accumulated as `(text, role, hook_name)` records     |
//! | `ask_user`       | short-circuit; the caller resolves the approval      |
//!
//! Handler names are unique across the whole registry: re-registering a name
//! replaces the old record wherever it was. Handler errors are logged with
//! the handler's name and treated as `continue`; a misbehaving observer
//! never fails the event.
//!
//! # Envelope
//!
//! Every `emit` stamps `event`, `ts`, and `seq` (infrastructure-owned; caller
//! values are overwritten) and merges the registry's default fields, with
//! explicit payload fields winning.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use axon_core::hooks::{
    ApprovalDefault, HookAction, HookHandler, HookResult, InjectionRole, NoticeLevel,
};
use axon_core::ids::{now_rfc3339, SeqCounter};

struct HandlerRecord {
    event: String,
    name: String,
    priority: i32,
    order: u64,
    handler: Arc<dyn HookHandler>,
}

/// Snapshot of one registered handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerInfo {
    pub event: String,
    pub name: String,
    pub priority: i32,
}

/// One accumulated context injection from a hook emission.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextInjection {
    pub text: String,
    pub role: InjectionRole,
    pub hook_name: String,
    /// Counted and announced, but not persisted to the context manager.
    pub ephemeral: bool,
}

/// A user-facing notice carried out of a hook emission.
#[derive(Clone, Debug, PartialEq)]
pub struct UserNotice {
    pub text: String,
    pub level: NoticeLevel,
    /// Source tag: the result's explicit source, else the handler name.
    pub source: String,
    pub suppress_output: bool,
}

/// An approval request that short-circuited the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingApproval {
    pub hook_name: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub timeout_secs: f64,
    pub default: ApprovalDefault,
}

/// The reconciled control-flow decision of one emission.
#[derive(Clone, Debug, PartialEq)]
pub enum EmitAction {
    Continue,
    Deny { reason: String },
    AskUser(PendingApproval),
}

/// Everything one `emit` produced: the decision, the final payload, and the
/// side effects (injections, notices) for the coordinator to apply.
#[derive(Clone, Debug)]
pub struct EmitOutcome {
    pub action: EmitAction,
    pub payload: Value,
    pub injections: Vec<ContextInjection>,
    pub notices: Vec<UserNotice>,
}

impl EmitOutcome {
    pub fn is_deny(&self) -> bool {
        matches!(self.action, EmitAction::Deny { .. })
    }
}

/// Priority-ordered hook registry for one session.
pub struct HookRegistry {
    handlers: Mutex<Vec<HandlerRecord>>,
    defaults: Mutex<Map<String, Value>>,
    next_order: Mutex<u64>,
    seq: Arc<SeqCounter>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            defaults: Mutex::new(Map::new()),
            next_order: Mutex::new(0),
            seq: Arc::new(SeqCounter::new()),
        }
    }

    /// The session's sequence counter, shared with every emitted envelope.
    pub fn seq(&self) -> Arc<SeqCounter> {
        self.seq.clone()
    }

    /// Register `handler` for `event` under a globally unique `name`.
    ///
    /// Lower priority runs earlier; ties break on registration order. If the
    /// name is already registered, for any event, the old record is
    /// replaced.
    pub fn register(
        &self,
        event: &str,
        name: &str,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) {
        let mut handlers = self.handlers.lock();
        let replaced = {
            let before = handlers.len();
            handlers.retain(|record| record.name != name);
            handlers.len() < before
        };

        let order = {
            let mut next = self.next_order.lock();
            let order = *next;
            *next += 1;
            order
        };

        debug!(event, name, priority, replaced, "registered hook handler");
        handlers.push(HandlerRecord {
            event: event.to_owned(),
            name: name.to_owned(),
            priority,
            order,
            handler,
        });
    }

    /// Remove the handler with `name`, wherever it is registered.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|record| record.name != name);
        let removed = handlers.len() < before;
        if removed {
            debug!(name, "unregistered hook handler");
        }
        removed
    }

    /// Snapshot of registered handlers, optionally filtered by event,
    /// in dispatch order within each event.
    pub fn list_handlers(&self, event: Option<&str>) -> Vec<HandlerInfo> {
        let handlers = self.handlers.lock();
        let mut records: Vec<&HandlerRecord> = handlers
            .iter()
            .filter(|record| event.map_or(true, |e| record.event == e))
            .collect();
        records.sort_by(|a, b| {
            (a.event.as_str(), a.priority, a.order).cmp(&(b.event.as_str(), b.priority, b.order))
        });
        records
            .iter()
            .map(|record| HandlerInfo {
                event: record.event.clone(),
                name: record.name.clone(),
                priority: record.priority,
            })
            .collect()
    }

    /// Merge `fields` into the defaults applied to every emitted payload.
    /// Explicit payload fields still win over defaults.
    pub fn set_default_fields(&self, fields: Map<String, Value>) {
        let mut defaults = self.defaults.lock();
        for (key, value) in fields {
            defaults.insert(key, value);
        }
    }

    /// Set a single default field.
    pub fn set_default_field(&self, key: &str, value: Value) {
        self.defaults.lock().insert(key.to_owned(), value);
    }

    /// Remove a default field (e.g. `turn_id` when a turn closes).
    pub fn remove_default_field(&self, key: &str) {
        self.defaults.lock().remove(key);
    }

    /// Dispatch `event` to its handlers and reconcile their verdicts.
    pub async fn emit(&self, event: &str, payload: Value) -> EmitOutcome {
        let snapshot = self.snapshot_for(event);
        let stamped = self.stamp_envelope(event, payload);

        let mut current = stamped;
        let mut injections = Vec::new();
        let mut notices = Vec::new();

        for (name, handler) in &snapshot {
            let result = match handler.handle(event, current.clone()).await {
                Ok(result) => result,
                Err(error) => {
                    warn!(event, handler = %name, %error, "hook handler failed; continuing");
                    continue;
                }
            };

            collect_notice(&result, name, &mut notices);

            match result.action {
                HookAction::Continue => {}
                HookAction::Deny => {
                    let reason = result.reason.unwrap_or_else(|| "denied by hook".to_owned());
                    debug!(event, handler = %name, %reason, "hook denied event");
                    return EmitOutcome {
                        action: EmitAction::Deny { reason },
                        payload: current,
                        injections,
                        notices,
                    };
                }
                HookAction::Modify => {
                    if let Some(data) = result.data {
                        current = Value::Object(data.into_iter().collect());
                    }
                }
                HookAction::InjectContext => {
                    if let Some(text) = result.context_injection {
                        injections.push(ContextInjection {
                            text,
                            role: result.context_injection_role,
                            hook_name: name.clone(),
                            ephemeral: result.ephemeral,
                        });
                    }
                }
                HookAction::AskUser => {
                    let pending = PendingApproval {
                        hook_name: name.clone(),
                        prompt: result
                            .approval_prompt
                            .unwrap_or_else(|| "Allow this operation?".to_owned()),
                        options: result
                            .approval_options
                            .unwrap_or_else(|| vec!["Allow".to_owned(), "Deny".to_owned()]),
                        timeout_secs: result.approval_timeout,
                        default: result.approval_default,
                    };
                    return EmitOutcome {
                        action: EmitAction::AskUser(pending),
                        payload: current,
                        injections,
                        notices,
                    };
                }
            }
        }

        EmitOutcome {
            action: EmitAction::Continue,
            payload: current,
            injections,
            notices,
        }
    }

    /// Dispatch `event` and return every handler's raw verdict in dispatch
    /// order, without reconciliation or envelope stamping.
    ///
    /// `timeout` bounds the whole chain; handlers past the deadline are
    /// skipped with a warning. Used for decision events where the caller
    /// reduces the verdicts itself.
    pub async fn emit_and_collect(
        &self,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> Vec<HookResult> {
        let snapshot = self.snapshot_for(event);
        let deadline = Instant::now() + timeout;
        let mut verdicts = Vec::with_capacity(snapshot.len());

        for (name, handler) in &snapshot {
            match timeout_at(deadline, handler.handle(event, payload.clone())).await {
                Ok(Ok(result)) => verdicts.push(result),
                Ok(Err(error)) => {
                    warn!(event, handler = %name, %error, "hook handler failed during collect");
                }
                Err(_) => {
                    warn!(event, handler = %name, ?timeout, "hook collect deadline exceeded");
                    break;
                }
            }
        }

        verdicts
    }

    /// Handlers for `event`, sorted by `(priority, registration order)`.
    fn snapshot_for(&self, event: &str) -> Vec<(String, Arc<dyn HookHandler>)> {
        let handlers = self.handlers.lock();
        let mut matching: Vec<&HandlerRecord> = handlers
            .iter()
            .filter(|record| record.event == event)
            .collect();
        matching.sort_by_key(|record| (record.priority, record.order));
        matching
            .iter()
            .map(|record| (record.name.clone(), record.handler.clone()))
            .collect()
    }

    /// Build the event envelope: defaults under the payload, then the
    /// infrastructure-owned `event`, `ts`, and `seq` fields on top.
    fn stamp_envelope(&self, event: &str, payload: Value) -> Value {
        let mut merged = self.defaults.lock().clone();
        if let Value::Object(fields) = payload {
            for (key, value) in fields {
                merged.insert(key, value);
            }
        }
        merged.insert("event".to_owned(), Value::String(event.to_owned()));
        merged.insert("ts".to_owned(), Value::String(now_rfc3339()));
        merged.insert("seq".to_owned(), Value::from(self.seq.next()));
        Value::Object(merged)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("handler_count", &self.handlers.lock().len())
            .finish()
    }
}

fn collect_notice(result: &HookResult, handler_name: &str, notices: &mut Vec<UserNotice>) {
    if let Some(text) = &result.user_message {
        notices.push(UserNotice {
            text: text.clone(),
            level: result.user_message_level,
            source: result
                .user_message_source
                .clone()
                .unwrap_or_else(|| handler_name.to_owned()),
            suppress_output: result.suppress_output,
        });
    }
}
