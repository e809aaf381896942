//! The coordinator: per-session registry and infrastructure context.
//!
//! Modules discover each other here at run time: the mount table holds the
//! installed modules, the capability map and contribution channels carry
//! cross-module wiring, and `dispatch` is the single entry point that fans a
//! lifecycle event out to hooks and folds the verdicts, injections, user
//! notices, and approvals into one decision the orchestrator acts on.
//!
//! # Injection budgets
//!
//! Hook-originated context injections are bounded: a hard per-injection
//! limit of 10 KiB (oversized injections are dropped with a logged error)
//! and a soft per-turn budget of 4 000 bytes (exceeding it only warns). The
//! turn counter resets at each `execute`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use axon_core::config::{ModuleSpec, MountPlan};
use axon_core::contracts::{ApprovalSystem, ContextManager, DisplaySystem, Observer, Provider, Tool};
use axon_core::errors::{ApprovalError, KernelError};
use axon_core::events;
use axon_core::hooks::{ApprovalDefault, InjectionRole};
use axon_core::ids::{now_rfc3339, SessionId, TurnId};
use axon_core::messages::{ChatMessage, ChatRole};

use crate::cancellation::CancellationToken;
use crate::module::{CleanupFn, ModuleInstance, ModuleLoader, Orchestrator};
use crate::registry::{ContextInjection, EmitAction, HookRegistry, PendingApproval, UserNotice};

/// Hard per-injection limit, in bytes. Larger injections are dropped.
pub const INJECTION_HARD_LIMIT: usize = 10 * 1024;

/// Soft per-turn injection budget, in bytes. Exceeding it warns but
/// continues.
pub const INJECTION_TURN_BUDGET: usize = 4_000;

/// Mount point names, fixed at five.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MountPoint {
    Orchestrator,
    Context,
    Providers,
    Tools,
    Hooks,
}

impl MountPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Context => "context",
            Self::Providers => "providers",
            Self::Tools => "tools",
            Self::Hooks => "hooks",
        }
    }

    fn is_singleton(self) -> bool {
        matches!(self, Self::Orchestrator | Self::Context)
    }
}

impl std::fmt::Display for MountPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reconciled decision `dispatch` hands back to its caller.
#[derive(Clone, Debug, PartialEq)]
pub enum EventVerdict {
    /// Proceed; `payload` carries any hook modifications.
    Continue { payload: Value },
    /// The operation was denied by a hook or an approval decision.
    Deny { reason: String },
}

impl EventVerdict {
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}

/// Async contribution callback: returns this contributor's chunk.
pub type ContributorFn = Box<
    dyn Fn() -> BoxFuture<'static, Result<Value, Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

struct Contributor {
    name: String,
    callback: ContributorFn,
}

struct CleanupEntry {
    /// `Some((point, name))` for module teardowns, `None` for plain
    /// `register_cleanup` entries.
    mount_key: Option<(MountPoint, String)>,
    callback: CleanupFn,
}

type ApprovalCacheKey = (String, String, Vec<String>);

/// Per-session coordination hub.
pub struct Coordinator {
    session_id: SessionId,
    parent_id: Option<SessionId>,
    plan: MountPlan,
    hooks: Arc<HookRegistry>,
    cancellation: CancellationToken,
    loader: Arc<dyn ModuleLoader>,
    approval: Option<Arc<dyn ApprovalSystem>>,
    display: Option<Arc<dyn DisplaySystem>>,

    orchestrator: Mutex<Option<(String, Arc<dyn Orchestrator>)>>,
    context: Mutex<Option<(String, Arc<dyn ContextManager>)>>,
    providers: Mutex<Vec<(String, Arc<dyn Provider>)>>,
    tools: Mutex<Vec<(String, Arc<dyn Tool>)>>,
    observers: Mutex<Vec<(String, Arc<dyn Observer>)>>,

    capabilities: Mutex<HashMap<String, Value>>,
    channels: Mutex<HashMap<String, Vec<Contributor>>>,
    cleanups: Mutex<Vec<CleanupEntry>>,

    current_turn: Mutex<Option<TurnId>>,
    turn_injected_bytes: Mutex<usize>,
    /// Allow-forever approval decisions for this session.
    approval_cache: Mutex<HashMap<ApprovalCacheKey, String>>,
}

impl Coordinator {
    pub fn new(
        session_id: SessionId,
        parent_id: Option<SessionId>,
        plan: MountPlan,
        loader: Arc<dyn ModuleLoader>,
        approval: Option<Arc<dyn ApprovalSystem>>,
        display: Option<Arc<dyn DisplaySystem>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            parent_id,
            plan,
            hooks: Arc::new(HookRegistry::new()),
            cancellation: CancellationToken::new(),
            loader,
            approval,
            display,
            orchestrator: Mutex::new(None),
            context: Mutex::new(None),
            providers: Mutex::new(Vec::new()),
            tools: Mutex::new(Vec::new()),
            observers: Mutex::new(Vec::new()),
            capabilities: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            cleanups: Mutex::new(Vec::new()),
            current_turn: Mutex::new(None),
            turn_injected_bytes: Mutex::new(0),
            approval_cache: Mutex::new(HashMap::new()),
        })
    }

    // -- Infrastructure accessors --

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn parent_id(&self) -> Option<&SessionId> {
        self.parent_id.as_ref()
    }

    /// The validated mount plan.
    pub fn plan(&self) -> &MountPlan {
        &self.plan
    }

    /// The raw mount plan tree, verbatim.
    pub fn config(&self) -> &Value {
        self.plan.raw()
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    pub fn approval_system(&self) -> Option<&Arc<dyn ApprovalSystem>> {
        self.approval.as_ref()
    }

    pub fn display_system(&self) -> Option<&Arc<dyn DisplaySystem>> {
        self.display.as_ref()
    }

    /// The turn currently in progress, if any.
    pub fn current_turn(&self) -> Option<TurnId> {
        self.current_turn.lock().clone()
    }

    /// Config overlays for forked child sessions; never loaded as modules.
    pub fn agent_overlays(&self) -> &[ModuleSpec] {
        &self.plan.agents
    }

    // -- Mount table --

    /// Install a module instance, optionally overriding its name.
    ///
    /// Singleton mount points reject a second mount with
    /// [`KernelError::MountConflict`]. Multi mount points replace an entry
    /// with the same name in place, preserving insertion order.
    pub fn mount(
        &self,
        instance: ModuleInstance,
        name: Option<String>,
        cleanup: Option<CleanupFn>,
    ) -> Result<(), KernelError> {
        let (point, name) = match &instance {
            ModuleInstance::Orchestrator(_) => {
                (MountPoint::Orchestrator, name.unwrap_or_else(|| "orchestrator".to_owned()))
            }
            ModuleInstance::Context(_) => {
                (MountPoint::Context, name.unwrap_or_else(|| "context".to_owned()))
            }
            ModuleInstance::Provider(p) => {
                (MountPoint::Providers, name.unwrap_or_else(|| p.name().to_owned()))
            }
            ModuleInstance::Tool(t) => {
                (MountPoint::Tools, name.unwrap_or_else(|| t.name().to_owned()))
            }
            ModuleInstance::Observer(o) => {
                (MountPoint::Hooks, name.unwrap_or_else(|| o.name().to_owned()))
            }
        };

        match instance {
            ModuleInstance::Orchestrator(orchestrator) => {
                let mut slot = self.orchestrator.lock();
                if let Some((existing, _)) = slot.as_ref() {
                    return Err(KernelError::MountConflict {
                        point: point.as_str().to_owned(),
                        existing: existing.clone(),
                    });
                }
                *slot = Some((name.clone(), orchestrator));
            }
            ModuleInstance::Context(context) => {
                let mut slot = self.context.lock();
                if let Some((existing, _)) = slot.as_ref() {
                    return Err(KernelError::MountConflict {
                        point: point.as_str().to_owned(),
                        existing: existing.clone(),
                    });
                }
                *slot = Some((name.clone(), context));
            }
            ModuleInstance::Provider(provider) => {
                upsert(&mut self.providers.lock(), &name, provider);
            }
            ModuleInstance::Tool(tool) => {
                upsert(&mut self.tools.lock(), &name, tool);
            }
            ModuleInstance::Observer(observer) => {
                upsert(&mut self.observers.lock(), &name, observer);
            }
        }

        if let Some(callback) = cleanup {
            self.cleanups.lock().push(CleanupEntry {
                mount_key: Some((point, name.clone())),
                callback,
            });
        }

        info!(point = %point, name = %name, "mounted module");
        Ok(())
    }

    /// Remove a module and run any teardown it registered at mount time.
    ///
    /// Singleton points ignore `name`; multi points require it. Returns
    /// `true` if something was unmounted.
    pub async fn unmount(&self, point: MountPoint, name: Option<&str>) -> bool {
        let removed_name: Option<String> = match point {
            MountPoint::Orchestrator => self.orchestrator.lock().take().map(|(n, _)| n),
            MountPoint::Context => self.context.lock().take().map(|(n, _)| n),
            MountPoint::Providers => name.and_then(|n| remove(&mut self.providers.lock(), n)),
            MountPoint::Tools => name.and_then(|n| remove(&mut self.tools.lock(), n)),
            MountPoint::Hooks => name.and_then(|n| remove(&mut self.observers.lock(), n)),
        };

        let Some(removed_name) = removed_name else {
            return false;
        };

        let key = (point, removed_name.clone());
        let teardowns: Vec<CleanupFn> = {
            let mut cleanups = self.cleanups.lock();
            let mut taken = Vec::new();
            let mut index = 0;
            while index < cleanups.len() {
                if cleanups[index].mount_key.as_ref() == Some(&key) {
                    taken.push(cleanups.remove(index).callback);
                } else {
                    index += 1;
                }
            }
            taken
        };

        for teardown in teardowns {
            if let Err(error) = teardown().await {
                warn!(point = %point, name = %removed_name, %error, "module teardown failed");
            }
        }

        info!(point = %point, name = %removed_name, "unmounted module");
        true
    }

    pub fn orchestrator(&self) -> Option<Arc<dyn Orchestrator>> {
        self.orchestrator.lock().as_ref().map(|(_, o)| o.clone())
    }

    pub fn context(&self) -> Option<Arc<dyn ContextManager>> {
        self.context.lock().as_ref().map(|(_, c)| c.clone())
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        lookup(&self.providers.lock(), name)
    }

    /// All providers in insertion order.
    pub fn providers(&self) -> Vec<(String, Arc<dyn Provider>)> {
        self.providers.lock().clone()
    }

    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        lookup(&self.tools.lock(), name)
    }

    /// All tools in insertion order.
    pub fn tools(&self) -> Vec<(String, Arc<dyn Tool>)> {
        self.tools.lock().clone()
    }

    /// All mounted hook observers in insertion order.
    pub fn observers(&self) -> Vec<(String, Arc<dyn Observer>)> {
        self.observers.lock().clone()
    }

    /// Names installed at a mount point, in insertion order.
    pub fn mounted_names(&self, point: MountPoint) -> Vec<String> {
        match point {
            MountPoint::Orchestrator => {
                self.orchestrator.lock().iter().map(|(n, _)| n.clone()).collect()
            }
            MountPoint::Context => self.context.lock().iter().map(|(n, _)| n.clone()).collect(),
            MountPoint::Providers => {
                self.providers.lock().iter().map(|(n, _)| n.clone()).collect()
            }
            MountPoint::Tools => self.tools.lock().iter().map(|(n, _)| n.clone()).collect(),
            MountPoint::Hooks => self.observers.lock().iter().map(|(n, _)| n.clone()).collect(),
        }
    }

    // -- Capabilities --

    /// Register a named capability. Last writer wins.
    pub fn register_capability(&self, name: &str, value: Value) {
        debug!(name, "registered capability");
        self.capabilities.lock().insert(name.to_owned(), value);
    }

    /// Look up a capability. `None` is the typed miss.
    pub fn get_capability(&self, name: &str) -> Option<Value> {
        self.capabilities.lock().get(name).cloned()
    }

    // -- Contribution channels --

    /// Append a contributor to a named channel.
    pub fn register_contributor(&self, channel: &str, name: &str, callback: ContributorFn) {
        self.channels
            .lock()
            .entry(channel.to_owned())
            .or_default()
            .push(Contributor {
                name: name.to_owned(),
                callback,
            });
    }

    /// Invoke every contributor on `channel` concurrently and concatenate
    /// the successful outputs in registration order. Failing contributors
    /// are dropped with a warning.
    pub async fn collect_contributions(&self, channel: &str) -> Vec<Value> {
        let pending: Vec<(String, _)> = {
            let channels = self.channels.lock();
            match channels.get(channel) {
                Some(entries) => entries
                    .iter()
                    .map(|c| (c.name.clone(), (c.callback)()))
                    .collect(),
                None => return Vec::new(),
            }
        };

        let (names, futures): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let results = join_all(futures).await;

        let mut contributions = Vec::with_capacity(results.len());
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(value) => contributions.push(value),
                Err(error) => {
                    warn!(channel, contributor = %name, %error, "contribution dropped");
                }
            }
        }
        contributions
    }

    // -- Cleanup --

    /// Register a teardown to run at session cleanup.
    pub fn register_cleanup(&self, callback: CleanupFn) {
        self.cleanups.lock().push(CleanupEntry {
            mount_key: None,
            callback,
        });
    }

    /// Run all registered teardowns in reverse registration order. A failing
    /// teardown is logged and does not stop the rest.
    pub async fn cleanup(&self) {
        let entries: Vec<CleanupEntry> = {
            let mut cleanups = self.cleanups.lock();
            cleanups.drain(..).collect()
        };

        for entry in entries.into_iter().rev() {
            if let Err(error) = (entry.callback)().await {
                error!(%error, "cleanup callback failed");
            }
        }
    }

    // -- Turn tracking --

    /// Open a turn: record its id and zero the injection counter.
    pub fn begin_turn(&self, turn_id: TurnId) {
        *self.current_turn.lock() = Some(turn_id);
        *self.turn_injected_bytes.lock() = 0;
    }

    /// Close the current turn.
    pub fn end_turn(&self) {
        *self.current_turn.lock() = None;
    }

    /// Zero the per-turn injection counter without touching the turn id.
    pub fn reset_turn(&self) {
        *self.turn_injected_bytes.lock() = 0;
    }

    /// Bytes of hook content accepted into the context this turn.
    pub fn turn_injected_bytes(&self) -> usize {
        *self.turn_injected_bytes.lock()
    }

    // -- Event dispatch --

    /// Fan `event` out to hooks and fold everything into one verdict.
    ///
    /// Applies accumulated context injections against the mounted context,
    /// routes user notices to the display system, and resolves any approval
    /// request before returning.
    pub async fn dispatch(&self, event: &str, payload: Value) -> EventVerdict {
        let outcome = self.hooks.emit(event, payload).await;

        self.apply_injections(event, &outcome.injections).await;
        self.route_notices(&outcome.notices).await;

        match outcome.action {
            EmitAction::Continue => EventVerdict::Continue {
                payload: outcome.payload,
            },
            EmitAction::Deny { reason } => EventVerdict::Deny { reason },
            EmitAction::AskUser(pending) => {
                self.resolve_approval(pending, outcome.payload).await
            }
        }
    }

    /// Emit an event for observability only: hook verdicts, injections, and
    /// notices are ignored. Used for the kernel's own announcements
    /// (approvals, cancellation, injection audit) where reacting to hook
    /// side effects would recurse.
    pub async fn announce(&self, event: &str, payload: Value) {
        let _ = self.hooks.emit(event, payload).await;
    }

    async fn apply_injections(&self, event: &str, injections: &[ContextInjection]) {
        for injection in injections {
            let bytes = injection.text.len();

            if bytes > INJECTION_HARD_LIMIT {
                let err = KernelError::InjectionTooLarge {
                    size: bytes,
                    limit: INJECTION_HARD_LIMIT,
                };
                error!(hook = %injection.hook_name, %err, "dropping oversized injection");
                self.announce(
                    events::HOOK_CONTEXT_INJECTION,
                    json!({
                        "hook_name": injection.hook_name,
                        "source_event": event,
                        "bytes": bytes,
                        "accepted": false,
                        "error": err.kind(),
                    }),
                )
                .await;
                continue;
            }

            if !injection.ephemeral {
                let Some(context) = self.context() else {
                    warn!(hook = %injection.hook_name, "injection skipped: no context mounted");
                    continue;
                };
                let message = ChatMessage::new(
                    injection_role_to_chat(injection.role),
                    injection.text.clone(),
                )
                .with_metadata(HashMap::from([
                    ("source".to_owned(), json!("hook")),
                    ("hook_name".to_owned(), json!(injection.hook_name)),
                    ("event".to_owned(), json!(event)),
                    ("timestamp".to_owned(), json!(now_rfc3339())),
                ]));
                if let Err(error) = context.add_message(message).await {
                    warn!(hook = %injection.hook_name, %error, "injection rejected by context");
                    continue;
                }
            }

            let total = {
                let mut counter = self.turn_injected_bytes.lock();
                *counter += bytes;
                *counter
            };
            if total > INJECTION_TURN_BUDGET {
                warn!(
                    hook = %injection.hook_name,
                    total,
                    budget = INJECTION_TURN_BUDGET,
                    "per-turn injection budget exceeded"
                );
            }

            self.announce(
                events::HOOK_CONTEXT_INJECTION,
                json!({
                    "hook_name": injection.hook_name,
                    "source_event": event,
                    "bytes": bytes,
                    "role": injection.role.as_str(),
                    "ephemeral": injection.ephemeral,
                    "accepted": true,
                }),
            )
            .await;
        }
    }

    async fn route_notices(&self, notices: &[UserNotice]) {
        for notice in notices {
            let source = format!("hook:{}", notice.source);
            match &self.display {
                Some(display) => {
                    if let Err(error) = display
                        .show_message(&notice.text, notice.level, &source)
                        .await
                    {
                        warn!(%source, %error, "display system rejected message");
                    }
                }
                None => {
                    info!(%source, level = notice.level.as_str(), "{}", notice.text);
                }
            }
            self.announce(
                events::USER_NOTIFICATION,
                json!({
                    "text": notice.text,
                    "level": notice.level.as_str(),
                    "source": source,
                }),
            )
            .await;
        }
    }

    /// Resolve an `ask_user` short-circuit into a continue/deny verdict.
    /// An allow decision continues with the payload as it stood at the ask.
    async fn resolve_approval(&self, pending: PendingApproval, payload: Value) -> EventVerdict {
        let mut sorted_options = pending.options.clone();
        sorted_options.sort();
        let cache_key: ApprovalCacheKey = (
            pending.hook_name.clone(),
            pending.prompt.clone(),
            sorted_options,
        );

        if let Some(cached) = self.approval_cache.lock().get(&cache_key).cloned() {
            debug!(hook = %pending.hook_name, decision = %cached, "approval served from cache");
            self.announce(
                events::APPROVAL_DECISION,
                json!({
                    "hook_name": pending.hook_name,
                    "prompt": pending.prompt,
                    "decision": cached,
                    "cached": true,
                }),
            )
            .await;
            return EventVerdict::Continue { payload };
        }

        self.announce(
            events::APPROVAL_REQUESTED,
            json!({
                "hook_name": pending.hook_name,
                "prompt": pending.prompt,
                "options": pending.options,
                "timeout_secs": pending.timeout_secs,
            }),
        )
        .await;

        let Some(approval) = self.approval.clone() else {
            warn!(hook = %pending.hook_name, "approval requested but no approval system mounted");
            return EventVerdict::Deny {
                reason: "no approval system available".to_owned(),
            };
        };

        let timeout = Duration::from_secs_f64(pending.timeout_secs.max(0.0));
        let decision = approval
            .request_approval(&pending.prompt, &pending.options, timeout, pending.default)
            .await;

        match decision {
            Ok(choice) => {
                self.announce(
                    events::APPROVAL_DECISION,
                    json!({
                        "hook_name": pending.hook_name,
                        "prompt": pending.prompt,
                        "decision": choice,
                        "cached": false,
                    }),
                )
                .await;

                if !pending.options.iter().any(|option| option == &choice) {
                    warn!(hook = %pending.hook_name, %choice, "approval response not among options");
                    return EventVerdict::Deny {
                        reason: format!("invalid approval response: {choice}"),
                    };
                }

                if is_deny_option(&choice) {
                    return EventVerdict::Deny {
                        reason: format!("user denied: {}", pending.prompt),
                    };
                }

                if choice.to_lowercase().contains("always") {
                    self.approval_cache.lock().insert(cache_key, choice);
                }

                EventVerdict::Continue { payload }
            }
            Err(ApprovalError::Timeout(elapsed)) => {
                warn!(hook = %pending.hook_name, ?elapsed, "approval timed out; applying default");
                self.announce(
                    events::APPROVAL_TIMEOUT,
                    json!({
                        "hook_name": pending.hook_name,
                        "prompt": pending.prompt,
                        "default": default_str(pending.default),
                    }),
                )
                .await;
                self.apply_default(&pending, payload)
            }
            Err(error) => {
                warn!(hook = %pending.hook_name, %error, "approval system failed; applying default");
                self.apply_default(&pending, payload)
            }
        }
    }

    fn apply_default(&self, pending: &PendingApproval, payload: Value) -> EventVerdict {
        match pending.default {
            ApprovalDefault::Allow => EventVerdict::Continue { payload },
            ApprovalDefault::Deny => EventVerdict::Deny {
                reason: format!("approval timeout - denied by default: {}", pending.prompt),
            },
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("session_id", &self.session_id)
            .field("providers", &self.providers.lock().len())
            .field("tools", &self.tools.lock().len())
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}

fn upsert<T>(entries: &mut Vec<(String, Arc<T>)>, name: &str, value: Arc<T>)
where
    T: ?Sized,
{
    if let Some(slot) = entries.iter_mut().find(|(n, _)| n == name) {
        slot.1 = value;
    } else {
        entries.push((name.to_owned(), value));
    }
}

fn remove<T>(entries: &mut Vec<(String, Arc<T>)>, name: &str) -> Option<String>
where
    T: ?Sized,
{
    let index = entries.iter().position(|(n, _)| n == name)?;
    Some(entries.remove(index).0)
}

fn lookup<T>(entries: &[(String, Arc<T>)], name: &str) -> Option<Arc<T>>
where
    T: ?Sized,
{
    entries
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, value)| value.clone())
}

fn injection_role_to_chat(role: InjectionRole) -> ChatRole {
    match role {
        InjectionRole::System => ChatRole::System,
        InjectionRole::User => ChatRole::User,
        InjectionRole::Assistant => ChatRole::Assistant,
    }
}

fn is_deny_option(choice: &str) -> bool {
    let normalized = choice.trim().to_lowercase();
    normalized.starts_with("deny") || normalized == "no"
}

fn default_str(default: ApprovalDefault) -> &'static str {
    match default {
        ApprovalDefault::Allow => "allow",
        ApprovalDefault::Deny => "deny",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_option_classification() {
        assert!(is_deny_option("Deny"));
        assert!(is_deny_option("deny always"));
        assert!(is_deny_option("  No "));
        assert!(!is_deny_option("Allow"));
        assert!(!is_deny_option("Allow always"));
        assert!(!is_deny_option("Yes"));
    }

    #[test]
    fn mount_point_names() {
        assert_eq!(MountPoint::Orchestrator.as_str(), "orchestrator");
        assert_eq!(MountPoint::Hooks.as_str(), "hooks");
        assert!(MountPoint::Context.is_singleton());
        assert!(!MountPoint::Tools.is_singleton());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut entries: Vec<(String, Arc<str>)> = Vec::new();
        upsert(&mut entries, "a", Arc::from("one"));
        upsert(&mut entries, "b", Arc::from("two"));
        upsert(&mut entries, "a", Arc::from("three"));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert_eq!(&*entries[0].1, "three");
        assert_eq!(entries[1].0, "b");
    }

    #[test]
    fn remove_returns_stored_name() {
        let mut entries: Vec<(String, Arc<str>)> = vec![
            ("a".to_owned(), Arc::from("one")),
            ("b".to_owned(), Arc::from("two")),
        ];
        assert_eq!(remove(&mut entries, "a").as_deref(), Some("a"));
        assert!(remove(&mut entries, "a").is_none());
        assert_eq!(entries.len(), 1);
    }
}
