//! Session lifecycle: create → initialize → execute turns → fork → cleanup.
//!
//! A session owns exactly one coordinator. `initialize` walks the mount plan
//! in dependency order (context → providers → tools → hook observers →
//! orchestrator); a missing orchestrator or context is fatal, anything else
//! is logged and skipped. `execute` scopes one turn: fresh turn id, reset
//! injection budget, `turn:start` / `turn:end` bracketing the orchestrator
//! run. Forked children inherit the plan (with a shallow-merged override),
//! the loader, and the approval/display surfaces, and record lineage.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use axon_core::config::{ModuleSpec, MountPlan};
use axon_core::contracts::{ApprovalSystem, DisplaySystem};
use axon_core::errors::KernelError;
use axon_core::events;
use axon_core::ids::{SessionId, TurnId};

use crate::coordinator::Coordinator;
use crate::module::{ModuleInstance, ModuleLoader};

/// Observable lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    CleanedUp,
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    plan: MountPlan,
    loader: Arc<dyn ModuleLoader>,
    session_id: Option<SessionId>,
    parent_id: Option<SessionId>,
    approval: Option<Arc<dyn ApprovalSystem>>,
    display: Option<Arc<dyn DisplaySystem>>,
    resumed: bool,
}

impl SessionBuilder {
    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn parent_id(mut self, parent_id: SessionId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn approval_system(mut self, approval: Arc<dyn ApprovalSystem>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn display_system(mut self, display: Arc<dyn DisplaySystem>) -> Self {
        self.display = Some(display);
        self
    }

    /// Mark the session as resumed from persisted state; `session:start`
    /// will carry `source: "resume"`.
    pub fn resumed(mut self) -> Self {
        self.resumed = true;
        self
    }

    pub fn build(self) -> Session {
        let session_id = self.session_id.unwrap_or_default();

        let coordinator = Coordinator::new(
            session_id.clone(),
            self.parent_id.clone(),
            self.plan,
            self.loader,
            self.approval,
            self.display,
        );

        // Seed causality defaults so every event carries lineage.
        let hooks = coordinator.hooks();
        hooks.set_default_field("session_id", json!(session_id.as_str()));
        hooks.set_default_field(
            "parent_id",
            match &self.parent_id {
                Some(parent) => json!(parent.as_str()),
                None => Value::Null,
            },
        );

        Session {
            session_id,
            parent_id: self.parent_id,
            coordinator,
            resumed: self.resumed,
            state: Mutex::new(SessionState::Uninitialized),
        }
    }
}

/// One agent session: the top-level entry point of the kernel.
pub struct Session {
    session_id: SessionId,
    parent_id: Option<SessionId>,
    coordinator: Arc<Coordinator>,
    resumed: bool,
    state: Mutex<SessionState>,
}

impl Session {
    /// Start building a session from a mount plan and a loader.
    pub fn builder(plan: MountPlan, loader: Arc<dyn ModuleLoader>) -> SessionBuilder {
        SessionBuilder {
            plan,
            loader,
            session_id: None,
            parent_id: None,
            approval: None,
            display: None,
            resumed: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn parent_id(&self) -> Option<&SessionId> {
        self.parent_id.as_ref()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Load and mount every module in the plan.
    ///
    /// Idempotent: a second call is a no-op. Orchestrator and context are
    /// required; provider/tool/observer failures are logged and skipped. At
    /// least one provider must end up mounted.
    pub async fn initialize(&self) -> Result<(), KernelError> {
        if *self.state.lock() != SessionState::Uninitialized {
            return Ok(());
        }

        let plan = self.coordinator.plan().clone();

        // Context first: everything downstream may write to it.
        let context_spec = ModuleSpec {
            module: plan.context.clone(),
            config: plan.context_config.clone(),
        };
        self.mount_required(&context_spec, "context").await?;

        for spec in &plan.providers {
            self.mount_optional(spec, "provider").await;
        }
        for spec in &plan.tools {
            self.mount_optional(spec, "tool").await;
        }
        for spec in &plan.hooks {
            self.mount_optional(spec, "hook").await;
        }

        let orchestrator_spec = ModuleSpec {
            module: plan.orchestrator.clone(),
            config: plan.orchestrator_config.clone(),
        };
        self.mount_required(&orchestrator_spec, "orchestrator").await?;

        if self.coordinator.providers().is_empty() {
            return Err(KernelError::ConfigInvalid(
                "at least one provider must be mounted".into(),
            ));
        }

        *self.state.lock() = SessionState::Initialized;
        info!(session_id = %self.session_id, "session initialized");

        let source = if self.parent_id.is_some() {
            "fork"
        } else if self.resumed {
            "resume"
        } else {
            "startup"
        };
        self.coordinator
            .dispatch(events::SESSION_START, json!({ "source": source }))
            .await;

        if self.parent_id.is_some() {
            self.coordinator
                .dispatch(events::SESSION_FORK, json!({}))
                .await;
        }

        Ok(())
    }

    /// Run one prompt through the mounted orchestrator.
    ///
    /// Opens a turn (fresh `turn_id` in every event, injection budget
    /// reset), emits `turn:start`, and always emits `turn:end`, including
    /// on error and on immediate cancellation, which surfaces as
    /// [`KernelError::Cancelled`].
    pub async fn execute(&self, prompt: &str) -> Result<String, KernelError> {
        if *self.state.lock() != SessionState::Initialized {
            return Err(KernelError::NotInitialized);
        }

        let turn_id = TurnId::new();
        self.coordinator.begin_turn(turn_id.clone());
        self.coordinator
            .hooks()
            .set_default_field("turn_id", json!(turn_id.as_str()));

        self.coordinator
            .dispatch(events::TURN_START, json!({ "prompt": prompt }))
            .await;

        let run = async {
            let orchestrator = self.coordinator.orchestrator().ok_or_else(|| {
                KernelError::Orchestration("no orchestrator mounted".into())
            })?;
            let result = orchestrator
                .run(
                    prompt,
                    self.coordinator.clone(),
                    self.coordinator.cancellation().clone(),
                )
                .await?;

            if self.coordinator.cancellation().is_immediate() {
                return Err(KernelError::Cancelled);
            }
            Ok(result)
        };

        let outcome: Result<String, KernelError> = run.await;

        if let Err(err) = &outcome {
            self.coordinator
                .dispatch(
                    events::TURN_ERROR,
                    json!({ "error": err.to_string(), "kind": err.kind() }),
                )
                .await;
            error!(session_id = %self.session_id, %err, "turn failed");
        }

        self.coordinator
            .dispatch(events::TURN_END, json!({ "ok": outcome.is_ok() }))
            .await;
        self.coordinator.hooks().remove_default_field("turn_id");
        self.coordinator.end_turn();

        if let Err(err) = &outcome {
            if err.is_fatal() {
                self.coordinator
                    .dispatch(
                        events::SESSION_ERROR,
                        json!({ "error": err.to_string(), "kind": err.kind() }),
                    )
                    .await;
                self.cleanup().await;
            }
        }

        outcome
    }

    /// Request graceful cancellation: in-flight tools finish, no new work.
    pub async fn request_graceful(&self) -> bool {
        if self.coordinator.cancellation().is_cancelled() {
            return false;
        }
        self.coordinator
            .announce(events::CANCEL_REQUESTED, json!({ "mode": "graceful" }))
            .await;
        let changed = self.coordinator.cancellation().request_graceful().await;
        if changed {
            self.coordinator
                .announce(events::CANCEL_COMPLETED, json!({ "mode": "graceful" }))
                .await;
        }
        changed
    }

    /// Request immediate cancellation: abandon in-flight work.
    pub async fn request_immediate(&self) -> bool {
        if self.coordinator.cancellation().is_immediate() {
            return false;
        }
        self.coordinator
            .announce(events::CANCEL_REQUESTED, json!({ "mode": "immediate" }))
            .await;
        let changed = self.coordinator.cancellation().request_immediate().await;
        if changed {
            self.coordinator
                .announce(events::CANCEL_COMPLETED, json!({ "mode": "immediate" }))
                .await;
        }
        changed
    }

    /// Fork a child session.
    ///
    /// The child shallow-merges `overlay` onto this session's plan, shares
    /// the loader and approval/display surfaces, gets a fresh coordinator
    /// and hook registry, and records `parent_id`. Its cancellation token is
    /// adopted by this session's, so cancelling the parent cancels the
    /// child. Lifecycles stay independent: cleaning up the parent does not
    /// clean up the child.
    pub async fn fork(&self, overlay: Option<&Value>) -> Result<Session, KernelError> {
        let plan = match overlay {
            Some(overlay) => self.coordinator.plan().merged_with(overlay)?,
            None => self.coordinator.plan().clone(),
        };

        let mut builder = Session::builder(plan, self.coordinator.loader().clone())
            .parent_id(self.session_id.clone());
        if let Some(approval) = self.coordinator.approval_system() {
            builder = builder.approval_system(approval.clone());
        }
        if let Some(display) = self.coordinator.display_system() {
            builder = builder.display_system(display.clone());
        }
        let child = builder.build();

        self.coordinator
            .cancellation()
            .adopt_child(child.coordinator.cancellation().clone())
            .await;

        info!(
            parent = %self.session_id,
            child = %child.session_id,
            "forked child session"
        );
        Ok(child)
    }

    /// Release the session: graceful cancellation, registered cleanups in
    /// reverse order, `session:end`. Idempotent.
    pub async fn cleanup(&self) {
        {
            let mut state = self.state.lock();
            if *state == SessionState::CleanedUp {
                return;
            }
            *state = SessionState::CleanedUp;
        }

        self.request_graceful().await;
        self.coordinator.cleanup().await;
        self.coordinator
            .dispatch(events::SESSION_END, json!({ "state": "cleaned_up" }))
            .await;
        info!(session_id = %self.session_id, "session cleaned up");
    }

    /// Scoped acquisition: initialize, run `f`, always clean up.
    pub async fn scoped<T, F, Fut>(self, f: F) -> Result<T, KernelError>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, KernelError>>,
    {
        let session = Arc::new(self);
        session.initialize().await?;
        let result = f(session.clone()).await;
        session.cleanup().await;
        result
    }

    /// Mount a module whose absence is fatal (orchestrator, context).
    async fn mount_required(
        &self,
        spec: &ModuleSpec,
        role: &'static str,
    ) -> Result<(), KernelError> {
        let module = self.coordinator.loader().load(&spec.module).await?;
        let mounted = module
            .mount(self.coordinator.clone(), spec.config.clone())
            .await
            .map_err(|err| KernelError::ModuleLoadFailure {
                module: spec.module.clone(),
                reason: err.to_string(),
            })?;

        if mounted.instance.kind() != role {
            return Err(KernelError::ModuleLoadFailure {
                module: spec.module.clone(),
                reason: format!(
                    "expected a {role} module, got {}",
                    mounted.instance.kind()
                ),
            });
        }

        self.install(mounted.instance, mounted.cleanup)
    }

    /// Mount a module whose failure is logged and skipped.
    async fn mount_optional(&self, spec: &ModuleSpec, role: &'static str) {
        let module = match self.coordinator.loader().load(&spec.module).await {
            Ok(module) => module,
            Err(err) => {
                warn!(module = %spec.module, role, %err, "skipping module: load failed");
                return;
            }
        };
        let mounted = match module
            .mount(self.coordinator.clone(), spec.config.clone())
            .await
        {
            Ok(mounted) => mounted,
            Err(err) => {
                warn!(module = %spec.module, role, %err, "skipping module: mount failed");
                return;
            }
        };
        if let Err(err) = self.install(mounted.instance, mounted.cleanup) {
            warn!(module = %spec.module, role, %err, "skipping module: install failed");
        }
    }

    fn install(
        &self,
        instance: ModuleInstance,
        cleanup: Option<crate::module::CleanupFn>,
    ) -> Result<(), KernelError> {
        self.coordinator.mount(instance, None, cleanup)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("parent_id", &self.parent_id)
            .field("state", &*self.state.lock())
            .finish()
    }
}
