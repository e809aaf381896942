//! Two-level cooperative cancellation.
//!
//! The kernel provides the mechanism (a token with state); deciding when to
//! cancel belongs to the caller. Orchestrators and tool dispatchers check
//! the predicates at their loop boundaries; nothing is preempted.
//!
//! # State machine
//!
//! ```text
//! Running ──→ Graceful ──→ Immediate
//!    │                         ↑
//!    └─────────────────────────┘
//! ```
//!
//! Transitions are monotonic. `reset()` returns to `Running` and clears the
//! in-flight tool set, but teardown callbacks stay spent: they fire at most
//! once across the token's lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::warn;

/// Cancellation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelState {
    /// Running normally.
    #[default]
    Running,
    /// Let in-flight tools finish; admit no new work.
    Graceful,
    /// Abandon in-flight work where possible.
    Immediate,
}

/// An async teardown callback, fired on the first cancellation.
pub type Teardown = Box<
    dyn Fn() -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

struct Inner {
    state: CancelState,
    /// In-flight tool executions: id → display name.
    running_tools: HashMap<String, String>,
    teardowns: Vec<Teardown>,
    /// Set once the teardowns have been fired; never cleared, even by reset.
    teardowns_fired: bool,
    children: Vec<CancellationToken>,
}

/// Cooperative cancellation token shared by a session's subsystems.
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Mutex<Inner>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: CancelState::Running,
                running_tools: HashMap::new(),
                teardowns: Vec::new(),
                teardowns_fired: false,
                children: Vec::new(),
            })),
        }
    }

    pub fn state(&self) -> CancelState {
        self.inner.lock().state
    }

    /// `true` in `Graceful` or `Immediate`.
    pub fn is_cancelled(&self) -> bool {
        self.state() != CancelState::Running
    }

    pub fn is_graceful(&self) -> bool {
        self.state() == CancelState::Graceful
    }

    pub fn is_immediate(&self) -> bool {
        self.state() == CancelState::Immediate
    }

    /// Request graceful cancellation: in-flight tools finish, no new work.
    ///
    /// Returns `true` if the state changed. Fires teardown callbacks on the
    /// token's first cancellation; propagates to adopted children and their
    /// descendants.
    pub async fn request_graceful(&self) -> bool {
        self.transition(CancelState::Graceful).await
    }

    /// Request immediate cancellation: abandon work where possible.
    ///
    /// Returns `true` if the state changed. Callbacks only fire if graceful
    /// did not already fire them.
    pub async fn request_immediate(&self) -> bool {
        self.transition(CancelState::Immediate).await
    }

    /// Apply `target` to this token and every descendant, firing each
    /// affected token's teardowns once. Iterative so fork chains of any
    /// depth propagate without recursion.
    async fn transition(&self, target: CancelState) -> bool {
        let mut changed_self = false;
        let mut to_fire: Vec<CancellationToken> = Vec::new();
        let mut pending = vec![self.clone()];

        while let Some(token) = pending.pop() {
            let advanced = {
                let mut inner = token.inner.lock();
                let admissible = match target {
                    CancelState::Graceful => inner.state == CancelState::Running,
                    _ => inner.state != CancelState::Immediate,
                };
                if admissible {
                    inner.state = target;
                    pending.extend(inner.children.iter().cloned());
                    true
                } else {
                    false
                }
            };
            if advanced {
                if Arc::ptr_eq(&token.inner, &self.inner) {
                    changed_self = true;
                }
                to_fire.push(token);
            }
        }

        for token in to_fire {
            token.fire_teardowns().await;
        }
        changed_self
    }

    /// Return to `Running` and clear the in-flight tool set.
    ///
    /// Does not re-arm teardown callbacks.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CancelState::Running;
        inner.running_tools.clear();
    }

    // -- Tool tracking --

    /// Record a tool execution as in flight.
    pub fn track_tool(&self, tool_id: impl Into<String>, name: impl Into<String>) {
        self.inner
            .lock()
            .running_tools
            .insert(tool_id.into(), name.into());
    }

    /// Record a tool execution as finished. Unknown ids are a no-op.
    pub fn complete_tool(&self, tool_id: &str) {
        self.inner.lock().running_tools.remove(tool_id);
    }

    /// Snapshot of in-flight `(tool_id, name)` pairs.
    pub fn running_tools(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .running_tools
            .iter()
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect()
    }

    // -- Teardown callbacks --

    /// Register a callback to run on the first cancellation.
    pub fn on_cancel(&self, teardown: Teardown) {
        self.inner.lock().teardowns.push(teardown);
    }

    /// Fire the teardown callbacks if they have not fired yet.
    ///
    /// Callbacks run in registration order, outside the lock. A failing
    /// callback is logged and does not stop the rest.
    async fn fire_teardowns(&self) {
        let pending: Vec<_> = {
            let mut inner = self.inner.lock();
            if inner.teardowns_fired {
                return;
            }
            inner.teardowns_fired = true;
            inner.teardowns.iter().map(|cb| cb()).collect()
        };

        for (index, fut) in pending.into_iter().enumerate() {
            if let Err(error) = fut.await {
                warn!(index, %error, "cancellation teardown failed");
            }
        }
    }

    // -- Child propagation --

    /// Adopt a child token (a forked session's). The child inherits the
    /// current state immediately and receives future transitions.
    pub async fn adopt_child(&self, child: CancellationToken) {
        let state = self.state();
        match state {
            CancelState::Graceful => {
                child.request_graceful().await;
            }
            CancelState::Immediate => {
                child.request_immediate().await;
            }
            CancelState::Running => {}
        }
        self.inner.lock().children.push(child);
    }

    /// Detach a previously adopted child.
    pub fn release_child(&self, child: &CancellationToken) {
        self.inner
            .lock()
            .children
            .retain(|c| !Arc::ptr_eq(&c.inner, &child.inner));
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CancellationToken")
            .field("state", &inner.state)
            .field("running_tools", &inner.running_tools.len())
            .field("teardowns", &inner.teardowns.len())
            .finish()
    }
}
