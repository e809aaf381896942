//! Axon kernel: the runtime core of a modular agent system.
//!
//! The kernel coordinates pluggable modules (providers, tools, orchestrators,
//! context stores, hook observers) into an interactive session. It owns five
//! subsystems:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`cancellation`] | two-level cooperative cancellation token |
//! | [`registry`] | priority-ordered hook dispatch with verdict reconciliation |
//! | [`coordinator`] | mount table, capabilities, contribution channels, budgets, approvals |
//! | [`session`] | lifecycle: initialize, execute turns, fork, cleanup |
//! | [`module`] | the loader/mount contracts modules plug in through |
//!
//! The kernel never spawns parallel workers of its own; it signals, tracks,
//! and dispatches, and leaves parallelism to mounted modules.

pub mod cancellation;
pub mod coordinator;
pub mod module;
pub mod registry;
pub mod session;
pub mod testing;

pub use cancellation::{CancelState, CancellationToken, Teardown};
pub use coordinator::{
    Coordinator, ContributorFn, EventVerdict, MountPoint, INJECTION_HARD_LIMIT,
    INJECTION_TURN_BUDGET,
};
pub use module::{CleanupFn, Module, ModuleInstance, ModuleLoader, Mounted, Orchestrator};
pub use registry::{
    ContextInjection, EmitAction, EmitOutcome, HandlerInfo, HookRegistry, PendingApproval,
    UserNotice,
};
pub use session::{Session, SessionBuilder, SessionState};
