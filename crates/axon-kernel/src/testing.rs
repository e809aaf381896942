//! Test doubles for kernel and module tests.
//!
//! Everything here is deterministic and in-memory: a recording hook handler,
//! fake providers/tools/context, a table-backed loader, and scriptable
//! approval/display surfaces. Kept in the library (not `#[cfg(test)]`) so
//! module implementations outside this crate can reuse them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use axon_core::contracts::{
    ApprovalSystem, ContextManager, DisplaySystem, Observer, Provider, Tool, ToolOutcome,
};
use axon_core::errors::{ApprovalError, HookError, KernelError};
use axon_core::hooks::{ApprovalDefault, HookHandler, HookResult, NoticeLevel};
use axon_core::messages::{ChatMessage, ChatRequest, ChatResponse};

use crate::cancellation::CancellationToken;
use crate::coordinator::Coordinator;
use crate::module::{Module, ModuleInstance, ModuleLoader, Mounted, Orchestrator};

/// Hook handler that records every `(event, payload)` it sees and replies
/// with a fixed result.
pub struct RecordingHandler {
    result: HookResult,
    seen: Mutex<Vec<(String, Value)>>,
}

impl RecordingHandler {
    pub fn new(result: HookResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn continuing() -> Arc<Self> {
        Self::new(HookResult::proceed())
    }

    pub fn seen(&self) -> Vec<(String, Value)> {
        self.seen.lock().clone()
    }

    /// Payloads recorded for one event name.
    pub fn payloads_for(&self, event: &str) -> Vec<Value> {
        self.seen
            .lock()
            .iter()
            .filter(|(e, _)| e == event)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl HookHandler for RecordingHandler {
    async fn handle(&self, event: &str, payload: Value) -> Result<HookResult, HookError> {
        self.seen.lock().push((event.to_owned(), payload));
        Ok(self.result.clone())
    }
}

/// Provider that always answers with the same text.
pub struct FakeProvider {
    name: String,
    reply: String,
}

impl FakeProvider {
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: reply.into(),
        })
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, KernelError> {
        Ok(ChatResponse::text(self.reply.clone()))
    }
}

/// Tool that echoes its input back.
pub struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Value {
        serde_json::json!({"type": "object", "additionalProperties": true})
    }

    async fn execute(&self, input: Value) -> Result<ToolOutcome, KernelError> {
        Ok(ToolOutcome::ok(input))
    }
}

/// In-memory context manager.
#[derive(Default)]
pub struct MemoryContext {
    messages: Mutex<Vec<ChatMessage>>,
}

impl MemoryContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl ContextManager for MemoryContext {
    async fn add_message(&self, message: ChatMessage) -> Result<(), KernelError> {
        self.messages.lock().push(message);
        Ok(())
    }

    async fn get_messages(&self) -> Result<Vec<ChatMessage>, KernelError> {
        Ok(self.messages.lock().clone())
    }

    async fn should_compact(&self) -> bool {
        false
    }

    async fn compact(&self) -> Result<(), KernelError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), KernelError> {
        self.messages.lock().clear();
        Ok(())
    }
}

/// Named no-op observer.
pub struct FakeObserver {
    name: String,
}

impl FakeObserver {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

impl Observer for FakeObserver {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Orchestrator that returns a fixed response.
pub struct FakeOrchestrator {
    response: String,
}

impl FakeOrchestrator {
    pub fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
        })
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn run(
        &self,
        _prompt: &str,
        _coordinator: Arc<Coordinator>,
        _cancellation: CancellationToken,
    ) -> Result<String, KernelError> {
        Ok(self.response.clone())
    }
}

/// Orchestrator driven by a closure, for behavior-specific tests.
pub struct FnOrchestrator<F>(pub F);

#[async_trait]
impl<F, Fut> Orchestrator for FnOrchestrator<F>
where
    F: Fn(String, Arc<Coordinator>, CancellationToken) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<String, KernelError>> + Send,
{
    async fn run(
        &self,
        prompt: &str,
        coordinator: Arc<Coordinator>,
        cancellation: CancellationToken,
    ) -> Result<String, KernelError> {
        (self.0)(prompt.to_owned(), coordinator, cancellation).await
    }
}

/// Module that hands back a pre-built instance on mount.
pub struct StaticModule {
    build: Box<dyn Fn() -> ModuleInstance + Send + Sync>,
    fail_with: Option<String>,
}

impl StaticModule {
    pub fn new(build: impl Fn() -> ModuleInstance + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            build: Box::new(build),
            fail_with: None,
        })
    }

    /// A module whose mount always fails.
    pub fn failing(reason: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            build: Box::new(|| ModuleInstance::Observer(FakeObserver::new("never"))),
            fail_with: Some(reason.into()),
        })
    }
}

#[async_trait]
impl Module for StaticModule {
    async fn mount(
        &self,
        _coordinator: Arc<Coordinator>,
        _config: Value,
    ) -> Result<Mounted, KernelError> {
        if let Some(reason) = &self.fail_with {
            return Err(KernelError::Orchestration(reason.clone()));
        }
        Ok(Mounted::new((self.build)()))
    }
}

/// Hook module that registers one [`RecordingHandler`] for a set of events.
///
/// Registered names are `<observer>:<event>` so the global name-uniqueness
/// rule keeps one registration per event.
pub struct RecorderHookModule {
    observer_name: String,
    events: Vec<String>,
    handler: Arc<RecordingHandler>,
}

impl RecorderHookModule {
    pub fn new(
        observer_name: impl Into<String>,
        events: impl IntoIterator<Item = impl Into<String>>,
        handler: Arc<RecordingHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            observer_name: observer_name.into(),
            events: events.into_iter().map(Into::into).collect(),
            handler,
        })
    }
}

#[async_trait]
impl Module for RecorderHookModule {
    async fn mount(
        &self,
        coordinator: Arc<Coordinator>,
        _config: Value,
    ) -> Result<Mounted, KernelError> {
        for event in &self.events {
            coordinator.hooks().register(
                event,
                &format!("{}:{event}", self.observer_name),
                self.handler.clone(),
                100,
            );
        }
        Ok(Mounted::new(ModuleInstance::Observer(FakeObserver::new(
            self.observer_name.clone(),
        ))))
    }
}

/// Loader backed by a name → module table.
#[derive(Default)]
pub struct TableLoader {
    modules: Mutex<HashMap<String, Arc<dyn Module>>>,
}

impl TableLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, module_id: impl Into<String>, module: Arc<dyn Module>) {
        self.modules.lock().insert(module_id.into(), module);
    }
}

#[async_trait]
impl ModuleLoader for TableLoader {
    async fn load(&self, module_id: &str) -> Result<Arc<dyn Module>, KernelError> {
        self.modules
            .lock()
            .get(module_id)
            .cloned()
            .ok_or_else(|| KernelError::ModuleNotFound(module_id.to_owned()))
    }
}

/// How a [`ScriptedApproval`] responds.
pub enum ApprovalScript {
    /// Answer every request with this option.
    Respond(String),
    /// Never answer; every request times out.
    Block,
}

/// Scriptable approval surface that records every request.
pub struct ScriptedApproval {
    script: ApprovalScript,
    requests: Mutex<Vec<String>>,
}

impl ScriptedApproval {
    pub fn responding(option: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            script: ApprovalScript::Respond(option.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn blocking() -> Arc<Self> {
        Arc::new(Self {
            script: ApprovalScript::Block,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Prompts received, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ApprovalSystem for ScriptedApproval {
    async fn request_approval(
        &self,
        prompt: &str,
        _options: &[String],
        timeout: Duration,
        _default: ApprovalDefault,
    ) -> Result<String, ApprovalError> {
        self.requests.lock().push(prompt.to_owned());
        match &self.script {
            ApprovalScript::Respond(option) => Ok(option.clone()),
            ApprovalScript::Block => {
                tokio::time::sleep(timeout).await;
                Err(ApprovalError::Timeout(timeout))
            }
        }
    }
}

/// Display surface that records every message.
#[derive(Default)]
pub struct RecordingDisplay {
    messages: Mutex<Vec<(String, NoticeLevel, String)>>,
}

impl RecordingDisplay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(String, NoticeLevel, String)> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl DisplaySystem for RecordingDisplay {
    async fn show_message(
        &self,
        text: &str,
        level: NoticeLevel,
        source: &str,
    ) -> Result<(), KernelError> {
        self.messages
            .lock()
            .push((text.to_owned(), level, source.to_owned()));
        Ok(())
    }
}
