//! Mount plan: the declarative configuration a session is built from.
//!
//! The plan names which modules to install at each mount point and carries
//! their free-form config blocks. Module identifiers are opaque here; the
//! external loader resolves them. `${ENV}` placeholders are the caller's
//! concern and arrive already substituted.

use serde_json::{Map, Value};

use crate::errors::KernelError;

/// One module entry in an ordered mount list.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleSpec {
    /// Opaque module identifier, resolved by the loader.
    pub module: String,
    /// Free-form configuration passed to the module's mount entry point.
    pub config: Value,
}

/// A validated mount plan.
///
/// The raw tree is retained verbatim so modules can read keys the kernel
/// does not interpret.
#[derive(Clone, Debug)]
pub struct MountPlan {
    raw: Value,
    pub orchestrator: String,
    pub orchestrator_config: Value,
    pub context: String,
    pub context_config: Value,
    pub providers: Vec<ModuleSpec>,
    pub tools: Vec<ModuleSpec>,
    pub hooks: Vec<ModuleSpec>,
    /// Config overlays for forked child sessions. Not loaded as modules.
    pub agents: Vec<ModuleSpec>,
}

impl MountPlan {
    /// Parse and validate a mount plan from a JSON tree.
    ///
    /// `session.orchestrator` and `session.context` are required; the module
    /// lists are optional and default to empty.
    pub fn parse(raw: Value) -> Result<Self, KernelError> {
        let root = raw
            .as_object()
            .ok_or_else(|| KernelError::ConfigInvalid("mount plan must be an object".into()))?;

        let session = root
            .get("session")
            .and_then(Value::as_object)
            .ok_or_else(|| KernelError::ConfigInvalid("missing 'session' section".into()))?;

        let orchestrator = required_str(session, "orchestrator", "session.orchestrator")?;
        let context = required_str(session, "context", "session.context")?;

        let orchestrator_config = section_config(root, "orchestrator");
        let context_config = section_config(root, "context");

        let providers = module_list(root, "providers")?;
        let tools = module_list(root, "tools")?;
        let hooks = module_list(root, "hooks")?;
        let agents = module_list(root, "agents")?;

        Ok(Self {
            raw,
            orchestrator,
            orchestrator_config,
            context,
            context_config,
            providers,
            tools,
            hooks,
            agents,
        })
    }

    /// The unparsed plan, exactly as supplied.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Derive a child plan by shallow-merging `overlay` on top of this plan:
    /// top-level keys from the overlay replace the parent's wholesale.
    pub fn merged_with(&self, overlay: &Value) -> Result<Self, KernelError> {
        let mut merged: Map<String, Value> = self
            .raw
            .as_object()
            .cloned()
            .unwrap_or_default();
        if let Some(overlay_map) = overlay.as_object() {
            for (key, value) in overlay_map {
                merged.insert(key.clone(), value.clone());
            }
        }
        Self::parse(Value::Object(merged))
    }
}

fn required_str(
    section: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<String, KernelError> {
    section
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| KernelError::ConfigInvalid(format!("missing '{path}'")))
}

/// Reads `<section>.config`, defaulting to an empty object.
fn section_config(root: &Map<String, Value>, section: &str) -> Value {
    root.get(section)
        .and_then(|v| v.get("config"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn module_list(root: &Map<String, Value>, key: &str) -> Result<Vec<ModuleSpec>, KernelError> {
    let Some(value) = root.get(key) else {
        return Ok(Vec::new());
    };
    let entries = value
        .as_array()
        .ok_or_else(|| KernelError::ConfigInvalid(format!("'{key}' must be a list")))?;

    let mut specs = Vec::with_capacity(entries.len());
    for entry in entries {
        let module = entry
            .get("module")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                KernelError::ConfigInvalid(format!("'{key}' entry missing 'module'"))
            })?;
        let config = entry
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        specs.push(ModuleSpec {
            module: module.to_owned(),
            config,
        });
    }
    Ok(specs)
}
