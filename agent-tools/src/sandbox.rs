//! Capability-gated invocation wrapper around [`ToolRegistry`](crate::registry::ToolRegistry).
//!
//! A [`CapabilityGate`] narrows the set of capabilities a caller may exercise
//! without touching the underlying registry. It does not sandbox process
//! resources (filesystem, network); it only enforces that the invoker was
//! granted every capability a tool declares before the call reaches it.

use std::collections::BTreeSet;

use agent_primitives::CapabilityId;
use serde_json::Value;

use crate::registry::{ToolError, ToolRegistry, ToolResult};

/// Restricts invocation to tools whose declared capabilities are a subset of
/// a fixed grant set.
#[derive(Debug, Clone)]
pub struct CapabilityGate {
    granted: BTreeSet<CapabilityId>,
}

impl CapabilityGate {
    /// Creates a gate granting exactly the supplied capabilities.
    #[must_use]
    pub fn new(granted: impl IntoIterator<Item = CapabilityId>) -> Self {
        Self {
            granted: granted.into_iter().collect(),
        }
    }

    /// Creates a gate that grants nothing; only capability-free tools may run.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            granted: BTreeSet::new(),
        }
    }

    /// Returns the granted capability set.
    #[must_use]
    pub fn granted(&self) -> &BTreeSet<CapabilityId> {
        &self.granted
    }

    /// Invokes `name` against `registry` if every capability it declares is
    /// granted, otherwise rejects the call without reaching the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] if the tool isn't registered, or
    /// [`ToolError::Execution`] if the gate denies the capability set.
    /// Propagates the tool's own execution errors otherwise.
    pub async fn invoke(
        &self,
        registry: &ToolRegistry,
        name: &str,
        input: Value,
    ) -> ToolResult<Value> {
        let handle = registry.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;

        let missing: Vec<_> = handle
            .metadata()
            .capabilities()
            .iter()
            .filter(|cap| !self.granted.contains(cap))
            .map(CapabilityId::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(ToolError::execution(format!(
                "tool `{name}` requires ungranted capabilities: {}",
                missing.join(", ")
            )));
        }

        handle.invoke(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolMetadata;

    fn echo_metadata(capabilities: Vec<CapabilityId>) -> ToolMetadata {
        ToolMetadata::new("echo", "1.0.0")
            .unwrap()
            .with_capabilities(capabilities)
    }

    #[tokio::test]
    async fn allows_granted_capability() {
        let registry = ToolRegistry::new();
        let cap = CapabilityId::new("tool.echo").unwrap();
        registry
            .register_tool(echo_metadata(vec![cap.clone()]), |v: Value| async move {
                Ok(v)
            })
            .unwrap();

        let gate = CapabilityGate::new([cap]);
        let out = gate
            .invoke(&registry, "echo", Value::String("hi".into()))
            .await
            .unwrap();
        assert_eq!(out, Value::String("hi".into()));
    }

    #[tokio::test]
    async fn denies_ungranted_capability() {
        let registry = ToolRegistry::new();
        let cap = CapabilityId::new("tool.dangerous").unwrap();
        registry
            .register_tool(echo_metadata(vec![cap]), |v: Value| async move { Ok(v) })
            .unwrap();

        let gate = CapabilityGate::empty();
        let err = gate
            .invoke(&registry, "echo", Value::Null)
            .await
            .expect_err("missing capability should be denied");
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let gate = CapabilityGate::empty();
        let registry = ToolRegistry::new();
        let err = gate
            .invoke(&registry, "missing", Value::Null)
            .await
            .expect_err("unknown tool should error");
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }
}
