//! Provider interface and kind dispatch
//!
//! A [`ResourceProvider`] performs the actual create/update/delete for one or
//! more resource kinds. The engine never talks to a backend directly: the
//! [`ProviderRegistry`] dispatches on the node's kind tag.

use crate::error::ProviderError;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Attributes produced by successfully applying a node, consumed read-only by
/// downstream nodes
pub type ResolvedOutput = BTreeMap<String, Value>;

/// External capability performing the real work for a resource kind
pub trait ResourceProvider: Send + Sync {
    /// Idempotent-intent create/update of one resource. `attributes` arrive
    /// with all references already substituted.
    fn apply(
        &self,
        kind: &str,
        id: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<ResolvedOutput, ProviderError>;

    /// Teardown of one resource
    fn delete(&self, kind: &str, id: &str) -> Result<(), ProviderError>;
}

/// Kind tag -> provider dispatch table
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn ResourceProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` as the handler for `kind`, replacing any previous
    /// registration
    pub fn register(&mut self, kind: impl Into<String>, provider: Box<dyn ResourceProvider>) {
        self.providers.insert(kind.into(), provider);
    }

    pub fn get(&self, kind: &str) -> Option<&dyn ResourceProvider> {
        self.providers.get(kind).map(Box::as_ref)
    }

    /// Registry with the [`StubProvider`] wired to the built-in demo kinds
    pub fn with_stub_defaults() -> Self {
        let mut registry = Self::new();
        for kind in ["image-build", "managed-runtime", "policy-attachment"] {
            registry.register(kind, Box::new(StubProvider));
        }
        registry
    }
}

/// Deterministic provider used for demos and tests.
///
/// Synthesizes outputs in the shape a real backend would return: an image
/// build yields a repository location and tag, a managed runtime yields its
/// identifier and execution role, a policy attachment yields the policy
/// identifier. Outputs are pure functions of the identity and attributes, so
/// repeated applies with unchanged inputs yield unchanged outputs.
pub struct StubProvider;

impl StubProvider {
    fn fingerprint(attributes: &BTreeMap<String, Value>) -> String {
        let mut hasher = DefaultHasher::new();
        // BTreeMap iteration order makes the serialization stable
        serde_json::to_string(attributes)
            .unwrap_or_default()
            .hash(&mut hasher);
        format!("{:08x}", hasher.finish() as u32)
    }
}

impl ResourceProvider for StubProvider {
    fn apply(
        &self,
        kind: &str,
        id: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<ResolvedOutput, ProviderError> {
        let mut output = ResolvedOutput::new();
        match kind {
            "image-build" => {
                let repository = format!("registry.local/{id}");
                let tag = format!("build-{}", Self::fingerprint(attributes));
                output.insert("repository_uri".to_string(), json!(repository));
                output.insert("image_tag".to_string(), json!(tag));
                output.insert("image_uri".to_string(), json!(format!("{repository}:{tag}")));
            }
            "managed-runtime" => {
                output.insert("runtime_arn".to_string(), json!(format!("arn:stub:runtime/{id}")));
                output.insert(
                    "runtime_role_arn".to_string(),
                    json!(format!("arn:stub:role/{id}-role")),
                );
            }
            "policy-attachment" => {
                output.insert("policy_arn".to_string(), json!(format!("arn:stub:policy/{id}")));
            }
            _ => {
                output.insert("id".to_string(), json!(id));
            }
        }
        Ok(output)
    }

    fn delete(&self, _kind: &str, _id: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}
