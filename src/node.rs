//! Resource declarations
//!
//! A [`ResourceNode`] is one declared unit of infrastructure: a stable
//! identity, a kind tag selecting the provider, an attribute mapping, and
//! references to other nodes whose resolved outputs it consumes. References
//! double as dependency edges; `depends_on` adds ordering-only edges.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder substituted for a reference whose upstream output is not yet
/// known at plan time. The applier always re-substitutes with live outputs
/// before invoking a provider.
pub const UNKNOWN_OUTPUT: &str = "(known after apply)";

/// A reference to another node's resolved output attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    /// Identity of the node that produces the output
    #[serde(rename = "ref")]
    pub node: String,
    /// Name of the output attribute to consume
    pub output: String,
}

/// An attribute value: either a literal or a reference to an upstream output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Reference(Reference),
    Literal(Value),
}

/// One declared unit of provisionable infrastructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Stable identity, unique within a declaration
    pub id: String,
    /// Kind tag, dispatched to a provider (e.g. "image-build")
    pub kind: String,
    /// Declared attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
    /// Ordering-only dependencies (no output consumed)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Add a literal attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(name.into(), AttrValue::Literal(value.into()));
        self
    }

    /// Add an attribute consuming another node's output
    pub fn reference(
        mut self,
        name: impl Into<String>,
        node: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.attributes.insert(
            name.into(),
            AttrValue::Reference(Reference {
                node: node.into(),
                output: output.into(),
            }),
        );
        self
    }

    /// Add an ordering-only dependency
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// All identities this node depends on (references plus `depends_on`)
    pub fn dependencies(&self) -> BTreeSet<&str> {
        let mut deps: BTreeSet<&str> = self
            .attributes
            .values()
            .filter_map(|v| match v {
                AttrValue::Reference(r) => Some(r.node.as_str()),
                AttrValue::Literal(_) => None,
            })
            .collect();
        deps.extend(self.depends_on.iter().map(String::as_str));
        deps
    }
}

/// Substitute references in an attribute mapping using `lookup` to resolve
/// `(node, output)` pairs. Unresolvable references become the
/// [`UNKNOWN_OUTPUT`] placeholder.
pub fn resolve_attributes<F>(
    attributes: &BTreeMap<String, AttrValue>,
    lookup: F,
) -> BTreeMap<String, Value>
where
    F: Fn(&str, &str) -> Option<Value>,
{
    attributes
        .iter()
        .map(|(name, value)| {
            let resolved = match value {
                AttrValue::Literal(v) => v.clone(),
                AttrValue::Reference(r) => lookup(&r.node, &r.output)
                    .unwrap_or_else(|| Value::String(UNKNOWN_OUTPUT.to_string())),
            };
            (name.clone(), resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reference_attrs_deserialize_from_map_form() {
        let node: ResourceNode = serde_yaml::from_str(
            r#"
id: runtime
kind: managed-runtime
attributes:
  runtime_name: agent
  image_uri: { ref: image, output: image_uri }
"#,
        )
        .unwrap();

        assert_eq!(
            node.attributes.get("runtime_name"),
            Some(&AttrValue::Literal(json!("agent")))
        );
        assert_eq!(
            node.attributes.get("image_uri"),
            Some(&AttrValue::Reference(Reference {
                node: "image".to_string(),
                output: "image_uri".to_string(),
            }))
        );
    }

    #[test]
    fn dependencies_combine_references_and_depends_on() {
        let node = ResourceNode::new("policy", "policy-attachment")
            .reference("role_arn", "runtime", "runtime_role_arn")
            .depends_on("image");

        let deps: Vec<&str> = node.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["image", "runtime"]);
    }

    #[test]
    fn resolve_substitutes_known_outputs() {
        let node = ResourceNode::new("runtime", "managed-runtime")
            .attr("runtime_name", "agent")
            .reference("image_uri", "image", "image_uri");

        let resolved = resolve_attributes(&node.attributes, |id, output| {
            (id == "image" && output == "image_uri").then(|| json!("registry.local/image:v1"))
        });

        assert_eq!(resolved["runtime_name"], json!("agent"));
        assert_eq!(resolved["image_uri"], json!("registry.local/image:v1"));
    }

    #[test]
    fn resolve_marks_unknown_outputs() {
        let node =
            ResourceNode::new("runtime", "managed-runtime").reference("image_uri", "image", "uri");

        let resolved = resolve_attributes(&node.attributes, |_, _| None);
        assert_eq!(resolved["image_uri"], json!(UNKNOWN_OUTPUT));
    }
}
