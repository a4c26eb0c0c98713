//! Declaration loading
//!
//! A declaration is a YAML or JSON document listing the resource nodes to
//! materialize. The engine never inspects provider credentials or targets;
//! whatever a declaration carries in attributes passes through opaquely.

use crate::error::ConfigError;
use crate::node::ResourceNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A parsed declaration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    /// Optional human-facing name for the declared stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<ResourceNode>,
}

impl Declaration {
    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let declaration: Self = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        declaration.validate()?;
        Ok(declaration)
    }

    /// Structural validation independent of state and providers
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigError::DuplicateId {
                    id: node.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Default state file location for a declaration: sibling file with the
/// extension swapped for `.state.json`
pub fn default_state_path(declaration_path: &Path) -> PathBuf {
    declaration_path.with_extension("state.json")
}
