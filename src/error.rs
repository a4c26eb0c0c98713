//! Error taxonomy for stackform
//!
//! Structural errors (`GraphError`, `ConfigError`) abort before any side
//! effect occurs. Operational errors (`EngineError::Provider`) abort the run
//! after already-applied resources have been durably recorded.

use std::path::PathBuf;
use thiserror::Error;

/// Structural errors detected while building or ordering the dependency graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// The declared set contains a reference cycle
    #[error("dependency cycle between resources: {}", nodes.join(", "))]
    Cycle {
        /// Identities participating in the cycle
        nodes: Vec<String>,
    },

    /// A reference points at an identity outside the declared set
    #[error("resource '{node}' references unknown resource '{missing}'")]
    UnresolvedReference { node: String, missing: String },
}

/// Error returned by a [`ResourceProvider`](crate::provider::ResourceProvider)
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from the persistent state backend
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write state file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("state file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("state is locked by another run (lock file {} exists)", path.display())]
    Locked { path: PathBuf },
}

/// Errors while loading a declaration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read declaration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse declaration {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("duplicate resource identity '{id}' in declaration")]
    DuplicateId { id: String },

    #[error("unsupported declaration format: {} (expected .yaml, .yml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },
}

/// Top-level run errors surfaced by the planner and applier
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    State(#[from] StateError),

    /// A provider call failed; already-applied resources remain applied
    #[error("resource '{node}' failed: {message}")]
    Provider { node: String, message: String },

    /// No provider is registered for a declared kind tag
    #[error("no provider registered for kind '{kind}' (resource '{node}')")]
    UnknownKind { node: String, kind: String },

    /// The plan names an identity the declaration no longer contains
    #[error("plan references undeclared resource '{0}'")]
    PlanMismatch(String),
}
