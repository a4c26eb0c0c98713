//! stackform - declarative resource composition
//!
//! Declare resources with dependencies, then materialize them in the correct
//! order with idempotent re-apply. The pipeline:
//!
//! declaration -> [`DependencyGraph`] -> [`PlanBuilder`] -> [`Plan`]
//! -> [`Applier`] (dispatching to a [`ResourceProvider`] per kind)
//! -> [`StateStore`]
//!
//! Providers do the real work; this crate owns ordering, diffing, and the
//! persisted state that makes re-apply idempotent.

pub mod applier;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod node;
pub mod plan;
pub mod planner;
pub mod provider;
pub mod state;

// Re-export commonly used types
pub use applier::{Applier, ApplySummary};
pub use config::{default_state_path, Declaration};
pub use error::{ConfigError, EngineError, GraphError, ProviderError, StateError};
pub use graph::DependencyGraph;
pub use node::{resolve_attributes, AttrValue, Reference, ResourceNode, UNKNOWN_OUTPUT};
pub use plan::{Action, Change, Plan, PlannedAction};
pub use planner::PlanBuilder;
pub use provider::{ProviderRegistry, ResolvedOutput, ResourceProvider, StubProvider};
pub use state::{LocalStateStore, MemoryStateStore, State, StateRecord, StateStore};

/// stackform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
