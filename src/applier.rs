//! Plan execution
//!
//! The [`Applier`] consumes a plan strictly in order, blocking on each
//! provider call until it reports terminal success or failure. The state
//! snapshot is saved after every entry, so a run cancelled or failed between
//! entries leaves the store consistent with whatever completed. Apply is
//! monotonic: the first failure halts the run and nothing is rolled back.

use crate::error::EngineError;
use crate::node::{resolve_attributes, ResourceNode};
use crate::plan::{Action, Plan, PlannedAction};
use crate::provider::{ProviderRegistry, ResolvedOutput};
use crate::state::{StateRecord, StateStore};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

/// Counts of what an apply run did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl ApplySummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Executes a [`Plan`] against the provider registry, recording results in
/// the state store
pub struct Applier<'a> {
    registry: &'a ProviderRegistry,
    store: &'a dyn StateStore,
}

impl<'a> Applier<'a> {
    pub fn new(registry: &'a ProviderRegistry, store: &'a dyn StateStore) -> Self {
        Self { registry, store }
    }

    /// Execute `plan` in order. `nodes` must be the declared set the plan was
    /// computed from.
    pub fn apply(&self, plan: &Plan, nodes: &[ResourceNode]) -> Result<ApplySummary, EngineError> {
        let mut state = self.store.load()?;
        let by_id: HashMap<&str, &ResourceNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        // Seed run outputs from the recorded ones so NoChange upstreams still
        // feed their dependents.
        let mut outputs: HashMap<String, ResolvedOutput> = state
            .records
            .iter()
            .map(|(id, record)| (id.clone(), record.output.clone()))
            .collect();

        let mut summary = ApplySummary::default();
        for entry in &plan.actions {
            match &entry.action {
                Action::NoChange => {
                    debug!(resource = %entry.id, "no changes");
                    summary.unchanged += 1;
                }
                Action::Create | Action::Update { .. } => {
                    let output = self.apply_one(entry, &by_id, &outputs, &mut state)?;
                    outputs.insert(entry.id.clone(), output);
                    match entry.action {
                        Action::Create => summary.created += 1,
                        _ => summary.updated += 1,
                    }
                }
                Action::Delete => {
                    self.delete_one(entry, &mut state)?;
                    summary.deleted += 1;
                }
            }
        }

        Ok(summary)
    }

    fn apply_one(
        &self,
        entry: &PlannedAction,
        by_id: &HashMap<&str, &ResourceNode>,
        outputs: &HashMap<String, ResolvedOutput>,
        state: &mut crate::state::State,
    ) -> Result<ResolvedOutput, EngineError> {
        let node = by_id
            .get(entry.id.as_str())
            .ok_or_else(|| EngineError::PlanMismatch(entry.id.clone()))?;

        let provider = self
            .registry
            .get(&node.kind)
            .ok_or_else(|| EngineError::UnknownKind {
                node: node.id.clone(),
                kind: node.kind.clone(),
            })?;

        let effective = resolve_attributes(&node.attributes, |id, output| {
            outputs.get(id).and_then(|o| o.get(output)).cloned()
        });

        info!(resource = %node.id, kind = %node.kind, "applying");
        let output = provider
            .apply(&node.kind, &node.id, &effective)
            .map_err(|e| EngineError::Provider {
                node: node.id.clone(),
                message: e.to_string(),
            })?;

        state.set(
            node.id.clone(),
            StateRecord {
                kind: node.kind.clone(),
                attributes: effective,
                output: output.clone(),
                dependencies: node.dependencies().into_iter().map(String::from).collect(),
                updated_at: Utc::now(),
            },
        );
        // Durable after every entry: a later failure must not lose this one
        self.store.save(state)?;

        Ok(output)
    }

    fn delete_one(
        &self,
        entry: &PlannedAction,
        state: &mut crate::state::State,
    ) -> Result<(), EngineError> {
        let kind = state
            .get(&entry.id)
            .map(|r| r.kind.clone())
            .unwrap_or_else(|| entry.kind.clone());

        let provider = self
            .registry
            .get(&kind)
            .ok_or_else(|| EngineError::UnknownKind {
                node: entry.id.clone(),
                kind: kind.clone(),
            })?;

        info!(resource = %entry.id, kind = %kind, "deleting");
        provider
            .delete(&kind, &entry.id)
            .map_err(|e| EngineError::Provider {
                node: entry.id.clone(),
                message: e.to_string(),
            })?;

        state.remove(&entry.id);
        self.store.save(state)?;
        Ok(())
    }
}
