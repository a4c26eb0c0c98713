//! Change plans
//!
//! A [`Plan`] is an ordered sequence of per-resource actions, built once per
//! run and immutable once computed. Create/Update/NoChange entries follow the
//! dependency order; Delete entries trail in reverse dependency order.

use colored::Colorize;
use std::fmt;

/// Action planned for one resource
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create,
    Update { changes: Vec<Change> },
    NoChange,
    Delete,
}

/// A change to one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub attribute: String,
    pub old_value: String,
    pub new_value: String,
}

/// One plan entry
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub id: String,
    pub kind: String,
    pub action: Action,
}

/// Ordered actions for a declared resource set
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
}

impl Plan {
    /// Whether any entry mutates anything
    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| !matches!(a.action, Action::NoChange))
    }

    pub fn creates(&self) -> usize {
        self.count(|a| matches!(a, Action::Create))
    }

    pub fn updates(&self) -> usize {
        self.count(|a| matches!(a, Action::Update { .. }))
    }

    pub fn deletes(&self) -> usize {
        self.count(|a| matches!(a, Action::Delete))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|a| matches!(a, Action::NoChange))
    }

    fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(&a.action)).count()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Planned actions:")?;
        writeln!(f)?;

        for entry in &self.actions {
            match &entry.action {
                Action::Create => {
                    writeln!(f, "  {} {} {}", "+".green(), entry.kind, entry.id)?;
                }
                Action::Update { changes } => {
                    writeln!(f, "  {} {} {}", "~".yellow(), entry.kind, entry.id)?;
                    for change in changes {
                        writeln!(
                            f,
                            "      {}: {} -> {}",
                            change.attribute, change.old_value, change.new_value
                        )?;
                    }
                }
                Action::Delete => {
                    writeln!(f, "  {} {} {}", "-".red(), entry.kind, entry.id)?;
                }
                Action::NoChange => {
                    writeln!(f, "    {} {} (no changes)", entry.kind, entry.id)?;
                }
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Plan: {} to create, {} to update, {} to delete, {} unchanged.",
            self.creates(),
            self.updates(),
            self.deletes(),
            self.unchanged()
        )
    }
}
