//! stackform CLI - plan and apply declarative resource compositions

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;

use stackform::{
    cli, default_state_path, Applier, Declaration, LocalStateStore, PlanBuilder, ProviderRegistry,
    ResourceNode, StateStore,
};

#[derive(Parser)]
#[command(name = "stackform")]
#[command(about = "Declarative resource composition - plan and apply dependency-ordered changes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// State file path (defaults to <declaration>.state.json)
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and display the change plan without applying it
    Plan {
        /// Path to the declaration file (.yaml, .yml or .json)
        file: PathBuf,
    },

    /// Compute the plan and apply it in dependency order
    Apply {
        /// Path to the declaration file
        file: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Delete everything the state file knows about, dependents first
    Destroy {
        /// Path to the declaration file
        file: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Structurally validate a declaration (no state or provider access)
    Validate {
        /// Path to the declaration file
        file: PathBuf,
    },

    /// Show the recorded state
    State {
        /// Path to the declaration file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Plan { file } => {
            let (declaration, store) = load(&file, cli.state.as_deref())?;
            let state = store.load()?;

            let plan = match PlanBuilder::new(&declaration.nodes, &state).build() {
                Ok(plan) => plan,
                Err(e) => {
                    cli::error(&format!("Plan failed: {e}"));
                    std::process::exit(1);
                }
            };

            println!("{plan}");
        }

        Commands::Apply { file, auto_approve } => {
            let (declaration, store) = load(&file, cli.state.as_deref())?;
            run_changes(&store, &declaration.nodes, auto_approve, "Apply");
        }

        Commands::Destroy { file, auto_approve } => {
            let (_, store) = load(&file, cli.state.as_deref())?;
            // An empty declared set turns every record into a Delete
            run_changes(&store, &[], auto_approve, "Destroy");
        }

        Commands::Validate { file } => {
            let declaration = load_declaration(&file)?;

            let graph = match stackform::DependencyGraph::build(&declaration.nodes) {
                Ok(graph) => graph,
                Err(e) => {
                    cli::error(&format!("Validation failed: {e}"));
                    std::process::exit(1);
                }
            };
            if let Err(e) = graph.topological_order() {
                cli::error(&format!("Validation failed: {e}"));
                std::process::exit(1);
            }

            cli::success(&format!(
                "{} valid ({} resources)",
                file.display(),
                declaration.nodes.len()
            ));
        }

        Commands::State { file } => {
            let (_, store) = load(&file, cli.state.as_deref())?;
            let state = store.load()?;

            if state.records.is_empty() {
                cli::info("State is empty (nothing applied yet)");
                return Ok(());
            }

            println!("{} (serial {})", "Recorded resources:".bold(), state.serial);
            println!();
            for (id, record) in &state.records {
                println!(
                    "  {}  {}",
                    cli::format_resource(&record.kind, id),
                    format!("applied {}", record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"))
                        .dimmed()
                );
                for (name, value) in &record.output {
                    println!("      {} = {}", name.cyan(), value);
                }
            }
        }
    }

    Ok(())
}

/// Load the declaration and its state store
fn load(file: &PathBuf, state_path: Option<&std::path::Path>) -> Result<(Declaration, LocalStateStore)> {
    let declaration = load_declaration(file)?;
    let path = state_path
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| default_state_path(file));
    Ok((declaration, LocalStateStore::new(path)))
}

fn load_declaration(file: &PathBuf) -> Result<Declaration> {
    match Declaration::load(file) {
        Ok(declaration) => Ok(declaration),
        Err(e) => {
            cli::error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Plan, confirm, and apply changes against `nodes` (empty for destroy)
fn run_changes(store: &LocalStateStore, nodes: &[ResourceNode], auto_approve: bool, verb: &str) {
    let state = match store.load() {
        Ok(state) => state,
        Err(e) => {
            cli::error(&e.to_string());
            std::process::exit(1);
        }
    };

    let plan = match PlanBuilder::new(nodes, &state).build() {
        Ok(plan) => plan,
        Err(e) => {
            cli::error(&format!("Plan failed: {e}"));
            std::process::exit(1);
        }
    };

    println!("{plan}");

    if !plan.has_changes() {
        cli::success("Nothing to do");
        return;
    }

    if !auto_approve && !cli::confirm(&format!("{verb} these changes?")) {
        cli::warning("Aborted, no changes made");
        std::process::exit(1);
    }

    let lock = match store.lock() {
        Ok(lock) => lock,
        Err(e) => {
            cli::error(&e.to_string());
            std::process::exit(1);
        }
    };

    let registry = ProviderRegistry::with_stub_defaults();
    let started = Instant::now();
    let result = Applier::new(&registry, store).apply(&plan, nodes);

    if let Err(e) = store.unlock(lock) {
        cli::warning(&format!("Failed to release state lock: {e}"));
    }

    match result {
        Ok(summary) => {
            cli::success(&format!(
                "{} complete in {}: {} created, {} updated, {} deleted, {} unchanged",
                verb,
                cli::format_duration(started.elapsed()),
                summary.created,
                summary.updated,
                summary.deleted,
                summary.unchanged
            ));
        }
        Err(e) => {
            cli::error(&format!(
                "{verb} halted: {e} (already-applied resources remain recorded)"
            ));
            std::process::exit(1);
        }
    }
}
