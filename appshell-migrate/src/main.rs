use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use appshell_migrate::diff::{print_diff, print_summary_diff};
use appshell_migrate::migrate::{MigrateOptions, Migration, OutputFormat};
use appshell_migrate::state::{clean_old_state, get_state_dir, revert_run, show_history, RunJournal};
use appshell_migrate::{FsTree, MigrationSpec, ShellEditor};

#[derive(Parser)]
#[command(name = "appshell-migrate")]
#[command(about = "Replace the NavBar component with the AppShell wrapper across a source tree", long_about = None)]
#[command(version)]
struct Cli {
    /// Use project-local state directory (.appshell-migrate) instead of the user data directory
    #[arg(long, global = true)]
    local_state: bool,

    /// Output format: "default", "diff", or "summary"
    #[arg(long, default_value = "default", global = true)]
    format: String,

    /// Show summary statistics after diff output
    #[arg(long, global = true)]
    summary: bool,

    /// Leave this path untouched (relative to the root, absolute, or glob); repeat for more
    #[arg(long, global = true)]
    exclude: Vec<String>,

    /// Migration spec file (YAML or JSON) overriding component names, guards and extensions
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log per-file decisions to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files that still import the retiring component
    Scan {
        /// Root directory of the source tree
        root: PathBuf,
    },

    /// Migrate every selected file (default is dry-run)
    Migrate {
        /// Root directory of the source tree
        root: PathBuf,

        /// Apply changes (default is dry-run)
        #[arg(long)]
        apply: bool,
    },

    /// Rewrite a single file and print the result without writing it
    Rewrite {
        /// File to rewrite
        file: PathBuf,
    },

    /// Show run history
    History {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Revert a specific run
    Revert {
        /// Run ID to revert
        run_id: String,

        /// Revert even if files have changed since the run
        #[arg(long)]
        force: bool,
    },

    /// Clean old state data
    Clean {
        /// Keep runs from the last N days
        #[arg(long, default_value = "30")]
        keep_days: u32,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "appshell_migrate=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_spec(config: Option<&Path>) -> Result<MigrationSpec> {
    match config {
        Some(path) => MigrationSpec::load(path)
            .with_context(|| format!("Failed to load migration spec {}", path.display())),
        None => Ok(MigrationSpec::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = cli
        .format
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    match cli.command {
        Commands::Scan { root } => {
            let spec = load_spec(cli.config.as_deref())?;
            let tree = FsTree::new(&spec.extensions);
            let migration = Migration::new(&tree, &spec, &root, &cli.exclude)?;

            let discovery = migration.discover()?;
            println!("Found {} files to migrate", discovery.candidates.len());
            for path in &discovery.candidates {
                let shown = path.strip_prefix(&root).unwrap_or(path.as_path());
                println!("  {}", shown.display());
            }
            for (path, err) in &discovery.errors {
                println!("  ERR {}: {}", path.display(), err);
            }
        }

        Commands::Migrate { root, apply } => {
            let spec = load_spec(cli.config.as_deref())?;
            let tree = FsTree::new(&spec.extensions);
            let migration = Migration::new(&tree, &spec, &root, &cli.exclude)?;
            let options = MigrateOptions { apply, format };

            let report = if apply {
                let state_dir = get_state_dir(cli.local_state)?;
                let command = std::env::args().collect::<Vec<_>>().join(" ");
                let mut journal = RunJournal::new(&state_dir, &root, command);
                info!(run_id = journal.run_id(), "applying");

                let mut report = migration.run(options, Some(&mut journal))?;
                report.run_id = journal.finish()?;
                report
            } else {
                migration.run(options, None)?
            };

            if format != OutputFormat::Default && cli.summary {
                report.stats.print_summary();
            }
            report.print();
        }

        Commands::Rewrite { file } => {
            let spec = load_spec(cli.config.as_deref())?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let editor = ShellEditor::new(&spec)?;
            let rewrite = editor
                .rewrite(&content)
                .with_context(|| format!("Failed to rewrite {}", file.display()))?;

            if !rewrite.changed {
                println!("No changes: {} does not import {}", file.display(), spec.old_component);
                return Ok(());
            }

            match format {
                OutputFormat::Default => print!("{}", rewrite.text),
                OutputFormat::Diff => {
                    let stats = print_diff(&file, &content, &rewrite.text);
                    if cli.summary {
                        stats.print_summary();
                    }
                }
                OutputFormat::Summary => {
                    print_summary_diff(&file, &content, &rewrite.text);
                }
            }
        }

        Commands::History { limit } => {
            let state_dir = get_state_dir(cli.local_state)?;
            show_history(limit, &state_dir)?;
        }

        Commands::Revert { run_id, force } => {
            let state_dir = get_state_dir(cli.local_state)?;
            revert_run(&run_id, force, &state_dir)?;
        }

        Commands::Clean { keep_days } => {
            let state_dir = get_state_dir(cli.local_state)?;
            let cleaned = clean_old_state(keep_days, &state_dir)?;
            println!("✓ Cleaned {} old run(s)", cleaned);
        }
    }

    Ok(())
}
