use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use worktree_hub::git::GitError;
use worktree_hub::styling::{ERROR, ERROR_EMOJI, eprintln};

mod commands;

use commands::{
    Context, handle_add, handle_list, handle_lock, handle_open, handle_prune, handle_remove,
    handle_status, handle_unlock,
};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format
    Json,
}

#[derive(Parser)]
#[command(name = "wth")]
#[command(about = "Git worktree management", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Run as if started in <path>
    #[arg(short = 'C', global = true, value_name = "path")]
    directory: Option<PathBuf>,

    /// Show git commands and timings (-vv for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all worktrees
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Also display branches that don't have worktrees
        #[arg(long)]
        branches: bool,
    },

    /// Create a worktree for a branch
    Add {
        /// Branch to check out (or create with --create; a commit with --detach)
        branch: String,

        /// Create a new branch
        #[arg(short = 'c', long)]
        create: bool,

        /// Check out the commit with a detached HEAD instead of a branch
        #[arg(long, conflicts_with_all = ["create", "base"])]
        detach: bool,

        /// Base for the new branch (only with --create; default HEAD)
        #[arg(short = 'b', long, requires = "create")]
        base: Option<String>,

        /// Worktree directory (default: from the worktree-path template)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Open a terminal in the new worktree
        #[arg(long)]
        open: bool,
    },

    /// Remove a worktree and delete its branch when nothing else uses it
    Remove {
        /// Worktree path or branch name
        target: String,

        /// Remove even with modified or untracked files
        #[arg(short = 'f', long)]
        force: bool,

        /// Keep the branch
        #[arg(long)]
        keep_branch: bool,
    },

    /// Lock a worktree so prune leaves it alone
    Lock {
        /// Worktree path or branch name
        target: String,

        /// Why the worktree is locked
        #[arg(long)]
        reason: Option<String>,
    },

    /// Unlock a worktree
    Unlock {
        /// Worktree path or branch name
        target: String,
    },

    /// Remove metadata of worktrees whose directories are gone
    Prune {
        /// Only show what would be pruned
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show branch tracking and file counts for a worktree
    Status {
        /// Worktree path or branch name (default: current directory)
        target: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Open a terminal in a worktree
    Open {
        /// Worktree path or branch name (default: current directory)
        target: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Context::load(cli.directory.as_deref()).and_then(|ctx| match cli.command {
        Commands::List { format, branches } => handle_list(&ctx, format, branches),
        Commands::Add {
            branch,
            create,
            detach,
            base,
            path,
            open,
        } => handle_add(
            &ctx,
            &branch,
            create,
            detach,
            base.as_deref(),
            path.as_deref(),
            open,
        ),
        Commands::Remove {
            target,
            force,
            keep_branch,
        } => handle_remove(&ctx, &target, force, keep_branch),
        Commands::Lock { target, reason } => handle_lock(&ctx, &target, reason.as_deref()),
        Commands::Unlock { target } => handle_unlock(&ctx, &target),
        Commands::Prune { dry_run, yes } => handle_prune(&ctx, dry_run, yes),
        Commands::Status { target, format } => handle_status(&ctx, target.as_deref(), format),
        Commands::Open { target } => handle_open(&ctx, target.as_deref()),
    });

    if let Err(e) = result {
        // GitError messages are already formatted with emoji and colors
        match e.downcast_ref::<GitError>() {
            Some(git_error) => eprintln!("{git_error}"),
            None => eprintln!("{ERROR_EMOJI} {ERROR}{e:#}{ERROR:#}"),
        }
        process::exit(1);
    }
}
