mod app;
mod chain;
mod config;
mod git;
mod prompt;
mod watch;

use anyhow::{Context, Result};
use app::{Check, Decision, Session, SessionSettings};
use clap::{Parser, Subcommand};
use config::{ChainerConfig, Overrides};
use git::{RepoHandle, SystemGit};
use prompt::TerminalPrompt;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use watch::{FileWatcher, PathFilter, WatchEvent};

/// Split large in-progress work into a chain of bounded-size branches
#[derive(Parser)]
#[command(name = "chainer", version, about)]
struct Cli {
    /// Repository path (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Changed lines that trigger a prompt
    #[arg(long, global = true)]
    threshold: Option<u64>,

    /// Lines added past the current total on increase/cancel
    #[arg(long, global = true)]
    increment: Option<u64>,

    /// Seconds to stay quiet after a cancel
    #[arg(long, global = true)]
    cooldown: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the working tree and prompt when the threshold is crossed (default)
    Watch,
    /// Show the change breakdown and what the gate would decide
    Status {
        /// Print the metric as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the inferred parent of a branch
    Parent {
        /// Branch to resolve (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Print the name of the next branch in the chain
    NextName {
        /// Base branch (defaults to the current branch)
        #[arg(long)]
        base: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::new().filter_or("CHAINER_LOG", "info"))
        .format_timestamp(None)
        .init();

    let repo = RepoHandle::resolve(&SystemGit, &cli.repo)?;
    let config = config::load_config(repo.root()).with_overrides(Overrides {
        threshold: cli.threshold,
        increment: cli.increment,
        cooldown_secs: cli.cooldown,
    });

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => run_watch(&repo, &config),
        Command::Status { json } => print_status(&repo, &config, json),
        Command::Parent { branch } => {
            let branch = branch_or_current(&repo, branch)?;
            println!("{}", chain::resolve_parent(&SystemGit, repo.root(), &branch));
            Ok(())
        }
        Command::NextName { base } => {
            let base = branch_or_current(&repo, base)?;
            println!("{}", chain::next_name(&SystemGit, &repo, &base));
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn branch_or_current(repo: &RepoHandle, branch: Option<String>) -> Result<String> {
    match branch {
        Some(b) => Ok(b),
        None => {
            let current = git::current_branch(&SystemGit, repo.root())?;
            if current.is_empty() {
                anyhow::bail!("HEAD is detached; pass a branch name");
            }
            Ok(current)
        }
    }
}

fn print_status(repo: &RepoHandle, config: &ChainerConfig, json: bool) -> Result<()> {
    let session = Session::new(SystemGit, repo.root(), SessionSettings::from(config));
    let (metric, decision) = session.preview()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metric)?);
        return Ok(());
    }

    println!("branch:    {}", display_branch(&metric.branch));
    println!("parent:    {}", metric.parent);
    println!(
        "changes:   {} ({} committed + {} uncommitted)",
        metric.total, metric.branch_portion, metric.working_portion
    );
    println!("threshold: {}", config.threshold.lines);
    println!(
        "decision:  {}",
        match decision {
            Decision::Show { .. } => "prompt".to_string(),
            Decision::SkipBelowThreshold => "below threshold".to_string(),
            Decision::SkipCooldown(d) => format!("cooling down ({}s left)", d.as_secs()),
        }
    );
    Ok(())
}

fn display_branch(branch: &str) -> &str {
    if branch.is_empty() {
        "(detached)"
    } else {
        branch
    }
}

fn run_watch(repo: &RepoHandle, config: &ChainerConfig) -> Result<()> {
    let session = Arc::new(Session::new(
        SystemGit,
        repo.root(),
        SessionSettings::from(config),
    ));

    let (watch_tx, watch_rx) = mpsc::channel::<WatchEvent>();
    let filter = PathFilter::new(repo.root(), &config.watch.ignore);
    let _watcher = FileWatcher::new(repo.root(), config.watch.debounce_ms, filter, watch_tx)
        .context("Failed to start file watcher")?;

    log::info!(
        "Watching {} (threshold {} lines)",
        repo.root().display(),
        config.threshold.lines
    );

    // Initial check, so work already over the threshold prompts right away
    check(&session, repo.root());

    for event in watch_rx {
        let WatchEvent::FilesChanged(paths) = event;
        log::debug!("{} path(s) changed", paths.len());
        check(&session, repo.root());
    }

    Ok(())
}

/// One debounced check; a Show hands the prompt and workflow to a worker
/// thread so the watcher keeps draining events (which come back Busy).
fn check(session: &Arc<Session<SystemGit>>, root: &Path) {
    match session.on_possible_change() {
        Ok(Check::Show(request, ticket)) => {
            let session = Arc::clone(session);
            std::thread::spawn(move || {
                let mut prompt = TerminalPrompt::stdio();
                if let Err(e) = session.handle_prompt(request, ticket, &mut prompt) {
                    log::warn!("Prompt aborted: {:#}", e);
                }
            });
        }
        Ok(Check::Busy) | Ok(Check::Skipped(_)) => {}
        Err(e) => log::warn!("Skipping check in {}: {:#}", root.display(), e),
    }
}
