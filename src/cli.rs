//! CLI argument parsing for corral.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Corral: host-local lock coordination for fleets of cooperating agent
/// processes.
///
/// One process per working directory becomes the leader and hosts a tiny
/// in-memory lock store over a Unix socket; everyone else coordinates
/// through it with compare-and-swap based lock protocols.
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for corral.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the leader for this working directory.
    ///
    /// Attempts to bind the leader socket. If another leader already holds
    /// it, reports so and exits successfully (this process should simply act
    /// as a client). All lock state lives in this process and vanishes when
    /// it exits.
    Serve(ServeArgs),

    /// Lock coordination commands.
    ///
    /// Acquire/release an exclusive lock, or run a do-once barrier, against
    /// the current leader.
    Lock(LockCommand),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Leader socket path (overrides config).
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Acquire the exclusive lock for a key.
    ///
    /// Waits (potentially forever) until the lock is free. If multiple
    /// processes are waiting for the same lock, there is no ordering
    /// guarantee of which one acquires it next.
    Acquire(AcquireArgs),

    /// Release a previously-acquired lock.
    ///
    /// This should only be called by the process that acquired the lock.
    Release(ReleaseArgs),

    /// Begin a do-once barrier for a key.
    ///
    /// Prints exactly `do` if this process should perform the shared work
    /// (and then call `lock done`), or `done` once the work is complete.
    Do(DoArgs),

    /// Complete a do-once barrier.
    ///
    /// This should only be called by the process that was told to `do`.
    Done(DoneArgs),

    /// Print the raw state token for a key (diagnosis).
    Get(GetArgs),
}

/// Arguments for the `lock acquire` command.
#[derive(Parser, Debug)]
pub struct AcquireArgs {
    /// Lock key to acquire.
    pub key: String,

    /// Leader socket path (overrides config).
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Give up after this many seconds instead of waiting forever.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Arguments for the `lock release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Lock key to release.
    pub key: String,

    /// Leader socket path (overrides config).
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

/// Arguments for the `lock do` command.
#[derive(Parser, Debug)]
pub struct DoArgs {
    /// Do-once key.
    pub key: String,

    /// Leader socket path (overrides config).
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Give up after this many seconds instead of waiting forever.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Arguments for the `lock done` command.
#[derive(Parser, Debug)]
pub struct DoneArgs {
    /// Do-once key.
    pub key: String,

    /// Leader socket path (overrides config).
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

/// Arguments for the `lock get` command.
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Lock key to inspect.
    pub key: String,

    /// Leader socket path (overrides config).
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
