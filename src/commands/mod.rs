//! Command implementations for corral.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every lock subcommand is pure client-side work: build a
//! client against the configured socket and drive the relevant state
//! machine. Only `serve` hosts anything.

use crate::cli::{
    AcquireArgs, Command, DoArgs, DoneArgs, GetArgs, LockAction, LockCommand, ReleaseArgs,
    ServeArgs,
};
use crate::client::LeaderClient;
use crate::config::Config;
use crate::error::Result;
use crate::lock;
use crate::server::{BindOutcome, LeaderServer};
use std::path::PathBuf;
use std::time::Duration;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Serve(args) => cmd_serve(args),
        Command::Lock(lock_cmd) => dispatch_lock(lock_cmd),
    }
}

/// Dispatch lock subcommands.
fn dispatch_lock(lock_cmd: LockCommand) -> Result<()> {
    match lock_cmd.action {
        LockAction::Acquire(args) => cmd_acquire(args),
        LockAction::Release(args) => cmd_release(args),
        LockAction::Do(args) => cmd_do(args),
        LockAction::Done(args) => cmd_done(args),
        LockAction::Get(args) => cmd_get(args),
    }
}

/// Resolve config plus the effective socket path (CLI flag wins).
fn resolve(socket_override: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let config = Config::load_or_default()?;
    let socket = socket_override.unwrap_or_else(|| config.socket_path.clone());
    Ok((config, socket))
}

/// Build a client for the effective socket path.
fn client_for(socket_override: Option<PathBuf>) -> Result<(Config, LeaderClient)> {
    let (config, socket) = resolve(socket_override)?;
    let client = LeaderClient::connect(&socket)?;
    Ok((config, client))
}

fn cmd_serve(args: ServeArgs) -> Result<()> {
    let (config, socket) = resolve(args.socket)?;

    match LeaderServer::bind_with_drain(&socket, config.shutdown_grace())? {
        BindOutcome::AlreadyRunning => {
            // Losing the bind race is the normal "someone else is leader"
            // branch, not a failure.
            eprintln!("corral: a leader is already running on '{}'", socket.display());
            Ok(())
        }
        BindOutcome::Bound(server) => {
            println!(
                "corral: leader listening on '{}'",
                server.socket_path().display()
            );
            server.wait();
            Ok(())
        }
    }
}

fn cmd_acquire(args: AcquireArgs) -> Result<()> {
    let (config, client) = client_for(args.socket)?;
    let deadline = args.timeout_secs.map(Duration::from_secs);
    lock::acquire(&client, &args.key, config.poll_interval(), deadline)
}

fn cmd_release(args: ReleaseArgs) -> Result<()> {
    let (_config, client) = client_for(args.socket)?;
    lock::release(&client, &args.key)
}

fn cmd_do(args: DoArgs) -> Result<()> {
    let (config, client) = client_for(args.socket)?;
    let deadline = args.timeout_secs.map(Duration::from_secs);
    let outcome = lock::do_once(&client, &args.key, config.poll_interval(), deadline)?;

    // Caller-visible contract: exactly `do` or `done` on stdout, nothing
    // else. Scripts branch on this.
    println!("{}", outcome);
    Ok(())
}

fn cmd_done(args: DoneArgs) -> Result<()> {
    let (_config, client) = client_for(args.socket)?;
    lock::mark_done(&client, &args.key)
}

fn cmd_get(args: GetArgs) -> Result<()> {
    let (_config, client) = client_for(args.socket)?;
    let value = client.get(&args.key)?;
    println!("{}", value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes;
    use crate::test_support::TestLeader;
    use serial_test::serial;
    use tempfile::TempDir;

    // Commands resolve `.corral/config.yaml` relative to the working
    // directory, so tests that exercise resolution run serially.

    #[test]
    #[serial]
    fn lock_commands_fail_with_transport_error_without_a_leader() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("no-leader-sock");

        let result = cmd_release(ReleaseArgs {
            key: "k".to_string(),
            socket: Some(missing.clone()),
        });
        assert_eq!(
            result.unwrap_err().exit_code(),
            exit_codes::TRANSPORT_FAILURE
        );

        let result = cmd_get(GetArgs {
            key: "k".to_string(),
            socket: Some(missing),
        });
        assert_eq!(
            result.unwrap_err().exit_code(),
            exit_codes::TRANSPORT_FAILURE
        );
    }

    #[test]
    #[serial]
    fn acquire_and_release_against_a_live_leader() {
        let leader = TestLeader::spawn();
        let socket = leader.socket_path().to_path_buf();

        cmd_acquire(AcquireArgs {
            key: "llama".to_string(),
            socket: Some(socket.clone()),
            timeout_secs: None,
        })
        .unwrap();

        cmd_release(ReleaseArgs {
            key: "llama".to_string(),
            socket: Some(socket),
        })
        .unwrap();
    }

    #[test]
    #[serial]
    fn release_without_acquire_is_a_state_error() {
        let leader = TestLeader::spawn();

        let result = cmd_release(ReleaseArgs {
            key: "unheld".to_string(),
            socket: Some(leader.socket_path().to_path_buf()),
        });
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::STATE_FAILURE);
    }

    #[test]
    #[serial]
    fn do_done_cycle_through_commands() {
        let leader = TestLeader::spawn();
        let socket = leader.socket_path().to_path_buf();

        cmd_do(DoArgs {
            key: "setup".to_string(),
            socket: Some(socket.clone()),
            timeout_secs: None,
        })
        .unwrap();

        cmd_done(DoneArgs {
            key: "setup".to_string(),
            socket: Some(socket.clone()),
        })
        .unwrap();

        // A second `do` now sees the terminal state and succeeds.
        cmd_do(DoArgs {
            key: "setup".to_string(),
            socket: Some(socket),
            timeout_secs: None,
        })
        .unwrap();
    }

    #[test]
    #[serial]
    fn serve_reports_already_running_as_success() {
        let leader = TestLeader::spawn();

        let result = cmd_serve(ServeArgs {
            socket: Some(leader.socket_path().to_path_buf()),
        });
        assert!(result.is_ok(), "losing the bind race must not be an error");
    }
}
