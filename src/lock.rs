//! Lock state machines layered on the leader's compare-and-swap primitive.
//!
//! Both protocols are pure client-side orchestration of `get` and
//! `compare_and_swap`, run identically in every participating process. The
//! store never interprets tokens; all meaning lives here.
//!
//! # Exclusive lock
//!
//! Two states per key: `""` (unlocked) and `"1"` (locked). Acquire spins on
//! `cas(key, "", "1")` with a fixed sleep between attempts; release is a
//! single `cas(key, "1", "")` whose failure is fatal.
//!
//! # Do-once barrier
//!
//! Three states per key: `""` (new), `"doing"`, `"done"`, transitioning only
//! forward. The first caller to win `cas(key, "", "doing")` is elected to do
//! the work; everyone else polls until the worker marks the key `"done"`.
//!
//! Waits are unbounded by contract. Callers wanting a bound pass an explicit
//! deadline; `None` (the default everywhere) never changes that contract.

use crate::client::LeaderClient;
use crate::error::{CorralError, Result};
use std::time::{Duration, Instant};

/// Token stored while an exclusive lock is held.
pub const LOCKED_TOKEN: &str = "1";

/// Token stored while the elected do-once worker is busy.
pub const DOING_TOKEN: &str = "doing";

/// Token stored once do-once work is complete.
pub const DONE_TOKEN: &str = "done";

/// What a `do_once` caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoOutcome {
    /// This caller was elected: perform the work, then call [`mark_done`].
    Do,
    /// The work is already complete; proceed without doing it.
    Done,
}

impl std::fmt::Display for DoOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoOutcome::Do => write!(f, "do"),
            DoOutcome::Done => write!(f, "done"),
        }
    }
}

fn check_deadline(started: Instant, deadline: Option<Duration>, waiting_for: &str) -> Result<()> {
    if let Some(limit) = deadline
        && started.elapsed() >= limit
    {
        return Err(CorralError::TimeoutError(format!(
            "waited {:?} for {}",
            limit, waiting_for
        )));
    }
    Ok(())
}

/// Acquire the exclusive lock for `key`, waiting as long as it takes.
///
/// Retries every `poll_interval` until the lock is free. There is no
/// fairness among waiters: any of them may win a given race. With
/// `deadline: None` this waits forever by design.
pub fn acquire(
    client: &LeaderClient,
    key: &str,
    poll_interval: Duration,
    deadline: Option<Duration>,
) -> Result<()> {
    let started = Instant::now();
    loop {
        if client.compare_and_swap(key, "", LOCKED_TOKEN)? {
            return Ok(());
        }
        check_deadline(started, deadline, &format!("lock '{}'", key))?;
        std::thread::sleep(poll_interval);
    }
}

/// Release the exclusive lock for `key`.
///
/// Only the process that acquired the lock should call this. Failure means
/// the key was not in the locked state: releasing a lock that is not held,
/// or external corruption. Both require manual inspection, so this is fatal
/// rather than retried or papered over.
pub fn release(client: &LeaderClient, key: &str) -> Result<()> {
    if client.compare_and_swap(key, LOCKED_TOKEN, "")? {
        Ok(())
    } else {
        Err(CorralError::StateError(format!(
            "lock '{}' is not in a state to release; investigate with 'lock get {}'",
            key, key
        )))
    }
}

/// Enter the do-once barrier for `key`.
///
/// Returns [`DoOutcome::Do`] if this caller was elected to perform the work
/// (it must then call [`mark_done`]), or [`DoOutcome::Done`] once the work is
/// complete. While another process is working, this polls every
/// `poll_interval`; observed completion latency is bounded by that interval.
pub fn do_once(
    client: &LeaderClient,
    key: &str,
    poll_interval: Duration,
    deadline: Option<Duration>,
) -> Result<DoOutcome> {
    let started = Instant::now();
    loop {
        let state = client.get(key)?;
        match state.as_str() {
            "" => {
                if client.compare_and_swap(key, "", DOING_TOKEN)? {
                    return Ok(DoOutcome::Do);
                }
                // Lost the election race; re-read to see who won.
            }
            DOING_TOKEN => {
                check_deadline(started, deadline, &format!("completion of '{}'", key))?;
                std::thread::sleep(poll_interval);
            }
            DONE_TOKEN => return Ok(DoOutcome::Done),
            other => {
                return Err(CorralError::StateError(format!(
                    "key '{}' holds unexpected token '{}' for do-once; \
                     investigate with 'lock get {}'",
                    key, other, key
                )));
            }
        }
    }
}

/// Mark do-once work on `key` as complete.
///
/// Only the process that was elected by [`do_once`] should call this.
/// Failure means the key was not in the doing state, which is a fatal usage
/// error.
pub fn mark_done(client: &LeaderClient, key: &str) -> Result<()> {
    if client.compare_and_swap(key, DOING_TOKEN, DONE_TOKEN)? {
        Ok(())
    } else {
        Err(CorralError::StateError(format!(
            "lock '{}' is not in a state to mark complete; investigate with 'lock get {}'",
            key, key
        )))
    }
}
