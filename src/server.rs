//! Leader server: hosts the lock store over a Unix domain socket.
//!
//! Exactly one process per working directory wins the bind on the well-known
//! socket path and becomes the leader for the lifetime of that process. A
//! losing bind (`AddrInUse`) is not a failure: it means a leader is already
//! active and the caller should proceed as a client only. There is no further
//! leader election.
//!
//! Each accepted connection is served on its own thread, one request per
//! connection. Store access goes through the single store mutex, so
//! compare-and-swap stays linearizable no matter how many connections are in
//! flight.

use crate::error::{CorralError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::protocol::{self, LOCK_PATH, METHOD_GET, METHOD_PATCH, Request, Response};
use crate::store::LockStore;
use serde_json::json;
use std::fs;
use std::io::{BufReader, ErrorKind};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Drain window used when a server is dropped without an explicit shutdown.
const DEFAULT_DRAIN: Duration = Duration::from_secs(2);

/// Per-connection read timeout. A client that connects and then stalls must
/// not pin a worker thread forever through a drain.
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of attempting to bind the leader socket.
#[derive(Debug)]
pub enum BindOutcome {
    /// This process won the bind race and now hosts the store.
    Bound(LeaderServer),
    /// Another leader already holds the socket; proceed as a client.
    AlreadyRunning,
}

/// The leader's server: bound socket, store, and serving threads.
///
/// Dropping the server performs a best-effort drain and releases the socket
/// path; call [`LeaderServer::shutdown`] to control the grace period and
/// observe errors.
#[derive(Debug)]
pub struct LeaderServer {
    socket_path: PathBuf,
    events: EventLog,
    shutdown_flag: Arc<AtomicBool>,
    accept_handle: Option<JoinHandle<()>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    drain_grace: Duration,
    drained: bool,
}

impl LeaderServer {
    /// Attempt to claim `socket_path` exclusively and start serving, with
    /// the default drain window for shutdown.
    pub fn bind(socket_path: &Path) -> Result<BindOutcome> {
        Self::bind_with_drain(socket_path, DEFAULT_DRAIN)
    }

    /// Attempt to claim `socket_path` exclusively and start serving.
    ///
    /// `AddrInUse` yields [`BindOutcome::AlreadyRunning`]; any other bind
    /// failure is a transport error. The socket's parent directory is
    /// created if missing. `drain_grace` bounds how long a later shutdown
    /// waits for in-flight requests.
    pub fn bind_with_drain(socket_path: &Path, drain_grace: Duration) -> Result<BindOutcome> {
        if let Some(parent) = socket_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CorralError::UserError(format!(
                    "failed to create socket directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let listener = match UnixListener::bind(socket_path) {
            Ok(listener) => listener,
            Err(e) if e.kind() == ErrorKind::AddrInUse => return Ok(BindOutcome::AlreadyRunning),
            Err(e) => {
                return Err(CorralError::TransportError(format!(
                    "failed to bind leader socket '{}': {}",
                    socket_path.display(),
                    e
                )));
            }
        };

        let store = Arc::new(LockStore::new());
        let events = EventLog::for_socket(socket_path);
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let workers = Arc::new(Mutex::new(Vec::new()));

        events.append_best_effort(
            &Event::new(EventAction::LeaderBind)
                .with_details(json!({"socket": socket_path.display().to_string()})),
        );

        let accept_handle = {
            let store = Arc::clone(&store);
            let events = events.clone();
            let shutdown_flag = Arc::clone(&shutdown_flag);
            let workers = Arc::clone(&workers);
            thread::spawn(move || accept_loop(listener, store, events, shutdown_flag, workers))
        };

        Ok(BindOutcome::Bound(LeaderServer {
            socket_path: socket_path.to_path_buf(),
            events,
            shutdown_flag,
            accept_handle: Some(accept_handle),
            workers,
            drain_grace,
            drained: false,
        }))
    }

    /// Path of the bound socket.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Block until the accept loop exits.
    ///
    /// The accept loop only exits on shutdown or a listener error, so for
    /// the `serve` command this blocks until the process is terminated;
    /// leader death wiping all lock state is the accepted contract.
    pub fn wait(mut self) {
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }
    }

    /// Graceful drain: stop accepting, let in-flight requests finish within
    /// the drain window, then release the socket path.
    pub fn shutdown(mut self) -> Result<()> {
        let grace = self.drain_grace;
        self.shutdown_inner(grace)
    }

    fn shutdown_inner(&mut self, grace: Duration) -> Result<()> {
        if self.drained {
            return Ok(());
        }
        self.drained = true;

        self.shutdown_flag.store(true, Ordering::SeqCst);
        // Wake the accept loop; it re-checks the flag before serving the
        // wake-up connection.
        let _ = UnixStream::connect(&self.socket_path);
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }

        let deadline = Instant::now() + grace;
        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(|poison| poison.into_inner());
            std::mem::take(&mut *guard)
        };
        let mut abandoned = 0usize;
        for handle in workers {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            eprintln!(
                "Warning: abandoned {} in-flight connection(s) after {:?} drain",
                abandoned, grace
            );
        }

        match fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CorralError::UserError(format!(
                    "failed to remove leader socket '{}': {}",
                    self.socket_path.display(),
                    e
                )));
            }
        }

        self.events.append_best_effort(
            &Event::new(EventAction::Shutdown)
                .with_details(json!({"abandoned_connections": abandoned})),
        );

        Ok(())
    }
}

impl Drop for LeaderServer {
    fn drop(&mut self) {
        let grace = self.drain_grace;
        if !self.drained
            && let Err(e) = self.shutdown_inner(grace)
        {
            eprintln!("Warning: leader shutdown failed: {}", e);
        }
    }
}

fn accept_loop(
    listener: UnixListener,
    store: Arc<LockStore>,
    events: EventLog,
    shutdown_flag: Arc<AtomicBool>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    for stream in listener.incoming() {
        if shutdown_flag.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                let store = Arc::clone(&store);
                let events = events.clone();
                let handle = thread::spawn(move || handle_connection(stream, &store, &events));

                let mut guard = workers.lock().unwrap_or_else(|poison| poison.into_inner());
                // Completed workers are reaped as new connections arrive, so
                // a long-lived leader does not accumulate handles.
                guard.retain(|h: &JoinHandle<()>| !h.is_finished());
                guard.push(handle);
            }
            Err(e) => {
                if shutdown_flag.load(Ordering::SeqCst) {
                    break;
                }
                eprintln!("Warning: failed to accept connection: {}", e);
            }
        }
    }
}

/// Serve one request on one connection, then close it.
fn handle_connection(mut stream: UnixStream, store: &LockStore, events: &EventLog) {
    let _ = stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT));

    let reader_half = match stream.try_clone() {
        Ok(clone) => clone,
        Err(e) => {
            eprintln!("Warning: failed to clone connection: {}", e);
            return;
        }
    };
    let mut reader = BufReader::new(reader_half);

    let response = match protocol::read_request(&mut reader) {
        Ok(request) => route(store, events, &request),
        Err(e) => Response::bad_request(format!("malformed request: {}", e)),
    };

    // The peer may already be gone (the shutdown wake-up connects and
    // immediately hangs up); a failed write is not worth a warning.
    let _ = protocol::write_response(&mut stream, &response);
}

/// Map a parsed request to a response against the store.
fn route(store: &LockStore, events: &EventLog, request: &Request) -> Response {
    if request.path != LOCK_PATH {
        return Response::not_found();
    }

    match request.method.as_str() {
        METHOD_GET => {
            let key = request.param("key");
            if key.is_empty() {
                return Response::bad_request("key parameter missing");
            }
            Response::ok(store.get(key))
        }

        METHOD_PATCH => {
            let key = request.param("key");
            if key.is_empty() {
                return Response::bad_request("key parameter missing");
            }
            // old/new default to the empty string: empty is a legal token
            // (unlocked / never-written), so absence is not malformed.
            let old = request.param("old");
            let new = request.param("new");
            let replaced = store.compare_and_swap(key, old, new);

            events.append_best_effort(
                &Event::new(EventAction::Cas)
                    .with_key(key)
                    .with_details(json!({"old": old, "new": new, "replaced": replaced})),
            );

            if replaced {
                Response::no_content()
            } else {
                Response::not_modified()
            }
        }

        _ => Response::method_not_allowed(),
    }
}
