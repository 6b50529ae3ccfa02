use crate::client::LeaderClient;
use crate::server::{BindOutcome, LeaderServer};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway leader on a socket inside its own temp directory.
///
/// The temp directory keeps socket paths unique across parallel tests; both
/// the socket and the directory disappear when the leader is dropped.
pub(crate) struct TestLeader {
    server: Option<LeaderServer>,
    socket_path: PathBuf,
    _dir: TempDir,
}

impl TestLeader {
    pub(crate) fn spawn() -> Self {
        let dir = TempDir::new().unwrap();
        let socket_path = dir.path().join("leader-sock");
        let server = match LeaderServer::bind(&socket_path).unwrap() {
            BindOutcome::Bound(server) => server,
            BindOutcome::AlreadyRunning => {
                panic!("fresh temp socket path reported already running")
            }
        };
        Self {
            server: Some(server),
            socket_path,
            _dir: dir,
        }
    }

    pub(crate) fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub(crate) fn client(&self) -> LeaderClient {
        LeaderClient::connect(&self.socket_path).unwrap()
    }

    /// Drain and release the socket, leaving clients to fail with transport
    /// errors.
    pub(crate) fn shutdown(mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown().unwrap();
        }
    }
}
