//! Client for the leader's lock API.
//!
//! Every process reaches the store through this client, the leader included;
//! there is no in-process shortcut. Construction probes the socket so a
//! missing leader fails fast with a clear diagnostic instead of surfacing on
//! the first real operation. Each operation uses its own short-lived
//! connection: one request, one response, close.

use crate::error::{CorralError, Result};
use crate::protocol::{self, LOCK_PATH, METHOD_GET, METHOD_PATCH, Response};
use std::io::BufReader;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Client for the leader socket.
#[derive(Debug, Clone)]
pub struct LeaderClient {
    socket_path: PathBuf,
}

impl LeaderClient {
    /// Connect to the leader at `socket_path`.
    ///
    /// Verifies the path exists and is a socket, then opens and immediately
    /// closes a test connection. Any failure is a transport error naming the
    /// underlying cause.
    pub fn connect(socket_path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(socket_path).map_err(|e| {
            CorralError::TransportError(format!(
                "leader socket '{}' not found ({}); is a leader running?",
                socket_path.display(),
                e
            ))
        })?;

        if !metadata.file_type().is_socket() {
            return Err(CorralError::TransportError(format!(
                "'{}' exists but is not a socket",
                socket_path.display()
            )));
        }

        // Probe: a stale socket file left by a dead leader passes the stat
        // check but refuses connections.
        let probe = UnixStream::connect(socket_path).map_err(|e| {
            CorralError::TransportError(format!(
                "socket test connection to '{}' failed ({}); if the leader is gone, \
                 remove the stale socket file",
                socket_path.display(),
                e
            ))
        })?;
        drop(probe);

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
        })
    }

    fn request(&self, method: &str, params: &[(&str, &str)]) -> Result<Response> {
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            CorralError::TransportError(format!(
                "failed to connect to leader socket '{}': {}",
                self.socket_path.display(),
                e
            ))
        })?;

        protocol::write_request(&mut stream, method, LOCK_PATH, params)?;

        let mut reader = BufReader::new(stream);
        protocol::read_response(&mut reader)
    }

    /// Get the current value of the lock key.
    ///
    /// Returns the empty string for a key that was never written.
    pub fn get(&self, key: &str) -> Result<String> {
        let response = self.request(METHOD_GET, &[("key", key)])?;
        match response.status {
            200 => Ok(response.body),
            status => Err(CorralError::ProtocolError(format!(
                "unexpected status {} reading key '{}': {}",
                status, key, response.body
            ))),
        }
    }

    /// Atomically compare-and-swap the old value for the new value, or
    /// perform no modification. Reports whether the new value was written.
    ///
    /// A `false` return means `old` did not match the stored value; that is
    /// a normal outcome, not an error.
    pub fn compare_and_swap(&self, key: &str, old: &str, new: &str) -> Result<bool> {
        let response = self.request(
            METHOD_PATCH,
            &[("key", key), ("old", old), ("new", new)],
        )?;
        match response.status {
            204 => Ok(true),
            304 => Ok(false),
            status => Err(CorralError::ProtocolError(format!(
                "unexpected status {} swapping key '{}': {}",
                status, key, response.body
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestLeader;
    use tempfile::TempDir;

    #[test]
    fn connect_fails_when_socket_is_missing() {
        let temp = TempDir::new().unwrap();
        let result = LeaderClient::connect(&temp.path().join("no-sock"));
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::TRANSPORT_FAILURE);
        assert!(err.to_string().contains("is a leader running?"));
    }

    #[test]
    fn connect_fails_when_path_is_not_a_socket() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("regular-file");
        std::fs::write(&path, "not a socket").unwrap();

        let err = LeaderClient::connect(&path).unwrap_err();
        assert!(err.to_string().contains("not a socket"));
    }

    #[test]
    fn get_on_unset_key_returns_empty_string() {
        let leader = TestLeader::spawn();
        let client = leader.client();
        assert_eq!(client.get("never-written").unwrap(), "");
    }

    #[test]
    fn cas_reports_replaced_and_unchanged() {
        let leader = TestLeader::spawn();
        let client = leader.client();

        assert!(client.compare_and_swap("k", "", "1").unwrap());
        assert!(!client.compare_and_swap("k", "", "2").unwrap());
        assert_eq!(client.get("k").unwrap(), "1");
    }

    #[test]
    fn build_lock_scenario_over_the_wire() {
        let leader = TestLeader::spawn();
        let client = leader.client();

        assert!(client.compare_and_swap("build-lock", "", "1").unwrap());
        assert_eq!(client.get("build-lock").unwrap(), "1");
        assert!(client.compare_and_swap("build-lock", "1", "2").unwrap());
        assert_eq!(client.get("build-lock").unwrap(), "2");
        assert!(!client.compare_and_swap("build-lock", "1", "3").unwrap());
        assert_eq!(client.get("build-lock").unwrap(), "2");
    }

    #[test]
    fn tokens_with_reserved_characters_round_trip() {
        let leader = TestLeader::spawn();
        let client = leader.client();

        let token = "holder=agent 7&step/2";
        assert!(client.compare_and_swap("spaced key", "", token).unwrap());
        assert_eq!(client.get("spaced key").unwrap(), token);
    }

    #[test]
    fn empty_key_surfaces_as_a_protocol_error() {
        let leader = TestLeader::spawn();
        let client = leader.client();

        let err = client.get("").unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::PROTOCOL_FAILURE);

        let err = client.compare_and_swap("", "", "1").unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::PROTOCOL_FAILURE);
    }

    #[test]
    fn operations_fail_with_transport_error_after_leader_exit() {
        let leader = TestLeader::spawn();
        let client = leader.client();
        leader.shutdown();

        let err = client.get("k").unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::TRANSPORT_FAILURE);
    }
}
