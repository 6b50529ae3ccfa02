//! Exit code constants for the corral CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, bad config)
//! - 2: Transport failure (no leader reachable)
//! - 3: Protocol failure (unexpected response from the leader)
//! - 4: Invalid lock state (release/done from the wrong state)
//! - 5: Timeout (only with an explicit --timeout-secs)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Transport failure: leader socket missing, not a socket, or unreachable.
pub const TRANSPORT_FAILURE: i32 = 2;

/// Protocol failure: the leader answered outside the defined outcomes.
pub const PROTOCOL_FAILURE: i32 = 3;

/// Invalid lock state: a CAS transition was attempted from the wrong state.
pub const STATE_FAILURE: i32 = 4;

/// Timeout: an opt-in deadline expired before the wait completed.
pub const TIMEOUT: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            TRANSPORT_FAILURE,
            PROTOCOL_FAILURE,
            STATE_FAILURE,
            TIMEOUT,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
