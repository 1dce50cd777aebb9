//! Readiness contract for upstream hosted-batch inference.
//!
//! Prediction files are deposited by an out-of-process batch job. The engine
//! must not read them until the job reaches a terminal `Completed` state;
//! everything else about the upstream component is a black box. This module
//! models only that contract: the job state machine and a bounded-retry
//! polling helper.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from the batch-readiness contract
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Unknown batch status: {0}")]
    UnknownState(String),

    #[error("Batch job ended in terminal state {0:?} without usable output")]
    Terminal(BatchState),

    #[error("Batch job not complete after {0} polls")]
    RetriesExhausted(usize),

    #[error("Status probe failed: {0}")]
    Probe(String),
}

/// Lifecycle states of an upstream batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Submitted,
    InProgress,
    Completed,
    Failed,
    Expired,
}

impl BatchState {
    /// Whether the job can no longer change state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

impl FromStr for BatchState {
    type Err = BatchError;

    /// Parse a provider status string. Provider-specific spellings collapse
    /// into the five states the engine cares about.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" | "validating" => Ok(Self::Submitted),
            "in_progress" | "finalizing" | "pending" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" | "cancelling" | "cancelled" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(BatchError::UnknownState(s.to_string())),
        }
    }
}

/// Bounded-retry polling policy
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            interval: Duration::from_secs(30),
        }
    }
}

/// Poll a status probe until the job completes.
///
/// The probe is any closure that reports the current [`BatchState`], e.g. one
/// that re-reads a status file or queries the provider API.
///
/// # Errors
///
/// Returns an error if the job reaches `Failed` or `Expired`, if the probe
/// itself fails, or if `max_attempts` polls pass without completion.
pub fn wait_until_complete<F>(policy: PollPolicy, mut probe: F) -> Result<(), BatchError>
where
    F: FnMut() -> Result<BatchState, BatchError>,
{
    for attempt in 0..policy.max_attempts {
        match probe()? {
            BatchState::Completed => return Ok(()),
            state @ (BatchState::Failed | BatchState::Expired) => {
                return Err(BatchError::Terminal(state))
            }
            BatchState::Submitted | BatchState::InProgress => {
                if attempt + 1 < policy.max_attempts {
                    std::thread::sleep(policy.interval);
                }
            }
        }
    }
    Err(BatchError::RetriesExhausted(policy.max_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_policy(max_attempts: usize) -> PollPolicy {
        PollPolicy {
            max_attempts,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!("validating".parse::<BatchState>().unwrap(), BatchState::Submitted);
        assert_eq!("in_progress".parse::<BatchState>().unwrap(), BatchState::InProgress);
        assert_eq!("finalizing".parse::<BatchState>().unwrap(), BatchState::InProgress);
        assert_eq!("completed".parse::<BatchState>().unwrap(), BatchState::Completed);
        assert_eq!("cancelled".parse::<BatchState>().unwrap(), BatchState::Failed);
        assert_eq!("expired".parse::<BatchState>().unwrap(), BatchState::Expired);
        assert!(matches!(
            "weird".parse::<BatchState>(),
            Err(BatchError::UnknownState(_))
        ));
    }

    #[test]
    fn test_terminal_states() {
        assert!(BatchState::Completed.is_terminal());
        assert!(BatchState::Failed.is_terminal());
        assert!(BatchState::Expired.is_terminal());
        assert!(!BatchState::Submitted.is_terminal());
        assert!(!BatchState::InProgress.is_terminal());
    }

    #[test]
    fn test_wait_completes_after_progression() {
        let mut states = vec![
            BatchState::Submitted,
            BatchState::InProgress,
            BatchState::Completed,
        ]
        .into_iter();

        let result = wait_until_complete(instant_policy(10), || {
            Ok(states.next().unwrap_or(BatchState::Completed))
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_wait_fails_on_terminal_failure() {
        let result = wait_until_complete(instant_policy(10), || Ok(BatchState::Failed));
        assert!(matches!(result, Err(BatchError::Terminal(BatchState::Failed))));
    }

    #[test]
    fn test_wait_exhausts_retries() {
        let mut polls = 0;
        let result = wait_until_complete(instant_policy(3), || {
            polls += 1;
            Ok(BatchState::InProgress)
        });
        assert!(matches!(result, Err(BatchError::RetriesExhausted(3))));
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_wait_propagates_probe_error() {
        let result = wait_until_complete(instant_policy(5), || {
            Err(BatchError::Probe("connection refused".to_string()))
        });
        assert!(matches!(result, Err(BatchError::Probe(_))));
    }
}
