//! Submission state machine.
//!
//! ```text
//! PendingDispatch ──accepted──▶ Submitted ◀──▶ Running ──▶ Finished
//!        │                          │             │
//!        └──rejected / local fail───┴─────────────┴──────▶ Failed
//! ```
//!
//! `Finished` and `Failed` are terminal. The only event allowed out of a
//! terminal state is `Abort`, which the failure handler uses to force
//! `Failed` after a fatal task error (e.g. a finished run whose output
//! cannot be ingested).

use scoreq_state::SubmissionStatus;

use crate::backend::ExecutionStatus;
use crate::error::InvalidTransition;

/// Something that happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The remote service accepted the run and returned a handle.
    DispatchAccepted,
    /// The remote service refused the run, or could not be reached.
    DispatchRejected,
    /// A local run exited; `success` is a zero exit code.
    LocalRunFinished { success: bool },
    /// A status poll returned this backend status.
    Reported(ExecutionStatus),
    /// The poll ceiling was exceeded.
    LimitExceeded,
    /// A status poll returned nothing.
    QueryFailed,
    /// A task failed fatally.
    Abort,
}

/// Compute the status that follows `event`. `Ok(None)` means the event does
/// not change the status.
pub fn transition(
    current: SubmissionStatus,
    event: LifecycleEvent,
) -> Result<Option<SubmissionStatus>, InvalidTransition> {
    use LifecycleEvent as E;
    use SubmissionStatus as S;

    let next = match (current, event) {
        (_, E::Abort) => Some(S::Failed),

        (S::PendingDispatch, E::DispatchAccepted) => Some(S::Submitted),
        (S::PendingDispatch, E::DispatchRejected) => Some(S::Failed),
        (S::PendingDispatch, E::LocalRunFinished { success: true }) => Some(S::Finished),
        (S::PendingDispatch, E::LocalRunFinished { success: false }) => Some(S::Failed),

        (S::Submitted | S::Running, E::Reported(status)) => Some(match status {
            ExecutionStatus::Submitted => S::Submitted,
            ExecutionStatus::Running => S::Running,
            ExecutionStatus::Finished => S::Finished,
            ExecutionStatus::Failed => S::Failed,
        }),

        (status, E::LimitExceeded) if !status.is_terminal() => Some(S::Failed),
        (status, E::QueryFailed) if !status.is_terminal() => None,

        (from, event) => return Err(InvalidTransition { from, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionStatus as S;

    #[test]
    fn test_dispatch_transitions() {
        assert_eq!(
            transition(S::PendingDispatch, LifecycleEvent::DispatchAccepted).unwrap(),
            Some(S::Submitted)
        );
        assert_eq!(
            transition(S::PendingDispatch, LifecycleEvent::DispatchRejected).unwrap(),
            Some(S::Failed)
        );
    }

    #[test]
    fn test_local_run_transitions() {
        assert_eq!(
            transition(
                S::PendingDispatch,
                LifecycleEvent::LocalRunFinished { success: true }
            )
            .unwrap(),
            Some(S::Finished)
        );
        assert_eq!(
            transition(
                S::PendingDispatch,
                LifecycleEvent::LocalRunFinished { success: false }
            )
            .unwrap(),
            Some(S::Failed)
        );
    }

    #[test]
    fn test_reported_status_is_mirrored() {
        for current in [S::Submitted, S::Running] {
            for (reported, expected) in [
                (ExecutionStatus::Submitted, S::Submitted),
                (ExecutionStatus::Running, S::Running),
                (ExecutionStatus::Finished, S::Finished),
                (ExecutionStatus::Failed, S::Failed),
            ] {
                assert_eq!(
                    transition(current, LifecycleEvent::Reported(reported)).unwrap(),
                    Some(expected)
                );
            }
        }
    }

    #[test]
    fn test_limit_and_query_failure() {
        assert_eq!(
            transition(S::Running, LifecycleEvent::LimitExceeded).unwrap(),
            Some(S::Failed)
        );
        assert_eq!(
            transition(S::Submitted, LifecycleEvent::QueryFailed).unwrap(),
            None
        );
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for terminal in [S::Finished, S::Failed] {
            assert!(transition(terminal, LifecycleEvent::Reported(ExecutionStatus::Running)).is_err());
            assert!(transition(terminal, LifecycleEvent::DispatchAccepted).is_err());
            assert!(transition(terminal, LifecycleEvent::LimitExceeded).is_err());
            assert!(transition(terminal, LifecycleEvent::QueryFailed).is_err());
        }
    }

    #[test]
    fn test_poll_before_dispatch_is_invalid() {
        assert!(transition(
            S::PendingDispatch,
            LifecycleEvent::Reported(ExecutionStatus::Running)
        )
        .is_err());
    }

    #[test]
    fn test_abort_always_fails() {
        for current in [S::PendingDispatch, S::Submitted, S::Running, S::Finished, S::Failed] {
            assert_eq!(
                transition(current, LifecycleEvent::Abort).unwrap(),
                Some(S::Failed)
            );
        }
    }
}
