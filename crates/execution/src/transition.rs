//! State machine transition validation for instance and node states.

use crate::error::ExecutionError;
use crate::status::{NodeInstanceState, ProcessState};

/// Returns `true` if the instance-level transition from `from` to `to` is valid.
///
/// ERROR returns to ACTIVE only through operator recovery; COMPLETED and
/// ABORTED admit nothing.
#[must_use]
pub fn can_transition_process(from: ProcessState, to: ProcessState) -> bool {
    matches!(
        (from, to),
        (ProcessState::Active, ProcessState::Completed)
            | (ProcessState::Active, ProcessState::Aborted)
            | (ProcessState::Active, ProcessState::Error)
            | (ProcessState::Active, ProcessState::Suspended)
            | (ProcessState::Suspended, ProcessState::Active)
            | (ProcessState::Suspended, ProcessState::Aborted)
            | (ProcessState::Error, ProcessState::Active)
            | (ProcessState::Error, ProcessState::Aborted)
    )
}

/// Validate an instance-level transition, returning an error if invalid.
pub fn validate_process_transition(
    from: ProcessState,
    to: ProcessState,
) -> Result<(), ExecutionError> {
    if can_transition_process(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::invalid_transition(from, to))
    }
}

/// Returns `true` if the node-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_node(from: NodeInstanceState, to: NodeInstanceState) -> bool {
    matches!(
        (from, to),
        (NodeInstanceState::Active, NodeInstanceState::Completed)
            | (NodeInstanceState::Active, NodeInstanceState::Aborted)
    )
}

/// Validate a node-level transition, returning an error if invalid.
pub fn validate_node_transition(
    from: NodeInstanceState,
    to: NodeInstanceState,
) -> Result<(), ExecutionError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::invalid_transition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn arb_state() -> impl Strategy<Value = ProcessState> {
        prop_oneof![
            Just(ProcessState::Active),
            Just(ProcessState::Completed),
            Just(ProcessState::Aborted),
            Just(ProcessState::Error),
            Just(ProcessState::Suspended),
        ]
    }

    #[rstest]
    #[case(ProcessState::Active, ProcessState::Completed)]
    #[case(ProcessState::Active, ProcessState::Error)]
    #[case(ProcessState::Active, ProcessState::Suspended)]
    #[case(ProcessState::Suspended, ProcessState::Active)]
    #[case(ProcessState::Error, ProcessState::Active)]
    #[case(ProcessState::Error, ProcessState::Aborted)]
    fn valid_process_transitions(#[case] from: ProcessState, #[case] to: ProcessState) {
        assert!(validate_process_transition(from, to).is_ok());
    }

    #[rstest]
    #[case(ProcessState::Error, ProcessState::Completed)]
    #[case(ProcessState::Suspended, ProcessState::Error)]
    #[case(ProcessState::Active, ProcessState::Active)]
    fn invalid_process_transitions(#[case] from: ProcessState, #[case] to: ProcessState) {
        let err = validate_process_transition(from, to).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
    }

    #[test]
    fn node_transitions() {
        assert!(can_transition_node(
            NodeInstanceState::Active,
            NodeInstanceState::Completed
        ));
        assert!(can_transition_node(
            NodeInstanceState::Active,
            NodeInstanceState::Aborted
        ));
        assert!(validate_node_transition(
            NodeInstanceState::Completed,
            NodeInstanceState::Aborted
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn terminal_states_have_no_outgoing_transition(from in arb_state(), to in arb_state()) {
            if from.is_terminal() {
                prop_assert!(!can_transition_process(from, to));
            }
        }

        #[test]
        fn nothing_returns_to_a_fresh_start_except_recovery(from in arb_state()) {
            let allowed = can_transition_process(from, ProcessState::Active);
            prop_assert_eq!(
                allowed,
                matches!(from, ProcessState::Suspended | ProcessState::Error)
            );
        }
    }
}
