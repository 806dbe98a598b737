// src/task/teardown.rs

//! Pure teardown state machine.
//!
//! Tracks the two one-way flags "teardown started" and "teardown completed"
//! and decides, on each entry, whether teardown should run. Also reconciles
//! the observed exit status against the acceptable codes. No Tokio, no
//! processes: the async shell in [`super::Task`] drives it.

use std::collections::BTreeSet;

use crate::errors::TaskFailure;
use crate::exec::ExitResult;

/// What a teardown request should do, given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownEntry {
    /// First request: teardown was marked started and must run now.
    Proceed,
    /// Teardown already finished; nothing to do.
    AlreadyComplete,
    /// Completed without ever having started.
    Inconsistent,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownState {
    started: bool,
    completed: bool,
}

impl TeardownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Evaluate a teardown request, marking teardown started if it should
    /// proceed.
    pub fn enter(&mut self) -> TeardownEntry {
        if self.completed && !self.started {
            return TeardownEntry::Inconsistent;
        }
        if self.completed {
            return TeardownEntry::AlreadyComplete;
        }
        self.started = true;
        TeardownEntry::Proceed
    }

    /// Mark teardown completed. Only valid after a `Proceed` entry.
    pub fn finish(&mut self) {
        debug_assert!(self.started, "teardown finished before it started");
        self.completed = true;
    }
}

/// Decide the failure (if any) implied by the exit status.
///
/// A disallowed exit code wins over the initiating message; an observation
/// error uses the initiating message when there is one.
pub fn reconcile_exit(
    program: &str,
    exit: &ExitResult,
    acceptable: &BTreeSet<i32>,
    message: Option<String>,
) -> Option<TaskFailure> {
    match exit {
        Ok(code) if !acceptable.contains(code) => Some(TaskFailure::Status {
            program: program.to_string(),
            code: *code,
        }),
        Ok(_) => message.map(|message| TaskFailure::Observation {
            program: program.to_string(),
            message,
        }),
        Err(observed) => Some(TaskFailure::Observation {
            program: program.to_string(),
            message: message.unwrap_or_else(|| observed.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_only() -> BTreeSet<i32> {
        BTreeSet::from([0])
    }

    #[test]
    fn first_entry_proceeds_and_marks_started() {
        let mut state = TeardownState::new();
        assert_eq!(state.enter(), TeardownEntry::Proceed);
        assert!(state.is_started());
        assert!(!state.is_completed());
    }

    #[test]
    fn entry_after_finish_is_a_no_op() {
        let mut state = TeardownState::new();
        state.enter();
        state.finish();
        assert_eq!(state.enter(), TeardownEntry::AlreadyComplete);
        assert_eq!(state.enter(), TeardownEntry::AlreadyComplete);
    }

    #[test]
    fn completed_without_start_is_rejected() {
        let mut state = TeardownState {
            started: false,
            completed: true,
        };
        assert_eq!(state.enter(), TeardownEntry::Inconsistent);
        assert!(!state.is_started());
    }

    #[test]
    fn accepted_code_without_message_is_success() {
        assert_eq!(reconcile_exit("true", &Ok(0), &zero_only(), None), None);
    }

    #[test]
    fn rejected_code_names_program_and_code() {
        let failure = reconcile_exit("sh", &Ok(7), &zero_only(), None).unwrap();
        assert_eq!(failure.to_string(), "sh returned non-zero status code 7");
        assert_eq!(failure.status_code(), Some(7));
    }

    #[test]
    fn status_failure_takes_precedence_over_message() {
        let failure =
            reconcile_exit("sh", &Ok(3), &zero_only(), Some("boom".to_string())).unwrap();
        assert_eq!(failure.status_code(), Some(3));
    }

    #[test]
    fn observation_error_prefers_initiating_message() {
        let failure = reconcile_exit(
            "sleep",
            &Err("wait failed".to_string()),
            &zero_only(),
            Some("lost track".to_string()),
        )
        .unwrap();
        assert_eq!(
            failure,
            TaskFailure::Observation {
                program: "sleep".to_string(),
                message: "lost track".to_string(),
            }
        );

        let failure =
            reconcile_exit("sleep", &Err("wait failed".to_string()), &zero_only(), None).unwrap();
        assert!(failure.to_string().contains("wait failed"));
    }

    #[test]
    fn non_zero_code_can_be_acceptable() {
        let acceptable = BTreeSet::from([0, 1, 143]);
        assert_eq!(reconcile_exit("grep", &Ok(1), &acceptable, None), None);
        assert_eq!(reconcile_exit("sleep", &Ok(143), &acceptable, None), None);
    }
}
