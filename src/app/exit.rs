//! Exit code logic for the indexdl process.
//!
//! Single responsibility: map run results to the process exit outcome.

use crate::ProcessExit;

/// Determines the process exit outcome from download counts.
pub(crate) fn determine_exit_outcome(
    succeeded: usize,
    failed: usize,
    interrupted: usize,
) -> ProcessExit {
    if interrupted > 0 {
        ProcessExit::Failure
    } else if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// A non-empty keyword list with zero matches is a failed run.
pub(crate) fn resolution_failed(keyword_count: usize, matched_count: usize) -> bool {
    keyword_count > 0 && matched_count == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_when_nothing_to_do() {
        assert_eq!(determine_exit_outcome(0, 0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1, 0), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2, 0), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_outcome_failure_when_interrupted() {
        assert_eq!(determine_exit_outcome(4, 0, 1), ProcessExit::Failure);
    }

    #[test]
    fn test_resolution_failed_only_for_nonempty_lists() {
        assert!(resolution_failed(3, 0));
        assert!(!resolution_failed(3, 1));
        assert!(!resolution_failed(0, 0));
    }
}
