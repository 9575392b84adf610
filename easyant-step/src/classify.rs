//! Pure console-line classification.
//!
//! Decides, per decoded line, whether the line marks the start of a new
//! target or the final build outcome. The target heuristic deliberately
//! matches the build tool's console shape (a blank line followed by a short
//! `label:` line); both checks run independently, so a line can in principle
//! carry both markers.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Prefix of the line the build tool prints on success.
pub const SUCCESS_PREFIX: &str = "BUILD SUCCESSFUL";

/// Prefix of the line the build tool prints on failure.
pub const FAILURE_PREFIX: &str = "BUILD FAILED";

/// Environment variable that disables target-boundary detection.
pub const TARGET_NOTES_DISABLED_VAR: &str = "EASYANT_TARGET_NOTES_DISABLED";

/// Terminal outcome of a build, as printed by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failure,
}

/// An out-of-band annotation attached to one line of console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The line names the target whose execution starts here.
    TargetBoundary,
    /// The line reports the final build outcome.
    Outcome(BuildOutcome),
}

/// Result of classifying a single line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub target_boundary: bool,
    pub outcome: Option<BuildOutcome>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        !self.target_boundary && self.outcome.is_none()
    }

    /// Markers in emission order: target boundary first, then outcome.
    pub fn markers(self) -> impl Iterator<Item = Marker> {
        let target = self.target_boundary.then_some(Marker::TargetBoundary);
        let outcome = self.outcome.map(Marker::Outcome);
        target.into_iter().chain(outcome)
    }
}

fn target_notes_flag() -> &'static AtomicBool {
    static FLAG: OnceLock<AtomicBool> = OnceLock::new();
    FLAG.get_or_init(|| {
        let disabled = std::env::var(TARGET_NOTES_DISABLED_VAR)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        AtomicBool::new(!disabled)
    })
}

/// Whether target-boundary detection is enabled (default ON).
pub fn target_notes_enabled() -> bool {
    target_notes_flag().load(Ordering::Relaxed)
}

/// Override the target-boundary toggle at runtime.
pub fn set_target_notes_enabled(enabled: bool) {
    target_notes_flag().store(enabled, Ordering::Relaxed);
}

#[cfg(test)]
pub(crate) fn toggle_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::Mutex;

    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}

/// Classify one line of console output.
///
/// `line` is the decoded text with the terminator already stripped;
/// `prev_line_empty` is whether the immediately preceding line had zero
/// length after terminator stripping.
pub fn classify(line: &str, prev_line_empty: bool) -> Classification {
    let target_boundary = target_notes_enabled()
        && prev_line_empty
        && line.ends_with(':')
        && !line.contains(' ');

    let outcome = if line.starts_with(SUCCESS_PREFIX) {
        Some(BuildOutcome::Success)
    } else if line.starts_with(FAILURE_PREFIX) {
        Some(BuildOutcome::Failure)
    } else {
        None
    };

    Classification {
        target_boundary,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_boundary_requires_prev_empty_colon_and_no_space() {
        let _lock = toggle_test_lock();
        assert!(classify("compile:", true).target_boundary);
        assert!(!classify("compile:", false).target_boundary);
        assert!(!classify("compile foo:", true).target_boundary);
        assert!(!classify("compile", true).target_boundary);
        assert!(!classify("", true).target_boundary);
    }

    #[test]
    fn outcome_is_prefix_and_case_sensitive() {
        assert_eq!(
            classify("BUILD SUCCESSFUL in 3s", false).outcome,
            Some(BuildOutcome::Success)
        );
        assert_eq!(
            classify("BUILD FAILED", true).outcome,
            Some(BuildOutcome::Failure)
        );
        assert_eq!(classify("build successful", false).outcome, None);
        assert_eq!(classify(" BUILD FAILED", false).outcome, None);
    }

    #[test]
    fn outcome_does_not_depend_on_prev_line() {
        assert_eq!(
            classify("BUILD FAILED", true).outcome,
            Some(BuildOutcome::Failure)
        );
        assert_eq!(
            classify("BUILD FAILED", false).outcome,
            Some(BuildOutcome::Failure)
        );
    }

    #[test]
    fn markers_emit_target_then_outcome() {
        let c = Classification {
            target_boundary: true,
            outcome: Some(BuildOutcome::Failure),
        };
        let markers: Vec<_> = c.markers().collect();
        assert_eq!(
            markers,
            vec![
                Marker::TargetBoundary,
                Marker::Outcome(BuildOutcome::Failure)
            ]
        );
    }

    #[test]
    fn disabling_target_notes_suppresses_boundaries() {
        let _lock = toggle_test_lock();
        set_target_notes_enabled(false);
        assert!(!classify("compile:", true).target_boundary);
        // Outcome detection is not gated.
        assert_eq!(
            classify("BUILD FAILED", true).outcome,
            Some(BuildOutcome::Failure)
        );
        set_target_notes_enabled(true);
        assert!(classify("compile:", true).target_boundary);
    }
}
