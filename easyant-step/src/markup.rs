//! Console markup hooks for the log-rendering layer.
//!
//! Given a marker and the rendered line text, produce styling wrappers the
//! host's console renderer inserts around the matched range. The underlying
//! bytes are never modified; markers and wrappers ride alongside them.

use crate::classify::{self, Marker};
use regex::Regex;
use std::sync::OnceLock;

pub const TARGET_OPEN: &str = "<b class=easyant-target>";
pub const TARGET_CLOSE: &str = "</b>";
pub const OUTCOME_SUCCESS_OPEN: &str = "<span class=easyant-outcome-success>";
pub const OUTCOME_FAILURE_OPEN: &str = "<span class=easyant-outcome-failure>";
pub const OUTCOME_CLOSE: &str = "</span>";

/// A styling wrapper around a byte range of a rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupSpan {
    pub start: usize,
    pub end: usize,
    pub open: &'static str,
    pub close: &'static str,
}

impl MarkupSpan {
    /// Apply the wrapper to `text`, returning the decorated string.
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.open.len() + self.close.len());
        out.push_str(&text[..self.start]);
        out.push_str(self.open);
        out.push_str(&text[self.start..self.end]);
        out.push_str(self.close);
        out.push_str(&text[self.end..]);
        out
    }
}

fn target_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Text up to the last colon on the line.
    RE.get_or_init(|| Regex::new(r"^(.*):").unwrap())
}

/// Markup for a target-boundary line: bold the target name before the colon.
///
/// Returns nothing when target notes are disabled or the line carries no
/// colon (a renderer may see lines the annotator never classified).
pub fn annotate_target(text: &str) -> Option<MarkupSpan> {
    if !classify::target_notes_enabled() {
        return None;
    }
    let caps = target_token_re().captures(text)?;
    let token = caps.get(1)?;
    Some(MarkupSpan {
        start: token.start(),
        end: token.end(),
        open: TARGET_OPEN,
        close: TARGET_CLOSE,
    })
}

/// Markup for an outcome line.
///
/// Success and failure are distinguished by substring matching on the
/// already-decorated text, independent of the original classification; a
/// line containing both substrings gets both wrappers.
pub fn annotate_outcome(text: &str) -> Vec<MarkupSpan> {
    let mut spans = Vec::new();
    if text.contains("FAIL") {
        spans.push(MarkupSpan {
            start: 0,
            end: text.len(),
            open: OUTCOME_FAILURE_OPEN,
            close: OUTCOME_CLOSE,
        });
    }
    if text.contains("SUCCESS") {
        spans.push(MarkupSpan {
            start: 0,
            end: text.len(),
            open: OUTCOME_SUCCESS_OPEN,
            close: OUTCOME_CLOSE,
        });
    }
    spans
}

/// Markup for a line decorated by `marker`.
pub fn annotate(marker: Marker, text: &str) -> Vec<MarkupSpan> {
    match marker {
        Marker::TargetBoundary => annotate_target(text).into_iter().collect(),
        Marker::Outcome(_) => annotate_outcome(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{BuildOutcome, Marker};

    #[test]
    fn target_markup_bolds_text_before_colon() {
        let _lock = crate::classify::toggle_test_lock();
        let span = annotate_target("compile:").unwrap();
        assert_eq!(span.apply("compile:"), "<b class=easyant-target>compile</b>:");
    }

    #[test]
    fn target_markup_spans_up_to_last_colon() {
        let _lock = crate::classify::toggle_test_lock();
        let span = annotate_target("a:b:").unwrap();
        assert_eq!((span.start, span.end), (0, 3));
    }

    #[test]
    fn target_markup_absent_without_colon() {
        assert!(annotate_target("no colon here").is_none());
    }

    #[test]
    fn outcome_markup_distinguishes_by_substring() {
        let fail = annotate_outcome("BUILD FAILED");
        assert_eq!(fail.len(), 1);
        assert_eq!(fail[0].open, OUTCOME_FAILURE_OPEN);

        let ok = annotate_outcome("BUILD SUCCESSFUL in 3s");
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].open, OUTCOME_SUCCESS_OPEN);
        assert_eq!(
            ok[0].apply("BUILD SUCCESSFUL in 3s"),
            "<span class=easyant-outcome-success>BUILD SUCCESSFUL in 3s</span>"
        );
    }

    #[test]
    fn outcome_markup_can_emit_both_wrappers() {
        let spans = annotate_outcome("FAIL then SUCCESS");
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn annotate_dispatches_on_marker() {
        let _lock = crate::classify::toggle_test_lock();
        assert_eq!(annotate(Marker::TargetBoundary, "dist:").len(), 1);
        assert_eq!(
            annotate(Marker::Outcome(BuildOutcome::Failure), "BUILD FAILED").len(),
            1
        );
    }
}
